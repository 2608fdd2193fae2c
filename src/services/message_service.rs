use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{require_text, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{Case, Message, User};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct SendMessageInput {
    pub recipient_id: Uuid,
    pub case_id: Option<Uuid>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mailbox {
    #[default]
    Inbox,
    Sent,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageFilters {
    #[serde(default, rename = "box")]
    pub mailbox: Mailbox,
    pub unread: Option<bool>,
    pub case_id: Option<Uuid>,
}

pub struct MessageService {
    state: AppState,
}

impl MessageService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthUser, filters: MessageFilters, page: Page) -> ServiceResult<Vec<Message>> {
        let mut filter = match filters.mailbox {
            Mailbox::Inbox => FilterData::eq("recipient_id", actor.user_id),
            Mailbox::Sent => FilterData::eq("sender_id", actor.user_id),
        };
        if let Some(unread) = filters.unread {
            filter.and_where("read", !unread);
        }
        if let Some(case_id) = filters.case_id {
            filter.and_where("case_id", case_id);
        }
        Ok(self.state.repo::<Message>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Message> {
        let message = self.state.repo::<Message>().select_404(id).await?;
        if !message.involves(actor.user_id) {
            return Err(ServiceError::forbidden("You do not have access to this message"));
        }
        Ok(message)
    }

    pub async fn send(&self, actor: &AuthUser, input: SendMessageInput) -> ServiceResult<Message> {
        if input.recipient_id == actor.user_id {
            return Err(ServiceError::invalid("recipient_id", "You cannot message yourself"));
        }
        let recipient = self
            .state
            .repo::<User>()
            .select_by_id(input.recipient_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ServiceError::invalid("recipient_id", "Recipient does not exist"))?;
        if let Some(case_id) = input.case_id {
            self.state
                .repo::<Case>()
                .select_by_id(case_id)
                .await?
                .ok_or_else(|| ServiceError::invalid("case_id", "Case does not exist"))?;
        }

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: actor.user_id,
            recipient_id: recipient.id,
            case_id: input.case_id,
            subject: require_text("subject", &input.subject)?,
            body: require_text("body", &input.body)?,
            read: false,
            read_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state.repo::<Message>().insert(&message).await?;
        tracing::debug!("Message {} sent from {} to {}", message.id, actor.user_id, recipient.id);
        Ok(message)
    }

    /// Only the recipient can mark a message read; repeat calls keep the first `read_at`.
    pub async fn mark_read(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Message> {
        let mut message = self.get(actor, id).await?;
        if message.recipient_id != actor.user_id {
            return Err(ServiceError::forbidden("Only the recipient can mark a message as read"));
        }
        if !message.read {
            let now = Utc::now();
            message.read = true;
            message.read_at = Some(now);
            message.updated_at = now;
            self.state.repo::<Message>().update(&message).await?;
        }
        Ok(message)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<()> {
        self.get(actor, id).await?;
        self.state.repo::<Message>().delete(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use crate::services::user_service::CreateUserInput;
    use crate::services::UserService;

    async fn actor(state: &AppState, email: &str, role: Role) -> AuthUser {
        let user = UserService::new(state.clone())
            .create(CreateUserInput {
                name: email.to_string(),
                email: email.to_string(),
                password: "password123".to_string(),
                role,
                phone: None,
            })
            .await
            .unwrap();
        AuthUser { user_id: user.id, email: user.email, role }
    }

    fn note(to: Uuid) -> SendMessageInput {
        SendMessageInput {
            recipient_id: to,
            case_id: None,
            subject: "Hearing moved".to_string(),
            body: "The hearing is now on Friday.".to_string(),
        }
    }

    #[tokio::test]
    async fn inbox_and_sent_boxes() {
        let state = AppState::in_memory();
        let lawyer = actor(&state, "lee@firm.test", Role::Lawyer).await;
        let client = actor(&state, "pat@home.test", Role::Client).await;
        let messages = MessageService::new(state.clone());

        messages.send(&lawyer, note(client.user_id)).await.unwrap();

        let inbox = messages.list(&client, MessageFilters::default(), Page::default()).await.unwrap();
        assert_eq!(inbox.len(), 1);
        let sent = messages
            .list(&lawyer, MessageFilters { mailbox: Mailbox::Sent, ..Default::default() }, Page::default())
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert!(messages.list(&lawyer, MessageFilters::default(), Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_recipient_marks_read_and_outsiders_are_refused() {
        let state = AppState::in_memory();
        let lawyer = actor(&state, "lee@firm.test", Role::Lawyer).await;
        let client = actor(&state, "pat@home.test", Role::Client).await;
        let outsider = actor(&state, "sam@home.test", Role::Client).await;
        let messages = MessageService::new(state.clone());

        let message = messages.send(&lawyer, note(client.user_id)).await.unwrap();

        assert!(matches!(messages.mark_read(&lawyer, message.id).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(messages.get(&outsider, message.id).await, Err(ServiceError::Forbidden(_))));

        let read = messages.mark_read(&client, message.id).await.unwrap();
        assert!(read.read);
        assert!(read.read_at.is_some());
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected() {
        let state = AppState::in_memory();
        let lawyer = actor(&state, "lee@firm.test", Role::Lawyer).await;
        let err = MessageService::new(state).send(&lawyer, note(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }
}
