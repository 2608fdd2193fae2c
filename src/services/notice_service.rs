use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{require_text, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{timestamp, Notice, NoticeAudience, NoticePriority, Role};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct NoticeInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub audience: NoticeAudience,
    #[serde(default)]
    pub priority: NoticePriority,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoticeUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub audience: Option<NoticeAudience>,
    pub priority: Option<NoticePriority>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoticeFilters {
    pub priority: Option<NoticePriority>,
    /// Admins only.
    #[serde(default)]
    pub include_expired: bool,
}

pub struct NoticeService {
    state: AppState,
}

impl NoticeService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthUser, filters: NoticeFilters, page: Page) -> ServiceResult<Vec<Notice>> {
        let mut filter = FilterData::eq("audience", json!({ "$in": NoticeAudience::visible_to(actor.role) }));
        if !(filters.include_expired && actor.is_admin()) {
            filter.and_where(
                "$or",
                json!([
                    { "expires_at": { "$exists": false } },
                    { "expires_at": { "$gt": timestamp::to_json(Utc::now()) } }
                ]),
            );
        }
        if let Some(priority) = filters.priority {
            filter.and_where("priority", priority);
        }
        Ok(self.state.repo::<Notice>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Notice> {
        let notice = self.state.repo::<Notice>().select_404(id).await?;
        if !NoticeAudience::visible_to(actor.role).contains(&notice.audience) {
            return Err(ServiceError::NotFound("Notice not found".to_string()));
        }
        if !actor.is_admin() && notice.is_expired(Utc::now()) {
            return Err(ServiceError::NotFound("Notice not found".to_string()));
        }
        Ok(notice)
    }

    pub async fn create(&self, actor: &AuthUser, input: NoticeInput) -> ServiceResult<Notice> {
        let now = Utc::now();
        if input.expires_at.is_some_and(|at| at <= now) {
            return Err(ServiceError::invalid("expires_at", "Expiry must be in the future"));
        }
        let notice = Notice {
            id: Uuid::new_v4(),
            title: require_text("title", &input.title)?,
            content: require_text("content", &input.content)?,
            audience: input.audience,
            priority: input.priority,
            posted_by: actor.user_id,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };
        self.state.repo::<Notice>().insert(&notice).await?;
        Ok(notice)
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: NoticeUpdate) -> ServiceResult<Notice> {
        let mut notice = self.get_owned(actor, id).await?;

        if let Some(title) = input.title {
            notice.title = require_text("title", &title)?;
        }
        if let Some(content) = input.content {
            notice.content = require_text("content", &content)?;
        }
        if let Some(audience) = input.audience {
            notice.audience = audience;
        }
        if let Some(priority) = input.priority {
            notice.priority = priority;
        }
        if input.expires_at.is_some() {
            notice.expires_at = input.expires_at;
        }

        notice.updated_at = Utc::now();
        self.state.repo::<Notice>().update(&notice).await?;
        Ok(notice)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<()> {
        self.get_owned(actor, id).await?;
        self.state.repo::<Notice>().delete(id).await?;
        Ok(())
    }

    /// Lawyers may only change notices they posted.
    async fn get_owned(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Notice> {
        let notice = self.state.repo::<Notice>().select_404(id).await?;
        if actor.role != Role::Admin && notice.posted_by != actor.user_id {
            return Err(ServiceError::forbidden("You can only modify notices you posted"));
        }
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn actor(role: Role) -> AuthUser {
        AuthUser { user_id: Uuid::new_v4(), email: format!("{}@firm.test", role), role }
    }

    fn notice(audience: NoticeAudience) -> NoticeInput {
        NoticeInput {
            title: "Office closed".to_string(),
            content: "Closed Monday for the holiday.".to_string(),
            audience,
            priority: NoticePriority::Important,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn audience_limits_what_each_role_sees() {
        let notices = NoticeService::new(AppState::in_memory());
        let admin = actor(Role::Admin);

        notices.create(&admin, notice(NoticeAudience::All)).await.unwrap();
        notices.create(&admin, notice(NoticeAudience::Lawyers)).await.unwrap();
        let for_clients = notices.create(&admin, notice(NoticeAudience::Clients)).await.unwrap();

        let lawyer = actor(Role::Lawyer);
        assert_eq!(notices.list(&lawyer, NoticeFilters::default(), Page::default()).await.unwrap().len(), 2);
        assert_eq!(notices.list(&actor(Role::Client), NoticeFilters::default(), Page::default()).await.unwrap().len(), 2);
        assert_eq!(notices.list(&admin, NoticeFilters::default(), Page::default()).await.unwrap().len(), 3);
        assert!(matches!(notices.get(&lawyer, for_clients.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_notices_are_hidden_unless_admin_asks() {
        let state = AppState::in_memory();
        let notices = NoticeService::new(state.clone());
        let admin = actor(Role::Admin);

        let posted = notices
            .create(&admin, NoticeInput { expires_at: Some(Utc::now() + Duration::hours(1)), ..notice(NoticeAudience::All) })
            .await
            .unwrap();
        let mut expired = posted.clone();
        expired.id = Uuid::new_v4();
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        state.repo::<Notice>().insert(&expired).await.unwrap();

        let lawyer = actor(Role::Lawyer);
        let visible = notices.list(&lawyer, NoticeFilters::default(), Page::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, posted.id);

        let everything = NoticeFilters { include_expired: true, ..Default::default() };
        assert_eq!(notices.list(&admin, everything, Page::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lawyers_only_edit_their_own_notices() {
        let notices = NoticeService::new(AppState::in_memory());
        let author = actor(Role::Lawyer);
        let posted = notices.create(&author, notice(NoticeAudience::Lawyers)).await.unwrap();

        let other = actor(Role::Lawyer);
        assert!(matches!(notices.delete(&other, posted.id).await, Err(ServiceError::Forbidden(_))));
        assert!(notices.delete(&actor(Role::Admin), posted.id).await.is_ok());
    }
}
