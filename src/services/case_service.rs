use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{optional_text, require_text, ClientService, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{
    Case, CaseDocument, CasePriority, CaseStatus, CaseType, Client, Role, TimelineEvent, TimelineEventType, User,
};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct CreateCaseInput {
    pub title: String,
    pub description: Option<String>,
    pub client_id: Uuid,
    #[serde(default)]
    pub assigned_lawyers: Vec<Uuid>,
    #[serde(default)]
    pub case_type: CaseType,
    #[serde(default)]
    pub priority: CasePriority,
    pub court: Option<String>,
    pub opened_at: Option<NaiveDate>,
    /// Imported records may carry their existing number.
    pub case_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCaseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_lawyers: Option<Vec<Uuid>>,
    pub case_type: Option<CaseType>,
    pub status: Option<CaseStatus>,
    pub priority: Option<CasePriority>,
    pub court: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaseFilters {
    pub status: Option<CaseStatus>,
    pub client_id: Option<Uuid>,
    pub priority: Option<CasePriority>,
    /// Only cases whose number came from the fallback path.
    pub degraded: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    pub url: String,
    pub doc_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineInput {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: TimelineEventType,
    pub event_date: Option<DateTime<Utc>>,
}

pub struct CaseService {
    state: AppState,
}

impl CaseService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthUser, filters: CaseFilters, page: Page) -> ServiceResult<Vec<Case>> {
        let mut filter = FilterData::new();
        match actor.role {
            Role::Admin => {}
            Role::Lawyer => {
                filter.and_where("assigned_lawyers", serde_json::json!({ "$contains": actor.user_id }));
            }
            Role::Client => {
                let client_ids = ClientService::new(self.state.clone()).ids_for_user(actor.user_id).await?;
                filter.and_where("client_id", serde_json::json!({ "$in": client_ids }));
            }
        }
        if let Some(status) = filters.status {
            filter.and_where("status", status);
        }
        if let Some(client_id) = filters.client_id {
            filter.and_where("client_id", client_id);
        }
        if let Some(priority) = filters.priority {
            filter.and_where("priority", priority);
        }
        if let Some(degraded) = filters.degraded {
            filter.and_where("number_degraded", degraded);
        }
        Ok(self.state.repo::<Case>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Case> {
        let case = self.state.repo::<Case>().select_404(id).await?;
        self.ensure_visible(actor, &case).await?;
        Ok(case)
    }

    pub async fn create(&self, actor: &AuthUser, input: CreateCaseInput) -> ServiceResult<Case> {
        let title = require_text("title", &input.title)?;
        self.state
            .repo::<Client>()
            .select_by_id(input.client_id)
            .await?
            .ok_or_else(|| ServiceError::invalid("client_id", "Client does not exist"))?;

        let mut assigned_lawyers = input.assigned_lawyers;
        if assigned_lawyers.is_empty() && actor.role == Role::Lawyer {
            assigned_lawyers.push(actor.user_id);
        }
        self.ensure_lawyers(&assigned_lawyers).await?;

        let now = Utc::now();
        let case = Case {
            id: Uuid::new_v4(),
            case_number: input.case_number.map(|n| n.trim().to_string()).unwrap_or_default(),
            number_degraded: false,
            title,
            description: optional_text(input.description),
            client_id: input.client_id,
            assigned_lawyers,
            case_type: input.case_type,
            status: CaseStatus::Open,
            priority: input.priority,
            court: optional_text(input.court),
            opened_at: input.opened_at.unwrap_or_else(|| now.date_naive()),
            closed_at: None,
            documents: vec![],
            timeline: vec![TimelineEvent {
                id: Uuid::new_v4(),
                title: "Case opened".to_string(),
                description: None,
                event_type: TimelineEventType::Note,
                event_date: now,
                created_by: actor.user_id,
            }],
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };

        let case = self
            .state
            .sequences
            .insert_numbered(&self.state.repo::<Case>(), case)
            .await?;
        tracing::info!("Opened case {} ({})", case.case_number, case.id);
        Ok(case)
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: UpdateCaseInput) -> ServiceResult<Case> {
        let mut case = self.get_for_edit(actor, id).await?;

        if let Some(title) = input.title {
            case.title = require_text("title", &title)?;
        }
        if input.description.is_some() {
            case.description = optional_text(input.description);
        }
        if input.court.is_some() {
            case.court = optional_text(input.court);
        }
        if let Some(case_type) = input.case_type {
            case.case_type = case_type;
        }
        if let Some(priority) = input.priority {
            case.priority = priority;
        }
        if let Some(lawyers) = input.assigned_lawyers {
            self.ensure_lawyers(&lawyers).await?;
            case.assigned_lawyers = lawyers;
        }
        if let Some(status) = input.status {
            case.transition(status, actor.user_id);
        }

        self.save(&mut case).await?;
        Ok(case)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.state.repo::<Case>().delete(id).await?;
        Ok(())
    }

    pub async fn add_document(&self, actor: &AuthUser, id: Uuid, input: DocumentInput) -> ServiceResult<Case> {
        let mut case = self.get_for_edit(actor, id).await?;
        let now = Utc::now();
        let document = CaseDocument {
            id: Uuid::new_v4(),
            name: require_text("name", &input.name)?,
            url: require_text("url", &input.url)?,
            doc_type: optional_text(input.doc_type),
            uploaded_by: actor.user_id,
            uploaded_at: now,
        };
        case.timeline.push(TimelineEvent {
            id: Uuid::new_v4(),
            title: format!("Document added: {}", document.name),
            description: None,
            event_type: TimelineEventType::Filing,
            event_date: now,
            created_by: actor.user_id,
        });
        case.documents.push(document);

        self.save(&mut case).await?;
        Ok(case)
    }

    pub async fn remove_document(&self, actor: &AuthUser, id: Uuid, document_id: Uuid) -> ServiceResult<Case> {
        let mut case = self.get_for_edit(actor, id).await?;
        let before = case.documents.len();
        case.documents.retain(|d| d.id != document_id);
        if case.documents.len() == before {
            return Err(ServiceError::NotFound("Document not found".to_string()));
        }

        self.save(&mut case).await?;
        Ok(case)
    }

    pub async fn add_timeline_event(&self, actor: &AuthUser, id: Uuid, input: TimelineInput) -> ServiceResult<Case> {
        let mut case = self.get_for_edit(actor, id).await?;
        case.timeline.push(TimelineEvent {
            id: Uuid::new_v4(),
            title: require_text("title", &input.title)?,
            description: optional_text(input.description),
            event_type: input.event_type,
            event_date: input.event_date.unwrap_or_else(Utc::now),
            created_by: actor.user_id,
        });
        case.timeline.sort_by_key(|e| e.event_date);

        self.save(&mut case).await?;
        Ok(case)
    }

    /// Whether `actor` may see `case`: admins see all, lawyers their assignments,
    /// clients the cases of their linked client records.
    pub async fn ensure_visible(&self, actor: &AuthUser, case: &Case) -> ServiceResult<()> {
        let visible = match actor.role {
            Role::Admin => true,
            Role::Lawyer => case.is_assigned(actor.user_id),
            Role::Client => ClientService::new(self.state.clone())
                .ids_for_user(actor.user_id)
                .await?
                .contains(&case.client_id),
        };
        if visible {
            Ok(())
        } else {
            Err(ServiceError::forbidden("You do not have access to this case"))
        }
    }

    async fn get_for_edit(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Case> {
        let case = self.state.repo::<Case>().select_404(id).await?;
        match actor.role {
            Role::Admin => Ok(case),
            Role::Lawyer if case.is_assigned(actor.user_id) => Ok(case),
            _ => Err(ServiceError::forbidden("Only assigned lawyers can modify this case")),
        }
    }

    async fn ensure_lawyers(&self, ids: &[Uuid]) -> ServiceResult<()> {
        let users = self.state.repo::<User>().select_ids(ids).await?;
        for id in ids {
            match users.iter().find(|u| u.id == *id) {
                Some(user) if user.role.is_staff() => {}
                Some(_) => return Err(ServiceError::invalid("assigned_lawyers", format!("User {} is not a lawyer", id))),
                None => return Err(ServiceError::invalid("assigned_lawyers", format!("User {} does not exist", id))),
            }
        }
        Ok(())
    }

    async fn save(&self, case: &mut Case) -> ServiceResult<()> {
        case.updated_at = Utc::now();
        self.state.repo::<Case>().update(case).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::client_service::ClientInput;
    use crate::services::user_service::CreateUserInput;
    use crate::services::UserService;

    pub(crate) struct Fixture {
        pub state: AppState,
        pub admin: AuthUser,
        pub lawyer: AuthUser,
        pub client_id: Uuid,
    }

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

    pub(crate) async fn fixture() -> Fixture {
        let state = AppState::in_memory();
        let admin = actor(&state, "admin@firm.test", Role::Admin).await;
        let lawyer = actor(&state, "lawyer@firm.test", Role::Lawyer).await;
        let client = ClientService::new(state.clone())
            .create(
                &admin,
                ClientInput {
                    name: "Acme Ltd".to_string(),
                    email: None,
                    phone: None,
                    address: None,
                    company: Some("Acme".to_string()),
                    client_type: Default::default(),
                    assigned_lawyer: None,
                    user_id: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        Fixture { state, admin, lawyer, client_id: client.id }
    }

    fn input(client_id: Uuid, title: &str) -> CreateCaseInput {
        CreateCaseInput {
            title: title.to_string(),
            description: None,
            client_id,
            assigned_lawyers: vec![],
            case_type: CaseType::Corporate,
            priority: CasePriority::High,
            court: None,
            opened_at: None,
            case_number: None,
        }
    }

    #[tokio::test]
    async fn cases_are_numbered_in_creation_order() {
        let f = fixture().await;
        let cases = CaseService::new(f.state.clone());
        let year = Utc::now().format("%Y").to_string();

        for n in 1..=3 {
            let case = cases.create(&f.lawyer, input(f.client_id, "Merger review")).await.unwrap();
            assert_eq!(case.case_number, format!("CASE-{}-{:04}", year, n));
            assert!(!case.number_degraded);
            assert_eq!(case.assigned_lawyers, vec![f.lawyer.user_id]);
        }
    }

    #[tokio::test]
    async fn supplied_case_number_is_kept() {
        let f = fixture().await;
        let cases = CaseService::new(f.state.clone());

        let case = cases
            .create(&f.admin, CreateCaseInput { case_number: Some("CASE-2019-0042".to_string()), ..input(f.client_id, "Legacy") })
            .await
            .unwrap();
        assert_eq!(case.case_number, "CASE-2019-0042");
    }

    #[tokio::test]
    async fn unknown_client_is_rejected() {
        let f = fixture().await;
        let err = CaseService::new(f.state.clone())
            .create(&f.admin, input(Uuid::new_v4(), "Orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn lawyers_only_see_and_edit_their_cases() {
        let f = fixture().await;
        let cases = CaseService::new(f.state.clone());
        let other = actor(&f.state, "other@firm.test", Role::Lawyer).await;

        let mine = cases.create(&f.lawyer, input(f.client_id, "Mine")).await.unwrap();
        cases.create(&other, input(f.client_id, "Theirs")).await.unwrap();

        let listed = cases.list(&f.lawyer, CaseFilters::default(), Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        assert!(matches!(cases.get(&other, mine.id).await, Err(ServiceError::Forbidden(_))));
        assert_eq!(cases.list(&f.admin, CaseFilters::default(), Page::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closing_a_case_records_the_transition() {
        let f = fixture().await;
        let cases = CaseService::new(f.state.clone());
        let case = cases.create(&f.lawyer, input(f.client_id, "Dispute")).await.unwrap();

        let closed = cases
            .update(&f.lawyer, case.id, UpdateCaseInput { status: Some(CaseStatus::Closed), ..Default::default() })
            .await
            .unwrap();
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.case_number, case.case_number);
        assert!(closed.timeline.iter().any(|e| e.event_type == TimelineEventType::StatusChange));
    }

    #[tokio::test]
    async fn documents_can_be_attached_and_removed() {
        let f = fixture().await;
        let cases = CaseService::new(f.state.clone());
        let case = cases.create(&f.lawyer, input(f.client_id, "Contracts")).await.unwrap();

        let with_doc = cases
            .add_document(
                &f.lawyer,
                case.id,
                DocumentInput { name: "NDA.pdf".to_string(), url: "https://files.test/nda".to_string(), doc_type: None },
            )
            .await
            .unwrap();
        let doc_id = with_doc.documents[0].id;

        let without = cases.remove_document(&f.lawyer, case.id, doc_id).await.unwrap();
        assert!(without.documents.is_empty());
        assert!(matches!(
            cases.remove_document(&f.lawyer, case.id, doc_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
