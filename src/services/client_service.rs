use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{optional_text, require_text, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::database::models::{Case, Client, ClientStatus, ClientType, Role, User};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

#[derive(Debug, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub client_type: ClientType,
    pub assigned_lawyer: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub client_type: Option<ClientType>,
    pub status: Option<ClientStatus>,
    pub assigned_lawyer: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientFilters {
    pub status: Option<ClientStatus>,
    pub assigned_lawyer: Option<Uuid>,
}

pub struct ClientService {
    state: AppState,
}

impl ClientService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Client records a portal user is linked to.
    pub async fn ids_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let clients = self
            .state
            .repo::<Client>()
            .select_any(FilterData::eq("user_id", user_id))
            .await?;
        Ok(clients.into_iter().map(|c| c.id).collect())
    }

    pub async fn list(&self, actor: &AuthUser, filters: ClientFilters, page: Page) -> ServiceResult<Vec<Client>> {
        let mut filter = FilterData::new();
        if actor.role == Role::Client {
            filter.and_where("user_id", actor.user_id);
        }
        if let Some(status) = filters.status {
            filter.and_where("status", status);
        }
        if let Some(lawyer) = filters.assigned_lawyer {
            filter.and_where("assigned_lawyer", lawyer);
        }
        Ok(self.state.repo::<Client>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<Client> {
        let client = self.state.repo::<Client>().select_404(id).await?;
        if actor.role == Role::Client && client.user_id != Some(actor.user_id) {
            return Err(ServiceError::forbidden("You can only view your own client record"));
        }
        Ok(client)
    }

    pub async fn create(&self, actor: &AuthUser, input: ClientInput) -> ServiceResult<Client> {
        let name = require_text("name", &input.name)?;
        if let Some(lawyer) = input.assigned_lawyer {
            self.ensure_staff(lawyer).await?;
        }
        if let Some(user_id) = input.user_id {
            self.ensure_portal_user(user_id).await?;
        }

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name,
            email: optional_text(input.email).map(|e| e.to_lowercase()),
            phone: optional_text(input.phone),
            address: optional_text(input.address),
            company: optional_text(input.company),
            client_type: input.client_type,
            status: ClientStatus::Active,
            assigned_lawyer: input.assigned_lawyer.or((actor.role == Role::Lawyer).then_some(actor.user_id)),
            user_id: input.user_id,
            notes: optional_text(input.notes),
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        self.state.repo::<Client>().insert(&client).await?;
        Ok(client)
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: ClientUpdate) -> ServiceResult<Client> {
        let mut client = self.get(actor, id).await?;

        if let Some(name) = input.name {
            client.name = require_text("name", &name)?;
        }
        if input.email.is_some() {
            client.email = optional_text(input.email).map(|e| e.to_lowercase());
        }
        if input.phone.is_some() {
            client.phone = optional_text(input.phone);
        }
        if input.address.is_some() {
            client.address = optional_text(input.address);
        }
        if input.company.is_some() {
            client.company = optional_text(input.company);
        }
        if input.notes.is_some() {
            client.notes = optional_text(input.notes);
        }
        if let Some(client_type) = input.client_type {
            client.client_type = client_type;
        }
        if let Some(status) = input.status {
            client.status = status;
        }
        if let Some(lawyer) = input.assigned_lawyer {
            self.ensure_staff(lawyer).await?;
            client.assigned_lawyer = Some(lawyer);
        }
        if let Some(user_id) = input.user_id {
            self.ensure_portal_user(user_id).await?;
            client.user_id = Some(user_id);
        }

        client.updated_at = Utc::now();
        self.state.repo::<Client>().update(&client).await?;
        Ok(client)
    }

    /// Clients with cases on file are kept.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        self.state.repo::<Client>().select_404(id).await?;
        let cases = self.state.repo::<Case>().count(FilterData::eq("client_id", id)).await?;
        if cases > 0 {
            return Err(ServiceError::Conflict(format!(
                "Client has {} case(s); close them out or reassign before deleting",
                cases
            )));
        }
        self.state.repo::<Client>().delete(id).await?;
        Ok(())
    }

    async fn ensure_staff(&self, user_id: Uuid) -> ServiceResult<User> {
        let user = self
            .state
            .repo::<User>()
            .select_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::invalid("assigned_lawyer", "Assigned lawyer does not exist"))?;
        if !user.role.is_staff() {
            return Err(ServiceError::invalid("assigned_lawyer", "Assigned user is not a lawyer"));
        }
        Ok(user)
    }

    async fn ensure_portal_user(&self, user_id: Uuid) -> ServiceResult<()> {
        let user = self
            .state
            .repo::<User>()
            .select_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::invalid("user_id", "Linked user does not exist"))?;
        if user.role != Role::Client {
            return Err(ServiceError::invalid("user_id", "Only client users can be linked to a client record"));
        }
        Ok(())
    }
}
