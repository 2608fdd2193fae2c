use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{optional_text, require_text, Page, ServiceError, ServiceResult};
use crate::app::AppState;
use crate::auth::{hash_password, verify_password};
use crate::config;
use crate::database::models::{user::normalize_email, Client, ClientStatus, ClientType, Role, User};
use crate::filter::FilterData;
use crate::middleware::AuthUser;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilters {
    pub role: Option<Role>,
    pub active: Option<bool>,
}

pub struct UserService {
    state: AppState,
}

impl UserService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let filter = FilterData::eq("email", normalize_email(email));
        Ok(self.state.repo::<User>().select_one(filter).await?)
    }

    /// Check credentials and stamp `last_login_at`. Unknown emails, wrong passwords and
    /// inactive accounts all fail the same way.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let rejected = || ServiceError::Unauthorized("Invalid email or password".to_string());

        let mut user = self.find_by_email(email).await?.ok_or_else(rejected)?;
        if !verify_password(password, &user.password_hash) {
            tracing::warn!("Failed login for '{}'", user.email);
            return Err(rejected());
        }
        if !user.is_active {
            tracing::warn!("Login attempt for inactive user '{}'", user.email);
            return Err(rejected());
        }

        let now = Utc::now();
        user.last_login_at = Some(now);
        user.updated_at = now;
        self.state.repo::<User>().update(&user).await?;
        Ok(user)
    }

    /// Public self-registration: creates a client login plus the client record it owns.
    pub async fn register(&self, input: RegisterInput) -> ServiceResult<User> {
        if !config::config().security.allow_registration {
            return Err(ServiceError::forbidden("Registration is disabled"));
        }

        let mut user = self
            .build_user(&input.name, &input.email, &input.password, Role::Client)?;
        user.phone = optional_text(input.phone);
        self.state.repo::<User>().insert(&user).await?;

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: Some(user.email.clone()),
            phone: user.phone.clone(),
            address: None,
            company: None,
            client_type: ClientType::Individual,
            status: ClientStatus::Active,
            assigned_lawyer: None,
            user_id: Some(user.id),
            notes: None,
            created_by: user.id,
            created_at: now,
            updated_at: now,
        };
        self.state.repo::<Client>().insert(&client).await?;

        tracing::info!("Registered client user '{}'", user.email);
        Ok(user)
    }

    pub async fn create(&self, input: CreateUserInput) -> ServiceResult<User> {
        let mut user = self.build_user(&input.name, &input.email, &input.password, input.role)?;
        user.phone = optional_text(input.phone);
        self.state.repo::<User>().insert(&user).await?;
        tracing::info!("Created {} user '{}'", user.role, user.email);
        Ok(user)
    }

    pub async fn list(&self, filters: UserFilters, page: Page) -> ServiceResult<Vec<User>> {
        let mut filter = FilterData::new();
        if let Some(role) = filters.role {
            filter.and_where("role", role);
        }
        if let Some(active) = filters.active {
            filter.and_where("is_active", active);
        }
        Ok(self.state.repo::<User>().select_any(page.apply(filter)).await?)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<User> {
        Ok(self.state.repo::<User>().select_404(id).await?)
    }

    pub async fn update(&self, actor: &AuthUser, id: Uuid, input: UpdateUserInput) -> ServiceResult<User> {
        let mut user = self.get(id).await?;

        if actor.user_id == id {
            if input.role.is_some_and(|role| role != Role::Admin) {
                return Err(ServiceError::invalid("role", "Admins cannot demote themselves"));
            }
            if input.is_active == Some(false) {
                return Err(ServiceError::invalid("is_active", "Admins cannot deactivate themselves"));
            }
        }

        if let Some(name) = input.name {
            user.name = require_text("name", &name)?;
        }
        if let Some(email) = input.email {
            user.email = validate_email(&email)?;
        }
        if let Some(role) = input.role {
            user.role = role;
        }
        if input.phone.is_some() {
            user.phone = optional_text(input.phone);
        }
        if let Some(active) = input.is_active {
            user.is_active = active;
        }
        if let Some(password) = input.password {
            validate_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }

        user.updated_at = Utc::now();
        self.state.repo::<User>().update(&user).await?;
        Ok(user)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> ServiceResult<()> {
        if actor.user_id == id {
            return Err(ServiceError::Conflict("You cannot delete your own account".to_string()));
        }
        self.state.repo::<User>().delete(id).await?;
        tracing::info!("User {} deleted by {}", id, actor.user_id);
        Ok(())
    }

    pub async fn change_password(&self, user_id: Uuid, current: &str, new_password: &str) -> ServiceResult<()> {
        let mut user = self.get(user_id).await?;
        if !verify_password(current, &user.password_hash) {
            return Err(ServiceError::invalid("current_password", "Current password is incorrect"));
        }
        validate_password(new_password)?;

        user.password_hash = hash_password(new_password)?;
        user.updated_at = Utc::now();
        self.state.repo::<User>().update(&user).await?;
        Ok(())
    }

    fn build_user(&self, name: &str, email: &str, password: &str, role: Role) -> ServiceResult<User> {
        let name = require_text("name", name)?;
        let email = validate_email(email)?;
        validate_password(password)?;
        Ok(User::new(name, &email, hash_password(password)?, role))
    }
}

fn validate_email(email: &str) -> ServiceResult<String> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(ServiceError::invalid("email", "A valid email address is required"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppState;

    fn service() -> UserService {
        UserService::new(AppState::in_memory())
    }

    fn lawyer_input(email: &str) -> CreateUserInput {
        CreateUserInput {
            name: "Lee Counsel".to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            role: Role::Lawyer,
            phone: None,
        }
    }

    #[test]
    fn email_validation() {
        assert_eq!(validate_email(" Lee@Firm.Test ").unwrap(), "lee@firm.test");
        assert!(validate_email("lee").is_err());
        assert!(validate_email("@firm.test").is_err());
        assert!(validate_email("lee@localhost").is_err());
    }

    #[tokio::test]
    async fn authenticates_case_insensitively_and_rejects_bad_passwords() {
        let users = service();
        users.create(lawyer_input("lee@firm.test")).await.unwrap();

        let user = users.authenticate("LEE@firm.test", "s3cret-pass").await.unwrap();
        assert!(user.last_login_at.is_some());

        assert!(matches!(
            users.authenticate("lee@firm.test", "wrong-pass").await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            users.authenticate("nobody@firm.test", "s3cret-pass").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let users = service();
        users.create(lawyer_input("lee@firm.test")).await.unwrap();
        let err = users.create(lawyer_input("Lee@Firm.test")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Database(crate::database::DatabaseError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn registration_creates_linked_client_record() {
        let state = AppState::in_memory();
        let users = UserService::new(state.clone());
        let user = users
            .register(RegisterInput {
                name: "Pat Client".to_string(),
                email: "pat@home.test".to_string(),
                password: "password123".to_string(),
                phone: Some("555-0100".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(user.role, Role::Client);
        let clients = state
            .repo::<Client>()
            .select_any(FilterData::eq("user_id", user.id))
            .await
            .unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].phone.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn admins_cannot_delete_themselves() {
        let users = service();
        let admin = users
            .create(CreateUserInput { role: Role::Admin, ..lawyer_input("boss@firm.test") })
            .await
            .unwrap();
        let actor = AuthUser { user_id: admin.id, email: admin.email.clone(), role: Role::Admin };

        assert!(matches!(users.delete(&actor, admin.id).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let users = service();
        let user = users.create(lawyer_input("lee@firm.test")).await.unwrap();

        assert!(users.change_password(user.id, "nope-nope", "new-password").await.is_err());
        users.change_password(user.id, "s3cret-pass", "new-password").await.unwrap();
        assert!(users.authenticate("lee@firm.test", "new-password").await.is_ok());
    }
}
