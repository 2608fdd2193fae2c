use super::user_service::CreateUserInput;
use super::{ServiceResult, UserService};
use crate::app::AppState;
use crate::config::AppConfig;
use crate::database::models::{Role, User};

/// Ensure an admin login exists for a fresh deployment.
///
/// Does nothing unless both `STORAGE_BOOTSTRAP_ADMIN_EMAIL` and
/// `STORAGE_BOOTSTRAP_ADMIN_PASSWORD` are configured. An existing user with the same
/// email is left untouched, whatever its role.
pub async fn ensure_admin(state: &AppState, config: &AppConfig) -> ServiceResult<Option<User>> {
    let (Some(email), Some(password)) = (
        config.storage.bootstrap_admin_email.as_deref(),
        config.storage.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(None);
    };

    create_admin(state, &config.storage.bootstrap_admin_name, email, password).await
}

/// Create an admin unless a user with `email` already exists. Returns the new user.
pub async fn create_admin(state: &AppState, name: &str, email: &str, password: &str) -> ServiceResult<Option<User>> {
    let users = UserService::new(state.clone());
    if let Some(existing) = users.find_by_email(email).await? {
        tracing::debug!("Bootstrap admin '{}' already present ({})", existing.email, existing.role);
        return Ok(None);
    }

    let admin = users
        .create(CreateUserInput {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            phone: None,
        })
        .await?;
    tracing::info!("Created bootstrap admin '{}'", admin.email);
    Ok(Some(admin))
}
