// handlers/public/auth/mod.rs - Public authentication handlers

use serde::Serialize;

use crate::auth::{generate_jwt, Claims};
use crate::database::models::{User, UserProfile};
use crate::error::ApiError;

pub mod login;    // POST /auth/login - authenticate and get JWT
pub mod register; // POST /auth/register - create a client account

pub use login::login_post;
pub use register::register_post;

/// Token payload shared by login, register and refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserProfile,
    pub expires_in: i64,
}

pub(crate) fn issue_token(user: &User) -> Result<TokenResponse, ApiError> {
    let claims = Claims::new(user);
    Ok(TokenResponse {
        token: generate_jwt(&claims)?,
        user: user.profile(),
        expires_in: claims.expires_in(),
    })
}
