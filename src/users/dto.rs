use serde::Deserialize;

use crate::users::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for profile updates. Avatar is optional: when omitted the
/// stored value is kept.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct UserBody {
    pub user: User,
}
