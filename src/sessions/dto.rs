use serde::{Deserialize, Serialize};

use crate::users::repo::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Response returned when a session is created.
#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub user: User,
    pub token: String,
}
