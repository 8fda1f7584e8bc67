use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{jwt::JwtKeys, password::verify_password, AuthUser},
    errors::{ApiError, AppJson},
    sessions::dto::{LoginRequest, SessionBody},
    state::AppState,
    users::repo::User,
};

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/sessions", post(store).delete(destroy))
}

#[instrument(skip(state, payload))]
pub async fn store(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> Result<(StatusCode, Json<SessionBody>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidOperation("invalid credentials".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidOperation("invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidOperation("invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = user.id, "session created");
    Ok((StatusCode::CREATED, Json(SessionBody { user, token })))
}

/// Tokens are stateless; logging out is acknowledged and the client drops
/// the token.
#[instrument(skip(_state))]
pub async fn destroy(
    State(_state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Json<serde_json::Value> {
    info!(user_id, "session closed");
    Json(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_default_to_empty_strings() {
        let payload: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(payload.email.is_empty());
        assert!(payload.password.is_empty());
    }

    #[test]
    fn session_body_exposes_token_and_user_without_password() {
        use time::macros::datetime;
        let body = SessionBody {
            user: User {
                id: 1,
                created_at: datetime!(2024-01-01 00:00 UTC),
                updated_at: datetime!(2024-01-01 00:00 UTC),
                username: "a".into(),
                email: "a@b.com".into(),
                password: "hash".into(),
                avatar: String::new(),
            },
            token: "jwt".into(),
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["token"], "jwt");
        assert_eq!(json["user"]["id"], 1);
        assert!(json["user"].get("password").is_none());
    }
}
