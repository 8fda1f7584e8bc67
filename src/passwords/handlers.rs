use axum::{extract::State, http::StatusCode, routing::post, Router};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::{
    auth::{self, password::hash_password},
    errors::{ApiError, AppJson},
    passwords::{
        dto::{ForgotPasswordRequest, ResetPasswordRequest},
        repo::{self, LinkToken},
    },
    state::AppState,
    users::repo::User,
};

pub fn password_routes() -> Router<AppState> {
    Router::new()
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

const MAIL_SUBJECT: &str = "Roleplay: Password Recovery";

fn recovery_email(username: &str, link: &str) -> String {
    format!(
        "<p>Hello {username},</p>\
         <p><a href=\"{link}\">Click here</a> to reset your password.</p>\
         <p>The link stays valid for 2 hours.</p>"
    )
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<ForgotPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !auth::is_valid_email(&payload.email) {
        return Err(ApiError::Validation("email must be a valid address".into()));
    }
    if payload.reset_password_url.trim().is_empty() {
        return Err(ApiError::Validation(
            "resetPasswordUrl must be provided".into(),
        ));
    }

    // Same response whether or not the address is registered, so the
    // endpoint does not reveal which emails have accounts.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            debug!("forgot-password for unknown email");
            return Ok(StatusCode::NO_CONTENT);
        }
    };

    let token = repo::generate_token();
    LinkToken::create(&state.db, user.id, &token).await?;

    let link = format!("{}?token={}", payload.reset_password_url, token);
    state
        .mailer
        .send(&user.email, MAIL_SUBJECT, &recovery_email(&user.username, &link))
        .await?;

    info!(user_id = user.id, "reset token issued");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.token.trim().is_empty() {
        return Err(ApiError::Validation("token must be provided".into()));
    }
    if payload.password.len() < 4 {
        return Err(ApiError::Validation(
            "password must be at least 4 characters".into(),
        ));
    }

    // A consumed token was deleted, so reuse surfaces as not-found.
    let token = LinkToken::find_by_token(&state.db, &payload.token)
        .await?
        .ok_or_else(|| ApiError::NotFound("token not found".into()))?;

    if repo::is_expired(token.created_at, OffsetDateTime::now_utc()) {
        return Err(ApiError::TokenExpired);
    }

    let hash = hash_password(&payload.password)?;
    token.consume(&state.db, &hash).await?;

    info!(user_id = token.user_id, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_email_mentions_user_and_link() {
        let html = recovery_email("dungeon-master", "https://example.com/?token=abc");
        assert!(html.contains("dungeon-master"));
        assert!(html.contains("https://example.com/?token=abc"));
    }

    #[test]
    fn forgot_payload_uses_camel_case_url_field() {
        let payload: ForgotPasswordRequest = serde_json::from_str(
            r#"{"email":"a@b.com","resetPasswordUrl":"https://example.com/"}"#,
        )
        .unwrap();
        assert_eq!(payload.reset_password_url, "https://example.com/");
    }
}
