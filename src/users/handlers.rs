use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{self, password::hash_password, AuthUser},
    errors::{ApiError, AppJson},
    state::AppState,
    users::{
        dto::{RegisterRequest, UpdateUserRequest, UserBody},
        repo::User,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(store))
        .route("/users/:id", put(update))
}

const MIN_PASSWORD_LEN: usize = 4;

fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    if !auth::is_valid_email(email) {
        return Err(ApiError::Validation("email must be a valid address".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_register(payload: &RegisterRequest) -> Result<(), ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::Validation("username must be provided".into()));
    }
    validate_credentials(&payload.email, &payload.password)
}

#[instrument(skip(state, payload))]
pub async fn store(
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserBody>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_register(&payload)?;

    // Email first, then username: the order is part of the API contract.
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        return Err(ApiError::Conflict("email already in use".into()));
    }
    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("username already in use".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.username, &payload.email, &hash).await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserBody { user })))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
    AppJson(mut payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserBody>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    validate_credentials(&payload.email, &payload.password)?;

    if User::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("user not found".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::update(&state.db, id, &payload.email, payload.avatar.as_deref(), &hash).await?;

    info!(user_id = user.id, "user updated");
    Ok(Json(UserBody { user }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_requires_username() {
        let err = validate_register(&register("", "a@b.com", "secret1")).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);
    }

    #[test]
    fn register_requires_valid_email() {
        let err = validate_register(&register("a", "nope", "secret1")).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);
    }

    #[test]
    fn register_enforces_minimum_password_length() {
        let err = validate_register(&register("a", "a@b.com", "abc")).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);
        assert!(validate_register(&register("a", "a@b.com", "abcd")).is_ok());
    }

    #[test]
    fn update_validation_reuses_credential_rules() {
        assert!(validate_credentials("a@b.com", "123456").is_ok());
        assert!(validate_credentials("broken", "123456").is_err());
        assert!(validate_credentials("a@b.com", "12").is_err());
    }

    use sqlx::PgPool;

    #[sqlx::test]
    async fn duplicate_email_registration_conflicts(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        let (status, body) = store(
            State(state.clone()),
            AppJson(register("alice", "a@b.com", "secret1")),
        )
        .await
        .expect("first registration");
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.0.user.id > 0);

        let err = store(
            State(state),
            AppJson(register("someone-else", "a@b.com", "secret1")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 409);
        assert_eq!(err.to_string(), "email already in use");
    }

    #[sqlx::test]
    async fn duplicate_username_registration_conflicts(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        store(State(state.clone()), AppJson(register("alice", "a@b.com", "secret1")))
            .await
            .expect("first registration");

        let err = store(
            State(state),
            AppJson(register("alice", "other@b.com", "secret1")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 409);
        assert_eq!(err.to_string(), "username already in use");
    }

    #[sqlx::test]
    async fn email_conflict_is_reported_before_username(pool: PgPool) {
        let state = AppState::fake_with_db(pool);

        store(State(state.clone()), AppJson(register("alice", "a@b.com", "secret1")))
            .await
            .expect("first registration");

        // Both taken: the email check runs first.
        let err = store(State(state), AppJson(register("alice", "a@b.com", "secret1")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "email already in use");
    }
}
