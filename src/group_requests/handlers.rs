use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    errors::ApiError,
    group_requests::{
        dto::{GroupRequestBody, GroupRequestItem, GroupRequestsBody, ListQuery},
        repo::GroupRequest,
    },
    groups::repo::Group,
    state::AppState,
};

pub fn group_request_routes() -> Router<AppState> {
    Router::new()
        .route("/groups/:group_id/requests", post(store).get(index))
        .route("/groups/:group_id/requests/:request_id/accept", post(accept))
        .route("/groups/:group_id/requests/:request_id", delete(destroy))
}

#[instrument(skip(state))]
pub async fn store(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<i64>,
) -> Result<(StatusCode, Json<GroupRequestBody>), ApiError> {
    if Group::find_by_id(&state.db, group_id).await?.is_none() {
        return Err(ApiError::NotFound("group not found".into()));
    }

    if GroupRequest::find_for_pair(&state.db, group_id, user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("group request already exists".into()));
    }

    if Group::is_player(&state.db, group_id, user_id).await? {
        return Err(ApiError::Validation("user is already in the group".into()));
    }

    let group_request = GroupRequest::create(&state.db, group_id, user_id).await?;
    info!(request_id = group_request.id, group_id, user_id, "group request created");
    Ok((StatusCode::CREATED, Json(GroupRequestBody { group_request })))
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<GroupRequestsBody>, ApiError> {
    let master = query
        .master
        .ok_or_else(|| ApiError::Validation("master query should be provided".into()))?;

    let rows = GroupRequest::list_pending_for_master(&state.db, master).await?;
    let group_requests = rows.into_iter().map(GroupRequestItem::from).collect();
    Ok(Json(GroupRequestsBody { group_requests }))
}

/// Loads the request scoped to its group and checks the caller is the
/// group's master. Shared by accept and reject.
async fn load_authorized(
    state: &AppState,
    group_id: i64,
    request_id: i64,
    caller: i64,
) -> Result<GroupRequest, ApiError> {
    let request = GroupRequest::find_in_group(&state.db, request_id, group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("group request not found".into()))?;

    let group = Group::find_by_id(&state.db, group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;

    if group.master != caller {
        return Err(ApiError::Forbidden(
            "only the group master can act on requests".into(),
        ));
    }
    Ok(request)
}

#[instrument(skip(state))]
pub async fn accept(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((group_id, request_id)): Path<(i64, i64)>,
) -> Result<Json<GroupRequestBody>, ApiError> {
    let request = load_authorized(&state, group_id, request_id, caller).await?;

    let group_request = request.accept(&state.db).await?;
    info!(request_id, group_id, user_id = group_request.user_id, "group request accepted");
    Ok(Json(GroupRequestBody { group_request }))
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((group_id, request_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = load_authorized(&state, group_id, request_id, caller).await?;

    request.delete(&state.db).await?;
    info!(request_id, group_id, "group request rejected");
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    use crate::group_requests::repo::{STATUS_ACCEPTED, STATUS_PENDING};
    use crate::groups::dto::CreateGroupRequest;
    use crate::users::repo::User;

    async fn seed_user(pool: &PgPool, username: &str) -> i64 {
        User::create(pool, username, &format!("{username}@roleplay.com"), "hash")
            .await
            .expect("seed user")
            .id
    }

    async fn seed_group(pool: &PgPool, master: i64) -> i64 {
        let payload = CreateGroupRequest {
            name: "The Misfits".into(),
            description: "weekly campaign".into(),
            schedule: "fridays".into(),
            location: "tavern".into(),
            chronic: "fresh start".into(),
            master: Some(master),
        };
        Group::create(pool, &payload, master).await.expect("seed group").id
    }

    async fn request_to_join(state: &AppState, group_id: i64, user_id: i64) -> GroupRequest {
        let (status, body) = store(
            State(state.clone()),
            AuthUser(user_id),
            Path(group_id),
        )
        .await
        .expect("create request");
        assert_eq!(status, StatusCode::CREATED);
        body.0.group_request
    }

    #[sqlx::test]
    async fn second_request_for_same_pair_conflicts(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;
        let candidate = seed_user(&pool, "bard").await;

        let request = request_to_join(&state, group_id, candidate).await;
        assert_eq!(request.status, STATUS_PENDING);

        let err = store(State(state), AuthUser(candidate), Path(group_id))
            .await
            .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 409);
    }

    #[sqlx::test]
    async fn roster_member_cannot_request(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;

        // The master is seeded onto the roster at group creation.
        let err = store(State(state), AuthUser(master), Path(group_id))
            .await
            .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 422);
    }

    #[sqlx::test]
    async fn accept_flips_status_and_adds_one_roster_row(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;
        let candidate = seed_user(&pool, "bard").await;
        let request = request_to_join(&state, group_id, candidate).await;

        let accepted = accept(
            State(state),
            AuthUser(master),
            Path((group_id, request.id)),
        )
        .await
        .expect("accept")
        .0
        .group_request;
        assert_eq!(accepted.status, STATUS_ACCEPTED);

        let players = Group::players(&pool, group_id).await.unwrap();
        let occurrences = players.iter().filter(|p| p.id == candidate).count();
        assert_eq!(occurrences, 1);
        assert_eq!(players.len(), 2);
    }

    #[sqlx::test]
    async fn only_the_master_can_accept(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;
        let candidate = seed_user(&pool, "bard").await;
        let request = request_to_join(&state, group_id, candidate).await;

        let err = accept(
            State(state.clone()),
            AuthUser(candidate),
            Path((group_id, request.id)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 403);

        // The request is untouched by the refused accept.
        let still_there = GroupRequest::find_in_group(&pool, request.id, group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_there.status, STATUS_PENDING);
    }

    #[sqlx::test]
    async fn reject_deletes_the_request_permanently(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;
        let candidate = seed_user(&pool, "bard").await;
        let request = request_to_join(&state, group_id, candidate).await;

        destroy(
            State(state.clone()),
            AuthUser(master),
            Path((group_id, request.id)),
        )
        .await
        .expect("reject");

        assert!(GroupRequest::find_in_group(&pool, request.id, group_id)
            .await
            .unwrap()
            .is_none());

        let err = accept(State(state), AuthUser(master), Path((group_id, request.id)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 404);
    }

    #[sqlx::test]
    async fn request_under_the_wrong_group_is_not_found(pool: PgPool) {
        let state = AppState::fake_with_db(pool.clone());
        let master = seed_user(&pool, "master").await;
        let group_id = seed_group(&pool, master).await;
        let other_group = seed_group(&pool, master).await;
        let candidate = seed_user(&pool, "bard").await;
        let request = request_to_join(&state, group_id, candidate).await;

        let err = accept(
            State(state),
            AuthUser(master),
            Path((other_group, request.id)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code().as_u16(), 404);
    }
}
