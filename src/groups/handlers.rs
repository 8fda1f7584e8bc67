use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, patch, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    errors::{ApiError, AppJson},
    groups::{
        dto::{CreateGroupRequest, GroupBody, GroupsBody, GroupsPage, GroupsQuery, UpdateGroupRequest},
        repo::Group,
    },
    state::AppState,
    users::repo::User,
};

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", post(store).get(index))
        .route("/groups/:group_id", patch(update).delete(destroy))
        .route("/groups/:group_id/players/:player_id", delete(remove_player))
}

fn validate_create(payload: &CreateGroupRequest) -> Result<i64, ApiError> {
    let required = [
        ("name", &payload.name),
        ("description", &payload.description),
        ("schedule", &payload.schedule),
        ("location", &payload.location),
        ("chronic", &payload.chronic),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("{field} must be provided")));
        }
    }
    payload
        .master
        .ok_or_else(|| ApiError::Validation("master must be provided".into()))
}

#[instrument(skip(state, payload))]
pub async fn store(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    AppJson(payload): AppJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupBody>), ApiError> {
    let master = validate_create(&payload)?;

    if User::find_by_id(&state.db, master).await?.is_none() {
        return Err(ApiError::Validation(
            "master must reference an existing user".into(),
        ));
    }

    let group = Group::create(&state.db, &payload, master).await?;
    info!(group_id = group.id, master, "group created");

    let details = group.details(&state.db).await?;
    Ok((StatusCode::CREATED, Json(GroupBody { group: details })))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateGroupRequest>,
) -> Result<Json<GroupBody>, ApiError> {
    let group = Group::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;

    if group.master != caller {
        return Err(ApiError::Forbidden(
            "only the group master can update the group".into(),
        ));
    }

    let group = Group::update(&state.db, id, &payload).await?;
    info!(group_id = id, "group updated");

    let details = group.details(&state.db).await?;
    Ok(Json(GroupBody { group: details }))
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let group = Group::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;

    if group.master != caller {
        return Err(ApiError::Forbidden(
            "only the group master can delete the group".into(),
        ));
    }

    Group::delete(&state.db, id).await?;
    info!(group_id = id, "group deleted");
    Ok(Json(serde_json::json!({})))
}

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(query): Query<GroupsQuery>,
) -> Result<Json<GroupsBody>, ApiError> {
    let groups = Group::list(&state.db, query.user, query.text.as_deref()).await?;

    let mut detailed = Vec::with_capacity(groups.len());
    for group in groups {
        detailed.push(group.details(&state.db).await?);
    }
    Ok(Json(GroupsBody {
        groups: GroupsPage::new(detailed),
    }))
}

#[instrument(skip(state))]
pub async fn remove_player(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path((group_id, player_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let group = Group::find_by_id(&state.db, group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;

    // The master is a permanent roster member.
    if player_id == group.master {
        return Err(ApiError::InvalidOperation(
            "cannot remove master from group".into(),
        ));
    }

    Group::remove_player(&state.db, group_id, player_id).await?;
    info!(group_id, player_id, "player removed");
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CreateGroupRequest {
        CreateGroupRequest {
            name: "The Misfits".into(),
            description: "weekly campaign".into(),
            schedule: "fridays".into(),
            location: "tavern".into(),
            chronic: "fresh start".into(),
            master: Some(7),
        }
    }

    #[test]
    fn create_requires_every_text_field() {
        for field in ["name", "description", "schedule", "location", "chronic"] {
            let mut p = payload();
            match field {
                "name" => p.name.clear(),
                "description" => p.description.clear(),
                "schedule" => p.schedule.clear(),
                "location" => p.location.clear(),
                _ => p.chronic.clear(),
            }
            let err = validate_create(&p).unwrap_err();
            assert_eq!(err.status_code().as_u16(), 422, "field {field}");
        }
    }

    #[test]
    fn create_requires_master() {
        let mut p = payload();
        p.master = None;
        assert!(validate_create(&p).is_err());
    }

    #[test]
    fn valid_payload_yields_master_id() {
        assert_eq!(validate_create(&payload()).unwrap(), 7);
    }
}
