use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::groups::dto::{CreateGroupRequest, UpdateGroupRequest};
use crate::users::repo::{PublicProfile, User};

const GROUP_COLUMNS: &str =
    "id, created_at, updated_at, name, description, schedule, location, chronic, master";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub location: String,
    pub chronic: String,
    pub master: i64,
}

/// Group with its master profile and roster embedded, as serialized to
/// clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub master_user: Option<PublicProfile>,
    pub players: Vec<PublicProfile>,
}

impl Group {
    /// Insert the group and seed the roster with the master in one
    /// transaction, so the master-on-roster invariant holds from creation.
    pub async fn create(db: &PgPool, payload: &CreateGroupRequest, master: i64) -> anyhow::Result<Group> {
        let mut tx = db.begin().await?;
        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            INSERT INTO groups (name, description, schedule, location, chronic, master)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&payload.schedule)
        .bind(&payload.location)
        .bind(&payload.chronic)
        .bind(master)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO groups_players (group_id, user_id) VALUES ($1, $2)")
            .bind(group.id)
            .bind(master)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(group)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(group)
    }

    pub async fn update(
        db: &PgPool,
        id: i64,
        payload: &UpdateGroupRequest,
    ) -> anyhow::Result<Group> {
        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                schedule = COALESCE($4, schedule),
                location = COALESCE($5, location),
                chronic = COALESCE($6, chronic),
                updated_at = now()
            WHERE id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payload.name.as_deref())
        .bind(payload.description.as_deref())
        .bind(payload.schedule.as_deref())
        .bind(payload.location.as_deref())
        .bind(payload.chronic.as_deref())
        .fetch_one(db)
        .await?;
        Ok(group)
    }

    /// Roster rows and pending requests go with the group via FK cascade.
    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Optional filters compose with AND: roster membership of `user`, and a
    /// case-sensitive `LIKE '%text%'` over name OR description.
    pub async fn list(
        db: &PgPool,
        user: Option<i64>,
        text: Option<&str>,
    ) -> anyhow::Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>(&format!(
            r#"
            SELECT {GROUP_COLUMNS} FROM groups g
            WHERE ($1::bigint IS NULL OR EXISTS (
                      SELECT 1 FROM groups_players gp
                      WHERE gp.group_id = g.id AND gp.user_id = $1))
              AND ($2::text IS NULL
                      OR g.name LIKE '%' || $2 || '%'
                      OR g.description LIKE '%' || $2 || '%')
            ORDER BY g.id
            "#
        ))
        .bind(user)
        .bind(text)
        .fetch_all(db)
        .await?;
        Ok(groups)
    }

    pub async fn players(db: &PgPool, group_id: i64) -> anyhow::Result<Vec<PublicProfile>> {
        let players = sqlx::query_as::<_, PublicProfile>(
            r#"
            SELECT u.id, u.username, u.email, u.avatar
            FROM groups_players gp
            JOIN users u ON u.id = gp.user_id
            WHERE gp.group_id = $1
            ORDER BY gp.id
            "#,
        )
        .bind(group_id)
        .fetch_all(db)
        .await?;
        Ok(players)
    }

    pub async fn is_player(db: &PgPool, group_id: i64, user_id: i64) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM groups_players WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(exists)
    }

    /// Idempotent: detaching an absent player is a no-op.
    pub async fn remove_player(db: &PgPool, group_id: i64, user_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM groups_players WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn details(self, db: &PgPool) -> anyhow::Result<GroupDetails> {
        let master_user = User::find_by_id(db, self.master)
            .await?
            .map(PublicProfile::from);
        let players = Group::players(db, self.id).await?;
        Ok(GroupDetails {
            group: self,
            master_user,
            players,
        })
    }
}
