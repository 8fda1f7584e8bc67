use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_ACCEPTED: &str = "ACCEPTED";

const REQUEST_COLUMNS: &str = "id, created_at, updated_at, user_id, group_id, status";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: i64,
    pub group_id: i64,
    pub status: String,
}

/// A pending request joined with its requester and group, as listed to the
/// master.
#[derive(Debug, FromRow)]
pub struct PendingRequestRow {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub status: String,
    pub username: String,
    pub group_name: String,
    pub group_master: i64,
}

impl GroupRequest {
    /// The request for a (user, group) pair in any status, if one exists.
    pub async fn find_for_pair(
        db: &PgPool,
        group_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<GroupRequest>> {
        let row = sqlx::query_as::<_, GroupRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM groups_requests WHERE group_id = $1 AND user_id = $2"
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Look up a request by id scoped to its group; a request id under the
    /// wrong group resolves to nothing.
    pub async fn find_in_group(
        db: &PgPool,
        request_id: i64,
        group_id: i64,
    ) -> anyhow::Result<Option<GroupRequest>> {
        let row = sqlx::query_as::<_, GroupRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM groups_requests WHERE id = $1 AND group_id = $2"
        ))
        .bind(request_id)
        .bind(group_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn create(db: &PgPool, group_id: i64, user_id: i64) -> anyhow::Result<GroupRequest> {
        let row = sqlx::query_as::<_, GroupRequest>(&format!(
            r#"
            INSERT INTO groups_requests (group_id, user_id)
            VALUES ($1, $2)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// All PENDING requests across every group owned by `master`.
    pub async fn list_pending_for_master(
        db: &PgPool,
        master: i64,
    ) -> anyhow::Result<Vec<PendingRequestRow>> {
        let rows = sqlx::query_as::<_, PendingRequestRow>(
            r#"
            SELECT gr.id, gr.user_id, gr.group_id, gr.status,
                   u.username, g.name AS group_name, g.master AS group_master
            FROM groups_requests gr
            JOIN groups g ON g.id = gr.group_id
            JOIN users u ON u.id = gr.user_id
            WHERE g.master = $1 AND gr.status = $2
            ORDER BY gr.id
            "#,
        )
        .bind(master)
        .bind(STATUS_PENDING)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Flip the request to ACCEPTED and attach the requester to the roster
    /// as one transaction. If the roster insert fails the status change
    /// rolls back, so the request can never read ACCEPTED without the user
    /// actually being on the roster.
    pub async fn accept(&self, db: &PgPool) -> anyhow::Result<GroupRequest> {
        let mut tx = db.begin().await?;
        let updated = sqlx::query_as::<_, GroupRequest>(&format!(
            r#"
            UPDATE groups_requests
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(STATUS_ACCEPTED)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO groups_players (group_id, user_id) VALUES ($1, $2)
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(self.group_id)
        .bind(self.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Rejection deletes the row outright; no REJECTED state is kept.
    pub async fn delete(&self, db: &PgPool) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM groups_requests WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = GroupRequest {
            id: 11,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
            user_id: 9,
            group_id: 3,
            status: STATUS_PENDING.to_string(),
        };
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["userId"], 9);
        assert_eq!(json["groupId"], 3);
        assert_eq!(json["status"], "PENDING");
    }
}
