use rand::{distributions::Alphanumeric, Rng};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};

/// How long a reset link stays usable after issuance.
pub const TOKEN_VALIDITY: Duration = Duration::hours(2);

const TOKEN_LEN: usize = 64;

#[derive(Debug, Clone, FromRow)]
pub struct LinkToken {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub token: String,
    pub user_id: i64,
}

/// Opaque single-use token value.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// A token is expired once strictly more than [`TOKEN_VALIDITY`] has passed
/// since it was created.
pub fn is_expired(created_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now - created_at > TOKEN_VALIDITY
}

impl LinkToken {
    pub async fn create(db: &PgPool, user_id: i64, token: &str) -> anyhow::Result<LinkToken> {
        let row = sqlx::query_as::<_, LinkToken>(
            r#"
            INSERT INTO link_tokens (token, user_id)
            VALUES ($1, $2)
            RETURNING id, created_at, updated_at, token, user_id
            "#,
        )
        .bind(token)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn find_by_token(db: &PgPool, token: &str) -> anyhow::Result<Option<LinkToken>> {
        let row = sqlx::query_as::<_, LinkToken>(
            r#"
            SELECT id, created_at, updated_at, token, user_id
            FROM link_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Store the new password and burn the token in one transaction, so a
    /// consumed token can never be replayed against a half-applied reset.
    pub async fn consume(&self, db: &PgPool, password_hash: &str) -> anyhow::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query("UPDATE users SET password = $2, updated_at = now() WHERE id = $1")
            .bind(self.user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM link_tokens WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
