use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

const USER_COLUMNS: &str = "id, created_at, updated_at, username, email, password, avatar";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: String,
}

/// Profile fields safe to embed in other resources.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: String,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
        }
    }
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user. `password` must already be hashed.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Update profile fields. A `None` avatar keeps the stored value.
    pub async fn update(
        db: &PgPool,
        id: i64,
        email: &str,
        avatar: Option<&str>,
        password: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = $2, avatar = COALESCE($3, avatar), password = $4, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(email)
        .bind(avatar)
        .bind(password)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
