use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repo_types::{NewUser, User, UserPatch};
use crate::db::{map_unique, RepoError, RepoResult};

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_pic, created_at, updated_at";
const EMAIL_TAKEN: &str = "Email address already in use";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new: NewUser) -> RepoResult<User>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn get(&self, id: i32) -> RepoResult<User>;

    /// All users ordered by name.
    async fn list(&self) -> RepoResult<Vec<User>>;

    async fn update(&self, id: i32, patch: &UserPatch) -> RepoResult<User>;

    async fn update_profile_pic(&self, id: i32, reference: &str) -> RepoResult<User>;

    async fn delete(&self, id: i32) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, EMAIL_TAKEN))
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn get(&self, id: i32) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound("user"))
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> RepoResult<User> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(name) = &patch.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(email) = &patch.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        qb.build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_unique(e, EMAIL_TAKEN))?
            .ok_or(RepoError::NotFound("user"))
    }

    async fn update_profile_pic(&self, id: i32, reference: &str) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET profile_pic = $1, updated_at = now()
            WHERE id = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(reference)
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound("user"))
    }

    async fn delete(&self, id: i32) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound("user"));
        }
        Ok(())
    }
}
