use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::repo_types::{NewProduct, Product, ProductPatch};
use crate::db::{RepoError, RepoResult};

const PRODUCT_COLUMNS: &str = "id, description, value, quantity, image, created_at, updated_at";

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, new: NewProduct) -> RepoResult<Product>;

    async fn get(&self, id: i32) -> RepoResult<Product>;

    /// All products ordered by description.
    async fn list(&self) -> RepoResult<Vec<Product>>;

    /// Writes the present patch fields, and `new_image` when one is given.
    async fn update(
        &self,
        id: i32,
        patch: &ProductPatch,
        new_image: Option<&str>,
    ) -> RepoResult<Product>;

    async fn delete(&self, id: i32) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct PgProductRepository {
    db: PgPool,
}

impl PgProductRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create(&self, new: NewProduct) -> RepoResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (description, value, quantity, image)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&new.description)
        .bind(new.value)
        .bind(new.quantity)
        .bind(new.image.as_deref())
        .fetch_one(&self.db)
        .await?;
        Ok(product)
    }

    async fn get(&self, id: i32) -> RepoResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound("product"))
    }

    async fn list(&self) -> RepoResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY description ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(
        &self,
        id: i32,
        patch: &ProductPatch,
        new_image: Option<&str>,
    ) -> RepoResult<Product> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE products SET updated_at = now()");
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(value) = patch.value {
            qb.push(", value = ").push_bind(value);
        }
        if let Some(quantity) = patch.quantity {
            qb.push(", quantity = ").push_bind(quantity);
        }
        if let Some(image) = new_image {
            qb.push(", image = ").push_bind(image.to_string());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(PRODUCT_COLUMNS);

        qb.build_query_as::<Product>()
            .fetch_optional(&self.db)
            .await?
            .ok_or(RepoError::NotFound("product"))
    }

    async fn delete(&self, id: i32) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound("product"));
        }
        Ok(())
    }
}
