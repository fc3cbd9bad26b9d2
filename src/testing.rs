//! In-memory repositories and request helpers for handler tests.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{jwt::JwtKeys, password::Passwords},
    cleanup::CleanupPolicy,
    config::{AppConfig, JwtConfig},
    db::{RepoError, RepoResult},
    products::{
        repo::ProductRepository,
        repo_types::{NewProduct, Product, ProductPatch},
    },
    state::AppState,
    storage::LocalStorage,
    users::{
        repo::UserRepository,
        repo_types::{NewUser, User, UserPatch},
    },
};

fn injected_failure() -> RepoError {
    RepoError::Database(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<User>>,
    /// When set, every write fails with a database error.
    pub fail_writes: AtomicBool,
}

impl MemoryUsers {
    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(())
    }

    pub fn snapshot(&self, id: i32) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create(&self, new: NewUser) -> RepoResult<User> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == new.email) {
            return Err(RepoError::Conflict("Email address already in use".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: rows.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            profile_pic: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn get(&self, id: i32) -> RepoResult<User> {
        self.snapshot(id).ok_or(RepoError::NotFound("user"))
    }

    async fn list(&self) -> RepoResult<Vec<User>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> RepoResult<User> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = &patch.email {
            if rows.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Conflict("Email address already in use".into()));
            }
        }
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound("user"))?;
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_profile_pic(&self, id: i32, reference: &str) -> RepoResult<User> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound("user"))?;
        user.profile_pic = Some(reference.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete(&self, id: i32) -> RepoResult<()> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound("user"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProducts {
    rows: Mutex<Vec<Product>>,
    pub fail_writes: AtomicBool,
}

impl MemoryProducts {
    fn check_writable(&self) -> RepoResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(())
    }

    pub fn snapshot(&self, id: i32) -> Option<Product> {
        self.rows.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ProductRepository for MemoryProducts {
    async fn create(&self, new: NewProduct) -> RepoResult<Product> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: rows.iter().map(|p| p.id).max().unwrap_or(0) + 1,
            description: new.description,
            value: new.value,
            quantity: new.quantity,
            image: new.image,
            created_at: now,
            updated_at: now,
        };
        rows.push(product.clone());
        Ok(product)
    }

    async fn get(&self, id: i32) -> RepoResult<Product> {
        self.snapshot(id).ok_or(RepoError::NotFound("product"))
    }

    async fn list(&self) -> RepoResult<Vec<Product>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.description.cmp(&b.description).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update(
        &self,
        id: i32,
        patch: &ProductPatch,
        new_image: Option<&str>,
    ) -> RepoResult<Product> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let product = rows
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepoError::NotFound("product"))?;
        if let Some(description) = &patch.description {
            product.description = description.clone();
        }
        if let Some(value) = patch.value {
            product.value = value;
        }
        if let Some(quantity) = patch.quantity {
            product.quantity = quantity;
        }
        if let Some(image) = new_image {
            product.image = Some(image.to_string());
        }
        product.updated_at = OffsetDateTime::now_utc();
        Ok(product.clone())
    }

    async fn delete(&self, id: i32) -> RepoResult<()> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|p| p.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound("product"));
        }
        Ok(())
    }
}

/// Full router over in-memory repositories and a temporary upload root.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<MemoryUsers>,
    pub products: Arc<MemoryProducts>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::init(dir.path().join("uploads")).await.unwrap();

        let config = AppConfig {
            database_url: "postgres://unused".into(),
            host: "127.0.0.1".into(),
            port: 0,
            upload_dir: storage.root().to_path_buf(),
            max_upload_bytes: 1024 * 1024,
            argon2_time_cost: Some(1),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
        };

        let users = Arc::new(MemoryUsers::default());
        let products = Arc::new(MemoryProducts::default());
        let mut state = AppState::from_parts(
            Arc::new(config.clone()),
            JwtKeys::new(&config.jwt),
            Passwords::with_time_cost(config.argon2_time_cost).unwrap(),
            users.clone(),
            products.clone(),
            Arc::new(storage),
        );
        state.cleanup = CleanupPolicy {
            attempts: 2,
            delay: Duration::ZERO,
        };

        Self {
            router: build_app(state.clone()),
            state,
            users,
            products,
            _dir: dir,
        }
    }

    pub async fn raw(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Sends the request and decodes the JSON body (`Null` when empty or not JSON).
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.raw(req).await;
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Registers a user and returns its id.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> i32 {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/v1/auth/register",
                None,
                &serde_json::json!({ "name": name, "email": email, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["user"]["id"].as_i64().unwrap() as i32
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/v1/auth/login",
                None,
                &serde_json::json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers and logs in, returning `(id, token)`.
    pub async fn signup(&self, name: &str, email: &str) -> (i32, String) {
        let id = self.register(name, email, "password123").await;
        (id, self.login(email, "password123").await)
    }

    pub fn blob_path(&self, reference: &str) -> PathBuf {
        self.state.storage.resolve(reference).unwrap()
    }

    /// Waits for background cleanups until `subdir` holds `expected` files,
    /// then returns whatever is there.
    pub async fn settled_blobs(&self, subdir: &str, expected: usize) -> Vec<String> {
        for _ in 0..200 {
            let blobs = self.blobs(subdir);
            if blobs.len() == expected {
                return blobs;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.blobs(subdir)
    }

    /// File names currently stored under `subdir`.
    pub fn blobs(&self, subdir: &str) -> Vec<String> {
        let dir = self.state.config.upload_dir.join(subdir);
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(t) => builder.header(header::AUTHORIZATION, format!("Bearer {t}")),
        None => builder,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method("DELETE").uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "X-STOREFRONT-TEST-BOUNDARY";

/// A file part: `(field, file name, content)`.
pub type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

pub fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((field, file_name, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    with_auth(Request::builder().method(method).uri(uri), token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
