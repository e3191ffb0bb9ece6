use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use docdesk::auth::password::hash_password;
use docdesk::config::AppConfig;
use docdesk::db::{self, PgPool};
use docdesk::models::{Approval, Document, NewUser};
use docdesk::routes;
use docdesk::state::AppState;
use docdesk::storage::{FileStorage, LocalFileStorage};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Text fields of a multipart upload; `None` leaves the field out.
#[derive(Clone, Default)]
pub struct UploadFields<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub section: Option<&'a str>,
    pub sub_section: Option<&'a str>,
    pub extra: Vec<(&'a str, &'a str)>,
}

impl<'a> UploadFields<'a> {
    pub fn new(title: &'a str, section: &'a str, sub_section: &'a str) -> Self {
        Self {
            title: Some(title),
            section: Some(section),
            sub_section: Some(sub_section),
            ..Default::default()
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    upload_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;
        let upload_dir = tempfile::tempdir().context("failed to create upload dir")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            upload_dir: upload_dir.path().to_string_lossy().into_owned(),
            max_upload_bytes: 1024 * 1024,
            session_expiry_hours: 1,
            session_cookie_secure: false,
            session_cookie_domain: None,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(upload_dir.path()));
        let state = AppState::new(pool, config, storage);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            upload_dir,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn stored_file_count(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.upload_dir.path())?.count())
    }

    pub async fn insert_user(&self, username: &str, password: &str, role: &str) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                full_name: format!("{username} (test)"),
                username,
                password_hash: hash_password(&password)?,
                role,
            };
            diesel::insert_into(docdesk::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        #[derive(serde::Deserialize)]
        struct LoginResponse {
            token: String,
        }
        let parsed: LoginResponse = json_body(response).await?;
        Ok(parsed.token)
    }

    /// Inserts a user with `role` and logs them in, returning (user id, token).
    pub async fn user_with_role(&self, username: &str, role: &str) -> Result<(Uuid, String)> {
        let password = format!("{username}-pass");
        let id = self.insert_user(username, &password, role).await?;
        let token = self.login_token(username, &password).await?;
        Ok((id, token))
    }

    /// Opens a session for `user_id` that expired an hour ago.
    #[allow(dead_code)]
    pub async fn expired_session_token(&self, user_id: Uuid) -> Result<String> {
        self.with_conn(move |conn| {
            let issued = docdesk::auth::session::open_session(
                conn,
                user_id,
                chrono::Duration::hours(-1),
            )
            .context("failed to open session")?;
            Ok(issued.token)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn approvals_in_db(&self, document_id: Uuid) -> Result<Vec<Approval>> {
        self.with_conn(move |conn| {
            use docdesk::schema::approvals::dsl;
            dsl::approvals
                .filter(dsl::document_id.eq(document_id))
                .load::<Approval>(conn)
                .context("failed to load approvals")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn document_in_db(&self, document_id: Uuid) -> Result<Option<Document>> {
        self.with_conn(move |conn| {
            docdesk::documents::get(conn, document_id).context("failed to load document")
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<Response> {
        let body = serde_json::to_vec(payload)?;
        self.post_raw(path, "application/json", body, token).await
    }

    pub async fn post_raw(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
        token: Option<&str>,
    ) -> Result<Response> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", content_type);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        self.send(request).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> Result<Response> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("cookie", cookie)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        self.send(request).await
    }

    pub async fn upload_document(
        &self,
        fields: &UploadFields<'_>,
        file: Option<(&str, &[u8])>,
        token: Option<&str>,
    ) -> Result<Response> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        let mut text_fields: Vec<(&str, &str)> = Vec::new();
        if let Some(title) = fields.title {
            text_fields.push(("title", title));
        }
        if let Some(description) = fields.description {
            text_fields.push(("description", description));
        }
        if let Some(section) = fields.section {
            text_fields.push(("section", section));
        }
        if let Some(sub_section) = fields.sub_section {
            text_fields.push(("subSection", sub_section));
        }
        text_fields.extend(fields.extra.iter().copied());

        for (name, value) in text_fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        if let Some((filename, data)) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    filename
                )
                .as_bytes(),
            );
            body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend(data);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.post_raw(
            "/api/documents",
            &format!("multipart/form-data; boundary={boundary}"),
            body,
            token,
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).with_context(|| {
        format!(
            "unexpected response body: {}",
            String::from_utf8_lossy(&body)
        )
    })
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE approvals, documents, sessions, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
