use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveDateTime};
use fastfeet::auth::password::hash_password;
use fastfeet::clock::Clock;
use fastfeet::config::AppConfig;
use fastfeet::db;
use fastfeet::mail::{MailMessage, Mailer};
use fastfeet::models::NewUser;
use fastfeet::routes;
use fastfeet::state::AppState;
use fastfeet::store::{MemoryStore, Store, UserStore};
use fastfeet::uploads::UploadStorage;
use http_body_util::BodyExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Clock whose "now" the tests move by hand.
pub struct ManualClock {
    now: StdMutex<NaiveDateTime>,
}

impl ManualClock {
    fn starting_at(at: NaiveDateTime) -> Self {
        Self {
            now: StdMutex::new(at),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mailer that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: StdMutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUploads {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryUploads {
    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl UploadStorage for MemoryUploads {
    async fn save(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.objects.lock().await;
        Ok(guard.get(name).cloned())
    }
}

/// The test server's "today": a date whose morning sits inside the
/// collection window.
pub fn day_at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 10)
        .unwrap()
        .and_hms_opt(hour, min, sec)
        .unwrap()
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    mailer: Arc<RecordingMailer>,
    uploads: Arc<MemoryUploads>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let uploads = Arc::new(MemoryUploads::default());
        let clock = Arc::new(ManualClock::starting_at(day_at(10, 0, 0)));

        let store_for_state: Arc<dyn Store> = store;
        let mailer_for_state: Arc<dyn Mailer> = mailer.clone();
        let uploads_for_state: Arc<dyn UploadStorage> = uploads.clone();
        let clock_for_state: Arc<dyn Clock> = clock.clone();
        let state = AppState::new(
            config,
            store_for_state,
            mailer_for_state,
            uploads_for_state,
            clock_for_state,
        );
        let router = routes::create_router(state.clone());

        Self {
            state,
            router,
            mailer,
            uploads,
            clock,
        }
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<RecordingMailer> {
        self.mailer.clone()
    }

    #[allow(dead_code)]
    pub fn uploads(&self) -> Arc<MemoryUploads> {
        self.uploads.clone()
    }

    #[allow(dead_code)]
    pub fn set_now(&self, at: NaiveDateTime) {
        self.clock.set(at);
    }

    pub async fn insert_user(&self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        let password_hash = hash_password(password)?;
        let user = self
            .state
            .store
            .create_user(
                NewUser {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash,
                },
                self.clock.now(),
            )
            .await?;
        Ok(user.id)
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/sessions", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.token)
    }

    #[allow(dead_code)]
    pub async fn create_recipient(&self, token: &str, name: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/recipients",
                &serde_json::json!({"name": name}),
                Some(token),
            )
            .await?;
        created_id(response, "recipient").await
    }

    #[allow(dead_code)]
    pub async fn create_deliveryman(&self, token: &str, name: &str, email: &str) -> Result<Uuid> {
        let response = self
            .post_json(
                "/deliverymen",
                &serde_json::json!({"name": name, "email": email}),
                Some(token),
            )
            .await?;
        created_id(response, "deliveryman").await
    }

    #[allow(dead_code)]
    pub async fn create_delivery(
        &self,
        token: &str,
        recipient_id: Uuid,
        deliveryman_id: Uuid,
        product: &str,
    ) -> Result<Uuid> {
        let response = self
            .post_json(
                "/deliveries",
                &serde_json::json!({
                    "recipient_id": recipient_id,
                    "deliveryman_id": deliveryman_id,
                    "product": product,
                }),
                Some(token),
            )
            .await?;
        created_id(response, "delivery").await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Sends one file as a multipart form field.
    #[allow(dead_code)]
    pub async fn send_file(
        &self,
        method: Method,
        path: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.send_multipart(method, path, boundary, body, token)
            .await
    }

    /// Multipart form whose only part is an unrelated text field, for the
    /// routes that demand a file.
    #[allow(dead_code)]
    pub async fn send_form_without_file(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
        body.extend(b"nothing attached");
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.send_multipart(method, path, boundary, body, token)
            .await
    }

    async fn send_multipart(
        &self,
        method: Method,
        path: &str,
        boundary: String,
        body: Vec<u8>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path).header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        );
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

async fn created_id(response: hyper::Response<Body>, what: &str) -> Result<Uuid> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    ensure!(
        status == StatusCode::OK,
        "creating a {what} failed with status {status}: {}",
        String::from_utf8_lossy(&body)
    );
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("{what} response has no id"))?;
    Ok(Uuid::parse_str(id)?)
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn json_body(response: hyper::Response<Body>) -> Result<serde_json::Value> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// The `error` field of a failure response.
#[allow(dead_code)]
pub async fn error_message(response: hyper::Response<Body>) -> Result<String> {
    let body = body_to_vec(response.into_body()).await?;
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    value
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!(
                "response body has no error field: {}",
                String::from_utf8_lossy(&body)
            )
        })
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        app_url: "http://localhost:3333".to_string(),
        upload_dir: "tmp/test-uploads".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        cors_allowed_origin: None,
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        mail_from: "Equipe FastFeet <noreply@fastfeet.com.br>".to_string(),
        admin_name: "Admin".to_string(),
        admin_email: None,
        admin_password: None,
    }
}
