#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use nextauth_client::adapters::cookies::Cookie;
use nextauth_client::config::ClientConfig;
use nextauth_client::domain::session::{ACCESS_TOKEN_COOKIE, CookieOptions, REFRESH_TOKEN_COOKIE};
use nextauth_client::{ApiClient, CookieStore, ExecutionContext, MemoryCookieStore, SessionTerminator};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("nextauth_client=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Rotates both tokens when the presented refresh token is current.
    Rotate,
    /// Never answers in time.
    Hang,
    /// Answers 500.
    Fail,
    /// Answers 200 with a blank access token.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct BackendState {
    generation: AtomicUsize,
    valid_token: Mutex<Option<String>>,
    refresh_token: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    refresh_calls: AtomicUsize,
    refresh_bodies: Mutex<Vec<Value>>,
    hits: Mutex<Vec<Hit>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            generation: AtomicUsize::new(1),
            valid_token: Mutex::new(Some("T1".to_string())),
            refresh_token: Mutex::new("R1".to_string()),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            refresh_delay: Mutex::new(Duration::ZERO),
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            hits: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, path: &str, headers: &HeaderMap, body: Option<Value>) -> Option<String> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);
        self.hits.lock().unwrap().push(Hit {
            path: path.to_string(),
            bearer: bearer.clone(),
            body,
        });
        bearer
    }

    fn authorize(&self, bearer: Option<String>) -> Result<(), Response> {
        let valid = self.valid_token.lock().unwrap().clone();
        match bearer {
            Some(token) if Some(&token) == valid.as_ref() => Ok(()),
            Some(_) => Err(unauthorized("token.expired")),
            None => Err(unauthorized("token.invalid")),
        }
    }
}

fn unauthorized(code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": true, "code": code, "message": "Unauthorized" })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let bearer = state.record("/me", &headers, None);
    match state.authorize(bearer) {
        Ok(()) => Json(json!({ "user": "alice" })).into_response(),
        Err(response) => response,
    }
}

async fn create_item(State(state): State<Arc<BackendState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let bearer = state.record("/items", &headers, Some(body.clone()));
    match state.authorize(bearer) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "created": body }))).into_response(),
        Err(response) => response,
    }
}

async fn admin(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/admin", &headers, None);
    unauthorized("token.invalid")
}

async fn stubborn(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/stubborn", &headers, None);
    unauthorized("token.expired")
}

async fn broken(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/broken", &headers, None);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "boom" }))).into_response()
}

async fn bare_unauthorized(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/bare-401", &headers, None);
    StatusCode::UNAUTHORIZED.into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state.refresh_bodies.lock().unwrap().push(body.clone());

    let delay = *state.refresh_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        RefreshMode::Fail => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "refresh unavailable" }))).into_response()
        }
        RefreshMode::Empty => Json(json!({ "token": "", "refreshToken": "R9" })).into_response(),
        RefreshMode::Rotate => {
            let presented = body.get("refreshToken").and_then(Value::as_str).map(str::to_owned);
            let mut current = state.refresh_token.lock().unwrap();
            if presented.as_deref() != Some(current.as_str()) {
                return unauthorized("refresh_token.invalid");
            }

            let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let token = format!("T{generation}");
            let refresh_token = format!("R{generation}");
            *current = refresh_token.clone();
            *state.valid_token.lock().unwrap() = Some(token.clone());

            Json(json!({ "token": token, "refreshToken": refresh_token })).into_response()
        }
    }
}

/// In-process stand-in for the application backend.
pub struct TestBackend {
    pub url: String,
    state: Arc<BackendState>,
}

impl TestBackend {
    pub async fn spawn() -> Self {
        setup_tracing();
        let state = Arc::new(BackendState::new());

        let app = Router::new()
            .route("/me", get(me))
            .route("/items", post(create_item))
            .route("/admin", get(admin))
            .route("/stubborn", get(stubborn))
            .route("/broken", get(broken))
            .route("/bare-401", get(bare_unauthorized))
            .route("/refresh", post(refresh))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Invalidates the current access token; presenting it now yields `token.expired`.
    pub fn expire_access_token(&self) {
        *self.state.valid_token.lock().unwrap() = None;
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_bodies(&self) -> Vec<Value> {
        self.state.refresh_bodies.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> Vec<Hit> {
        self.state
            .hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.path == path)
            .cloned()
            .collect()
    }

    pub fn hits_with_bearer(&self, path: &str, token: &str) -> usize {
        self.hits(path)
            .iter()
            .filter(|h| h.bearer.as_deref() == Some(token))
            .count()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            ..ClientConfig::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingTerminator {
    calls: AtomicUsize,
    delay: Duration,
}

impl RecordingTerminator {
    /// Terminator whose sign-out takes `delay` before it completes.
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTerminator for RecordingTerminator {
    async fn sign_out(&self) -> nextauth_client::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestClient {
    pub client: ApiClient,
    pub cookies: Arc<MemoryCookieStore>,
    pub terminator: Arc<RecordingTerminator>,
}

pub async fn seeded_cookies(token: &str, refresh_token: &str) -> Arc<MemoryCookieStore> {
    let cookies = Arc::new(MemoryCookieStore::new());
    let options = CookieOptions::session();
    cookies.set_cookie(Cookie::new(ACCESS_TOKEN_COOKIE, token, &options)).await.unwrap();
    cookies
        .set_cookie(Cookie::new(REFRESH_TOKEN_COOKIE, refresh_token, &options))
        .await
        .unwrap();
    cookies
}

/// Client signed in as `T1`/`R1`.
pub async fn client_with(config: ClientConfig, browser: bool) -> TestClient {
    client_with_terminator(config, browser, RecordingTerminator::default()).await
}

pub async fn client_with_terminator(config: ClientConfig, browser: bool, terminator: RecordingTerminator) -> TestClient {
    let cookies = seeded_cookies("T1", "R1").await;
    let terminator = Arc::new(terminator);
    let context = if browser {
        ExecutionContext::browser(Arc::clone(&terminator) as Arc<dyn SessionTerminator>)
    } else {
        ExecutionContext::Server
    };

    let client = ApiClient::new(config, Arc::clone(&cookies) as Arc<dyn CookieStore>, context)
        .await
        .unwrap();

    TestClient {
        client,
        cookies,
        terminator,
    }
}

pub async fn browser_client(backend: &TestBackend) -> TestClient {
    client_with(backend.config(), true).await
}

pub async fn server_client(backend: &TestBackend) -> TestClient {
    client_with(backend.config(), false).await
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within 5s");
}
