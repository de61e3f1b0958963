use crate::adapters::cookies::{Cookie, CookieStore};
use crate::api::schemas::auth::{AuthSession, Refresh};
use crate::api::{ApiResponse, RequestConfig};
use crate::config::ClientConfig;
use crate::domain::auth::{FailureKind, error_code};
use crate::domain::session::{
    ACCESS_TOKEN_COOKIE, CookieOptions, REFRESH_TOKEN_COOKIE, SessionTokens, bearer, fingerprint, parse_bearer,
};
use crate::error::{ClientError, Result};
use crate::services::refresh_coordinator::{RefreshCoordinator, RefreshGuard, RefreshOutcome};
use crate::services::session_terminator::ExecutionContext;
use futures::future::BoxFuture;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

const REFRESH_PATH: &str = "/refresh";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
struct Metrics {
    refresh_total: Counter<u64>,
    refresh_failures_total: Counter<u64>,
    replays_total: Counter<u64>,
    sign_outs_total: Counter<u64>,
    refresh_waiters: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("nextauth-client");
        Self {
            refresh_total: meter
                .u64_counter("client_refresh_total")
                .with_description("Total number of token refresh calls issued")
                .build(),
            refresh_failures_total: meter
                .u64_counter("client_refresh_failures_total")
                .with_description("Total number of token refresh calls that failed")
                .build(),
            replays_total: meter
                .u64_counter("client_replays_total")
                .with_description("Total number of requests re-issued after a refresh")
                .build(),
            sign_outs_total: meter
                .u64_counter("client_sign_outs_total")
                .with_description("Total number of forced sign-outs")
                .build(),
            refresh_waiters: meter
                .u64_histogram("client_refresh_waiters")
                .with_description("Number of requests released by a single refresh")
                .build(),
        }
    }
}

/// HTTP client for the application API.
///
/// Every request carries the session's bearer token. When the backend answers
/// `401 {"code": "token.expired"}` the request is parked until a single
/// `POST /refresh` completes, then re-issued with the new token. Cloning is
/// cheap and clones share the same session state.
#[derive(Clone, Debug)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    default_headers: RwLock<HeaderMap>,
    cookies: Arc<dyn CookieStore>,
    context: ExecutionContext,
    coordinator: Arc<RefreshCoordinator>,
    max_replays: u32,
    metrics: Metrics,
}

impl ApiClient {
    /// Builds a client whose default `Authorization` header comes from the access-token cookie.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid, `max_replays` is zero, the
    /// cookie store cannot be read, or the HTTP client cannot be constructed.
    pub async fn new(
        config: ClientConfig,
        cookies: Arc<dyn CookieStore>,
        context: ExecutionContext,
    ) -> Result<Self> {
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL {}: {e}", config.base_url)))?;
        if config.max_replays == 0 {
            return Err(ClientError::InvalidRequest("max_replays must be at least 1".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut default_headers = HeaderMap::new();
        if let Some(token) = cookies.get_value(ACCESS_TOKEN_COOKIE).await? {
            default_headers.insert(AUTHORIZATION, HeaderValue::from_str(&bearer(&token))?);
        }

        tracing::debug!(
            base_url = %config.base_url,
            browser = context.is_browser(),
            authenticated = default_headers.contains_key(AUTHORIZATION),
            "API client ready"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                default_headers: RwLock::new(default_headers),
                cookies,
                context,
                coordinator: Arc::new(RefreshCoordinator::new()),
                max_replays: config.max_replays,
                metrics: Metrics::new(),
            }),
        })
    }

    /// Issues `request`, transparently refreshing the session if its token has expired.
    ///
    /// # Errors
    /// - `ClientError::Status` / `ClientError::Transport` for failures unrelated to the session.
    /// - `ClientError::AuthToken` (server) when the session is invalid and cannot be
    ///   refreshed. A browser client signs out and returns the original `ClientError::Status`.
    /// - `ClientError::RefreshFailed` when the refresh this request waited on failed.
    pub async fn send(&self, request: RequestConfig) -> Result<ApiResponse> {
        Arc::clone(&self.inner).send(request).await
    }

    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(RequestConfig::get(path)).await
    }

    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(RequestConfig::delete(path)).await
    }

    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn post_json<T: Serialize + Sync + ?Sized>(&self, path: &str, payload: &T) -> Result<ApiResponse> {
        self.send(RequestConfig::post(path).json(payload)?).await
    }

    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn put_json<T: Serialize + Sync + ?Sized>(&self, path: &str, payload: &T) -> Result<ApiResponse> {
        self.send(RequestConfig::put(path).json(payload)?).await
    }

    /// Persists `tokens` to the cookie store and makes them the default credentials.
    ///
    /// # Errors
    /// Returns an error if the cookies cannot be written or the token is not a valid header value.
    pub async fn store_session(&self, tokens: &SessionTokens) -> Result<()> {
        self.inner.store_session(tokens).await
    }

    /// Current default `Authorization` header value.
    pub fn authorization(&self) -> Option<String> {
        self.inner
            .read_headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// True while a token refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    /// Requests currently waiting on an in-flight refresh.
    pub fn pending_requests(&self) -> usize {
        self.inner.coordinator.pending()
    }

    /// Cookie store holding the session tokens.
    pub fn cookies(&self) -> Arc<dyn CookieStore> {
        Arc::clone(&self.inner.cookies)
    }
}

impl ClientInner {
    fn send(self: Arc<Self>, request: RequestConfig) -> BoxFuture<'static, Result<ApiResponse>> {
        let span = tracing::debug_span!(
            "api_request",
            method = %request.method,
            path = %request.path,
            replay = request.replays()
        );
        Box::pin(self.send_intercepted(request).instrument(span))
    }

    async fn send_intercepted(self: Arc<Self>, mut request: RequestConfig) -> Result<ApiResponse> {
        // Sending the stale token now would only earn another 401.
        if let Some(rx) = self.coordinator.park_if_refreshing() {
            tracing::debug!("Token refresh in progress, holding request");
            let token = await_refresh(rx).await?;
            request.set_bearer(&token)?;
        }
        request.merge_defaults(&self.read_headers());

        match self.dispatch(&request).await {
            Ok(response) => Ok(response),
            Err(error) => self.handle_failure(request, error).await,
        }
    }

    async fn handle_failure(self: Arc<Self>, request: RequestConfig, error: ClientError) -> Result<ApiResponse> {
        match error.failure_kind() {
            FailureKind::Passthrough => Err(error),
            FailureKind::Unrecoverable => {
                tracing::warn!(code = error.code().unwrap_or("none"), "Unrecoverable authentication failure");
                if self.context.is_browser() {
                    self.metrics.sign_outs_total.add(1, &[]);
                }
                Err(self.context.unrecoverable(error).await)
            }
            FailureKind::Expired => self.recover_expired(request, error).await,
        }
    }

    async fn recover_expired(self: Arc<Self>, mut request: RequestConfig, error: ClientError) -> Result<ApiResponse> {
        if request.replays >= self.max_replays {
            tracing::warn!(replays = request.replays, "Access token still rejected after replay, giving up");
            return Err(error);
        }
        request.replays += 1;

        // A refresh completed after this request went out: reuse its token.
        if let Some(current) = self.current_token().filter(|t| Some(t.as_str()) != request.bearer()) {
            tracing::debug!(token = %fingerprint(&current), "Token already rotated, replaying");
            request.set_bearer(&current)?;
            return self.send(request).await;
        }

        let (rx, guard) = self.coordinator.enqueue();
        if let Some(guard) = guard {
            self.spawn_refresh(guard);
        }

        let token = await_refresh(rx).await?;
        request.set_bearer(&token)?;
        self.metrics.replays_total.add(1, &[]);
        self.send(request).await
    }

    fn spawn_refresh(self: &Arc<Self>, guard: RefreshGuard) {
        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                inner.run_refresh(guard).await;
            }
            .instrument(tracing::info_span!("token_refresh")),
        );
    }

    async fn run_refresh(&self, guard: RefreshGuard) {
        self.metrics.refresh_total.add(1, &[]);

        match self.refresh_session().await {
            Ok(tokens) => {
                let released = guard.succeed(tokens.token.clone());
                self.metrics.refresh_waiters.record(released as u64, &[]);
                tracing::info!(waiters = released, token = %fingerprint(&tokens.token), "Session refreshed");
            }
            Err(e) => {
                self.metrics.refresh_failures_total.add(1, &[]);
                // Waiters resume only after the session is gone.
                if self.context.refresh_failed().await {
                    self.metrics.sign_outs_total.add(1, &[]);
                }
                let released = guard.fail(Arc::new(e));
                self.metrics.refresh_waiters.record(released as u64, &[]);
            }
        }
    }

    #[tracing::instrument(err(level = "warn"), skip(self))]
    async fn refresh_session(&self) -> Result<SessionTokens> {
        let refresh_token = self.cookies.get_value(REFRESH_TOKEN_COOKIE).await?;
        if refresh_token.is_none() {
            tracing::debug!("No refresh token cookie present");
        }

        let mut request = RequestConfig::post(REFRESH_PATH).json(&Refresh { refresh_token })?;
        request.merge_defaults(&self.read_headers());

        let session: AuthSession = self.dispatch(&request).await?.json()?;
        session.validate().map_err(ClientError::InvalidSession)?;

        let tokens = SessionTokens::from(session);
        self.store_session(&tokens).await?;
        Ok(tokens)
    }

    async fn store_session(&self, tokens: &SessionTokens) -> Result<()> {
        let options = CookieOptions::session();
        // Refresh token first: a failed access write still leaves a session that can refresh.
        self.cookies
            .set_cookie(Cookie::new(REFRESH_TOKEN_COOKIE, tokens.refresh_token.as_str(), &options))
            .await?;
        if let Err(e) = self
            .cookies
            .set_cookie(Cookie::new(ACCESS_TOKEN_COOKIE, tokens.token.as_str(), &options))
            .await
        {
            tracing::warn!(error = %e, "Refresh token stored but access token was not");
            return Err(e.into());
        }

        let value = HeaderValue::from_str(&bearer(&tokens.token))?;
        self.default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn dispatch(&self, request: &RequestConfig) -> Result<ApiResponse> {
        let request_id = Uuid::now_v7();
        let mut builder = self
            .http
            .request(request.method.clone(), self.url_for(&request.path))
            .headers(request.headers.clone())
            .header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::debug!(request.id = %request_id, status = status.as_u16(), "Response received");

        if status.is_success() {
            Ok(ApiResponse::new(status, headers, body))
        } else {
            Err(ClientError::Status {
                status,
                code: error_code(&body),
                body,
            })
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn read_headers(&self) -> std::sync::RwLockReadGuard<'_, HeaderMap> {
        self.default_headers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_token(&self) -> Option<String> {
        self.read_headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .map(str::to_owned)
    }
}

async fn await_refresh(rx: oneshot::Receiver<RefreshOutcome>) -> Result<String> {
    match rx.await {
        Ok(Ok(token)) => Ok(token),
        Ok(Err(error)) => Err(ClientError::RefreshFailed(error)),
        Err(_) => Err(ClientError::RefreshFailed(Arc::new(ClientError::RefreshAborted))),
    }
}
