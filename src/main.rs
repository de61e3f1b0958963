#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use anyhow::Context;
use nextauth_client::config::{Config, ContextKind};
use nextauth_client::{
    ApiClient, CookieSignOut, CookieStore, ExecutionContext, FileCookieStore, RequestConfig, SessionTokens, telemetry,
};
use reqwest::{Method, StatusCode};
use std::io::Write;
use std::sync::Arc;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let span = tracing::info_span!("request", method = %config.request.method, path = %config.request.path);
    let result = run(&config).instrument(span).await;

    telemetry_guard.shutdown();
    result
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let cookies: Arc<dyn CookieStore> = Arc::new(FileCookieStore::new(&config.cookie_file));
    let context = match config.context {
        ContextKind::Browser => ExecutionContext::browser(Arc::new(CookieSignOut::new(Arc::clone(&cookies)))),
        ContextKind::Server => ExecutionContext::Server,
    };

    let client = ApiClient::new(config.client.clone(), cookies, context).await?;

    if let (Some(token), Some(refresh_token)) = (&config.request.token, &config.request.refresh_token) {
        client
            .store_session(&SessionTokens::new(token.as_str(), refresh_token.as_str()))
            .await?;
        tracing::info!("Session cookies seeded");
    }

    let method = Method::from_bytes(config.request.method.to_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method {}", config.request.method))?;
    let mut request = RequestConfig::new(method, config.request.path.as_str());
    if let Some(data) = &config.request.data {
        let payload: serde_json::Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(&payload)?;
    }

    match client.send(request).await {
        Ok(response) => {
            tracing::info!(status = %response.status(), "Request completed");
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(response.body())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
        Err(e) if e.is_auth_token_error() || e.status() == Some(StatusCode::UNAUTHORIZED) => {
            tracing::warn!(error = %e, "Not logged in");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.code().unwrap_or("none"), "Request failed");
            Err(e.into())
        }
    }
}
