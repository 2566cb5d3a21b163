// asset_proxy::server
//
// HTTP surface.  Maps an inbound request onto a `TargetRequest`, runs the
// pipeline, and writes the result (or the error's status and message).
//
//   GET <route>?url=<target>          target from the query string
//   GET <route>  x-target-url: ...    target from a header
//   x-api-key: ...                    shared secret, when configured

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use log::info;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::handler::{handle, TargetRequest};

pub const TARGET_HEADER: &str = "x-target-url";
pub const API_KEY_HEADER: &str = "x-api-key";

pub struct AppState<F> {
    config: Arc<ProxyConfig>,
    fetcher: Arc<F>,
}

impl<F> AppState<F> {
    pub fn new(config: Arc<ProxyConfig>, fetcher: Arc<F>) -> Self {
        Self { config, fetcher }
    }
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

pub fn router<F: Fetcher + 'static>(state: AppState<F>) -> Router {
    let route = state.config.route.clone();
    Router::new()
        .route(&route, any(proxy_handler::<F>))
        .with_state(state)
}

async fn proxy_handler<F: Fetcher + 'static>(
    State(state): State<AppState<F>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = target_request(&uri, &headers);
    match handle(&request, &state.config.access, state.fetcher.as_ref()).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Pull the proxy inputs out of the request line and headers.
pub fn target_request(uri: &Uri, headers: &HeaderMap) -> TargetRequest {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    let from_query = uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == "url" && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    });
    let raw_url = from_query
        .or_else(|| header(TARGET_HEADER))
        .unwrap_or_default();

    // First hop of a forwarded chain wins.
    let forwarded = |name: &str| {
        header(name).and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
    };
    let caller_protocol = match forwarded("x-forwarded-proto").as_deref() {
        Some(p) if p.eq_ignore_ascii_case("https") => "https".to_string(),
        _ => "http".to_string(),
    };
    let caller_host = forwarded("x-forwarded-host")
        .filter(|h| !h.is_empty())
        .or_else(|| header("host"))
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    TargetRequest {
        raw_url,
        api_key: header(API_KEY_HEADER),
        caller_protocol,
        caller_host,
        caller_path: uri.path().to_string(),
    }
}

/// Bind, serve until Ctrl-C / SIGTERM.
pub async fn serve(config: ProxyConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let fetcher = HttpFetcher::new(
        Arc::new(config.access.allowlist.clone()),
        config.upstream_timeout,
        &config.user_agent,
    )?;
    let app = router(AppState::new(Arc::clone(&config), Arc::new(fetcher)));

    let listener = TcpListener::bind(config.bind).await?;
    info!(
        "proxy listening on {} at {} (api key {}, allowlist {:?})",
        listener.local_addr()?,
        config.route,
        if config.access.api_key.is_some() { "on" } else { "off" },
        config.access.allowlist.entries(),
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
