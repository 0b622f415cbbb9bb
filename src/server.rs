//! On-demand page server.
//!
//! | Path | Cache | Revalidate |
//! |------|-------|------------|
//! | `/` | home page | `home.revalidate_secs` (8h) |
//! | `/episodes/{id}` | one entry per id | `episodes.revalidate_secs` (24h) |
//!
//! No page is built at startup. The first request for a path builds it and
//! waits (blocking fallback); later requests are answered from the
//! [`RegenerationCache`], which rebuilds in the background once the page is
//! older than its TTL.
//!
//! Responses carry an `ETag` (hash of the HTML) and
//! `Cache-Control: s-maxage={ttl}, stale-while-revalidate` so a CDN in front
//! follows the same schedule. Failures are plain text: `404` when the API does
//! not know the episode, `500` for anything else.

use crate::api::EpisodeSource;
use crate::cache::{Clock, RegenerationCache, SystemClock};
use crate::config::SiteConfig;
use crate::generate::{GenerateError, RenderedPage, build_episode_page, build_home_page};
use axum::{
    Router,
    extract::{Path, State},
    http::{
        HeaderMap, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

type PageCache<K> = RegenerationCache<K, RenderedPage, GenerateError>;

const HOME_KEY: &str = "/";

/// Shared handler state: one cache per page kind.
#[derive(Clone)]
pub struct AppState {
    home: PageCache<&'static str>,
    episodes: PageCache<String>,
}

impl AppState {
    pub fn new<S: EpisodeSource>(config: Arc<SiteConfig>, source: Arc<S>) -> Self {
        Self::with_clock(config, source, Arc::new(SystemClock))
    }

    pub fn with_clock<S: EpisodeSource>(
        config: Arc<SiteConfig>,
        source: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let home = {
            let config = Arc::clone(&config);
            let source = Arc::clone(&source);
            RegenerationCache::with_clock(
                "home",
                config.home.revalidate(),
                Arc::clone(&clock),
                move |_key: &'static str| {
                    let config = Arc::clone(&config);
                    let source = Arc::clone(&source);
                    async move { build_home_page(source.as_ref(), &config).await }
                },
            )
        };
        let episodes = RegenerationCache::with_clock(
            "episodes",
            config.episodes.revalidate(),
            clock,
            move |id: String| {
                let config = Arc::clone(&config);
                let source = Arc::clone(&source);
                async move { build_episode_page(source.as_ref(), &config, &id).await }
            },
        );
        Self { home, episodes }
    }

    /// Wait for any background rebuilds of the home page or `episode_ids`.
    pub async fn settle(&self, episode_ids: &[String]) {
        self.home.wait_for_refresh(&HOME_KEY).await;
        for id in episode_ids {
            self.episodes.wait_for_refresh(id).await;
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/episodes/{id}", get(episode))
        .with_state(state)
}

/// Bind `config.server.bind` and serve until Ctrl-C.
pub async fn serve<S: EpisodeSource>(config: SiteConfig, source: S) -> std::io::Result<()> {
    let bind = config.server.bind.clone();
    let state = AppState::new(Arc::new(config), Arc::new(source));
    let listener = TcpListener::bind(&bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let result = state.home.get(&HOME_KEY).await;
    respond(HOME_KEY, result, state.home.ttl(), &headers)
}

async fn episode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let result = state.episodes.get(&id).await;
    let path = format!("/episodes/{id}");
    respond(&path, result, state.episodes.ttl(), &headers)
}

fn respond(
    path: &str,
    result: Result<Arc<RenderedPage>, Arc<GenerateError>>,
    ttl: Duration,
    headers: &HeaderMap,
) -> Response {
    let page = match result {
        Ok(page) => page,
        Err(err) if err.is_not_found() => {
            warn!("{path}: {err}");
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        }
        Err(err) => {
            error!("{path}: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let cache_control = format!("s-maxage={}, stale-while-revalidate", ttl.as_secs());
    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag_matches(value, &page.etag));
    if not_modified {
        return (
            StatusCode::NOT_MODIFIED,
            [(ETAG, page.etag.clone()), (CACHE_CONTROL, cache_control)],
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (ETAG, page.etag.clone()),
            (CACHE_CONTROL, cache_control),
        ],
        page.html.clone(),
    )
        .into_response()
}

/// Whether an `If-None-Match` value names `etag` (weak comparison).
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag)
}
