//! In-process mock of the json-server episodes API, loaded from
//! `fixtures/api/episodes.json`.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const FIXTURE: &str = include_str!("../../fixtures/api/episodes.json");

#[derive(Clone, Default)]
pub struct MockApi {
    episodes: Arc<Vec<Value>>,
    listing_hits: Arc<AtomicUsize>,
    episode_hits: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    broken: Arc<AtomicBool>,
}

impl MockApi {
    pub fn from_fixture() -> Self {
        let db: Value = serde_json::from_str(FIXTURE).unwrap();
        let episodes = db["episodes"].as_array().unwrap().clone();
        Self {
            episodes: Arc::new(episodes),
            ..Self::default()
        }
    }

    /// Bind an ephemeral port and serve until the test runtime shuts down.
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/episodes", get(list_episodes))
            .route("/episodes/{id}", get(get_episode))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    /// Make every following request answer 500.
    pub fn break_down(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn listing_hits(&self) -> usize {
        self.listing_hits.load(Ordering::SeqCst)
    }

    pub fn episode_hits(&self) -> usize {
        self.episode_hits.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<HashMap<String, String>> {
        self.queries.lock().unwrap().clone()
    }

    pub fn episode_ids(&self) -> Vec<String> {
        self.episodes
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect()
    }
}

async fn list_episodes(
    State(api): State<MockApi>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    api.listing_hits.fetch_add(1, Ordering::SeqCst);
    api.queries.lock().unwrap().push(query.clone());
    if api.broken.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut episodes: Vec<Value> = api.episodes.as_ref().clone();
    if let Some(field) = query.get("_sort") {
        episodes.sort_by(|a, b| {
            a[field.as_str()]
                .as_str()
                .unwrap_or_default()
                .cmp(b[field.as_str()].as_str().unwrap_or_default())
        });
        if query.get("_order").map(String::as_str) == Some("desc") {
            episodes.reverse();
        }
    }
    if let Some(limit) = query.get("_limit").and_then(|l| l.parse().ok()) {
        episodes.truncate(limit);
    }
    Json(episodes).into_response()
}

async fn get_episode(State(api): State<MockApi>, Path(id): Path<String>) -> Response {
    api.episode_hits.fetch_add(1, Ordering::SeqCst);
    if api.broken.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match api.episodes.iter().find(|e| e["id"] == id.as_str()) {
        Some(episode) => Json(episode.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({}))).into_response(),
    }
}
