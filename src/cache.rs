//! Page regeneration cache.
//!
//! Served pages are built on first request and then reused until they are
//! older than a fixed time-to-live. This module holds that policy, separate
//! from the HTTP layer, so it can be tested with a fake clock and a fake
//! builder.
//!
//! # Page lifecycle
//!
//! Each key moves through:
//!
//! ```text
//! NotBuilt ──request──▶ Building ──ok──▶ Built ──ttl──▶ Stale
//!    ▲                     │                ▲              │
//!    └───────error─────────┘                └──rebuild─────┘
//! ```
//!
//! - **NotBuilt → Building**: the first request starts a build and waits for
//!   it (blocking fallback). Requests that arrive while it runs wait on the
//!   *same* build and get the same result, success or error.
//! - **Building → NotBuilt**: a failed first build leaves nothing cached, so
//!   the next request tries again.
//! - **Stale**: the next request gets the old page immediately and starts one
//!   background rebuild. If that rebuild fails the old page keeps being
//!   served until a later request retries.
//!
//! # Single flight
//!
//! In-flight builds are [`Shared`] futures stored in the slot map, so any
//! number of waiters poll one underlying build. Each build carries a
//! generation number; a build only updates its slot if the slot still
//! belongs to that generation. The slot map lock is never held across an
//! `.await`.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Where a key is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    NotBuilt,
    Building,
    Built,
    Stale,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PageState::NotBuilt => "not built",
            PageState::Building => "building",
            PageState::Built => "built",
            PageState::Stale => "stale",
        };
        f.write_str(label)
    }
}

type BuildOutcome<V, E> = Result<Arc<V>, Arc<E>>;
type SharedBuild<V, E> = Shared<BoxFuture<'static, BuildOutcome<V, E>>>;
type Builder<K, V, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;

enum Slot<V, E> {
    Building {
        generation: u64,
        build: SharedBuild<V, E>,
    },
    Built {
        value: Arc<V>,
        built_at: Instant,
        refresh: Option<(u64, SharedBuild<V, E>)>,
    },
}

/// Cache of built values with TTL regeneration and one build per key at a time.
pub struct RegenerationCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for RegenerationCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K, V, E> {
    name: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    build: Builder<K, V, E>,
    slots: Mutex<HashMap<K, Slot<V, E>>>,
    generations: AtomicU64,
}

impl<K, V, E> RegenerationCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: fmt::Display + Send + Sync + 'static,
{
    /// A cache named `name` (used in log lines) whose entries go stale after `ttl`.
    pub fn new<F, Fut>(name: impl Into<String>, ttl: Duration, build: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self::with_clock(name, ttl, Arc::new(SystemClock), build)
    }

    pub fn with_clock<F, Fut>(
        name: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        build: F,
    ) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                ttl,
                clock,
                build: Arc::new(move |key| build(key).boxed()),
                slots: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// The value for `key`, building it if needed.
    ///
    /// Fresh values return immediately. Stale values return immediately and
    /// start a background rebuild. Missing values are built, or the in-flight
    /// build is joined, and the result awaited. Builds run as tokio tasks, so
    /// dropping the returned future does not stop one.
    pub async fn get(&self, key: &K) -> Result<Arc<V>, Arc<E>> {
        let build = {
            let mut slots = self.inner.lock();
            let now = self.inner.clock.now();
            match slots.get_mut(key) {
                Some(Slot::Built {
                    value,
                    built_at,
                    refresh,
                }) => {
                    if now.duration_since(*built_at) >= self.inner.ttl && refresh.is_none() {
                        let generation = self.inner.next_generation();
                        info!("{}: {:?} is stale, rebuilding", self.inner.name, key);
                        let rebuild = self.inner.start_build(key.clone(), generation);
                        *refresh = Some((generation, rebuild.clone()));
                        tokio::spawn(rebuild);
                    }
                    return Ok(Arc::clone(value));
                }
                Some(Slot::Building { build, .. }) => {
                    debug!("{}: joining in-flight build of {:?}", self.inner.name, key);
                    build.clone()
                }
                None => {
                    let generation = self.inner.next_generation();
                    debug!("{}: building {:?}", self.inner.name, key);
                    let build = self.inner.start_build(key.clone(), generation);
                    slots.insert(
                        key.clone(),
                        Slot::Building {
                            generation,
                            build: build.clone(),
                        },
                    );
                    // Runs to completion even if every waiter goes away.
                    tokio::spawn(build.clone());
                    build
                }
            }
        };
        build.await
    }

    /// Current lifecycle state of `key`.
    pub fn state(&self, key: &K) -> PageState {
        let slots = self.inner.lock();
        let now = self.inner.clock.now();
        match slots.get(key) {
            None => PageState::NotBuilt,
            Some(Slot::Building { .. }) => PageState::Building,
            Some(Slot::Built { built_at, .. }) => {
                if now.duration_since(*built_at) >= self.inner.ttl {
                    PageState::Stale
                } else {
                    PageState::Built
                }
            }
        }
    }

    /// Wait for a background rebuild of `key`, if one is running.
    pub async fn wait_for_refresh(&self, key: &K) {
        let refresh = {
            let slots = self.inner.lock();
            match slots.get(key) {
                Some(Slot::Built {
                    refresh: Some((_, build)),
                    ..
                }) => Some(build.clone()),
                _ => None,
            }
        };
        if let Some(build) = refresh {
            let _ = build.await;
        }
    }

    /// Number of keys with a built or building entry.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a finished build should do to its slot.
enum Landing {
    FirstBuild,
    Refresh,
    Superseded,
}

impl<K, V, E> Inner<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    E: fmt::Display + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V, E>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    /// Wrap the builder so the slot is updated as part of the build itself:
    /// by the time any waiter sees the outcome, the slot already reflects it.
    fn start_build(self: &Arc<Self>, key: K, generation: u64) -> SharedBuild<V, E> {
        let inner: Weak<Self> = Arc::downgrade(self);
        let pending = (self.build)(key.clone());
        async move {
            let started = Instant::now();
            let outcome = match pending.await {
                Ok(value) => Ok(Arc::new(value)),
                Err(err) => Err(Arc::new(err)),
            };
            if let Some(inner) = inner.upgrade() {
                inner.land(key, generation, &outcome, started.elapsed());
            }
            outcome
        }
        .boxed()
        .shared()
    }

    fn land(&self, key: K, generation: u64, outcome: &BuildOutcome<V, E>, took: Duration) {
        let mut slots = self.lock();
        let landing = match slots.get(&key) {
            Some(Slot::Building { generation: g, .. }) if *g == generation => Landing::FirstBuild,
            Some(Slot::Built {
                refresh: Some((g, _)),
                ..
            }) if *g == generation => Landing::Refresh,
            _ => Landing::Superseded,
        };
        let now = self.clock.now();

        match (landing, outcome) {
            (Landing::FirstBuild, Ok(value)) => {
                info!("{}: built {:?} in {:?}", self.name, key, took);
                slots.insert(
                    key,
                    Slot::Built {
                        value: Arc::clone(value),
                        built_at: now,
                        refresh: None,
                    },
                );
            }
            (Landing::FirstBuild, Err(err)) => {
                warn!("{}: building {:?} failed: {}", self.name, key, err);
                slots.remove(&key);
            }
            (Landing::Refresh, outcome) => {
                if let Some(Slot::Built {
                    value,
                    built_at,
                    refresh,
                }) = slots.get_mut(&key)
                {
                    match outcome {
                        Ok(fresh) => {
                            info!("{}: rebuilt {:?} in {:?}", self.name, key, took);
                            *value = Arc::clone(fresh);
                            *built_at = now;
                        }
                        Err(err) => {
                            warn!(
                                "{}: rebuilding {:?} failed, serving stale copy: {}",
                                self.name, key, err
                            );
                        }
                    }
                    *refresh = None;
                }
            }
            (Landing::Superseded, _) => {
                debug!("{}: dropping superseded build of {:?}", self.name, key);
            }
        }
    }
}
