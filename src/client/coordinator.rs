//! Request Coordinator Module
//!
//! Issues HTTP-style calls through a [`Transport`], serves repeated GETs
//! from an internal [`CacheStore`] and collapses concurrent identical GETs
//! onto a single underlying call. Failure classification happens here, once,
//! and nowhere else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::client::{RequestKey, RequestMetrics, SessionHooks, Transport, TransportError};
use crate::config::RequestConfig;
use crate::error::{ApiError, ValidationItem};

// == Request Options ==
/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the configured call timeout
    pub timeout: Option<Duration>,
}

type DedupSender = broadcast::Sender<Result<Value, ApiError>>;

// == Api Client ==
/// The request coordinator.
///
/// Cheap to share: wrap in an `Arc` and clone the handle across tasks. The
/// internal cache, in-flight map and metrics are process-wide state owned by
/// this instance; nothing outside reaches into them directly.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn SessionHooks>,
    cache: Arc<RwLock<CacheStore<Value>>>,
    /// At most one entry per key: the live call all duplicate GETs attach to.
    /// A synchronous mutex so the entry can be removed from a `Drop` impl.
    in_flight: StdMutex<HashMap<RequestKey, DedupSender>>,
    metrics: Mutex<RequestMetrics>,
    /// Recently surfaced notification messages, for flood suppression
    recent_notices: Mutex<HashMap<String, Instant>>,
    config: RequestConfig,
}

impl ApiClient {
    // == Constructor ==
    pub fn new(
        transport: Arc<dyn Transport>,
        hooks: Arc<dyn SessionHooks>,
        config: RequestConfig,
    ) -> Self {
        let cache = Arc::new(RwLock::new(CacheStore::from_config(&config.cache)));
        Self {
            transport,
            hooks,
            cache,
            in_flight: StdMutex::new(HashMap::new()),
            metrics: Mutex::new(RequestMetrics::new()),
            recent_notices: Mutex::new(HashMap::new()),
            config,
        }
    }

    // == Verb Sugar ==
    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, endpoint, None, RequestOptions::default())
            .await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn patch(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PATCH, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, endpoint, None, RequestOptions::default())
            .await
    }

    // == Request ==
    /// Issues a call.
    ///
    /// GETs consult the response cache first, then the in-flight map; a
    /// novel GET registers itself there so concurrent identical calls await
    /// the same outcome instead of dispatching their own. Non-GET verbs
    /// always hit the network and never touch the cache.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let key = RequestKey::new(&method, endpoint, body.as_ref());
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut in_flight_guard = None;
        if key.is_cacheable() {
            if let Some(cached) = self.cache.write().await.get(&key.to_string()) {
                let mut metrics = self.metrics.lock().await;
                metrics.record_cache_hit();
                return Ok(cached);
            }

            // Attach to an identical in-flight call if one exists, otherwise
            // register as the caller that dispatches it.
            let mut follower = None;
            {
                let mut in_flight = self.lock_in_flight();
                if let Some(tx) = in_flight.get(&key) {
                    follower = Some(tx.subscribe());
                } else {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(key.clone(), tx);
                    in_flight_guard = Some(InFlightGuard {
                        map: &self.in_flight,
                        key: key.clone(),
                    });
                }
            }
            if let Some(mut rx) = follower {
                debug!(key = %key, "attached to in-flight request");
                return match rx.recv().await {
                    Ok(outcome) => outcome,
                    // Channel closed without an outcome: the dispatching
                    // caller was cancelled mid-flight.
                    Err(_) => Err(ApiError::NetworkUnavailable),
                };
            }
        }

        let result = self.dispatch(method, endpoint, body.as_ref(), timeout).await;

        if key.is_cacheable() {
            if let Ok(data) = &result {
                self.cache
                    .write()
                    .await
                    .set(key.to_string(), data.clone(), None);
            }
        }
        if let Some(guard) = in_flight_guard {
            guard.settle(&result);
        }

        result
    }

    // == Dispatch ==
    /// Runs one network call and classifies the outcome.
    async fn dispatch(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let token = self.hooks.token();
        let started = Instant::now();

        let outcome = self
            .transport
            .execute(method.clone(), endpoint, body, token.as_deref(), timeout)
            .await;

        let result = match outcome {
            Err(TransportError::Timeout) => Err(ApiError::Timeout),
            Err(TransportError::Network(reason)) => {
                warn!(%method, endpoint, reason, "transport failure");
                Err(ApiError::NetworkUnavailable)
            }
            Ok(response) if response.is_success() => Ok(response.body),
            Ok(response) => Err(classify_failure(response.status, &response.body)),
        };

        match &result {
            Ok(_) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.metrics.lock().await.record_response_time(elapsed_ms);
            }
            Err(error) => {
                self.metrics.lock().await.record_error();
                if matches!(error, ApiError::Unauthorized) {
                    self.hooks.force_logout();
                }
                if error.is_notifiable() {
                    self.notify(&error.to_string()).await;
                }
            }
        }

        result
    }

    // == Notifications ==
    /// Surfaces a failure message, suppressing repeats of the identical
    /// message within the configured window.
    async fn notify(&self, message: &str) {
        {
            let mut recent = self.recent_notices.lock().await;
            let now = Instant::now();
            recent.retain(|_, seen| now.duration_since(*seen) < self.config.notice_window);
            if recent.contains_key(message) {
                debug!(message, "duplicate notification suppressed");
                return;
            }
            recent.insert(message.to_string(), now);
        }
        self.hooks.notify_error(message);
    }

    // == Cache Management ==
    /// Removes cached responses whose key contains `pattern`. This is the
    /// hook realtime subscribers use to drop stale reads for a topic.
    pub async fn invalidate(&self, pattern: &str) {
        let mut cache = self.cache.write().await;
        for key in cache.keys() {
            if key.contains(pattern) {
                cache.delete(&key);
            }
        }
    }

    /// Drops every cached response.
    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
    }

    // == Accessors ==
    /// Shared handle to the response cache, for wiring the TTL sweep task.
    pub fn cache(&self) -> Arc<RwLock<CacheStore<Value>>> {
        self.cache.clone()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    pub async fn metrics(&self) -> RequestMetrics {
        self.metrics.lock().await.clone()
    }

    /// Number of calls currently awaiting a transport outcome.
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<RequestKey, DedupSender>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// == In-Flight Guard ==
/// Owns a registered in-flight entry on behalf of the dispatching caller.
///
/// Settling removes the entry and publishes the outcome. If the caller's
/// future is dropped before settling, `Drop` removes the entry anyway; the
/// map held the only sender, so followers observe a closed channel instead
/// of waiting on a call nobody is running.
struct InFlightGuard<'a> {
    map: &'a StdMutex<HashMap<RequestKey, DedupSender>>,
    key: RequestKey,
}

impl InFlightGuard<'_> {
    /// Deregisters before publishing so late arrivals start a fresh call
    /// instead of attaching to a settled one.
    fn settle(self, result: &Result<Value, ApiError>) {
        let sender = self
            .map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        if let Some(tx) = sender {
            let _ = tx.send(result.clone());
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// == Classification ==
/// Maps a non-2xx response to the typed failure surfaced to callers.
fn classify_failure(status: u16, body: &Value) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        404 => ApiError::NotFound(
            detail_message(body).unwrap_or_else(|| "Resource not found".to_string()),
        ),
        _ => {
            if let Some(items) = validation_items(body) {
                let message = items
                    .iter()
                    .map(|item| format!("{}: {}", item.field, item.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                ApiError::Validation { message, items }
            } else {
                ApiError::Server {
                    status,
                    message: detail_message(body)
                        .unwrap_or_else(|| "An error occurred".to_string()),
                }
            }
        }
    }
}

/// Plain-string `detail` field of an error body.
fn detail_message(body: &Value) -> Option<String> {
    body.get("detail")?.as_str().map(str::to_string)
}

/// Structured `detail` list of a validation error body
/// (`[{"loc": ["body", "field"], "msg": "..."}]`).
fn validation_items(body: &Value) -> Option<Vec<ValidationItem>> {
    let detail = body.get("detail")?.as_array()?;
    let items = detail
        .iter()
        .map(|entry| {
            let field = entry
                .get("loc")
                .and_then(Value::as_array)
                .map(|loc| {
                    loc.iter()
                        // First element names the request part (body, query)
                        .skip(1)
                        .filter_map(|part| match part {
                            Value::String(s) => Some(s.clone()),
                            Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .filter(|field| !field.is_empty())
                .unwrap_or_else(|| "request".to_string());
            let message = entry
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("invalid value")
                .to_string();
            ValidationItem { field, message }
        })
        .collect::<Vec<_>>();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
