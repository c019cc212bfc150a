//! Active model and warm-up bookkeeping

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::info;

use crate::engine::EngineClient;
use crate::error::LocalError;

/// Result of a warm-up call
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WarmupOutcome {
    pub model: String,
    pub already_warm: bool,
}

/// One model's load, shared by every caller warming it at the same time
#[derive(Debug, Default)]
struct WarmEntry {
    loaded_at: OnceCell<Instant>,
}

/// Which model serves new requests, and which models are resident
///
/// Warm-up is single-flight per model: concurrent callers share one engine
/// call. A model counts as warm until the engine's keep-alive has passed
/// since its load, or until another model becomes active. Failed warm-ups
/// leave no entry behind.
#[derive(Debug)]
pub struct ModelState {
    active: RwLock<String>,
    keep_alive: Option<Duration>,
    warmups: Mutex<HashMap<String, Arc<WarmEntry>>>,
}

impl ModelState {
    /// `keep_alive` of `None` means the engine never unloads on its own
    pub fn new(default_model: impl Into<String>, keep_alive: Option<Duration>) -> Self {
        Self {
            active: RwLock::new(default_model.into()),
            keep_alive,
            warmups: Mutex::new(HashMap::new()),
        }
    }

    pub fn active(&self) -> String {
        self.active
            .read()
            .map(|model| model.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Switch the model for subsequent requests, returning the previous one
    ///
    /// Loading a different model may evict the others, so only the new
    /// model keeps its warm mark.
    pub fn set_active(&self, model: impl Into<String>) -> String {
        let model = model.into();
        let previous = {
            let mut active = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *active, model.clone())
        };
        if previous != model {
            info!(from = %previous, to = %model, "switching active model");
            let mut warmups = self.lock_warmups();
            warmups.retain(|name, entry| *name == model || !entry.loaded_at.initialized());
        }
        previous
    }

    /// Models still resident, sorted
    pub fn warm_models(&self) -> Vec<String> {
        let warmups = self.lock_warmups();
        warmups
            .iter()
            .filter(|(_, entry)| self.is_fresh(entry))
            .map(|(model, _)| model.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn is_warm(&self, model: &str) -> bool {
        let warmups = self.lock_warmups();
        warmups.get(model).is_some_and(|entry| self.is_fresh(entry))
    }

    fn lock_warmups(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<WarmEntry>>> {
        self.warmups.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_fresh(&self, entry: &WarmEntry) -> bool {
        match (entry.loaded_at.get(), self.keep_alive) {
            (Some(_), None) => true,
            (Some(loaded_at), Some(ttl)) => loaded_at.elapsed() < ttl,
            (None, _) => false,
        }
    }

    /// Entry to warm through; an expired load is replaced by a fresh one
    fn entry(&self, model: &str) -> Arc<WarmEntry> {
        let mut warmups = self.lock_warmups();
        let expired = warmups
            .get(model)
            .is_some_and(|entry| entry.loaded_at.initialized() && !self.is_fresh(entry));
        if expired {
            warmups.remove(model);
        }
        Arc::clone(warmups.entry(model.to_string()).or_default())
    }

    fn remember(&self, model: &str, entry: &Arc<WarmEntry>) {
        self.lock_warmups().insert(model.to_string(), Arc::clone(entry));
    }

    fn forget(&self, model: &str, entry: &Arc<WarmEntry>) {
        let mut warmups = self.lock_warmups();
        if warmups.get(model).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            warmups.remove(model);
        }
    }

    /// Load `model` unless it is already resident
    ///
    /// Does not take an admission permit, so it can run next to in-flight
    /// generations.
    pub async fn warm(
        &self,
        engine: &EngineClient,
        model: &str,
        deadline: Duration,
    ) -> Result<WarmupOutcome, LocalError> {
        let entry = self.entry(model);
        if self.is_fresh(&entry) {
            return Ok(WarmupOutcome {
                model: model.to_string(),
                already_warm: true,
            });
        }

        let mut ran = false;
        let load = entry.loaded_at.get_or_try_init(|| {
            ran = true;
            async move {
                engine.warm(model).await?;
                Ok::<_, LocalError>(Instant::now())
            }
        });
        let result = match tokio::time::timeout(deadline, load).await {
            Ok(loaded) => loaded.map(|_| ()),
            Err(_) => Err(LocalError::WarmupTimeout {
                model: model.to_string(),
            }),
        };

        if let Err(e) = result {
            self.forget(model, &entry);
            return Err(e);
        }

        self.remember(model, &entry);
        if ran {
            info!(model, "model warmed");
        }
        Ok(WarmupOutcome {
            model: model.to_string(),
            already_warm: !ran,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LONG: Option<Duration> = Some(Duration::from_secs(1800));

    fn engine(server: &MockServer) -> EngineClient {
        EngineClient::new(reqwest::Client::new(), server.uri(), "30m")
    }

    async fn mount_generate(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_warmup_is_idempotent() {
        let server = MockServer::start().await;
        mount_generate(&server, 1).await;

        let state = ModelState::new("llama3", LONG);
        let engine = engine(&server);
        let deadline = Duration::from_secs(5);

        let first = state.warm(&engine, "llama3", deadline).await.unwrap();
        let second = state.warm(&engine, "llama3", deadline).await.unwrap();

        assert!(!first.already_warm);
        assert!(second.already_warm);
        assert!(state.is_warm("llama3"));
    }

    #[tokio::test]
    async fn test_warm_mark_expires_with_keep_alive() {
        let server = MockServer::start().await;
        mount_generate(&server, 2).await;

        let state = ModelState::new("llama3", Some(Duration::from_millis(50)));
        let engine = engine(&server);
        let deadline = Duration::from_secs(5);

        assert!(!state.warm(&engine, "llama3", deadline).await.unwrap().already_warm);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(!state.is_warm("llama3"));
        assert!(state.warm_models().is_empty());
        let again = state.warm(&engine, "llama3", deadline).await.unwrap();
        assert!(!again.already_warm);
        assert!(state.is_warm("llama3"));
    }

    #[tokio::test]
    async fn test_switching_model_clears_other_warm_marks() {
        let server = MockServer::start().await;
        mount_generate(&server, 3).await;

        let state = ModelState::new("llama3", LONG);
        let engine = engine(&server);
        let deadline = Duration::from_secs(5);

        state.warm(&engine, "llama3", deadline).await.unwrap();
        state.warm(&engine, "phi3", deadline).await.unwrap();
        state.set_active("phi3");

        assert_eq!(state.warm_models(), vec!["phi3".to_string()]);
        let reload = state.warm(&engine, "llama3", deadline).await.unwrap();
        assert!(!reload.already_warm);
    }

    #[tokio::test]
    async fn test_concurrent_warmups_share_one_engine_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
            .expect(1)
            .mount(&server)
            .await;

        let state = ModelState::new("llama3", LONG);
        let engine = engine(&server);
        let deadline = Duration::from_secs(5);

        let (a, b) = tokio::join!(
            state.warm(&engine, "phi3", deadline),
            state.warm(&engine, "phi3", deadline)
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| !o.already_warm).count(), 1);
        assert_eq!(state.warm_models(), vec!["phi3".to_string()]);
    }

    #[tokio::test]
    async fn test_warmup_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let state = ModelState::new("llama3", LONG);
        let result = state
            .warm(&engine(&server), "llama3", Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(LocalError::WarmupTimeout { .. })));
        assert!(!state.is_warm("llama3"));
        assert!(state.lock_warmups().is_empty());
    }

    #[tokio::test]
    async fn test_failed_warmup_leaves_no_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({ "model": "nope" })))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .expect(2)
            .mount(&server)
            .await;

        let state = ModelState::new("llama3", LONG);
        let engine = engine(&server);
        let deadline = Duration::from_secs(5);

        assert!(state.warm(&engine, "nope", deadline).await.is_err());
        assert!(state.warm(&engine, "nope", deadline).await.is_err());
        assert!(state.warm_models().is_empty());
        assert!(state.lock_warmups().is_empty());
    }

    #[test]
    fn test_hot_switch_returns_previous() {
        let state = ModelState::new("llama3", LONG);
        assert_eq!(state.set_active("phi3"), "llama3");
        assert_eq!(state.active(), "phi3");
    }
}
