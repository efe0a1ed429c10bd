#![allow(dead_code)]

use async_trait::async_trait;
use recording_service::db::{InMemorySessionStore, SessionStore};
use recording_service::models::RecordingMode;
use recording_service::services::{
    MediaService, ObjectStore, OrchestratorSettings, PlaybackResolver, PlaybackSettings,
    RecordingOrchestrator, RecordingStatus, StopOutcome, StoredObject, TokenIssuer,
    UpstreamError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(200);

/// Which vendor call a scripted failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Acquire,
    Token,
    Start,
    Stop,
    Query,
}

/// Vendor double: counts calls, fails or stalls on request
#[derive(Default)]
pub struct ScriptedMedia {
    pub acquire_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    failures: Mutex<Vec<(Step, UpstreamError)>>,
    stop_delay: Mutex<Option<Duration>>,
    stop_files: Mutex<Vec<String>>,
    fixed_sid: Mutex<Option<String>>,
}

impl ScriptedMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, step: Step, err: UpstreamError) {
        self.failures.lock().unwrap().push((step, err));
    }

    pub fn delay_stop(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    pub fn stop_returns(&self, files: &[&str]) {
        *self.stop_files.lock().unwrap() = files.iter().map(|f| f.to_string()).collect();
    }

    /// Every start returns this sid, as a misbehaving vendor would
    pub fn reuse_sid(&self, sid: &str) {
        *self.fixed_sid.lock().unwrap() = Some(sid.to_string());
    }

    fn scripted_failure(&self, step: Step) -> Result<(), UpstreamError> {
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(s, _)| *s == step) {
            Some((_, err)) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaService for ScriptedMedia {
    async fn acquire_resource(&self, _channel: &str, _uid: &str) -> Result<String, UpstreamError> {
        let n = self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure(Step::Acquire)?;
        Ok(format!("rid-{n}"))
    }

    async fn mint_token(
        &self,
        channel: &str,
        uid: u32,
        _ttl_secs: u32,
    ) -> Result<String, UpstreamError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure(Step::Token)?;
        Ok(format!("token-{channel}-{uid}"))
    }

    async fn start_recording(
        &self,
        _resource_id: &str,
        _channel: &str,
        _uid: &str,
        _token: &str,
        _mode: RecordingMode,
    ) -> Result<String, UpstreamError> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure(Step::Start)?;
        let fixed = self.fixed_sid.lock().unwrap().clone();
        Ok(fixed.unwrap_or_else(|| format!("sid-{n}")))
    }

    async fn stop_recording(
        &self,
        _resource_id: &str,
        _sid: &str,
        _channel: &str,
        _uid: &str,
        _mode: RecordingMode,
    ) -> Result<StopOutcome, UpstreamError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.stop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.scripted_failure(Step::Stop)?;
        Ok(StopOutcome {
            file_keys: self.stop_files.lock().unwrap().clone(),
            uploading_status: Some("uploaded".to_string()),
        })
    }

    async fn query_status(
        &self,
        _resource_id: &str,
        sid: &str,
        _mode: RecordingMode,
    ) -> Result<RecordingStatus, UpstreamError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.scripted_failure(Step::Query)?;
        Ok(RecordingStatus {
            status: Some(5),
            file_keys: Vec::new(),
            server_response: serde_json::json!({ "status": 5, "sid": sid }),
        })
    }
}

/// Bucket double keyed by object name
#[derive(Default)]
pub struct FakeBucket {
    objects: Mutex<Vec<StoredObject>>,
    pub list_calls: AtomicUsize,
    pub listed_prefixes: Mutex<Vec<String>>,
}

impl FakeBucket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: &str) {
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            size: 1024,
        });
    }
}

#[async_trait]
impl ObjectStore for FakeBucket {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<StoredObject>, UpstreamError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listed_prefixes.lock().unwrap().push(prefix.to_string());
        let mut found: Vec<StoredObject> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.key.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, UpstreamError> {
        Ok(format!(
            "https://bucket.test/{key}?X-Amz-Expires={}",
            ttl.as_secs()
        ))
    }
}

/// Everything wired against the in-memory store
pub struct Harness {
    pub store: Arc<InMemorySessionStore>,
    pub media: Arc<ScriptedMedia>,
    pub bucket: Arc<FakeBucket>,
    pub orchestrator: RecordingOrchestrator,
    pub resolver: PlaybackResolver,
    pub issuer: TokenIssuer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prefix("recordings")
    }

    pub fn with_prefix(prefix: &str) -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let media = ScriptedMedia::new();
        let bucket = FakeBucket::new();

        let dyn_store: Arc<dyn SessionStore> = store.clone();
        let orchestrator = RecordingOrchestrator::new(
            dyn_store.clone(),
            media.clone(),
            OrchestratorSettings {
                default_recording_uid: "999999".to_string(),
                token_ttl_secs: 3600,
                upstream_timeout: UPSTREAM_TIMEOUT,
            },
        );
        let resolver = PlaybackResolver::new(
            dyn_store,
            bucket.clone(),
            PlaybackSettings {
                key_prefix: prefix.to_string(),
                url_ttl: Duration::from_secs(7200),
                upstream_timeout: UPSTREAM_TIMEOUT,
            },
        );
        let issuer = TokenIssuer::new(media.clone(), "app-123", 3600, UPSTREAM_TIMEOUT);

        Self {
            store,
            media,
            bucket,
            orchestrator,
            resolver,
            issuer,
        }
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
