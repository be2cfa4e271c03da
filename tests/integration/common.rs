//! Stub collaborators shared by the integration tests
//!
//! Stub document bodies are one line of whitespace-separated words:
//! - `list REF...` - a discovery page listing item references
//! - `composite REF...` - an item page whose children are further pages
//! - `record [ID]` - an item page producing one record
//! - `empty` - an item page with no data
//! - `broken` - an item page missing a required field
//! - `panic` - an item page the adapter chokes on

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_harvest::adapter::{Extracted, ExtractionError};
use sumi_harvest::output::{SinkError, SinkResult};
use sumi_harvest::{
    Coordinator, Document, EngineConfig, FetchError, Record, RunSummary, Sink, SiteAdapter, Task,
    Transport,
};

pub const BASE: &str = "https://catalog.test";

pub fn page(path: &str) -> String {
    format!("{}/{}", BASE, path)
}

/// Engine with quick retries, suited to stubbed runs
pub fn test_engine(fetchers: usize, extractors: usize, capacity: usize) -> EngineConfig {
    EngineConfig::new(fetchers, extractors, capacity)
        .with_retries(2)
        .with_timeout(Duration::from_secs(2))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
        .with_overflow_wait(Duration::from_millis(10))
        .with_grace_period(Duration::from_secs(1))
}

struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves bodies from a map and counts every call
#[derive(Default)]
pub struct StubTransport {
    pages: HashMap<String, String>,
    failures: HashMap<String, FetchError>,
    flaky: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, reference: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(reference.into(), body.into());
        self
    }

    /// Every fetch of `reference` fails with `error`
    pub fn with_failure(mut self, reference: impl Into<String>, error: FetchError) -> Self {
        self.failures.insert(reference.into(), error);
        self
    }

    /// The first `failures` fetches of `reference` answer 503
    pub fn with_flaky(mut self, reference: impl Into<String>, failures: usize) -> Self {
        self.flaky
            .get_mut()
            .unwrap()
            .insert(reference.into(), failures);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, reference: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(reference)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of fetches observed in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, reference: &str) -> Result<Document, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(reference.to_string())
            .or_insert(0) += 1;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard {
            active: &self.active,
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = self.failures.get(reference) {
            return Err(error.clone());
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(reference) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Status { status: 503 });
                }
            }
        }

        match self.pages.get(reference) {
            Some(body) => Ok(Document::html(reference, body.clone())),
            None => Err(FetchError::Status { status: 404 }),
        }
    }
}

/// Interprets the one-line stub bodies described in the module docs
pub struct StubAdapter;

impl SiteAdapter for StubAdapter {
    fn discover(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
        let mut words = document.body.split_whitespace();
        match words.next() {
            Some("list") => Ok(words.map(str::to_string).collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn extract_record(&self, task: &Task, document: &Document) -> Result<Extracted, ExtractionError> {
        let mut words = document.body.split_whitespace();
        match words.next() {
            Some("record") => {
                let identity = words.next().unwrap_or(task.identity());
                Ok(Extracted::Record(
                    Record::new(identity, task.reference()).with_field("kind", task.kind().as_str()),
                ))
            }
            Some("composite") => Ok(Extracted::References(words.map(str::to_string).collect())),
            Some("broken") => Err(ExtractionError::MissingField("name".to_string())),
            Some("panic") => panic!("unexpected markup on {}", task.reference()),
            _ => Ok(Extracted::Empty),
        }
    }
}

/// Keeps every record and the final summary
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Record>>,
    summary: Mutex<Option<RunSummary>>,
    reject: Option<String>,
    gate: Option<tokio::sync::Semaphore>,
}

impl RecordingSink {
    /// A sink refusing the record with this identity
    pub fn rejecting(identity: &str) -> Self {
        Self {
            reject: Some(identity.to_string()),
            ..Default::default()
        }
    }

    /// A sink whose `emit` waits until [`RecordingSink::release`] is called
    pub fn stalled() -> Self {
        Self {
            gate: Some(tokio::sync::Semaphore::new(0)),
            ..Default::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    /// Sorted identities of the received records
    pub fn identities(&self) -> Vec<String> {
        let mut identities: Vec<String> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.identity.clone())
            .collect();
        identities.sort();
        identities
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn finished(&self) -> Option<RunSummary> {
        self.summary.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn emit(&self, record: Record) -> SinkResult<()> {
        if let Some(gate) = &self.gate {
            // Only ever closed, never given permits
            let _ = gate.acquire().await;
        }
        if self.reject.as_deref() == Some(record.identity.as_str()) {
            return Err(SinkError::Rejected(record.identity));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        *self.summary.lock().unwrap() = Some(summary.clone());
        Ok(())
    }
}

pub fn coordinator(
    engine: EngineConfig,
    transport: Arc<StubTransport>,
    sink: Arc<RecordingSink>,
) -> Coordinator {
    Coordinator::new(engine, transport, Arc::new(StubAdapter), sink)
}
