//! Forwarding to several sinks at once

use crate::crawler::{Record, RunSummary};
use crate::output::traits::{Sink, SinkResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Forwards every call to each inner sink in order
///
/// All sinks are called even if an earlier one fails; the first error is
/// the one returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn Sink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Sink for FanoutSink {
    async fn emit(&self, record: Record) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.finish(summary).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
