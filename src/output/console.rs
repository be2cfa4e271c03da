//! Records as pretty-printed JSON

use crate::crawler::Record;
use crate::output::traits::{Sink, SinkResult};
use async_trait::async_trait;
use std::io::{Stdout, Write};
use std::sync::Mutex;

/// Writes every record as pretty-printed JSON, one document per record
pub struct ConsoleSink<W: Write + Send = Stdout> {
    writer: Mutex<W>,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> Sink for ConsoleSink<W> {
    async fn emit(&self, record: Record) -> SinkResult<()> {
        let json = serde_json::to_string_pretty(&record)?;
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}
