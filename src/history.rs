//! Record history: a bounded in-memory buffer plus the JSON-lines form
//!
//! JSON lines carry one flat `TickMetricRecord` per line in tick order. The
//! runner also keeps the bounded history as a JSON array that survives
//! restarts.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::core::error::{EmergenceError, Result};
use crate::core::types::Tick;
use crate::simulation::metrics::TickMetricRecord;

/// Keeps only the newest `limit` records
#[derive(Clone, Debug)]
pub struct BoundedHistory {
    records: VecDeque<TickMetricRecord>,
    limit: usize,
    dropped: u64,
}

impl BoundedHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            records: VecDeque::with_capacity(limit.min(4096)),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: TickMetricRecord) {
        if self.records.len() == self.limit {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    /// Rebuild a history from records saved by an earlier run
    pub fn from_records(limit: usize, records: impl IntoIterator<Item = TickMetricRecord>) -> Self {
        let mut history = Self::new(limit);
        for record in records {
            history.push(record);
        }
        history
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Records evicted so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickMetricRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&TickMetricRecord> {
        self.records.back()
    }

    pub fn to_vec(&self) -> Vec<TickMetricRecord> {
        self.records.iter().cloned().collect()
    }
}

/// Streams records as JSON lines, rejecting out-of-order ticks
pub struct JsonlWriter<W: Write> {
    writer: W,
    last_tick: Option<Tick>,
    written: u64,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_tick: None,
            written: 0,
        }
    }

    pub fn write(&mut self, record: &TickMetricRecord) -> Result<()> {
        if let Some(last) = self.last_tick {
            if record.tick <= last {
                return Err(EmergenceError::Ordering {
                    component: "jsonl writer",
                    tick: record.tick,
                    last,
                });
            }
        }
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.last_tick = Some(record.tick);
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub fn write_jsonl<W: Write>(writer: W, records: &[TickMetricRecord]) -> Result<()> {
    let mut out = JsonlWriter::new(writer);
    for record in records {
        out.write(record)?;
    }
    out.flush()
}

/// Parse JSON lines; blank lines are skipped, ticks must strictly increase
pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Vec<TickMetricRecord>> {
    let mut records: Vec<TickMetricRecord> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TickMetricRecord = serde_json::from_str(&line)?;
        if let Some(last) = records.last() {
            if record.tick <= last.tick {
                return Err(EmergenceError::Ordering {
                    component: "jsonl reader",
                    tick: record.tick,
                    last: last.tick,
                });
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Write `contents` to a sibling temp file, then rename it over `path`
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = sibling(path, ".tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn write_history_file(path: &Path, history: &BoundedHistory) -> Result<()> {
    write_atomic(path, &serde_json::to_string_pretty(&history.to_vec())?)
}

/// Load a history array written by an earlier run
///
/// A missing file is an empty history. A file that does not parse is moved
/// aside to `<name>.bad.json` once and an empty history is returned.
pub fn read_history_file(path: &Path) -> Result<Vec<TickMetricRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_str::<Vec<TickMetricRecord>>(&content) {
        Ok(records) => Ok(records),
        Err(e) => {
            let bad = path.with_extension("bad.json");
            fs::rename(path, &bad)?;
            tracing::warn!(
                error = %e,
                moved_to = %bad.display(),
                "history file was corrupt"
            );
            Ok(Vec::new())
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
