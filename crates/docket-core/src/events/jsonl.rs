//! File-backed event store: one JSON object per line, one file per plan.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{PlanEvent, PlanEventStore, PlanEventType, matches_filter};
use crate::config::DocketConfig;
use crate::error::{DocketError, Result};

/// Stores each plan's log at `<dir>/plan-<id>.jsonl`.
///
/// Appends open the file in append mode and write one whole line, so
/// concurrent writers on the same host do not interleave partial events.
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    dir: PathBuf,
}

impl JsonlEventStore {
    /// The directory is created lazily on first append.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A store rooted at the configured events directory.
    pub fn from_config(config: &DocketConfig) -> Self {
        Self::new(config.events_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, plan_id: u64) -> PathBuf {
        self.dir.join(format!("plan-{plan_id}.jsonl"))
    }
}

fn io_error(path: &Path, source: io::Error) -> DocketError {
    DocketError::EventLog {
        path: path.to_path_buf(),
        source,
    }
}

impl PlanEventStore for JsonlEventStore {
    fn append_event(&self, plan_id: u64, event: PlanEvent) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let path = self.log_path(plan_id);
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| io_error(&path, e))?;

        debug!(plan = plan_id, event_type = %event.event_type, path = %path.display(), "appended plan event");
        Ok(())
    }

    fn get_events(
        &self,
        plan_id: u64,
        event_types: Option<&[PlanEventType]>,
    ) -> Result<Vec<PlanEvent>> {
        let path = self.log_path(plan_id);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&path, err)),
        };

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_error(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event: PlanEvent =
                serde_json::from_str(&line).map_err(|source| DocketError::CorruptEventLog {
                    path: path.clone(),
                    line: index + 1,
                    source,
                })?;
            if matches_filter(&event, event_types) {
                events.push(event);
            }
        }
        Ok(events)
    }
}
