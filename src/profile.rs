// src/profile.rs

//! CSV execution profile.
//!
//! One row per executed task, written as soon as the task ends:
//!
//! ```text
//! exec_id,task_id,task_name,command,start_time,end_time,elap_time,host,status
//! ```
//!
//! `status` is the exit code (`0` on success) or `error` when the executor
//! itself failed.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::Result;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const HEADER: [&str; 9] = [
    "exec_id",
    "task_id",
    "task_name",
    "command",
    "start_time",
    "end_time",
    "elap_time",
    "host",
    "status",
];

#[derive(Debug, Serialize)]
struct ProfileRow<'a> {
    exec_id: u64,
    task_id: u64,
    task_name: &'a str,
    command: &'a str,
    start_time: String,
    end_time: String,
    elap_time: String,
    host: &'a str,
    status: String,
}

/// One finished execution, as handed to [`Profiler::record`].
#[derive(Debug, Clone)]
pub struct ExecRecord<'a> {
    pub task_id: u64,
    pub task_name: &'a str,
    pub command: &'a str,
    pub host: &'a str,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    /// Exit code, or `None` if the executor returned an error.
    pub exit_code: Option<i32>,
}

struct ProfileState {
    writer: csv::Writer<Box<dyn Write + Send>>,
    next_exec_id: u64,
}

/// Thread-safe CSV profile writer shared by all workers.
pub struct Profiler {
    state: Mutex<ProfileState>,
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("rows", &self.state.lock().next_exec_id)
            .finish()
    }
}

impl Profiler {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        debug!(path = ?path, "writing execution profile");
        Self::from_writer(Box::new(file))
    }

    /// Wrap any writer; the header row is written immediately.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self {
            state: Mutex::new(ProfileState {
                writer,
                next_exec_id: 0,
            }),
        })
    }

    /// Append a row. Errors are logged, never propagated: a broken profile
    /// must not fail the build.
    pub fn record(&self, rec: &ExecRecord<'_>) {
        let elapsed = (rec.end - rec.start).num_microseconds().unwrap_or(0) as f64 / 1e6;
        let mut st = self.state.lock();
        let row = ProfileRow {
            exec_id: st.next_exec_id,
            task_id: rec.task_id,
            task_name: rec.task_name,
            command: rec.command,
            start_time: rec.start.format(TIME_FORMAT).to_string(),
            end_time: rec.end.format(TIME_FORMAT).to_string(),
            elap_time: format!("{elapsed:.6}"),
            host: rec.host,
            status: rec
                .exit_code
                .map_or_else(|| "error".to_string(), |c| c.to_string()),
        };
        st.next_exec_id += 1;

        let written = st.writer.serialize(&row).and_then(|_| Ok(st.writer.flush()?));
        if let Err(e) = written {
            warn!(task = %rec.task_name, error = %e, "failed to write profile row");
        }
    }
}
