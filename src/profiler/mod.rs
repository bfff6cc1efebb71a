//! Execution profiler
//!
//! Writes begin/end trace events in the Chrome trace format. Recording an
//! event only enqueues it; a dedicated thread owns the file.

pub mod event;
mod writer;

pub use event::{read_events, Phase, TraceEvent};

use crossbeam_channel::{bounded, unbounded, Sender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};
use writer::{TraceWriter, WriterMsg};

/// Errors raised while setting up or reading traces
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Trace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Trace JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where and how traces are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// First trace file; rotated files are written next to it
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Size in bytes after which a new file is started; 0 disables rotation
    #[serde(default = "default_split_size")]
    pub split_size: u64,
}

fn default_output_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("serving-pipeline")
        .join("profiler.json")
}

fn default_split_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            split_size: default_split_size(),
        }
    }
}

impl ProfilerConfig {
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
            ..Default::default()
        }
    }

    pub fn with_split_size(mut self, split_size: u64) -> Self {
        self.split_size = split_size;
        self
    }
}

/// Asynchronous trace recorder
pub struct Profiler {
    tx: Sender<WriterMsg>,
    open: Mutex<BTreeSet<String>>,
    current: Arc<Mutex<PathBuf>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Profiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profiler")
            .field("current_log", &self.current_log())
            .finish()
    }
}

impl Profiler {
    /// Open the trace file and start the writer thread
    pub fn new(config: &ProfilerConfig) -> Result<Self, ProfilerError> {
        let writer = TraceWriter::open(config.output_file.clone(), config.split_size)?;
        let current = writer.current_log();
        let (tx, rx) = unbounded();
        let handle = std::thread::Builder::new()
            .name("pipeline-profiler".to_string())
            .spawn(move || writer.run(rx))?;

        info!("Profiling to {}", config.output_file.display());
        Ok(Self {
            tx,
            open: Mutex::new(BTreeSet::new()),
            current,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn event_start(&self, name: &str) {
        self.open_events().insert(name.to_string());
        self.enqueue(TraceEvent::begin(name));
    }

    pub fn event_end(&self, name: &str) {
        self.open_events().remove(name);
        self.enqueue(TraceEvent::end(name));
    }

    /// End every event that was started but not yet ended
    pub fn close_all(&self) {
        let open = std::mem::take(&mut *self.open_events());
        for name in open {
            self.enqueue(TraceEvent::end(name));
        }
    }

    /// Block until everything queued so far has been written
    pub fn flush_blocking(&self) {
        let (done_tx, done_rx) = bounded(1);
        if self.tx.send(WriterMsg::Flush(done_tx)).is_ok() {
            // An error here means the writer is gone, so there is nothing left to wait for
            let _ = done_rx.recv();
        }
    }

    /// Close open events, drain the queue and stop the writer
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn shutdown(&self) {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(handle) = handle else {
            return;
        };
        self.close_all();
        let _ = self.tx.send(WriterMsg::Shutdown);
        if handle.join().is_err() {
            warn!("Profiler writer thread panicked");
        }
        debug!("Profiler shut down");
    }

    /// The file currently being written
    pub fn current_log(&self) -> PathBuf {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn enqueue(&self, event: TraceEvent) {
        if self.tx.send(WriterMsg::Event(event)).is_err() {
            debug!("Profiler is shut down; dropping trace event");
        }
    }

    fn open_events(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
