//! Background trace writer

use super::event::TraceEvent;
use super::ProfilerError;
use crossbeam_channel::{Receiver, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Messages consumed by the writer thread
pub(crate) enum WriterMsg {
    Event(TraceEvent),
    /// Reply once everything queued before this message is on disk
    Flush(Sender<()>),
    Shutdown,
}

pub(crate) struct TraceWriter {
    base: PathBuf,
    split_size: u64,
    out: BufWriter<File>,
    written: u64,
    rotations: u32,
    current: Arc<Mutex<PathBuf>>,
}

impl TraceWriter {
    /// Open (or append to) `base`, writing the array header if it is new
    pub(crate) fn open(base: PathBuf, split_size: u64) -> Result<Self, ProfilerError> {
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let (out, written) = open_log(&base)?;
        Ok(Self {
            current: Arc::new(Mutex::new(base.clone())),
            base,
            split_size,
            out,
            written,
            rotations: 0,
        })
    }

    pub(crate) fn current_log(&self) -> Arc<Mutex<PathBuf>> {
        self.current.clone()
    }

    /// Drain `rx` until shutdown or until every sender is gone
    pub(crate) fn run(mut self, rx: Receiver<WriterMsg>) {
        for msg in rx.iter() {
            match msg {
                WriterMsg::Event(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!("Failed to write trace event '{}': {}", event.name, e);
                    }
                }
                WriterMsg::Flush(done) => {
                    self.flush();
                    let _ = done.send(());
                }
                WriterMsg::Shutdown => break,
            }
            if rx.is_empty() {
                self.flush();
            }
        }
        self.flush();
        debug!("Trace writer stopped after {} rotation(s)", self.rotations);
    }

    fn write_event(&mut self, event: &TraceEvent) -> Result<(), ProfilerError> {
        if self.split_size > 0 && self.written > self.split_size {
            self.rotate()?;
        }
        let line = serde_json::to_string(event)?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b",\n")?;
        self.written += line.len() as u64 + 2;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), ProfilerError> {
        self.out.flush()?;
        self.rotations += 1;
        let next = rotated_path(&self.base, self.rotations);
        let (out, written) = open_log(&next)?;
        self.out = out;
        self.written = written;
        debug!("Trace log rotated to {}", next.display());
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = next;
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            error!("Failed to flush trace log: {}", e);
        }
    }
}

fn open_log(path: &Path) -> Result<(BufWriter<File>, u64), ProfilerError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let existing = file.metadata()?.len();
    let mut out = BufWriter::new(file);
    if existing > 0 {
        // Keep extending the array a previous session left open
        return Ok((out, existing));
    }
    // The array is left open; readers close it
    out.write_all(b"[")?;
    out.flush()?;
    Ok((out, 1))
}

/// `<dir>/<stem>_<n>.json`
pub(crate) fn rotated_path(base: &Path, n: u32) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profiler".to_string());
    base.with_file_name(format!("{}_{}.json", stem, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::read_events;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_extends_existing_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.json");

        for name in ["first", "second"] {
            let mut writer = TraceWriter::open(path.clone(), 0).unwrap();
            writer.write_event(&TraceEvent::begin(name)).unwrap();
            writer.flush();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches('[').count(), 1);
        let names: Vec<_> = read_events(&path).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_rotated_path() {
        let base = PathBuf::from("/tmp/traces/profiler.json");
        assert_eq!(rotated_path(&base, 1), PathBuf::from("/tmp/traces/profiler_1.json"));
        assert_eq!(rotated_path(&base, 12), PathBuf::from("/tmp/traces/profiler_12.json"));
    }
}
