//! Trace event records and trace file reading

use super::ProfilerError;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Begin/end marker of a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "B")]
    Begin,
    #[serde(rename = "E")]
    End,
}

/// One record in the trace file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    /// `START` or `END`
    pub cat: String,
    /// Wall-clock timestamp in microseconds
    pub ts: i64,
    pub ph: Phase,
    pub pid: u32,
    pub tid: u64,
}

impl TraceEvent {
    pub fn begin(name: impl Into<String>) -> Self {
        Self::now(name.into(), Phase::Begin)
    }

    pub fn end(name: impl Into<String>) -> Self {
        Self::now(name.into(), Phase::End)
    }

    fn now(name: String, ph: Phase) -> Self {
        let cat = match ph {
            Phase::Begin => "START",
            Phase::End => "END",
        };
        Self {
            name,
            cat: cat.to_string(),
            ts: chrono::Utc::now().timestamp_micros(),
            ph,
            pid: std::process::id(),
            tid: current_thread_id(),
        }
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Small, stable numeric id for the calling thread
fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Read every event from one trace file
///
/// The writer never closes the JSON array, so a trailing `,` is turned into
/// `]` and a missing `]` is added.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<TraceEvent>, ProfilerError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut content = content.trim_end().to_string();
    if content.is_empty() {
        return Ok(Vec::new());
    }
    if content.ends_with(',') {
        content.pop();
        content.push(']');
    } else if !content.ends_with(']') {
        content.push(']');
    }
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_phase_serialization() {
        let event = TraceEvent::begin("step");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""ph":"B""#));
        assert!(json.contains(r#""cat":"START""#));
        assert_eq!(TraceEvent::end("step").ph, Phase::End);
    }

    #[test]
    fn test_thread_ids_differ() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());
        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_read_events_tolerates_open_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "[").unwrap();
        for event in [TraceEvent::begin("a"), TraceEvent::end("a")] {
            writeln!(file, "{},", serde_json::to_string(&event).unwrap()).unwrap();
        }
        drop(file);

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "a");
        assert_eq!(events[1].ph, Phase::End);
    }

    #[test]
    fn test_read_events_empty_and_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "").unwrap();
        assert!(read_events(&empty).unwrap().is_empty());

        let header = dir.path().join("header.json");
        std::fs::write(&header, "[").unwrap();
        assert!(read_events(&header).unwrap().is_empty());
    }
}
