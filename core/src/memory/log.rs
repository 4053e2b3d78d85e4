//! Durable memory log
//!
//! Append-only JSONL record of interactions, events and autonomous
//! thoughts, plus the working-memory session files consumed by the
//! consolidation cycle. Appends are serialized behind a mutex; readers
//! scan the file from the tail.

use crate::error::Result;
use crate::memory::working::WorkingMemory;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct MemoryLog {
    log_path: PathBuf,
    session_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl MemoryLog {
    pub fn open(log_path: impl AsRef<Path>, session_dir: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        let session_dir = session_dir.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&session_dir)?;
        Ok(Self {
            log_path,
            session_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn append(&self, entry: Value) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        Ok(())
    }

    pub fn log_event(&self, event_type: &str, metadata: Value) -> Result<()> {
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "type": "event",
            "event_type": event_type,
            "metadata": metadata,
        }))
    }

    pub fn log_interaction(&self, query: &str, final_answer: &str) -> Result<()> {
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "type": "interaction",
            "query": query,
            "final_answer": final_answer,
        }))
    }

    pub fn log_autonomous_thought(&self, topic: &str, synthesized_knowledge: &str) -> Result<()> {
        info!(topic, "autonomous thought recorded");
        self.append(json!({
            "timestamp": Utc::now().to_rfc3339(),
            "type": "autonomous_thought",
            "topic": topic,
            "synthesized_knowledge": synthesized_knowledge,
        }))
    }

    fn read_lines_reversed(&self) -> Vec<Value> {
        let raw = match fs::read_to_string(&self.log_path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        raw.lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Most recent autonomous-thought entries for a topic, newest first.
    pub fn get_recent_insights(&self, topic: &str, limit: usize) -> Vec<Value> {
        self.read_lines_reversed()
            .into_iter()
            .filter(|entry| {
                entry.get("type").and_then(Value::as_str) == Some("autonomous_thought")
                    && entry.get("topic").and_then(Value::as_str) == Some(topic)
            })
            .take(limit)
            .collect()
    }

    /// Most recent entries of any type, newest first.
    pub fn get_recent_events(&self, limit: usize) -> Vec<Value> {
        self.read_lines_reversed().into_iter().take(limit).collect()
    }

    /// Flush a working-memory session to its own JSON file for offline
    /// consolidation. Empty sessions are skipped.
    pub fn save_working_memory_for_consolidation(&self, memory: &WorkingMemory) -> Result<()> {
        if memory.is_empty() {
            warn!(
                session_id = %memory.session_id,
                "working memory has nothing worth consolidating"
            );
            return Ok(());
        }
        let path = self.session_dir.join(format!("{}.json", memory.session_id));
        fs::write(&path, serde_json::to_string_pretty(memory)?)?;
        info!(path = %path.display(), "working memory saved for consolidation");
        Ok(())
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Plain-text sidecar listing session files already consolidated.
    pub fn processed_sessions_log(&self) -> PathBuf {
        self.session_dir.join("processed_sessions.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_log() -> (tempfile::TempDir, MemoryLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = MemoryLog::open(dir.path().join("memory.jsonl"), dir.path().join("sessions"))
            .unwrap();
        (dir, log)
    }

    #[test]
    fn test_interactions_are_appended_and_read_back() {
        let (_dir, log) = test_log();
        log.log_interaction("what is fusion?", "a nuclear process").unwrap();
        log.log_interaction("and fission?", "a different one").unwrap();

        let events = log.get_recent_events(10);
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0]["query"], "and fission?");
    }

    #[test]
    fn test_recent_insights_filter_by_topic() {
        let (_dir, log) = test_log();
        log.log_autonomous_thought("fusion", "plasma is hot").unwrap();
        log.log_autonomous_thought("economics", "markets fluctuate").unwrap();
        log.log_autonomous_thought("fusion", "confinement is hard").unwrap();

        let insights = log.get_recent_insights("fusion", 5);
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0]["synthesized_knowledge"], "confinement is hard");
    }

    #[test]
    fn test_insight_limit_is_respected() {
        let (_dir, log) = test_log();
        for i in 0..5 {
            log.log_autonomous_thought("topic", &format!("fact {}", i)).unwrap();
        }
        assert_eq!(log.get_recent_insights("topic", 3).len(), 3);
    }

    #[test]
    fn test_working_memory_session_file() {
        let (_dir, log) = test_log();
        let mut memory = WorkingMemory::new();
        memory.add_prediction_error(json!({"novel": true}));
        log.save_working_memory_for_consolidation(&memory).unwrap();

        let path = log.session_dir().join(format!("{}.json", memory.session_id));
        assert!(path.exists());

        // Empty sessions produce no file
        let empty = WorkingMemory::new();
        log.save_working_memory_for_consolidation(&empty).unwrap();
        assert!(!log
            .session_dir()
            .join(format!("{}.json", empty.session_id))
            .exists());
    }
}
