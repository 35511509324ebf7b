use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSONL log of one shell session
pub struct Transcript {
    pub path: PathBuf,
    session_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Transcript {
    pub fn new(path: &Path, session_id: &str) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            file,
        })
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn session_start(&mut self, api_url: Option<&str>) -> Result<()> {
        self.log("session_start", serde_json::json!({ "api_url": api_url }))
    }

    pub fn request(&mut self, method: &str, path: &str) -> Result<()> {
        self.log(
            "request",
            serde_json::json!({ "method": method, "path": path }),
        )
    }

    pub fn response(&mut self, method: &str, path: &str, status: u16) -> Result<()> {
        self.log(
            "response",
            serde_json::json!({ "method": method, "path": path, "status": status }),
        )
    }

    pub fn users_loaded(&mut self, count: usize) -> Result<()> {
        self.log("users_loaded", serde_json::json!({ "count": count }))
    }

    pub fn diagnostic(&mut self, kind: &str, message: &str) -> Result<()> {
        self.log(
            "diagnostic",
            serde_json::json!({ "kind": kind, "message": message }),
        )
    }
}
