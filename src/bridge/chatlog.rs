use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// One handled message, as stored in the JSONL chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub timestamp: String,
    pub tag: String,
    pub session_id: String,
    pub conversation_id: String,
    pub user_text: String,
    pub bot_text: String,
}

impl ChatRecord {
    pub fn new(
        tag: &str,
        session_id: Option<&str>,
        conversation_id: &str,
        user_text: &str,
        bot_text: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tag: tag.to_string(),
            session_id: session_id.unwrap_or_default().to_string(),
            conversation_id: conversation_id.to_string(),
            user_text: user_text.trim().to_string(),
            bot_text: bot_text.trim().to_string(),
        }
    }
}

/// Append-only chat history. Write failures are logged, never returned.
#[derive(Debug, Clone)]
pub struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ChatRecord) {
        let mut line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("chat log serialize failed: {}", e);
                return;
            }
        };
        line.push('\n');

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!("chat log write failed path={} err={}", self.path.display(), e);
        }
    }
}
