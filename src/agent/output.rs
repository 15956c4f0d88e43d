//! Extracts the assistant reply and session id from raw agent process output.
//!
//! Agent CLIs print banners, metadata and transcripts around the actual answer.
//! Reply extraction runs an ordered list of [`ReplyStrategy`] values and keeps
//! the first non-empty result. Session id extraction is independent of it.

use std::fs;
use std::path::PathBuf;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static SESSION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"session id:\s*([0-9a-fA-F-]{36})").unwrap());

const REPLY_START_MARKER: &str = "codex";
const REPLY_END_MARKER: &str = "tokens used";

const VERSION_BANNER_PREFIX: &str = "OpenAI Codex v";
const METADATA_PREFIXES: &[&str] = &[
    "workdir:",
    "model:",
    "provider:",
    "approval:",
    "sandbox:",
    "reasoning effort:",
    "reasoning summaries:",
    "session id:",
];
const NOISE_FRAGMENTS: &[&str] = &["codex_core::", "mcp startup:"];
const ROLE_LABELS: &[&str] = &["user", "codex"];
const SEPARATOR_PREFIX: &str = "--------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStrategy {
    /// Reads the file the agent was asked to write its last message to.
    SentinelFile(PathBuf),
    /// Takes the text after the last `codex` marker line.
    Transcript,
    /// Strips known noise lines and returns whatever remains.
    Cleanup,
}

impl ReplyStrategy {
    fn extract(&self, raw: &str) -> Option<String> {
        match self {
            ReplyStrategy::SentinelFile(path) => match fs::read_to_string(path) {
                Ok(content) => non_empty(content.trim()),
                Err(e) => {
                    debug!("sentinel file unreadable path={} err={}", path.display(), e);
                    None
                }
            },
            ReplyStrategy::Transcript => extract_transcript_reply(raw),
            ReplyStrategy::Cleanup => non_empty(&clean_output(raw)),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReplyStrategy::SentinelFile(_) => "sentinel",
            ReplyStrategy::Transcript => "transcript",
            ReplyStrategy::Cleanup => "cleanup",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpretation {
    pub reply: String,
    pub session_id: Option<String>,
}

/// Interprets raw output. `previous_session` is kept when the output does not
/// announce a session id, so continuity never regresses to empty.
pub fn interpret(
    raw: &str,
    strategies: &[ReplyStrategy],
    previous_session: Option<&str>,
) -> Interpretation {
    let reply = strategies
        .iter()
        .find_map(|strategy| {
            strategy.extract(raw).map(|reply| {
                debug!(
                    "reply extracted strategy={} chars={}",
                    strategy.label(),
                    reply.len()
                );
                reply
            })
        })
        .unwrap_or_default();

    let session_id = parse_session_id(raw).or_else(|| {
        previous_session
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });

    Interpretation { reply, session_id }
}

pub fn parse_session_id(raw: &str) -> Option<String> {
    SESSION_ID_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Returns the text of the most recent assistant turn in a transcript.
pub fn extract_transcript_reply(raw: &str) -> Option<String> {
    let normalized = raw.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let start = lines
        .iter()
        .rposition(|line| line.trim().eq_ignore_ascii_case(REPLY_START_MARKER))?
        + 1;
    if start >= lines.len() {
        return None;
    }

    let end = lines[start..]
        .iter()
        .position(|line| line.trim().eq_ignore_ascii_case(REPLY_END_MARKER))
        .map(|offset| start + offset)
        .unwrap_or(lines.len());

    non_empty(lines[start..end].join("\n").trim())
}

pub fn clean_output(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !is_noise_line(line.trim()))
        .collect();

    kept.join("\n").trim().to_string()
}

fn is_noise_line(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with(VERSION_BANNER_PREFIX) {
        return true;
    }
    if METADATA_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if NOISE_FRAGMENTS.iter().any(|f| trimmed.contains(f)) || trimmed.starts_with(REPLY_END_MARKER)
    {
        return true;
    }
    ROLE_LABELS
        .iter()
        .any(|label| trimmed.eq_ignore_ascii_case(label))
        || trimmed.starts_with(SEPARATOR_PREFIX)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
