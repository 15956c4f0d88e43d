use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bridge configuration stored in `<config_dir>/bridge.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub codex: CodexConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub bridge: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Binary driven by the generic runner. Falls back to `codex.bin`.
    #[serde(default)]
    pub bin: Option<String>,
    /// Argument template for the generic runner.
    #[serde(default)]
    pub args: String,
    /// Unset means "only the built-in codex runner accepts images".
    #[serde(default)]
    pub supports_images: Option<bool>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            bin: None,
            args: String::new(),
            supports_images: None,
            model: String::new(),
            workdir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexConfig {
    #[serde(default = "default_codex_bin")]
    pub bin: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_sandbox")]
    pub sandbox: String,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            bin: default_codex_bin(),
            model: String::new(),
            sandbox: default_sandbox(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_store_file")]
    pub session_store_file: PathBuf,
    #[serde(default = "default_memory_file")]
    pub memory_file: PathBuf,
    #[serde(default = "default_chat_log_file")]
    pub chat_log_file: PathBuf,
    /// Screenshots land here. Relative paths resolve against the workdir.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_store_file: default_session_store_file(),
            memory_file: default_memory_file(),
            chat_log_file: default_chat_log_file(),
            image_dir: default_image_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
    #[serde(default)]
    pub parent_pid: Option<u32>,
    /// Invoked as `<bin> -x <output.png>`.
    #[serde(default = "default_screenshot_bin")]
    pub screenshot_bin: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_reply_chars: default_max_reply_chars(),
            parent_pid: None,
            screenshot_bin: default_screenshot_bin(),
        }
    }
}

fn default_provider() -> String {
    "codex".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_codex_bin() -> String {
    "codex".to_string()
}

fn default_sandbox() -> String {
    "workspace-write".to_string()
}

fn default_session_store_file() -> PathBuf {
    PathBuf::from("tmp/codex-sessions.json")
}

fn default_memory_file() -> PathBuf {
    PathBuf::from("MEMORY.md")
}

fn default_chat_log_file() -> PathBuf {
    PathBuf::from("tmp/chat-history.jsonl")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("tmp/images")
}

fn default_screenshot_bin() -> String {
    "screencapture".to_string()
}

fn default_max_reply_chars() -> usize {
    3500
}

/// Fully resolved settings: defaults applied, paths absolute, fixed for the
/// lifetime of the process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: String,
    pub agent_bin: String,
    pub agent_args: String,
    pub agent_supports_images: bool,
    pub workdir: PathBuf,
    pub timeout_secs: u64,
    pub codex_bin: String,
    pub codex_model: String,
    pub codex_sandbox: String,
    pub session_store_file: PathBuf,
    pub memory_file: PathBuf,
    pub chat_log_file: PathBuf,
    pub image_dir: PathBuf,
    pub max_reply_chars: usize,
    pub parent_pid: Option<u32>,
    pub screenshot_bin: String,
}
