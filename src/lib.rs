pub mod agent;
pub mod bridge;
pub mod config;
pub mod session;

use std::path::PathBuf;

use log::info;

use bridge::{build_router, spawn_parent_watchdog, BridgeError, ConsoleTransport};
use config::ConfigService;
use session::ConversationId;

pub const DEFAULT_CONVERSATION: &str = "console";

/// Options for one bridge process.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub conversation: Option<String>,
    pub images: Vec<PathBuf>,
    /// Single prompt to run; `None` reads messages from stdin.
    pub prompt: Option<String>,
}

pub async fn run(options: RunOptions) -> Result<(), BridgeError> {
    let settings = ConfigService::new()?.load_settings(options.config_path.as_deref())?;
    info!(
        "bridge starting provider={} workdir={} timeout={}s",
        settings.provider,
        settings.workdir.display(),
        settings.timeout_secs
    );

    let router = build_router(&settings)?;
    let _watchdog = spawn_parent_watchdog(settings.parent_pid);

    let conversation = ConversationId::new(
        options
            .conversation
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION),
    );
    let console = ConsoleTransport::new(router, conversation);

    match options.prompt {
        Some(prompt) => console.run_prompt(&prompt, &options.images).await,
        None => console.run_stdin().await,
    }
}
