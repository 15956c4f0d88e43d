mod chatlog;
mod commands;
mod console;
mod error;
mod router;
mod screenshot;
mod watchdog;

use std::sync::Arc;

use log::info;

use crate::agent::AgentService;
use crate::config::Settings;
use crate::session::SessionStore;

pub use chatlog::{ChatLog, ChatRecord};
pub use commands::TextCommand;
pub use console::ConsoleTransport;
pub use error::{BridgeError, ScreenshotError};
pub use router::{truncate_reply, MessageRouter};
pub use screenshot::{is_screenshot_request, Screenshotter};
pub use watchdog::{spawn_parent_watchdog, watch_parent, WATCHDOG_INTERVAL};

/// Builds the message router from resolved settings: loads the session
/// store and makes sure the memory file exists.
pub fn build_router(settings: &Settings) -> Result<MessageRouter, BridgeError> {
    let sessions = Arc::new(SessionStore::load(&settings.session_store_file)?);
    let agent = AgentService::new(settings, sessions);
    agent.memory().ensure_memory_file()?;
    info!(
        "agent ready provider={} workdir={} memory={}",
        agent.provider(),
        settings.workdir.display(),
        agent.memory().memory_path().display()
    );

    Ok(MessageRouter::new(agent, settings))
}
