//! Agent process runners.
//!
//! The set of ways to drive an agent CLI is small and fixed, so runners are a
//! closed enum rather than trait objects. Each variant owns the settings it
//! needs, copied out of [`Settings`] once at startup.

mod codex;
mod generic;

use std::path::PathBuf;

use crate::config::Settings;
use crate::session::{ConversationId, DEFAULT_PROVIDER};

use super::error::AgentError;

pub use codex::CodexRunner;
pub use generic::{build_args, GenericRunner};

const GENERIC_RUNNER_NAME: &str = "generic";

/// One turn handed to a runner.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub conversation: &'a ConversationId,
    pub prompt: &'a str,
    pub images: &'a [PathBuf],
    /// Token currently bound to the conversation, if any.
    pub session: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub reply: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Runner {
    Codex(CodexRunner),
    Generic(GenericRunner),
}

impl Runner {
    /// Picks the runner for the configured provider. Unknown providers run
    /// through the generic runner under their own name.
    pub fn select(settings: &Settings) -> Self {
        match settings.provider.as_str() {
            "" | DEFAULT_PROVIDER => Runner::Codex(CodexRunner::from_settings(settings)),
            other => {
                let name = if other.trim().is_empty() {
                    GENERIC_RUNNER_NAME
                } else {
                    other
                };
                Runner::Generic(GenericRunner::from_settings(name, settings))
            }
        }
    }

    /// Provider name used as the session-store namespace.
    pub fn name(&self) -> &str {
        match self {
            Runner::Codex(_) => DEFAULT_PROVIDER,
            Runner::Generic(runner) => runner.name(),
        }
    }

    pub fn supports_images(&self) -> bool {
        match self {
            Runner::Codex(_) => true,
            Runner::Generic(runner) => runner.supports_images(),
        }
    }

    pub async fn run(&self, request: RunRequest<'_>) -> Result<RunOutcome, AgentError> {
        match self {
            Runner::Codex(runner) => runner.run(request).await,
            Runner::Generic(runner) => runner.run(request).await,
        }
    }
}
