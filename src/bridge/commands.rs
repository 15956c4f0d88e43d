/// Exact-match chat commands. Anything else is either a remember command or a
/// prompt for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Help,
    Ping,
    Cwd,
    Session,
    NewSession,
    Memory,
    Forget,
    Screenshot,
}

impl TextCommand {
    pub fn classify(text: &str) -> Option<Self> {
        match text.trim() {
            "/start" | "/help" => Some(TextCommand::Help),
            "/ping" => Some(TextCommand::Ping),
            "/cwd" => Some(TextCommand::Cwd),
            "/session" => Some(TextCommand::Session),
            "/newsession" | "/reset" => Some(TextCommand::NewSession),
            "/memory" => Some(TextCommand::Memory),
            "/forget" => Some(TextCommand::Forget),
            "/screenshot" | "截图" => Some(TextCommand::Screenshot),
            _ => None,
        }
    }

    /// Chat log tag for a successful reply.
    pub fn tag(self) -> &'static str {
        match self {
            TextCommand::Help => "help",
            TextCommand::Ping => "ping",
            TextCommand::Cwd => "cwd",
            TextCommand::Session => "session",
            TextCommand::NewSession => "new_session",
            TextCommand::Memory => "memory_view",
            TextCommand::Forget => "memory_reset",
            TextCommand::Screenshot => "screenshot_ok",
        }
    }
}
