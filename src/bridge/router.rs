use std::path::PathBuf;

use log::{info, warn};

use crate::agent::{parse_remember_command, AgentService};
use crate::config::Settings;
use crate::session::ConversationId;

use super::chatlog::{ChatLog, ChatRecord};
use super::commands::TextCommand;
use super::screenshot::{is_screenshot_request, Screenshotter};

const TRUNCATION_MARKER: &str = "\n...[truncated]";
const EMPTY_REPLY: &str = "(no output)";
const EMPTY_MESSAGE_HINT: &str = "Send plain text. It will be passed to the agent.";
const DEFAULT_IMAGE_REQUEST: &str = "Describe the image and extract the key information.";

const HELP_TEXT: &str = "Commands:\n\
/ping - health check\n\
/cwd - show the agent workdir\n\
/newsession - reset the agent session for this chat\n\
/session - show the bound agent session id\n\
/memory - show persistent memory\n\
/remember <text> - append a memory item\n\
/forget - reset persistent memory\n\
/screenshot - take a local screenshot\n\
You can also send: 记住<text>\n\
Any other text is sent to the current agent provider.";

/// Turns one incoming chat message into one reply string.
pub struct MessageRouter {
    agent: AgentService,
    chat_log: ChatLog,
    screenshotter: Screenshotter,
    workdir: PathBuf,
    max_reply_chars: usize,
}

impl MessageRouter {
    pub fn new(agent: AgentService, settings: &Settings) -> Self {
        Self {
            agent,
            chat_log: ChatLog::new(settings.chat_log_file.clone()),
            screenshotter: Screenshotter::from_settings(settings),
            workdir: settings.workdir.clone(),
            max_reply_chars: settings.max_reply_chars,
        }
    }

    /// Handles a message and returns the (already truncated) reply. Every
    /// handled message is appended to the chat log.
    pub async fn handle_message(
        &self,
        conversation: &ConversationId,
        text: &str,
        images: &[PathBuf],
    ) -> String {
        let text = text.trim();
        let (tag, user_text, reply) = self.dispatch(conversation, text, images).await;
        let reply = truncate_reply(&reply, self.max_reply_chars);

        let session = self.agent.session_for(conversation);
        self.chat_log.append(&ChatRecord::new(
            tag,
            session.as_deref(),
            conversation.as_str(),
            &user_text,
            &reply,
        ));

        reply
    }

    async fn dispatch(
        &self,
        conversation: &ConversationId,
        text: &str,
        images: &[PathBuf],
    ) -> (&'static str, String, String) {
        if !images.is_empty() {
            return self.handle_images(conversation, text, images).await;
        }

        if text.is_empty() {
            return ("empty_message", String::new(), EMPTY_MESSAGE_HINT.to_string());
        }

        if let Some(command) = TextCommand::classify(text) {
            let (tag, reply) = self.handle_command(conversation, command).await;
            return (tag, text.to_string(), reply);
        }

        if let Some(item) = parse_remember_command(text) {
            let (tag, reply) = match self.agent.memory().append_item(item) {
                Ok(()) => ("memory_append", format!("remembered: {}", item)),
                Err(e) => ("memory_error", format!("failed to update memory: {}", e)),
            };
            return (tag, text.to_string(), reply);
        }

        if is_screenshot_request(text) {
            let (tag, reply) = self.take_screenshot().await;
            return (tag, text.to_string(), reply);
        }

        let (tag, reply) = self.run_agent(conversation, text, &[]).await;
        (tag, text.to_string(), reply)
    }

    async fn handle_command(
        &self,
        conversation: &ConversationId,
        command: TextCommand,
    ) -> (&'static str, String) {
        let provider = self.agent.provider();
        let reply = match command {
            TextCommand::Help => HELP_TEXT.to_string(),
            TextCommand::Ping => "pong".to_string(),
            TextCommand::Cwd => format!("workdir: {}", self.workdir.display()),
            TextCommand::Session => match self.agent.session_for(conversation) {
                Some(session) => format!("provider={} session: {}", provider, session),
                None => "session: (none)".to_string(),
            },
            TextCommand::NewSession => {
                if let Err(e) = self.agent.reset_session(conversation) {
                    warn!(
                        "session reset not persisted conversation={} err={}",
                        conversation, e
                    );
                }
                format!(
                    "session reset. next message will start a new {} session.",
                    provider
                )
            }
            TextCommand::Memory => match self.agent.memory().read_memory() {
                Ok(memory) => format!("MEMORY.md:\n{}", memory),
                Err(e) => return ("memory_error", format!("failed to read memory: {}", e)),
            },
            TextCommand::Forget => match self.agent.memory().reset() {
                Ok(()) => "memory reset done.".to_string(),
                Err(e) => return ("memory_error", format!("failed to reset memory: {}", e)),
            },
            TextCommand::Screenshot => return self.take_screenshot().await,
        };

        (command.tag(), reply)
    }

    async fn take_screenshot(&self) -> (&'static str, String) {
        match self.screenshotter.capture().await {
            Ok(path) => (
                TextCommand::Screenshot.tag(),
                format!("screenshot saved: {}", path.display()),
            ),
            Err(e) => ("screenshot_error", format!("screenshot failed: {}", e)),
        }
    }

    async fn handle_images(
        &self,
        conversation: &ConversationId,
        hint: &str,
        images: &[PathBuf],
    ) -> (&'static str, String, String) {
        let request = if hint.is_empty() {
            DEFAULT_IMAGE_REQUEST
        } else {
            hint
        };
        let prompt = format!(
            "The user sent an image. Complete the request based on its content.\nUser note: {}",
            request
        );
        let user_text = if hint.is_empty() {
            "[image]".to_string()
        } else {
            format!("[image] {}", hint)
        };

        let (tag, reply) = self.run_agent(conversation, &prompt, images).await;
        (tag, user_text, reply)
    }

    async fn run_agent(
        &self,
        conversation: &ConversationId,
        prompt: &str,
        images: &[PathBuf],
    ) -> (&'static str, String) {
        match self.agent.invoke(conversation, prompt, images).await {
            Ok(reply) => {
                info!(
                    "agent replied conversation={} chars={}",
                    conversation,
                    reply.reply.len()
                );
                let text = if reply.reply.trim().is_empty() {
                    EMPTY_REPLY.to_string()
                } else {
                    reply.reply
                };
                ("agent_output", text)
            }
            Err(e) => ("agent_error", format!("agent error:\n{}", e)),
        }
    }
}

/// Trims and caps `text` at `max_chars` characters, marking the cut.
pub fn truncate_reply(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
    }
}
