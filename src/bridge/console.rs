use std::path::PathBuf;

use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::session::ConversationId;

use super::error::BridgeError;
use super::router::MessageRouter;

/// Line-oriented transport: every input line is one message of a single
/// conversation, every reply is written back followed by a blank line.
pub struct ConsoleTransport {
    router: MessageRouter,
    conversation: ConversationId,
}

impl ConsoleTransport {
    pub fn new(router: MessageRouter, conversation: ConversationId) -> Self {
        Self {
            router,
            conversation,
        }
    }

    /// Runs a single turn and returns the reply.
    pub async fn run_once(&self, prompt: &str, images: &[PathBuf]) -> String {
        self.router
            .handle_message(&self.conversation, prompt, images)
            .await
    }

    /// Runs a single turn and writes the reply to stdout.
    pub async fn run_prompt(&self, prompt: &str, images: &[PathBuf]) -> Result<(), BridgeError> {
        let mut stdout = tokio::io::stdout();
        self.write_reply(prompt, images, &mut stdout).await
    }

    pub async fn write_reply<W>(
        &self,
        prompt: &str,
        images: &[PathBuf],
        output: &mut W,
    ) -> Result<(), BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let reply = self.run_once(prompt, images).await;
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        Ok(())
    }

    /// Reads stdin until EOF, replying on stdout.
    pub async fn run_stdin(&self) -> Result<(), BridgeError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.run_lines(stdin, &mut stdout).await
    }

    pub async fn run_lines<R, W>(&self, input: R, output: &mut W) -> Result<(), BridgeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("console transport reading conversation={}", self.conversation);
        let mut lines = input.lines();
        let mut handled = 0usize;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = self.run_once(&line, &[]).await;
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n\n").await?;
            output.flush().await?;
            handled += 1;
        }

        debug!("console input closed handled={}", handled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentService;
    use crate::config::Settings;
    use crate::session::SessionStore;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_lines_replies_per_non_empty_line() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            provider: "echo".to_string(),
            agent_bin: "echo".to_string(),
            agent_args: String::new(),
            agent_supports_images: false,
            workdir: dir.path().to_path_buf(),
            timeout_secs: 10,
            codex_bin: "codex".to_string(),
            codex_model: String::new(),
            codex_sandbox: String::new(),
            session_store_file: dir.path().join("sessions.json"),
            memory_file: dir.path().join("MEMORY.md"),
            chat_log_file: dir.path().join("chat.jsonl"),
            image_dir: dir.path().join("images"),
            max_reply_chars: 3500,
            parent_pid: None,
            screenshot_bin: "screencapture".to_string(),
        };
        let store = Arc::new(SessionStore::load(&settings.session_store_file).unwrap());
        let router = MessageRouter::new(AgentService::new(&settings, store), &settings);
        let console = ConsoleTransport::new(router, ConversationId::from("console"));

        let input: &[u8] = b"/ping\n\n/session\n";
        let mut output = Vec::new();
        console.run_lines(input, &mut output).await.unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "pong\n\nsession: (none)\n\n"
        );
    }
    #[tokio::test]
    async fn test_write_reply_single_turn() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            provider: "echo".to_string(),
            agent_bin: "echo".to_string(),
            agent_args: String::new(),
            agent_supports_images: false,
            workdir: dir.path().to_path_buf(),
            timeout_secs: 10,
            codex_bin: "codex".to_string(),
            codex_model: String::new(),
            codex_sandbox: String::new(),
            session_store_file: dir.path().join("sessions.json"),
            memory_file: dir.path().join("MEMORY.md"),
            chat_log_file: dir.path().join("chat.jsonl"),
            image_dir: dir.path().join("images"),
            max_reply_chars: 3500,
            parent_pid: None,
            screenshot_bin: "screencapture".to_string(),
        };
        let store = Arc::new(SessionStore::load(&settings.session_store_file).unwrap());
        let router = MessageRouter::new(AgentService::new(&settings, store), &settings);
        let console = ConsoleTransport::new(router, ConversationId::from("console"));

        let mut output = Vec::new();
        console.write_reply("/ping", &[], &mut output).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "pong\n");
    }
}
