use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::Settings;
use crate::session::{ConversationId, SessionStore, SessionStoreError};

use super::error::AgentError;
use super::image::describe_images_into_prompt;
use super::memory::MemoryContext;
use super::runner::{RunRequest, Runner};

/// Result of one successful agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub reply: String,
    pub session_id: Option<String>,
}

/// Runs agent turns for conversations: context injection, image fallback,
/// process invocation and session persistence.
///
/// Turns for the same conversation must be serialized by the caller.
pub struct AgentService {
    runner: Runner,
    sessions: Arc<SessionStore>,
    memory: MemoryContext,
    workdir: PathBuf,
}

impl AgentService {
    pub fn new(settings: &Settings, sessions: Arc<SessionStore>) -> Self {
        Self {
            runner: Runner::select(settings),
            sessions,
            memory: MemoryContext::new(settings.memory_file.clone(), settings.workdir.clone()),
            workdir: settings.workdir.clone(),
        }
    }

    pub fn provider(&self) -> &str {
        self.runner.name()
    }

    pub fn memory(&self) -> &MemoryContext {
        &self.memory
    }

    pub fn session_for(&self, conversation: &ConversationId) -> Option<String> {
        self.sessions
            .get(self.runner.name(), conversation)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn reset_session(&self, conversation: &ConversationId) -> Result<(), SessionStoreError> {
        info!(
            "session reset provider={} conversation={}",
            self.runner.name(),
            conversation
        );
        self.sessions.clear(self.runner.name(), conversation)
    }

    pub async fn invoke(
        &self,
        conversation: &ConversationId,
        prompt: &str,
        images: &[PathBuf],
    ) -> Result<AgentReply, AgentError> {
        let provider = self.runner.name();
        let existing = self.session_for(conversation);
        let inject_context = existing.is_none();

        let mut prompt = self.memory.build_prompt(prompt, inject_context);
        let mut images = images;
        if !images.is_empty() && !self.runner.supports_images() {
            debug!(
                "folding images into prompt provider={} count={}",
                provider,
                images.len()
            );
            prompt = describe_images_into_prompt(&prompt, images, &self.workdir).await;
            images = &[];
        }

        info!(
            "agent request provider={} conversation={} images={} session={:?} inject_context={}",
            provider,
            conversation,
            images.len(),
            existing,
            inject_context
        );
        debug!(
            "agent prompt provider={} conversation={} begin\n{}\nend",
            provider, conversation, prompt
        );

        let outcome = self
            .runner
            .run(RunRequest {
                conversation,
                prompt: &prompt,
                images,
                session: existing.as_deref(),
            })
            .await
            .map_err(|e| {
                warn!(
                    "agent error provider={} conversation={} err={}",
                    provider, conversation, e
                );
                e
            })?;

        let session_id = outcome
            .session_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(token) = &session_id {
            if let Err(e) = self.sessions.set(provider, conversation, token) {
                warn!(
                    "failed to persist session provider={} conversation={} err={}",
                    provider, conversation, e
                );
            }
        }

        info!(
            "agent response provider={} conversation={} session={:?} chars={}",
            provider,
            conversation,
            session_id,
            outcome.reply.len()
        );

        Ok(AgentReply {
            reply: outcome.reply.trim().to_string(),
            session_id,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::runner::test_support::{settings, write_script};
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const ECHO_PROMPT_ARGS: &str = r#"-c 'printf "%s" "$1"' sh {{prompt}}"#;

    fn echo_service(dir: &TempDir) -> (AgentService, Arc<SessionStore>) {
        let mut s = settings(dir.path(), "echo", Path::new("sh"));
        s.agent_args = ECHO_PROMPT_ARGS.to_string();
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        (AgentService::new(&s, Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn test_context_injected_on_first_turn_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("MEMORY.md"), "likes green tea").unwrap();
        let (service, store) = echo_service(&dir);
        let conversation = ConversationId::from(42);

        let first = service.invoke(&conversation, "hello", &[]).await.unwrap();
        assert!(first.reply.contains("Persistent memory:\nlikes green tea"));
        assert!(first.reply.ends_with("User request:\nhello"));

        let token = first.session_id.unwrap();
        assert_eq!(store.get("echo", &conversation), Some(token.clone()));

        let second = service.invoke(&conversation, "hello again", &[]).await.unwrap();
        assert_eq!(second.reply, "hello again");
        assert_eq!(second.session_id, Some(token));
    }

    #[tokio::test]
    async fn test_no_preamble_without_context_files() {
        let dir = tempdir().unwrap();
        let (service, _store) = echo_service(&dir);

        let reply = service
            .invoke(&ConversationId::from(1), "plain", &[])
            .await
            .unwrap();
        assert_eq!(reply.reply, "plain");
    }

    #[tokio::test]
    async fn test_session_survives_turn_without_session_echo() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "codex", "echo codex; echo just an answer");
        let s = settings(dir.path(), "codex", &script);
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        let service = AgentService::new(&s, Arc::clone(&store));
        let conversation = ConversationId::from(5);
        store.set("codex", &conversation, "prior-token").unwrap();

        let reply = service.invoke(&conversation, "next", &[]).await.unwrap();

        assert_eq!(reply.reply, "just an answer");
        assert_eq!(reply.session_id.as_deref(), Some("prior-token"));
        assert_eq!(
            store.get("codex", &conversation).as_deref(),
            Some("prior-token")
        );
    }

    #[tokio::test]
    async fn test_timeout_leaves_binding_unchanged() {
        let dir = tempdir().unwrap();
        let mut s = settings(dir.path(), "slow", Path::new("sh"));
        s.agent_args = "-c 'sleep 5'".to_string();
        s.timeout_secs = 1;
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        let service = AgentService::new(&s, Arc::clone(&store));
        let bound = ConversationId::from(1);
        let fresh = ConversationId::from(2);
        store.set("slow", &bound, "keep-me").unwrap();

        let err = service.invoke(&bound, "hi", &[]).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(store.get("slow", &bound).as_deref(), Some("keep-me"));

        let err = service.invoke(&fresh, "hi", &[]).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(store.get("slow", &fresh), None);
    }

    #[tokio::test]
    async fn test_process_failure_is_reported_without_binding() {
        let dir = tempdir().unwrap();
        let mut s = settings(dir.path(), "broken", Path::new("sh"));
        s.agent_args = "-c 'echo nope; exit 2'".to_string();
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        let service = AgentService::new(&s, Arc::clone(&store));
        let conversation = ConversationId::from(3);

        let err = service.invoke(&conversation, "hi", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::ProcessFailed { .. }));
        assert!(err.to_string().contains("nope"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_images_folded_into_prompt_for_text_only_agent() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("shot.png");
        fs::write(&image, b"png bytes").unwrap();
        let (service, _store) = echo_service(&dir);

        let reply = service
            .invoke(&ConversationId::from(9), "describe", &[image])
            .await
            .unwrap();

        assert!(reply
            .reply
            .starts_with("Images were converted to text descriptions"));
        assert!(reply.reply.contains("- file: shot.png, type: image/png"));
        assert!(reply.reply.ends_with("User request:\ndescribe"));
    }

    #[tokio::test]
    async fn test_images_passed_through_when_supported() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("shot.png");
        fs::write(&image, b"png bytes").unwrap();
        let mut s = settings(dir.path(), "vision", Path::new("sh"));
        s.agent_args = r#"-c 'echo "$@"' sh"#.to_string();
        s.agent_supports_images = true;
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        let service = AgentService::new(&s, store);

        let reply = service
            .invoke(&ConversationId::from(9), "look", &[image.clone()])
            .await
            .unwrap();

        assert_eq!(reply.reply, format!("--image {} look", image.display()));
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_fail_turn() {
        let dir = tempdir().unwrap();
        let mut s = settings(dir.path(), "echo", Path::new("sh"));
        s.agent_args = ECHO_PROMPT_ARGS.to_string();
        let store_dir = dir.path().join("state");
        fs::create_dir_all(&store_dir).unwrap();
        s.session_store_file = store_dir.join("sessions.json");
        let store = Arc::new(SessionStore::load(&s.session_store_file).unwrap());
        let service = AgentService::new(&s, Arc::clone(&store));
        fs::remove_dir_all(&store_dir).unwrap();

        let conversation = ConversationId::from(4);
        let reply = service.invoke(&conversation, "hi", &[]).await.unwrap();

        assert_eq!(reply.reply, "hi");
        assert_eq!(store.get("echo", &conversation), reply.session_id);
    }

    #[tokio::test]
    async fn test_reset_session_starts_fresh_context() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("MEMORY.md"), "note").unwrap();
        let (service, _store) = echo_service(&dir);
        let conversation = ConversationId::from(8);

        service.invoke(&conversation, "one", &[]).await.unwrap();
        assert!(service.session_for(&conversation).is_some());

        service.reset_session(&conversation).unwrap();
        assert_eq!(service.session_for(&conversation), None);

        let again = service.invoke(&conversation, "two", &[]).await.unwrap();
        assert!(again.reply.contains("Persistent memory:\nnote"));
    }
}
