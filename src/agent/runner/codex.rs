use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::agent::error::AgentError;
use crate::agent::output::{interpret, ReplyStrategy};
use crate::agent::process::run_to_completion;
use crate::config::Settings;

use super::{RunOutcome, RunRequest};

/// Drives `codex exec`, resuming the bound session when there is one.
#[derive(Debug, Clone)]
pub struct CodexRunner {
    bin: String,
    model: String,
    sandbox: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl CodexRunner {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bin: settings.codex_bin.clone(),
            model: settings.codex_model.clone(),
            sandbox: settings.codex_sandbox.clone(),
            workdir: settings.workdir.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub async fn run(&self, request: RunRequest<'_>) -> Result<RunOutcome, AgentError> {
        let session = request.session.map(str::trim).filter(|s| !s.is_empty());

        // Held until the end of the call; dropping it removes the file.
        let sentinel = match session {
            None => Some(
                tempfile::Builder::new()
                    .prefix("codex-last-message-")
                    .suffix(".txt")
                    .tempfile()?,
            ),
            Some(_) => None,
        };

        let args = self.build_args(
            request.prompt,
            request.images,
            session,
            sentinel.as_ref().map(|f| f.path()),
        );

        info!(
            "codex exec conversation={} session={:?} images={}",
            request.conversation,
            session,
            request.images.len()
        );

        let raw = match run_to_completion(&self.bin, &args, &self.workdir, self.timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "codex exec failed conversation={} session={:?} err={}",
                    request.conversation, session, e
                );
                return Err(e);
            }
        };
        debug!(
            "codex raw output conversation={} begin\n{}\nend",
            request.conversation, raw
        );

        let mut strategies = Vec::with_capacity(3);
        if let Some(file) = &sentinel {
            strategies.push(ReplyStrategy::SentinelFile(file.path().to_path_buf()));
        }
        strategies.push(ReplyStrategy::Transcript);
        strategies.push(ReplyStrategy::Cleanup);

        let interpretation = interpret(&raw, &strategies, session);
        info!(
            "codex exec ok conversation={} session_before={:?} session_after={:?}",
            request.conversation, session, interpretation.session_id
        );

        Ok(RunOutcome {
            reply: interpretation.reply,
            session_id: interpretation.session_id,
        })
    }

    fn build_args(
        &self,
        prompt: &str,
        images: &[PathBuf],
        session: Option<&str>,
        sentinel: Option<&Path>,
    ) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if !self.sandbox.is_empty() {
            args.push("--sandbox".to_string());
            args.push(self.sandbox.clone());
        }
        if !self.model.is_empty() {
            args.push("--model".to_string());
            args.push(self.model.clone());
        }

        match session {
            None => {
                push_images(&mut args, images);
                args.push("--skip-git-repo-check".to_string());
                if let Some(path) = sentinel {
                    args.push("--output-last-message".to_string());
                    args.push(path.display().to_string());
                }
                args.push(prompt.to_string());
            }
            Some(session) => {
                args.push("resume".to_string());
                args.push("--skip-git-repo-check".to_string());
                push_images(&mut args, images);
                args.push(session.to_string());
                args.push(prompt.to_string());
            }
        }

        args
    }
}

fn push_images(args: &mut Vec<String>, images: &[PathBuf]) {
    for image in images {
        let path = image.display().to_string();
        if path.trim().is_empty() {
            continue;
        }
        args.push("--image".to_string());
        args.push(path);
    }
}
