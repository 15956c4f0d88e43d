use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use uuid::Uuid;

use crate::agent::args::tokenize;
use crate::agent::error::AgentError;
use crate::agent::process::run_to_completion;
use crate::config::Settings;

use super::{RunOutcome, RunRequest};

const PROMPT_PLACEHOLDER: &str = "{{prompt}}";
const SESSION_PLACEHOLDER: &str = "{{session_id}}";
const IMAGES_PLACEHOLDER: &str = "{{image_paths}}";

/// Runs an arbitrary agent CLI from a user-supplied argument template.
///
/// There is no resume protocol: when the conversation has no token yet, a
/// fresh one is generated locally and handed to the process through
/// `{{session_id}}`. The process output, trimmed, is the reply.
#[derive(Debug, Clone)]
pub struct GenericRunner {
    name: String,
    bin: String,
    args_template: String,
    supports_images: bool,
    workdir: PathBuf,
    timeout: Duration,
}

impl GenericRunner {
    pub fn from_settings(name: &str, settings: &Settings) -> Self {
        Self {
            name: name.to_string(),
            bin: settings.agent_bin.clone(),
            args_template: settings.agent_args.clone(),
            supports_images: settings.agent_supports_images,
            workdir: settings.workdir.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_images(&self) -> bool {
        self.supports_images
    }

    pub async fn run(&self, request: RunRequest<'_>) -> Result<RunOutcome, AgentError> {
        let session = request
            .session
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let args = build_args(
            &self.args_template,
            request.prompt,
            &session,
            request.images,
            self.supports_images,
        )?;

        info!(
            "generic exec provider={} conversation={} session={} images={}",
            self.name,
            request.conversation,
            session,
            request.images.len()
        );

        let raw = match run_to_completion(&self.bin, &args, &self.workdir, self.timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "generic exec failed provider={} conversation={} err={}",
                    self.name, request.conversation, e
                );
                return Err(e);
            }
        };

        Ok(RunOutcome {
            reply: raw.trim().to_string(),
            session_id: Some(session),
        })
    }
}

/// Expands the argument template for one turn.
///
/// Placeholders may appear inside larger tokens. Without `{{prompt}}` the
/// prompt is appended as the last argument; without `{{image_paths}}` and
/// with image support each image is passed as `--image <path>`.
pub fn build_args(
    template: &str,
    prompt: &str,
    session: &str,
    images: &[PathBuf],
    supports_images: bool,
) -> Result<Vec<String>, AgentError> {
    let joined_images = images
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut prompt_attached = false;
    let mut images_attached = false;
    let mut args = Vec::new();

    for mut arg in tokenize(template)? {
        if arg.contains(PROMPT_PLACEHOLDER) {
            arg = arg.replace(PROMPT_PLACEHOLDER, prompt);
            prompt_attached = true;
        }
        if arg.contains(SESSION_PLACEHOLDER) {
            arg = arg.replace(SESSION_PLACEHOLDER, session);
        }
        if arg.contains(IMAGES_PLACEHOLDER) {
            arg = arg.replace(IMAGES_PLACEHOLDER, &joined_images);
            images_attached = true;
        }
        args.push(arg);
    }

    if supports_images && !images_attached {
        for image in images {
            let path = image.display().to_string();
            if path.trim().is_empty() {
                continue;
            }
            args.push("--image".to_string());
            args.push(path);
        }
    }

    if !prompt_attached {
        args.push(prompt.to_string());
    }

    Ok(args)
}
