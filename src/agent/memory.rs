use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::error::MemoryError;

const AGENTS_MD_FILENAME: &str = "AGENTS.md";
const AGENT_MD_FILENAME: &str = "AGENT.md";
const LEGACY_MEMORY_FILENAME: &str = "memory.md";
const MAX_CHAR_COUNT: usize = 50_000;

const USER_ITEMS_HEADING: &str = "## User Memory Items";

const PREAMBLE_DIRECTIVE: &str = "Use the following context as background constraints/preferences.\n\
                                  Prioritize the user's latest explicit request.";

const DEFAULT_MEMORY_TEMPLATE: &str = "# MEMORY\n\n\
## Profile\n\
- language: match the user's language\n\n\
## Interaction Preferences\n\
- Prefer concise, actionable answers.\n\
- For ops/tasks, return what changed and next step.\n\n\
## User Memory Items\n\
- (use `/remember ...` to append)\n";

/// Background context injected on the first turn of an agent session:
/// static agent instructions plus the user's persistent memory notes.
#[derive(Debug, Clone)]
pub struct MemoryContext {
    memory_path: PathBuf,
    workdir: PathBuf,
}

impl MemoryContext {
    pub fn new(memory_path: PathBuf, workdir: PathBuf) -> Self {
        Self {
            memory_path,
            workdir,
        }
    }

    pub fn memory_path(&self) -> &Path {
        &self.memory_path
    }

    /// Instruction files in lookup order; the first non-empty one wins.
    fn instruction_candidates(&self) -> Vec<PathBuf> {
        let memory_dir = self
            .memory_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workdir.clone());

        vec![
            memory_dir.join(AGENTS_MD_FILENAME),
            self.workdir.join(AGENTS_MD_FILENAME),
            self.workdir.join(AGENT_MD_FILENAME),
        ]
    }

    fn read_instructions(&self) -> Option<String> {
        self.instruction_candidates()
            .iter()
            .find_map(|path| read_trimmed(path))
    }

    fn read_memory_notes(&self) -> Option<String> {
        read_trimmed(&self.memory_path)
    }

    /// Returns the context preamble, or an empty string when neither the
    /// instructions nor the memory file has content. Never fails.
    pub fn compose_preamble(&self) -> String {
        let mut parts = Vec::new();

        if let Some(instructions) = self.read_instructions() {
            parts.push(format!("Agent instructions:\n{}", truncate(instructions)));
        }
        if let Some(memory) = self.read_memory_notes() {
            parts.push(format!("Persistent memory:\n{}", truncate(memory)));
        }

        if parts.is_empty() {
            return String::new();
        }

        format!("{}\n\n{}", PREAMBLE_DIRECTIVE, parts.join("\n\n"))
    }

    /// Prepends the preamble to `prompt` when `inject` is set and there is
    /// something to inject.
    pub fn build_prompt(&self, prompt: &str, inject: bool) -> String {
        if !inject {
            return prompt.to_string();
        }

        let preamble = self.compose_preamble();
        if preamble.is_empty() {
            return prompt.to_string();
        }

        format!("{}\n\nUser request:\n{}", preamble, prompt)
    }

    /// Creates the memory file if missing, migrating a legacy `memory.md`
    /// from the workdir when one exists.
    pub fn ensure_memory_file(&self) -> Result<(), MemoryError> {
        if self.memory_path.exists() {
            return Ok(());
        }

        let legacy = self.workdir.join(LEGACY_MEMORY_FILENAME);
        if legacy != self.memory_path && legacy.exists() {
            match fs::rename(&legacy, &self.memory_path) {
                Ok(()) => {
                    info!(
                        "migrated legacy memory file {} -> {}",
                        legacy.display(),
                        self.memory_path.display()
                    );
                    return Ok(());
                }
                Err(e) => debug!("legacy memory migration failed: {}", e),
            }
        }

        self.write(DEFAULT_MEMORY_TEMPLATE)
    }

    pub fn read_memory(&self) -> Result<String, MemoryError> {
        fs::read_to_string(&self.memory_path)
            .map(|content| content.trim().to_string())
            .map_err(|e| MemoryError::ReadError {
                path: self.memory_path.clone(),
                source: e,
            })
    }

    pub fn append_item(&self, item: &str) -> Result<(), MemoryError> {
        let item = item.trim();
        if item.is_empty() {
            return Err(MemoryError::EmptyItem);
        }

        let content = fs::read_to_string(&self.memory_path).map_err(|e| MemoryError::ReadError {
            path: self.memory_path.clone(),
            source: e,
        })?;

        let mut text = content.trim_end_matches('\n').to_string();
        if !text.contains(USER_ITEMS_HEADING) {
            text.push_str("\n\n");
            text.push_str(USER_ITEMS_HEADING);
        }
        text.push_str("\n- ");
        text.push_str(item);
        text.push('\n');

        self.write(&text)
    }

    pub fn reset(&self) -> Result<(), MemoryError> {
        self.write(DEFAULT_MEMORY_TEMPLATE)
    }

    fn write(&self, content: &str) -> Result<(), MemoryError> {
        fs::write(&self.memory_path, content).map_err(|e| MemoryError::WriteError {
            path: self.memory_path.clone(),
            source: e,
        })
    }
}

/// Recognises `/remember <item>` and `记住<item>`.
pub fn parse_remember_command(text: &str) -> Option<&str> {
    if let Some(rest) = text.strip_prefix("/remember") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(rest);
    }

    if let Some(rest) = text.strip_prefix("记住") {
        let rest = rest
            .trim()
            .trim_start_matches(|c: char| matches!(c, '：' | ':' | '，' | ',' | ' '));
        return (!rest.is_empty()).then_some(rest);
    }

    None
}

fn read_trimmed(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(_) => None,
    }
}

fn truncate(content: String) -> String {
    if content.chars().count() <= MAX_CHAR_COUNT {
        return content;
    }

    let truncate_at = content
        .char_indices()
        .nth(MAX_CHAR_COUNT)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    format!(
        "{}\n\n[Content truncated at {} characters]",
        &content[..truncate_at],
        MAX_CHAR_COUNT
    )
}
