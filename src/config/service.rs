use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{debug, info};

use super::error::ConfigError;
use super::types::{BridgeConfig, Settings};

const CONFIG_FILENAME: &str = "bridge.toml";
const MIN_REPLY_CHARS: usize = 500;

pub struct ConfigService {
    config_dir: PathBuf,
}

impl ConfigService {
    pub fn new() -> Result<Self, ConfigError> {
        let project_dirs =
            ProjectDirs::from("", "", "agentbridge").ok_or(ConfigError::NoConfigDir)?;

        let config_dir = project_dirs.config_dir().to_path_buf();

        Ok(Self { config_dir })
    }

    #[cfg(test)]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn default_config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILENAME)
    }

    /// Loads the config file. An explicit path must exist; the default
    /// location falls back to built-in defaults when absent.
    pub fn load(&self, explicit: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::load_file(path)
            }
            None => {
                let path = self.default_config_path();
                if !path.exists() {
                    debug!("no config at {}, using defaults", path.display());
                    return Ok(BridgeConfig::default());
                }
                Self::load_file(&path)
            }
        }
    }

    fn load_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("loaded config from {}", path.display());
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads, applies process environment overrides and resolves against the
    /// current directory.
    pub fn load_settings(&self, explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut config = self.load(explicit)?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        let cwd = std::env::current_dir().map_err(ConfigError::NoWorkdir)?;
        let settings = resolve(&config, &cwd)?;
        ensure_storage_dirs(&settings)?;
        Ok(settings)
    }
}

/// Applies the supported environment variables on top of `config`.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("AGENT_PROVIDER") {
        config.agent.provider = v;
    }
    if let Some(v) = get("AGENT_BIN") {
        config.agent.bin = Some(v);
    }
    if let Some(v) = get("AGENT_ARGS") {
        config.agent.args = v;
    }
    if let Some(v) = get("AGENT_MODEL") {
        config.agent.model = v;
    }
    if let Some(v) = lookup("AGENT_SUPPORTS_IMAGE") {
        config.agent.supports_images = match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        };
    }
    if let Some(v) = get("CODEX_BIN") {
        config.codex.bin = v;
    }
    if let Some(v) = get("CODEX_MODEL") {
        config.codex.model = v;
    }
    if let Some(v) = get("CODEX_SANDBOX") {
        config.codex.sandbox = v;
    }
    if let Some(v) = get("CODEX_WORKDIR") {
        config.agent.workdir = Some(PathBuf::from(v));
    }
    if let Some(v) = get("CODEX_TIMEOUT_SEC") {
        config.agent.timeout_secs = parse_number("CODEX_TIMEOUT_SEC", &v)?;
    }
    if let Some(v) = get("MEMORY_FILE") {
        config.storage.memory_file = PathBuf::from(v);
    }
    if let Some(v) = get("SESSION_STORE_FILE") {
        config.storage.session_store_file = PathBuf::from(v);
    }
    if let Some(v) = get("CHAT_LOG_FILE") {
        config.storage.chat_log_file = PathBuf::from(v);
    }
    if let Some(v) = get("IMAGE_DIR") {
        config.storage.image_dir = PathBuf::from(v);
    }
    if let Some(v) = get("SCREENSHOT_BIN") {
        config.bridge.screenshot_bin = v;
    }
    if let Some(v) = get("MAX_REPLY_CHARS") {
        config.bridge.max_reply_chars = parse_number("MAX_REPLY_CHARS", &v)?;
    }
    if let Some(v) = get("BRIDGE_PARENT_PID") {
        config.bridge.parent_pid = Some(parse_number("BRIDGE_PARENT_PID", &v)?);
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        reason: format!("'{}' is not a valid number", value),
    })
}

/// Validates `config` and resolves every path against `cwd`.
pub fn resolve(config: &BridgeConfig, cwd: &Path) -> Result<Settings, ConfigError> {
    if config.agent.timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "timeout_secs",
            reason: "must be a positive integer".to_string(),
        });
    }
    if config.bridge.max_reply_chars < MIN_REPLY_CHARS {
        return Err(ConfigError::InvalidValue {
            key: "max_reply_chars",
            reason: format!("must be at least {}", MIN_REPLY_CHARS),
        });
    }
    if let Some(pid) = config.bridge.parent_pid {
        if pid <= 1 {
            return Err(ConfigError::InvalidValue {
                key: "parent_pid",
                reason: "must be a pid greater than 1".to_string(),
            });
        }
    }

    let provider = config.agent.provider.trim().to_lowercase();
    let provider = if provider.is_empty() {
        "codex".to_string()
    } else {
        provider
    };

    let workdir = match &config.agent.workdir {
        Some(dir) => absolutize(dir, cwd),
        None => cwd.to_path_buf(),
    };

    let agent_bin = config
        .agent
        .bin
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(config.codex.bin.as_str())
        .to_string();

    let codex_model = if config.codex.model.trim().is_empty() {
        config.agent.model.trim().to_string()
    } else {
        config.codex.model.trim().to_string()
    };

    Ok(Settings {
        agent_supports_images: config
            .agent
            .supports_images
            .unwrap_or(provider == "codex"),
        provider,
        agent_bin,
        agent_args: config.agent.args.trim().to_string(),
        memory_file: absolutize(&config.storage.memory_file, &workdir),
        image_dir: absolutize(&config.storage.image_dir, &workdir),
        workdir,
        timeout_secs: config.agent.timeout_secs,
        codex_bin: config.codex.bin.trim().to_string(),
        codex_model,
        codex_sandbox: config.codex.sandbox.trim().to_string(),
        session_store_file: absolutize(&config.storage.session_store_file, cwd),
        chat_log_file: absolutize(&config.storage.chat_log_file, cwd),
        max_reply_chars: config.bridge.max_reply_chars,
        parent_pid: config.bridge.parent_pid,
        screenshot_bin: config.bridge.screenshot_bin.trim().to_string(),
    })
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Creates the parent directories of the files the bridge writes to.
pub fn ensure_storage_dirs(settings: &Settings) -> Result<(), ConfigError> {
    for file in [
        &settings.session_store_file,
        &settings.chat_log_file,
        &settings.memory_file,
    ] {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::CreateDirError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    fs::create_dir_all(&settings.image_dir).map_err(|e| ConfigError::CreateDirError {
        path: settings.image_dir.clone(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_temp_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_defaults_when_missing() {
        let temp_dir = create_temp_dir();
        let service = ConfigService::with_config_dir(temp_dir.path().to_path_buf());

        let config = service.load(None).unwrap();
        assert_eq!(config.agent.provider, "codex");
        assert_eq!(config.agent.timeout_secs, 120);
        assert_eq!(config.codex.sandbox, "workspace-write");
        assert_eq!(config.bridge.max_reply_chars, 3500);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let temp_dir = create_temp_dir();
        let service = ConfigService::with_config_dir(temp_dir.path().to_path_buf());

        let result = service.load(Some(&temp_dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = create_temp_dir();
        let service = ConfigService::with_config_dir(temp_dir.path().to_path_buf());
        fs::write(
            service.default_config_path(),
            "[agent]\nprovider = \"generic\"\nargs = \"--prompt {{prompt}}\"\ntimeout_secs = 30\n",
        )
        .unwrap();

        let config = service.load(None).unwrap();
        assert_eq!(config.agent.provider, "generic");
        assert_eq!(config.agent.args, "--prompt {{prompt}}");
        assert_eq!(config.agent.timeout_secs, 30);
        assert_eq!(config.codex.bin, "codex");
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[agent\nprovider=").unwrap();

        let service = ConfigService::with_config_dir(temp_dir.path().to_path_buf());
        assert!(matches!(
            service.load(Some(&path)),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = create_temp_dir();
        let settings = resolve(&BridgeConfig::default(), temp_dir.path()).unwrap();

        assert_eq!(settings.provider, "codex");
        assert!(settings.agent_supports_images);
        assert_eq!(settings.agent_bin, "codex");
        assert_eq!(settings.workdir, temp_dir.path());
        assert_eq!(settings.memory_file, temp_dir.path().join("MEMORY.md"));
        assert_eq!(
            settings.session_store_file,
            temp_dir.path().join("tmp/codex-sessions.json")
        );
        assert_eq!(settings.image_dir, temp_dir.path().join("tmp/images"));
        assert_eq!(settings.screenshot_bin, "screencapture");
    }

    #[test]
    fn test_generic_provider_images_default_off() {
        let temp_dir = create_temp_dir();
        let mut config = BridgeConfig::default();
        apply_env_overrides(&mut config, env(&[("AGENT_PROVIDER", "Generic")])).unwrap();

        let settings = resolve(&config, temp_dir.path()).unwrap();
        assert_eq!(settings.provider, "generic");
        assert!(!settings.agent_supports_images);

        apply_env_overrides(&mut config, env(&[("AGENT_SUPPORTS_IMAGE", "yes")])).unwrap();
        let settings = resolve(&config, temp_dir.path()).unwrap();
        assert!(settings.agent_supports_images);
    }

    #[test]
    fn test_unrecognised_image_flag_resets_to_default() {
        let mut config = BridgeConfig::default();
        config.agent.supports_images = Some(false);
        apply_env_overrides(&mut config, env(&[("AGENT_SUPPORTS_IMAGE", "maybe")])).unwrap();
        assert_eq!(config.agent.supports_images, None);
    }

    #[test]
    fn test_env_overrides_paths_and_models() {
        let temp_dir = create_temp_dir();
        let workdir = temp_dir.path().join("work");
        let mut config = BridgeConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("CODEX_WORKDIR", workdir.to_str().unwrap()),
                ("AGENT_MODEL", "gpt-x"),
                ("MEMORY_FILE", "notes/MEMORY.md"),
                ("SESSION_STORE_FILE", "/var/tmp/s.json"),
                ("IMAGE_DIR", "shots"),
                ("SCREENSHOT_BIN", "/usr/local/bin/grab"),
            ]),
        )
        .unwrap();

        let settings = resolve(&config, temp_dir.path()).unwrap();
        assert_eq!(settings.workdir, workdir);
        assert_eq!(settings.codex_model, "gpt-x");
        assert_eq!(settings.memory_file, workdir.join("notes/MEMORY.md"));
        assert_eq!(settings.session_store_file, PathBuf::from("/var/tmp/s.json"));
        assert_eq!(settings.image_dir, workdir.join("shots"));
        assert_eq!(settings.screenshot_bin, "/usr/local/bin/grab");
    }

    #[test]
    fn test_agent_bin_falls_back_to_codex_bin() {
        let temp_dir = create_temp_dir();
        let mut config = BridgeConfig::default();
        config.codex.bin = "/opt/codex".to_string();

        let settings = resolve(&config, temp_dir.path()).unwrap();
        assert_eq!(settings.agent_bin, "/opt/codex");

        config.agent.bin = Some("my-agent".to_string());
        let settings = resolve(&config, temp_dir.path()).unwrap();
        assert_eq!(settings.agent_bin, "my-agent");
    }

    #[test]
    fn test_invalid_numeric_values() {
        let temp_dir = create_temp_dir();

        let mut config = BridgeConfig::default();
        apply_env_overrides(&mut config, env(&[("CODEX_TIMEOUT_SEC", "0")])).unwrap();
        let err = resolve(&config, temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        let mut config = BridgeConfig::default();
        apply_env_overrides(&mut config, env(&[("MAX_REPLY_CHARS", "499")])).unwrap();
        let err = resolve(&config, temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("max_reply_chars"));

        let mut config = BridgeConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("CODEX_TIMEOUT_SEC", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("CODEX_TIMEOUT_SEC"));

        let mut config = BridgeConfig::default();
        config.bridge.parent_pid = Some(1);
        assert!(resolve(&config, temp_dir.path()).is_err());
    }

    #[test]
    fn test_ensure_storage_dirs() {
        let temp_dir = create_temp_dir();
        let settings = resolve(&BridgeConfig::default(), temp_dir.path()).unwrap();

        ensure_storage_dirs(&settings).unwrap();
        assert!(temp_dir.path().join("tmp").is_dir());
        assert!(temp_dir.path().join("tmp/images").is_dir());
    }
}
