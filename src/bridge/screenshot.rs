use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use log::{info, warn};

use crate::agent::run_to_completion;
use crate::config::Settings;

use super::error::ScreenshotError;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Takes local screenshots with a `screencapture`-compatible tool.
#[derive(Debug, Clone)]
pub struct Screenshotter {
    bin: String,
    image_dir: PathBuf,
    workdir: PathBuf,
}

impl Screenshotter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bin: settings.screenshot_bin.clone(),
            image_dir: settings.image_dir.clone(),
            workdir: settings.workdir.clone(),
        }
    }

    /// Captures the screen into the image directory and returns the file.
    pub async fn capture(&self) -> Result<PathBuf, ScreenshotError> {
        fs::create_dir_all(&self.image_dir).map_err(|e| ScreenshotError::CreateDir {
            path: self.image_dir.clone(),
            source: e,
        })?;

        let name = format!(
            "codex-screenshot-{}.png",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        let path = self.image_dir.join(name);
        let args = vec!["-x".to_string(), path.display().to_string()];

        if let Err(e) = run_to_completion(&self.bin, &args, &self.workdir, CAPTURE_TIMEOUT).await {
            warn!("screenshot failed bin={} err={}", self.bin, e);
            return Err(e.into());
        }
        if !path.is_file() {
            return Err(ScreenshotError::Missing(path));
        }

        info!("screenshot saved path={}", path.display());
        Ok(path)
    }
}

/// Free-text screenshot requests, in English or Chinese.
pub fn is_screenshot_request(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    lowered.contains("screenshot")
        || ["截图", "截个图", "截屏"]
            .iter()
            .any(|phrase| text.contains(phrase))
}
