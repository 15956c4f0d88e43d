use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;

use super::error::ImageError;
use super::process::run_to_completion;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const UNKNOWN_DIMENSION: &str = "unknown";

/// Folds text descriptions of `images` into `prompt` for agents that cannot
/// take image input directly. Never fails; unreadable images get a one-line
/// placeholder.
pub async fn describe_images_into_prompt(prompt: &str, images: &[PathBuf], workdir: &Path) -> String {
    let mut lines = Vec::with_capacity(images.len());
    for path in images {
        match describe_image(path, workdir).await {
            Ok(line) => lines.push(line),
            Err(e) => lines.push(format!("- {} (unreadable: {})", path.display(), e)),
        }
    }

    format!(
        "Images were converted to text descriptions (the current agent does not accept direct image input):\n{}\n\nUser request:\n{}",
        lines.join("\n"),
        prompt
    )
}

pub async fn describe_image(path: &Path, workdir: &Path) -> Result<String, ImageError> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(ImageError::EmptyPath);
    }

    let metadata = fs::metadata(path)?;
    if metadata.is_dir() {
        return Err(ImageError::IsDirectory);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let (width, height) = read_dimensions(path, workdir)
        .await
        .unwrap_or_else(|| (UNKNOWN_DIMENSION.to_string(), UNKNOWN_DIMENSION.to_string()));

    Ok(format!(
        "- file: {}, type: {}, dimensions: {}x{}, size: {} bytes",
        name,
        mime,
        width,
        height,
        metadata.len()
    ))
}

#[cfg(target_os = "macos")]
async fn read_dimensions(path: &Path, workdir: &Path) -> Option<(String, String)> {
    let args = vec![
        "-g".to_string(),
        "pixelWidth".to_string(),
        "-g".to_string(),
        "pixelHeight".to_string(),
        path.display().to_string(),
    ];
    let output = run_size_tool("sips", &args, workdir).await?;
    parse_sips_output(&output)
}

#[cfg(not(target_os = "macos"))]
async fn read_dimensions(path: &Path, workdir: &Path) -> Option<(String, String)> {
    let args = vec![
        "-format".to_string(),
        "%w %h\n".to_string(),
        path.display().to_string(),
    ];
    let output = run_size_tool("identify", &args, workdir).await?;
    parse_identify_output(&output)
}

async fn run_size_tool(program: &str, args: &[String], workdir: &Path) -> Option<String> {
    match run_to_completion(program, args, workdir, PROBE_TIMEOUT).await {
        Ok(output) => Some(output),
        Err(e) => {
            debug!("image size tool failed program={} err={}", program, e);
            None
        }
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_sips_output(output: &str) -> Option<(String, String)> {
    let mut width = None;
    let mut height = None;
    for line in output.lines().map(str::trim) {
        if let Some(v) = line.strip_prefix("pixelWidth:") {
            width = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("pixelHeight:") {
            height = Some(v.trim().to_string());
        }
    }
    Some((width?, height?))
}

// Multi-frame images print one line per frame; the first is enough.
#[cfg_attr(target_os = "macos", allow(dead_code))]
fn parse_identify_output(output: &str) -> Option<(String, String)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut parts = line.split_whitespace();
    let width = parts.next()?;
    let height = parts.next()?;
    if width.parse::<u32>().is_err() || height.parse::<u32>().is_err() {
        return None;
    }
    Some((width.to_string(), height.to_string()))
}
