use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tokio::time::timeout;

use super::error::AgentError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Runs `program` to completion and returns stdout and stderr combined.
///
/// The child is placed in its own process group; on timeout the whole group is
/// killed so helpers spawned by the agent do not outlive the request.
pub async fn run_to_completion(
    program: &str,
    args: &[String],
    working_dir: &Path,
    deadline: Duration,
) -> Result<String, AgentError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let child = cmd.spawn().map_err(|source| AgentError::Spawn {
        program: program.to_string(),
        source,
    })?;
    let pid = child.id();

    debug!("spawned program={} pid={:?} args={:?}", program, pid, args);

    match timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let combined = combine_output(&output.stdout, &output.stderr);
            if output.status.success() {
                Ok(combined)
            } else {
                Err(AgentError::ProcessFailed {
                    status: output.status.to_string(),
                    output: combined,
                })
            }
        }
        Ok(Err(e)) => Err(AgentError::Io(e)),
        Err(_) => {
            warn!(
                "process timed out program={} pid={:?} after={}s",
                program,
                pid,
                deadline.as_secs()
            );
            kill_process_tree(pid);
            Err(AgentError::Timeout(deadline.as_secs()))
        }
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);

    if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{}\n{}", stdout, stderr)
    }
}

#[cfg(unix)]
fn kill_process_tree(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg pid={} failed: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

// Without process groups the dropped future's kill_on_drop reaps the direct child.
#[cfg(not(unix))]
fn kill_process_tree(_pid: Option<u32>) {}
