use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use agentbridge_lib::RunOptions;

#[derive(Parser, Debug)]
#[command(
    name = "agentbridge",
    version,
    about = "Relay chat messages to a coding agent CLI with per-conversation sessions"
)]
struct Args {
    /// Path to bridge.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Conversation identity used for session binding
    #[arg(long)]
    conversation: Option<String>,

    /// Image to attach to the prompt (repeatable; needs PROMPT)
    #[arg(long = "image", requires = "prompt")]
    images: Vec<PathBuf>,

    /// Prompt to send; omit to read one message per stdin line
    prompt: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let options = RunOptions {
        config_path: args.config,
        conversation: args.conversation,
        images: args.images,
        prompt: args.prompt,
    };

    match agentbridge_lib::run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("bridge failed: {}", e);
            eprintln!("agentbridge: {}", e);
            ExitCode::FAILURE
        }
    }
}
