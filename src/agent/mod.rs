mod args;
mod error;
mod image;
mod memory;
mod output;
mod process;
mod runner;
mod service;

pub use args::{tokenize, ArgsError};
pub use error::{AgentError, ImageError, MemoryError};
pub use image::{describe_image, describe_images_into_prompt};
pub use memory::{parse_remember_command, MemoryContext};
pub use output::{interpret, Interpretation, ReplyStrategy};
pub use process::run_to_completion;
pub use runner::{build_args, CodexRunner, GenericRunner, RunOutcome, RunRequest, Runner};
pub use service::{AgentReply, AgentService};
