use clap::{Parser, Subcommand};

/// Drive issue-tracker actions from language-model replies.
///
/// Replays recorded model output or typed intent batches against an
/// in-memory tracker and shows each action's status as it runs.
#[derive(Parser, Debug)]
#[command(name = "ticketeer", about = "Run model-issued issue-tracker actions")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/ticketeer/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Environment profile (prefix for TICKETEER_* variables)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// JSON seed for the in-memory tracker (overrides config and env)
    #[arg(long, global = true)]
    pub seed: Option<String>,

    /// Project used when create_issue omits one
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Characters per streamed chunk when replaying a reply
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tool schema as JSON
    Schema,
    /// Print the tool catalogue given to the model
    Prompt,
    /// Replay a model reply (file or `-` for stdin) through the full pipeline
    Replay {
        input: String,
        /// User message recorded in the conversation
        #[arg(long, default_value = "(replayed reply)")]
        message: String,
    },
    /// Run a JSON array of typed intents (file or `-` for stdin)
    Intents { input: String },
}

impl Command {
    /// The path argument, if the command reads one.
    pub fn input(&self) -> Option<&str> {
        match self {
            Command::Replay { input, .. } | Command::Intents { input } => Some(input),
            Command::Schema | Command::Prompt => None,
        }
    }
}
