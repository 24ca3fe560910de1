//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod model_list;
pub mod settings;


use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::chat::{run_chat, ChatOptions};
use crate::cli::model_list::list_models;
use crate::cli::settings::{apply_set, apply_unset};
use crate::core::config::Config;

#[derive(Parser, Debug)]
#[command(name = "ollama-cli", version)]
#[command(about = "Chat with local Ollama models from the terminal")]
#[command(
    long_about = "ollama-cli starts a local Ollama server, lets you pick one of your installed \
models, and streams a multi-turn conversation with it. Replies that contain \
<file:name>...</file> blocks are written to the current directory.\n\n\
Environment Variables:\n\
  OLLAMA_HOST       Server address when no host is configured (default http://localhost:11434)\n\
  OLLAMA_CLI_LOG    Diagnostic log filter, e.g. 'debug' or 'ollama_cli=trace'\n\
  NO_COLOR          Disable colored output\n\n\
Chat commands:\n\
  exit, quit        Leave the session\n\
  clear, reset      Clear the screen and forget the conversation\n\
  help              Show the chat commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to chat with; skips the interactive picker
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Server base URL
    #[arg(long, global = true, value_name = "URL")]
    pub host: Option<String>,

    /// Attach to an already running server instead of starting one
    #[arg(long)]
    pub no_serve: bool,

    /// Seconds to wait for the server to accept connections
    #[arg(long, value_name = "SECS")]
    pub ready_timeout: Option<u64>,

    /// JSON file with ASCII-art logos per model family
    #[arg(long, value_name = "PATH")]
    pub logos: Option<PathBuf>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Use an alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print diagnostic logs to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat session (default)
    Chat,
    /// List models installed on a running server
    Models,
    /// Show the effective configuration
    Config,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set (may be multiple words for system-prompt)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

impl ChatOptions {
    /// Flags win over the config file, which wins over built-in defaults.
    pub fn resolve(args: &Args, config: &Config) -> Self {
        let base_url = args.host.clone().unwrap_or_else(|| config.base_url());
        ChatOptions {
            model: args.model.clone().or_else(|| config.default_model.clone()),
            base_url,
            spawn_server: !args.no_serve && config.spawn_server(),
            server_command: config.server_command(),
            ready_timeout: args
                .ready_timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.ready_timeout()),
            poll_interval: config.poll_interval(),
            logos_path: args.logos.clone().unwrap_or_else(|| config.logos_path()),
            system_prompt: config.system_prompt.clone(),
            log_file: args.log.clone(),
            color: !args.no_color && config.color(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "error" };
    let filter = EnvFilter::try_from_env("OLLAMA_CLI_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn save_config(args: &Args, config: &Config) -> Result<PathBuf, Box<dyn Error>> {
    match &args.config {
        Some(path) => {
            config.save_to_path(path)?;
            Ok(path.clone())
        }
        None => config.save(),
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async_main(args));
    // A pending stdin read would otherwise hold the runtime open after an interrupt.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args)?;

    match args.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => run_chat(ChatOptions::resolve(&args, &config)).await,
        Commands::Models => {
            let base_url = args.host.clone().unwrap_or_else(|| config.base_url());
            list_models(&base_url).await
        }
        Commands::Config => {
            println!("{}", config.describe());
            Ok(())
        }
        Commands::Set { key, value } => {
            let message = apply_set(&mut config, key, &value.join(" "))?;
            let path = save_config(&args, &config)?;
            println!("✅ {message} ({})", path.display());
            Ok(())
        }
        Commands::Unset { key } => {
            let message = apply_unset(&mut config, key)?;
            let path = save_config(&args, &config)?;
            println!("✅ {message} ({})", path.display());
            Ok(())
        }
    }
}
