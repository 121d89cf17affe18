//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod context;
pub mod login;
pub mod logout;
pub mod status;
pub mod upload;
pub mod user;
pub mod validate;

pub use args::OutputFormat;
pub use context::CommandContext;

/// Default number of seconds `login` waits for the browser redirect
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;

/// Avalab CLI - sign in and upload avatars to Avalab
#[derive(Parser, Debug)]
#[command(name = "avalab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "AVALAB_FORMAT",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: Option<OutputFormat>,

    /// Override config file location
    #[arg(long, global = true, env = "AVALAB_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override data directory (token database and sealing key)
    #[arg(long, global = true, env = "AVALAB_HOME", hide_env = true)]
    pub data_dir: Option<PathBuf>,

    /// Override API host
    #[arg(long, global = true, env = "AVALAB_API_HOST", hide_env = true)]
    pub api_host: Option<String>,

    /// Override API key
    #[arg(
        long,
        global = true,
        env = "AVALAB_API_KEY",
        hide_env_values = true,
        hide = true
    )]
    pub api_key: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "AVALAB_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in through the browser
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Seconds to wait for the browser redirect
        #[arg(long, default_value_t = DEFAULT_LOGIN_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Remove the stored token
    Logout {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Show configuration and sign-in status
    Status,

    /// Show the signed-in user's profile and quota
    User,

    /// Check an avatar manifest without uploading
    Validate {
        /// Path to the avatar manifest (JSON)
        manifest: PathBuf,
    },

    /// Package and upload an avatar
    Upload {
        /// Path to the avatar manifest (JSON)
        manifest: PathBuf,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  avalab completion bash > ~/.local/share/bash-completion/completions/avalab
  avalab completion zsh > ~/.zfunc/_avalab
  avalab completion fish > ~/.config/fish/completions/avalab.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Display version information
    Version,
}
