//! Avalab CLI - sign in and upload avatars to Avalab

use clap::{CommandFactory, Parser};

mod auth;
mod avatar;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod output;
mod store;
mod upload;

use cli::args::GlobalOptions;
use cli::{Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Login {
            no_browser,
            timeout,
        } => cli::login::run(&opts, no_browser, timeout).await,
        Commands::Logout { yes } => cli::logout::run(&opts, yes),
        Commands::Status => cli::status::run(&opts),
        Commands::User => cli::user::run(&opts).await,
        Commands::Validate { manifest } => cli::validate::run(&opts, &manifest).await,
        Commands::Upload { manifest, yes } => cli::upload::run(&opts, &manifest, yes).await,
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "avalab", &mut std::io::stdout());
            Ok(())
        }
        Commands::Version => {
            println!("avalab version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// `--debug` forces debug level; otherwise RUST_LOG applies, defaulting to warn
fn init_logging(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}
