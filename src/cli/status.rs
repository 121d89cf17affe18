//! Status command implementation

use colored::Colorize;

use crate::cli::CommandContext;
use crate::cli::args::GlobalOptions;
use crate::error::Result;

/// Run the status command. Reads local state only.
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "Avalab Status".bold());

    let ctx = match CommandContext::new(opts) {
        Ok(ctx) => ctx,
        Err(e) => {
            println!("{} Configuration could not be loaded", "✗".red());
            println!("  {}", e);
            println!();
            return Ok(());
        }
    };

    let config_note = if ctx.config_path.exists() {
        String::new()
    } else {
        " (not found, using defaults)".dimmed().to_string()
    };
    println!(
        "Config file: {}{}",
        ctx.config_path.display().to_string().cyan(),
        config_note
    );
    println!("Data directory: {}", ctx.data_dir.display().to_string().cyan());
    println!("API host: {}", ctx.config.api_host.cyan());
    println!();

    if ctx.config.require_api_key().is_ok() {
        println!("{} API key configured", "✓".green());
    } else {
        println!("{} API key not configured", "✗".red());
        println!("  → Set `api_key` in the config file or AVALAB_API_KEY");
    }

    let tokens = ctx.token_store()?;
    let record = tokens.load();
    match &record {
        None => {
            println!("{} Not signed in", "✗".red());
            println!("  → Run 'avalab login' to sign in");
        }
        Some(record) if record.is_expired() => {
            println!(
                "{} Access token expired (will refresh on next command)",
                "⚠".yellow()
            );
        }
        Some(record) => {
            let remaining = record
                .expires_at
                .map(|at| at.signed_duration_since(chrono::Utc::now()))
                .unwrap_or_else(chrono::Duration::zero);
            println!(
                "{} Signed in (token expires in {}h {}m)",
                "✓".green(),
                remaining.num_hours(),
                remaining.num_minutes() % 60
            );
        }
    }
    println!("{} Token storage: {}", "○".dimmed(), tokens.method());
    if let Some(saved) = record.as_ref().and(tokens.saved_at()) {
        println!(
            "{} Token saved: {}",
            "○".dimmed(),
            saved.format("%Y-%m-%d %H:%M UTC")
        );
    }
    println!();

    Ok(())
}
