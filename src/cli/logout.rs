//! Logout command

use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::cli::CommandContext;
use crate::cli::args::GlobalOptions;
use crate::error::Result;

/// Run the logout command
pub fn run(opts: &GlobalOptions, yes: bool) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let tokens = ctx.token_store()?;

    if tokens.load().is_none() {
        println!("{} Not signed in", "○".dimmed());
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Sign out and delete the stored token?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Logout cancelled.");
            return Ok(());
        }
    }

    tokens.save(None)?;
    println!("{} Signed out", "✓".green());
    Ok(())
}
