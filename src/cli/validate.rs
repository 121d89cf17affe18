//! Validate command

use std::path::Path;

use colored::Colorize;

use crate::avatar::{AvatarPackager, ManifestPackager};
use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::models::AvatarDisplay;
use crate::output::Formattable;

/// Run the packager checks on a manifest without contacting the server
pub async fn run(opts: &GlobalOptions, manifest: &Path) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let avatar = ManifestPackager::new(manifest).package().await?;

    vec![AvatarDisplay::from(&avatar)].print(ctx.format)?;

    if ctx.format != OutputFormat::Json {
        for warning in &avatar.warnings {
            println!("{} {}", "⚠".yellow(), warning);
        }
        println!("{} {} is ready to upload", "✓".green(), avatar.name.bold());
    }
    Ok(())
}
