//! Upload command implementation

use std::path::Path;

use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth;
use crate::avatar::{AvatarPackager, ManifestPackager};
use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::client::AvatarApi;
use crate::error::Result;
use crate::models::UploadDisplay;
use crate::output::Formattable;
use crate::upload::{Phase, UploadOrchestrator, UploadProgress};

/// Run the upload command
pub async fn run(opts: &GlobalOptions, manifest: &Path, yes: bool) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let client = ctx.client()?;

    // A broken manifest fails here, before any request or prompt
    let avatar = ManifestPackager::new(manifest).package().await?;

    let tokens = ctx.token_store()?;
    let token = auth::ensure_valid_token(&client, &tokens).await?;
    let profile = client.current_user(&token.access_token, None).await?;
    if profile.model_registration_left <= 0 {
        eprintln!(
            "{} No avatar registrations left on this account; the server may reject the upload.",
            "⚠".yellow()
        );
    }

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Upload {} ({} bytes)?",
                avatar.name, avatar.model_size
            ))
            .default(true)
            .interact()?;
        if !confirmed {
            println!("Upload cancelled.");
            return Ok(());
        }
    }

    let bar = progress_bar(ctx.format);
    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(render_progress(bar.clone(), rx));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Interrupt received, cancelling upload");
                cancel.cancel();
            }
        }
    });

    let result = UploadOrchestrator::new(&client, &tokens)
        .with_progress(tx)
        .with_cancellation(cancel)
        .run(&avatar)
        .await;

    interrupt.abort();
    // The orchestrator owned the only sender, so the renderer drains and ends
    if let Err(e) = renderer.await {
        log::debug!("Progress renderer stopped: {}", e);
    }
    bar.finish_and_clear();

    let outcome = result?;

    vec![UploadDisplay::from(&outcome)].print(ctx.format)?;
    if ctx.format != OutputFormat::Json {
        println!(
            "{} Uploaded {} ({} registrations left)",
            "✓".green(),
            outcome.avatar.name.bold(),
            outcome.profile.model_registration_left
        );
        println!(
            "Generate images with it at {}",
            format!("{}/generate", ctx.config.app_host.trim_end_matches('/')).cyan()
        );
    }
    Ok(())
}

fn progress_bar(format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:30.green/dim}] {pos:>3}%")
    {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar
}

/// Mirror orchestrator events onto the bar until the sender is dropped
async fn render_progress(bar: ProgressBar, mut rx: mpsc::UnboundedReceiver<UploadProgress>) {
    while let Some(event) = rx.recv().await {
        if matches!(event.phase, Phase::Done | Phase::Failed) {
            continue;
        }
        bar.set_message(event.label);
        bar.set_position(percent(event.fraction));
    }
}

fn percent(fraction: f32) -> u64 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u64
}
