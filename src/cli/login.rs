//! Login command implementation

use std::time::Duration;

use colored::Colorize;

use crate::auth::{self, RedirectListener};
use crate::cli::CommandContext;
use crate::cli::args::GlobalOptions;
use crate::cli::user::print_profile;
use crate::client::AvatarApi;
use crate::error::Result;

/// Run the login command
///
/// Any stored token is cleared first. The browser is sent to the
/// authorization page and the redirect is caught on `redirect_port`. On
/// success the effective configuration is written if no config file exists.
pub async fn run(opts: &GlobalOptions, no_browser: bool, timeout_secs: u64) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let client = ctx.client()?;
    let tokens = ctx.token_store()?;

    let url = auth::authorize_url(
        &ctx.config.app_host,
        &ctx.config.client_id,
        &ctx.config.redirect_uri(),
    )?;

    let mut listener = RedirectListener::new(ctx.config.redirect_port);
    if let Some(html) = ctx.config.redirect_page_html() {
        listener = listener.with_page(html);
    }

    let (record, method) = auth::login(
        &client,
        &tokens,
        &mut listener,
        Duration::from_secs(timeout_secs),
        |addr| {
            log::debug!("Redirect listener bound to {}", addr);
            if no_browser {
                println!("Open this URL in your browser to sign in:\n  {}", url.cyan());
            } else {
                println!("{}", "Opening your browser to sign in...".cyan());
                if let Err(e) = open::that(&url) {
                    log::warn!("Could not launch browser: {}", e);
                    println!("Open this URL in your browser:\n  {}", url.cyan());
                }
            }
            println!("Waiting for authorization (up to {}s)...", timeout_secs);
        },
    )
    .await?;

    println!("{} Signed in (token stored {})", "✓".green(), method);

    if !ctx.config_path.exists() {
        ctx.config.save_to(&ctx.config_path)?;
        println!(
            "{} Configuration saved to: {}",
            "✓".green(),
            ctx.config_path.display()
        );
    }

    let profile = client.current_user(&record.access_token, None).await?;
    println!();
    print_profile(&profile, ctx.format)
}
