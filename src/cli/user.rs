//! User profile command

use crate::auth;
use crate::cli::CommandContext;
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::client::AvatarApi;
use crate::client::models::UserProfile;
use crate::error::Result;
use crate::models::ProfileDisplay;
use crate::output::Formattable;
use crate::output::table::format_details;

/// Run the user command
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let client = ctx.client()?;
    let tokens = ctx.token_store()?;

    let token = auth::ensure_valid_token(&client, &tokens).await?;
    let profile = client.current_user(&token.access_token, None).await?;

    print_profile(&profile, ctx.format)
}

/// Print a profile summary in the requested format
pub fn print_profile(profile: &UserProfile, format: OutputFormat) -> Result<()> {
    let display = ProfileDisplay::from(profile);
    match format {
        OutputFormat::Pretty => {
            println!("{}", format_details(&profile_rows(&display)));
            Ok(())
        }
        _ => vec![display].print(format),
    }
}

fn profile_rows(display: &ProfileDisplay) -> Vec<(&'static str, String)> {
    vec![
        ("User", display.name.clone()),
        ("Plan", display.plan.clone()),
        ("Points", display.available_points.to_string()),
        ("Generations left today", display.generation_left_today.to_string()),
        (
            "Generations left this month",
            display.generation_left_monthly.to_string(),
        ),
        (
            "Registrations left",
            display.model_registration_left.to_string(),
        ),
    ]
}
