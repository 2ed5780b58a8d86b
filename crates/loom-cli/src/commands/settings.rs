use anyhow::{Context, Result};
use loom_core::settings::{Settings, SettingsRepository, SettingsUpdate};
use loom_interaction::can_create_client;

use super::context::AppContext;
use crate::SettingsAction;

pub async fn run(ctx: &AppContext, action: SettingsAction) -> Result<()> {
    let settings = match action {
        SettingsAction::Show => ctx.settings.load().await?,
        SettingsAction::Set {
            provider,
            api_key,
            api_endpoint,
            model,
            theme,
        } => {
            let update = SettingsUpdate {
                provider,
                api_key,
                api_endpoint,
                model,
                theme,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to update; pass at least one --<field>");
            }
            let settings = ctx.settings.update(update).await?;
            println!("✅ Settings updated");
            settings
        }
        SettingsAction::Reset => {
            let settings = ctx.settings.reset().await?;
            println!("✅ Settings reset to defaults");
            settings
        }
    };

    print_settings(ctx, &settings)
}

fn print_settings(ctx: &AppContext, settings: &Settings) -> Result<()> {
    let rendered =
        toml::to_string_pretty(&settings.redacted()).context("Failed to render settings")?;
    println!("# {}", ctx.paths.root().display());
    print!("{rendered}");
    if !can_create_client(settings) {
        println!("# No API key: set one with `loom settings set --api-key <KEY>` or OPENAI_API_KEY");
    }
    Ok(())
}
