//! Init command implementation

use colored::Colorize;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::config::{Config, TemperatureUnit, WindSpeedUnit};
use crate::error::Result;

/// Run the init command
///
/// Existing settings are kept as defaults so re-running init only changes what
/// the user edits.
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}", "Welcome to Backdrop!".bold().green());
    println!("Let's set up your background photo configuration.\n");

    let mut config = Config::load_or_default_at(opts.config_ref())?;
    let theme = ColorfulTheme::default();

    let access_key: String = Password::with_theme(&theme)
        .with_prompt("Enter your Unsplash access key (leave empty to use UNSPLASH_ACCESS_KEY)")
        .allow_empty_password(true)
        .interact()?;
    if !access_key.trim().is_empty() {
        config.access_key = Some(access_key.trim().to_string());
    }

    let interval: u64 = Input::with_theme(&theme)
        .with_prompt("Minutes between photo changes")
        .default(config.settings.photos.refresh_interval)
        .validate_with(|v: &u64| {
            if *v >= 1 {
                Ok(())
            } else {
                Err("must be at least one minute")
            }
        })
        .interact_text()?;
    config.settings.photos.refresh_interval = interval;

    let temperature = Select::with_theme(&theme)
        .with_prompt("Temperature unit")
        .items(&["Celsius", "Fahrenheit"])
        .default(match config.settings.units.temperature_unit {
            TemperatureUnit::Celsius => 0,
            TemperatureUnit::Fahrenheit => 1,
        })
        .interact()?;
    config.settings.units.temperature_unit = if temperature == 1 {
        TemperatureUnit::Fahrenheit
    } else {
        TemperatureUnit::Celsius
    };

    let wind_units = [WindSpeedUnit::Kmh, WindSpeedUnit::Mph, WindSpeedUnit::Ms];
    let wind_labels: Vec<&str> = wind_units.iter().map(|u| u.label()).collect();
    let current_wind = wind_units
        .iter()
        .position(|u| *u == config.settings.units.wind_speed_unit)
        .unwrap_or(0);
    let wind = Select::with_theme(&theme)
        .with_prompt("Wind speed unit")
        .items(&wind_labels)
        .default(current_wind)
        .interact()?;
    config.settings.units.wind_speed_unit = wind_units[wind];

    config.settings.photos.festive = Confirm::with_theme(&theme)
        .with_prompt("Prefer holiday photos around Christmas, New Year and Halloween?")
        .default(config.settings.photos.festive)
        .interact()?;

    let companion: String = Input::with_theme(&theme)
        .with_prompt("Companion display URL (optional)")
        .default(config.companion_url.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.companion_url = Some(companion.trim().to_string()).filter(|u| !u.is_empty());

    config.save_at(opts.config_ref())?;

    let config_path = Config::resolve_path(opts.config_ref())?;
    println!(
        "\n{} Configuration saved to: {}",
        "✓".green(),
        config_path.display()
    );

    if !config.access_key().is_available() {
        println!(
            "{} No usable access key yet; set {} or re-run init.",
            "⚠".yellow(),
            crate::config::ACCESS_KEY_ENV.cyan()
        );
    }

    println!("\n{}", "You're all set! Try running:".bold());
    println!("  {} - Show configuration status", "backdrop status".cyan());
    println!("  {} - Fetch a photo now", "backdrop refresh".cyan());
    println!("  {} - Keep the photo fresh", "backdrop run".cyan());

    Ok(())
}
