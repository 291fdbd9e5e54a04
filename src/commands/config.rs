//! Config command handlers: show effective configuration.

use anyhow::Result;
use mesh_trends::config::LoadedConfig;

use super::settings::AnalysisSettings;
use crate::cli::AnalyzeArgs;

/// Prints effective `analyze` settings with their origins.
///
/// Environment variables count as command line, matching `analyze`.
pub(crate) fn run_config_show_command(loaded: &LoadedConfig) -> Result<()> {
    let args = AnalyzeArgs {
        email: env_non_empty("NCBI_EMAIL"),
        api_key: env_non_empty("NCBI_API_KEY"),
        ..AnalyzeArgs::default()
    };
    let settings = AnalysisSettings::resolve(&args, loaded.config.as_ref());

    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if loaded.loaded_from_file() {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    for (key, value, origin) in settings.describe() {
        println!("{key} = {value}  # {}", origin.as_str());
    }
    let verbosity = loaded
        .config
        .as_ref()
        .and_then(|config| config.verbosity)
        .map_or("default", |verbosity| verbosity.as_str());
    println!("verbosity = {verbosity}");

    Ok(())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
