use std::time::Duration;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "toysaver",
    author,
    version,
    about = "Shadertoy screensaver for every display",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Render into a single desktop window instead of fullscreen on every monitor.
    #[arg(long)]
    pub window: bool,

    /// Preview window size (e.g. `1280x720`); only used with `--window`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "1280x720")]
    pub size: (u32, u32),

    /// Re-fetch the configured shaders in the background while rendering the cache.
    #[arg(long)]
    pub refresh: bool,

    /// Shadertoy API key; can also be supplied via the `SHADERTOY_API_KEY` env var.
    #[arg(long, env = "SHADERTOY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the saved separate-screens flag for this run.
    #[arg(long, value_name = "BOOL")]
    pub separate_screens: Option<bool>,

    /// Override the saved auto-rotate flag for this run.
    #[arg(long, value_name = "BOOL")]
    pub auto_rotate: Option<bool>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the configured shaders, validate them and cache the usable ones.
    Fetch(FetchArgs),
    /// Show or change saved settings.
    Settings(SettingsCommand),
    /// Print resolved config and cache directories.
    Where,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Comma separated ids or view URLs; saved when the fetch succeeds.
    #[arg(long, value_name = "IDS")]
    pub ids: Option<String>,

    /// Shadertoy API key; can also be supplied via the `SHADERTOY_API_KEY` env var.
    #[arg(long, env = "SHADERTOY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Save nothing unless every shader compiles.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings with the API key masked.
    Show,
    /// Update only the given keys.
    Set(SetArgs),
}

#[derive(Args, Debug, Default)]
pub struct SetArgs {
    #[arg(long, value_name = "IDS")]
    pub ids: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub separate_screens: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub auto_rotate: Option<bool>,

    /// e.g. `5m` or `300`.
    #[arg(long, value_name = "DURATION", value_parser = settings::parse_duration)]
    pub rotate_interval: Option<Duration>,

    /// e.g. `50ms` or `0.05`.
    #[arg(long, value_name = "DURATION", value_parser = settings::parse_duration)]
    pub frame_interval: Option<Duration>,
}

impl SetArgs {
    pub fn is_empty(&self) -> bool {
        self.ids.is_none()
            && self.api_key.is_none()
            && self.separate_screens.is_none()
            && self.auto_rotate.is_none()
            && self.rotate_interval.is_none()
            && self.frame_interval.is_none()
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{value}' must be non-zero"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 640X480 "), Ok((640, 480)));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("wide").is_err());
    }

    #[test]
    fn parses_settings_set() {
        let cli = Cli::try_parse_from([
            "toysaver",
            "settings",
            "set",
            "--ids",
            "111,abc",
            "--auto-rotate",
            "true",
            "--rotate-interval",
            "10m",
        ])
        .unwrap();
        let Some(Command::Settings(SettingsCommand {
            action: SettingsAction::Set(args),
        })) = cli.command
        else {
            panic!("expected settings set");
        };
        assert_eq!(args.ids.as_deref(), Some("111,abc"));
        assert_eq!(args.auto_rotate, Some(true));
        assert_eq!(args.rotate_interval, Some(Duration::from_secs(600)));
        assert!(!args.is_empty());
    }

    #[test]
    fn run_flags_parse_without_subcommand() {
        let cli = Cli::try_parse_from(["toysaver", "--window", "--size", "800x600", "--refresh"])
            .unwrap();
        assert!(cli.command.is_none());
        assert!(cli.run.window);
        assert!(cli.run.refresh);
        assert_eq!(cli.run.size, (800, 600));
    }
}
