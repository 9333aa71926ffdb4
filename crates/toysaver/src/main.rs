mod cli;
mod fetch;
mod paths;
mod run;

use anyhow::Result;
use cli::{Command, SetArgs, SettingsAction};
use paths::AppPaths;
use settings::Settings;
use shadertoy::{join_identifiers, parse_identifiers};

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Fetch(args)) => fetch::run_fetch(&AppPaths::discover()?, args),
        Some(Command::Settings(settings_cmd)) => handle_settings_command(settings_cmd.action),
        Some(Command::Where) => run_where(&AppPaths::discover()?),
        None => run::run(cli.run),
    }
}

fn handle_settings_command(action: SettingsAction) -> Result<()> {
    let paths = AppPaths::discover()?;
    match action {
        SettingsAction::Show => run_settings_show(&paths),
        SettingsAction::Set(args) => run_settings_set(&paths, args),
    }
}

fn run_settings_show(paths: &AppPaths) -> Result<()> {
    let settings = Settings::load_or_default(&paths.settings_file())?;
    let ids = settings.identifiers();
    println!("Settings file: {}", paths.settings_file().display());
    if ids.is_empty() {
        println!("  shader_ids       (none)");
    } else {
        println!("  shader_ids       {}", join_identifiers(&ids));
    }
    println!("  api_key          {}", settings.masked_api_key());
    println!("  separate_screens {}", settings.separate_screens);
    println!("  auto_rotate      {}", settings.auto_rotate);
    println!(
        "  rotate_interval  {}",
        humanize(settings.rotate_interval)
    );
    println!(
        "  frame_interval   {}",
        humanize(settings.frame_interval)
    );
    if settings.documents.is_empty() {
        println!("  cached shaders   (none)");
    } else {
        println!("  cached shaders   {}", settings.documents.len());
        for document in &settings.documents {
            println!("    {:<8} {}", document.id, document.label());
        }
    }
    Ok(())
}

fn run_settings_set(paths: &AppPaths, args: SetArgs) -> Result<()> {
    if args.is_empty() {
        println!("Nothing to change; see `toysaver settings set --help`.");
        return Ok(());
    }
    let settings_file = paths.settings_file();
    let mut settings = Settings::load_or_default(&settings_file)?;
    if let Some(raw) = &args.ids {
        settings.set_identifiers(&parse_identifiers(raw));
    }
    if let Some(key) = args.api_key {
        settings.api_key = key.trim().to_string();
    }
    if let Some(flag) = args.separate_screens {
        settings.separate_screens = flag;
    }
    if let Some(flag) = args.auto_rotate {
        settings.auto_rotate = flag;
    }
    if let Some(interval) = args.rotate_interval {
        settings.rotate_interval = interval;
    }
    if let Some(interval) = args.frame_interval {
        settings.frame_interval = interval;
    }
    settings.persist(&settings_file)?;
    println!("Saved {}", settings_file.display());
    Ok(())
}

fn run_where(paths: &AppPaths) -> Result<()> {
    println!("Config directory: {}", paths.config_dir().display());
    println!("Cache directory:  {}", paths.cache_dir().display());
    println!("Settings file:    {}", paths.settings_file().display());
    println!("Rejected sources: {}", paths.rejected_dir().display());
    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}
