use anyhow::{Context, Result};
use renderer::{Prelude, Renderer, RendererConfig, RendererHandle, WindowMode};
use rotation::{AssignmentMode, RotationPolicy};
use std::path::Path;

use settings::{Settings, SettingsError};
use shadertoy::{spawn_fetch, ShaderDocument};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::fetch::{accept_documents, build_client, dump_rejected};
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = Settings::load_or_default(&paths.settings_file())?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        cache = %paths.cache_dir().display(),
        shaders = settings.documents.len(),
        "resolved toysaver paths"
    );

    let policy = rotation_policy(&settings, &args);
    let mode = if args.window {
        let (width, height) = args.size;
        WindowMode::Preview { width, height }
    } else {
        WindowMode::Fullscreen
    };
    if settings.documents.is_empty() {
        tracing::info!("no cached shaders; showing the bundled fallback");
    }

    let config = RendererConfig {
        documents: settings.documents.clone(),
        policy,
        mode,
        prelude: Prelude::default(),
    };
    tracing::info!(?policy, ?mode, "starting toysaver");
    let renderer = Renderer::new(config)?;

    if args.refresh {
        spawn_refresh(&paths, settings, args.api_key.as_deref(), renderer.handle())?;
    }

    renderer.run()
}

pub fn rotation_policy(settings: &Settings, args: &RunArgs) -> RotationPolicy {
    RotationPolicy {
        mode: AssignmentMode::from_separate_screens(
            args.separate_screens.unwrap_or(settings.separate_screens),
        ),
        auto_rotate: args.auto_rotate.unwrap_or(settings.auto_rotate),
        rotate_interval: settings.rotate_interval,
        frame_interval: settings.frame_interval,
    }
}

/// Re-fetches the configured shaders off the event loop thread. A failed
/// batch leaves both the running set and the saved cache untouched.
fn spawn_refresh(
    paths: &AppPaths,
    settings: Settings,
    api_key: Option<&str>,
    handle: RendererHandle,
) -> Result<()> {
    let ids = settings.identifiers();
    let api_key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| settings.api_key())
        .map(str::to_owned);
    let Some(api_key) = api_key else {
        tracing::warn!("--refresh needs a Shadertoy API key; rendering cached shaders only");
        return Ok(());
    };
    if ids.is_empty() {
        tracing::warn!("--refresh with no shader ids configured; rendering cached shaders only");
        return Ok(());
    }

    let client = build_client(&api_key)?;
    let settings_file = paths.settings_file();
    let rejected_dir = paths.rejected_dir();
    spawn_fetch(client, ids, move |result| {
        let documents = match result {
            Ok(documents) => documents,
            Err(err) => {
                if handle.report_refresh_failure(err.to_string()).is_err() {
                    tracing::debug!("renderer exited before refresh completed");
                }
                return;
            }
        };

        let prelude = Prelude::default();
        let acceptance = accept_documents(documents.clone(), &prelude);
        if let Err(err) = dump_rejected(&rejected_dir, &documents, &acceptance.rejected, &prelude)
        {
            tracing::warn!("failed to save rejected shader sources: {err:#}");
        }

        if let Err(err) = save_refreshed(&settings_file, acceptance.accepted.clone()) {
            tracing::error!("failed to save refreshed shaders: {err}");
        }
        if handle.replace_documents(acceptance.accepted).is_err() {
            tracing::debug!("renderer exited before refresh completed");
        }
    })
    .context("failed to start shader refresh thread")?;
    Ok(())
}

/// Stores refreshed documents into the settings as they are on disk now, so
/// edits made while rendering are kept.
pub fn save_refreshed(
    settings_file: &Path,
    documents: Vec<ShaderDocument>,
) -> Result<(), SettingsError> {
    let mut settings = Settings::load_or_default(settings_file)?;
    settings.replace_documents(documents);
    settings.persist(settings_file)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn policy_follows_settings_without_overrides() {
        let settings = Settings {
            separate_screens: true,
            auto_rotate: true,
            rotate_interval: Duration::from_secs(60),
            ..Settings::default()
        };
        let policy = rotation_policy(&settings, &RunArgs::default());
        assert_eq!(policy.mode, AssignmentMode::Separate);
        assert!(policy.auto_rotate);
        assert_eq!(policy.rotate_interval, Duration::from_secs(60));
        assert_eq!(policy.frame_interval, settings.frame_interval);
    }

    #[test]
    fn command_line_overrides_win() {
        let settings = Settings {
            separate_screens: true,
            auto_rotate: true,
            ..Settings::default()
        };
        let args = RunArgs {
            separate_screens: Some(false),
            auto_rotate: Some(false),
            ..RunArgs::default()
        };
        let policy = rotation_policy(&settings, &args);
        assert_eq!(policy.mode, AssignmentMode::Unified);
        assert!(!policy.auto_rotate);
    }

    #[test]
    fn refresh_save_keeps_settings_changed_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let settings_file = dir.path().join("settings.toml");
        let mut startup = Settings::default();
        startup.set_identifiers(&["111".to_string()]);
        startup.persist(&settings_file).unwrap();

        let mut edited = startup.clone();
        edited.auto_rotate = true;
        edited.api_key = "newkey".into();
        edited.persist(&settings_file).unwrap();

        save_refreshed(
            &settings_file,
            vec![ShaderDocument::from_source("111", "void mainImage(out vec4 c, in vec2 f) {}")],
        )
        .unwrap();

        let saved = Settings::load_or_default(&settings_file).unwrap();
        assert!(saved.auto_rotate);
        assert_eq!(saved.api_key, "newkey");
        assert_eq!(saved.documents.len(), 1);
        assert_eq!(saved.documents[0].id, "111");
    }
}
