use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use renderer::{NagaCompiler, Prelude, Rejection, ShaderValidator, ValidationOutcome};
use settings::Settings;
use shadertoy::{
    fetch_all, parse_identifiers, DocumentSource, ShaderDocument, ShaderId, ShadertoyClient,
    ShadertoyConfig,
};
use tracing::{info, warn};

use crate::cli::FetchArgs;
use crate::paths::AppPaths;

/// Fetched documents split by whether their bodies compile against the prelude.
#[derive(Debug, Default)]
pub struct Acceptance {
    pub accepted: Vec<ShaderDocument>,
    pub rejected: Vec<Rejection>,
}

pub fn accept_documents(documents: Vec<ShaderDocument>, prelude: &Prelude) -> Acceptance {
    let validator = ShaderValidator::new(&NagaCompiler, prelude);
    let mut acceptance = Acceptance::default();
    for document in documents {
        match validator.validate(&document) {
            ValidationOutcome::Valid(_) => acceptance.accepted.push(document),
            ValidationOutcome::Rejected(diagnostic) => {
                warn!(shader = %document.id, "{diagnostic}");
                acceptance.rejected.push(Rejection {
                    id: document.id,
                    diagnostic,
                });
            }
        }
    }
    acceptance
}

/// Writes the wrapped source of every rejected document so failures can be
/// reproduced with external tools.
pub fn dump_rejected(
    dir: &Path,
    documents: &[ShaderDocument],
    rejected: &[Rejection],
    prelude: &Prelude,
) -> Result<()> {
    if rejected.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for rejection in rejected {
        let Some(document) = documents.iter().find(|doc| doc.id == rejection.id) else {
            continue;
        };
        let path = dir.join(format!("{}.frag", rejection.id));
        let contents = format!(
            "// {}\n{}",
            rejection.diagnostic.to_string().replace('\n', "\n// "),
            prelude.wrap(document.code())
        );
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

pub fn build_client(api_key: &str) -> Result<ShadertoyClient> {
    ShadertoyClient::new(ShadertoyConfig::new(api_key)?)
}

pub fn run_fetch(paths: &AppPaths, args: FetchArgs) -> Result<()> {
    let settings = Settings::load_or_default(&paths.settings_file())?;

    let ids = match &args.ids {
        Some(raw) => parse_identifiers(raw),
        None => settings.identifiers(),
    };
    if ids.is_empty() {
        bail!("no shader ids configured; pass --ids or run `toysaver settings set --ids ...`");
    }
    let api_key = args
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| settings.api_key())
        .map(str::to_owned)
        .context("no Shadertoy API key; pass --api-key or set SHADERTOY_API_KEY")?;

    let client = build_client(&api_key)?;
    let options = FetchOptions {
        save_ids: args.ids.is_some(),
        strict: args.strict,
    };
    fetch_into(&client, paths, settings, &ids, options)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Store `ids` as the configured identifier list once the cache is saved.
    pub save_ids: bool,
    /// Save nothing when any document is rejected.
    pub strict: bool,
}

/// Fetches `ids` from `source`, validates them and saves the accepted
/// documents into `settings`. The settings file is only written once the whole
/// batch has been fetched and, in strict mode, every document has compiled.
pub fn fetch_into<S>(
    source: &S,
    paths: &AppPaths,
    mut settings: Settings,
    ids: &[ShaderId],
    options: FetchOptions,
) -> Result<Acceptance>
where
    S: DocumentSource + ?Sized,
{
    println!("Fetching {} shader(s)...", ids.len());
    let documents =
        fetch_all(source, ids).context("fetch aborted; cached shaders left unchanged")?;

    let prelude = Prelude::default();
    let acceptance = accept_documents(documents.clone(), &prelude);
    dump_rejected(&paths.rejected_dir(), &documents, &acceptance.rejected, &prelude)?;

    for document in &acceptance.accepted {
        println!("  ok       {:<8} {}", document.id, document.label());
    }
    for rejection in &acceptance.rejected {
        println!("  rejected {:<8} {}", rejection.id, rejection.diagnostic);
    }

    if options.strict && !acceptance.rejected.is_empty() {
        bail!(
            "{} shader(s) failed to compile; nothing saved (sources in {})",
            acceptance.rejected.len(),
            paths.rejected_dir().display()
        );
    }

    let settings_file = paths.settings_file();
    settings.replace_documents(acceptance.accepted.clone());
    if options.save_ids {
        settings.set_identifiers(ids);
    }
    settings.persist(&settings_file)?;
    info!(
        accepted = acceptance.accepted.len(),
        rejected = acceptance.rejected.len(),
        "shader cache updated"
    );
    println!(
        "Cached {} of {} shader(s) in {}",
        acceptance.accepted.len(),
        ids.len(),
        settings_file.display()
    );
    Ok(acceptance)
}
