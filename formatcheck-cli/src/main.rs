use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use formatcheck_cli::telemetry;
use formatcheck_core::{Capabilities, CheckRequest, CheckerSettings, FormatChecker, PolicyName};

#[derive(Parser)]
#[command(name = "formatcheck")]
#[command(about = "Check academic submissions against formatting policies")]
struct Args {
    /// Directory of policy files (overrides POLICY_DIR)
    #[arg(long, global = true)]
    policy_dir: Option<PathBuf>,

    /// Policy cache lifetime in seconds (overrides POLICY_CACHE_TTL_SECONDS)
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Refuse to start unless every document format can be parsed
    #[arg(long, global = true)]
    strict_capabilities: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check one document and print the result as JSON
    Check {
        /// Path to the .docx or .pdf file
        #[arg(short, long)]
        input: PathBuf,

        /// Document type: synopsis, proposal, progress_report_1, progress_report_2, thesis, journal_article
        #[arg(short, long)]
        policy: String,

        /// Reported when the stored policy carries no version of its own
        #[arg(long, default_value = "v1.0")]
        policy_version: String,

        /// Media type of the upload, e.g. application/pdf
        #[arg(long)]
        media_type: Option<String>,

        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List known policies, the cache generation and parser capabilities
    Policies,
}

/// Readiness summary printed by `policies`
#[derive(Serialize)]
struct PolicyListing {
    policy_dir: String,
    fingerprint: String,
    policies: Vec<PolicyEntry>,
    capabilities: Capabilities,
}

#[derive(Serialize)]
struct PolicyEntry {
    name: &'static str,
    stored: bool,
    version: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = CheckerSettings::from_env()?;
    if let Some(dir) = &args.policy_dir {
        settings.policy_dir = dir.clone();
    }
    if let Some(seconds) = args.cache_ttl {
        settings.cache_ttl = Duration::from_secs(seconds);
    }

    telemetry::init(&settings.log_level)?;
    tracing::debug!(
        policy_dir = %settings.policy_dir.display(),
        cache_ttl_secs = settings.cache_ttl.as_secs(),
        "settings loaded"
    );

    let checker = FormatChecker::from_settings(&settings);
    let capabilities = checker.validate_capabilities(args.strict_capabilities)?;

    match args.command {
        Command::Check {
            input,
            policy,
            policy_version,
            media_type,
            output,
        } => run_check(&checker, &input, &policy, &policy_version, media_type.as_deref(), output.as_deref()),
        Command::Policies => list_policies(&checker, &settings, capabilities),
    }
}

fn run_check(
    checker: &FormatChecker,
    input: &Path,
    policy: &str,
    policy_version: &str,
    media_type: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut request = CheckRequest::new(bytes, &filename, policy, policy_version);
    if let Some(media_type) = media_type {
        request = request.with_media_type(media_type);
    }

    let result = checker.check(&request)?;
    let json = serde_json::to_string_pretty(&result)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(output = %path.display(), "result written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn list_policies(checker: &FormatChecker, settings: &CheckerSettings, capabilities: Capabilities) -> Result<()> {
    let snapshot = checker.policy_cache().get_now();
    let policies = PolicyName::ALL
        .iter()
        .map(|name| {
            let stored = snapshot.get(name.as_str());
            PolicyEntry {
                name: name.as_str(),
                stored: stored.is_some(),
                version: stored.and_then(|policy| policy.version.clone()),
            }
        })
        .collect();

    let listing = PolicyListing {
        policy_dir: settings.policy_dir.display().to_string(),
        fingerprint: snapshot.fingerprint.clone(),
        policies,
        capabilities,
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
