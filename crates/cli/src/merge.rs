//! `parcelmerge merge` and `parcelmerge validate`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use parcelmerge_recon::config::fields;
use parcelmerge_recon::identity::{FixedClock, SequentialIds};
use parcelmerge_recon::model::DataQuality;
use parcelmerge_recon::{
    summarize, MergeInput, MergeResult, MergeSummary, RawRecord, ReconConfig, ReconError,
    Reconciler, SourceKind, SourceMeta,
};

use crate::exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_MERGE_CONFLICTS, EXIT_RUNTIME};
use crate::CliError;

#[derive(Args)]
pub struct MergeArgs {
    /// Address the records were fetched for (used when no source supplies one)
    #[arg(long)]
    pub address: String,

    /// Valuation-site record (JSON object)
    #[arg(long, value_name = "FILE")]
    pub valuation: Option<PathBuf>,

    /// Listing-site record (JSON object)
    #[arg(long, value_name = "FILE")]
    pub listing: Option<PathBuf>,

    /// County assessor record (JSON object)
    #[arg(long, value_name = "FILE")]
    pub assessor: Option<PathBuf>,

    /// Per-source fetch metadata: {"listing": {"confidence": 0.8, ...}, ...}
    #[arg(long, value_name = "FILE")]
    pub meta: Option<PathBuf>,

    /// Merge policy (.toml); built-in defaults when omitted
    #[arg(long, value_name = "FILE", env = "PARCELMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the JSON merge report to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the JSON merge report to a file
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit 3 when any field conflict was recorded
    #[arg(long)]
    pub fail_on_conflict: bool,

    /// Sequential ids and a fixed epoch timestamp, for reproducible output
    #[arg(long)]
    pub deterministic: bool,
}

/// JSON document written by `merge --json` / `--output`.
#[derive(Serialize)]
struct MergeReport<'a> {
    meta: ReportMeta<'a>,
    #[serde(flatten)]
    result: &'a MergeResult,
    summary: MergeSummary,
}

#[derive(Serialize)]
struct ReportMeta<'a> {
    policy: &'a str,
    resolution: String,
    engine_version: &'static str,
    run_at: DateTime<Utc>,
}

fn runtime_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_RUNTIME, message: msg.into(), hint: None }
}

fn config_err(err: ReconError) -> CliError {
    let hint = match &err {
        ReconError::UnknownField(_) => Some(format!("known fields: {}", fields::ALL.join(", "))),
        ReconError::UnknownSource(_) => Some("sources are: valuation, listing, assessor".to_string()),
        _ => None,
    };
    CliError { code: EXIT_INVALID_CONFIG, message: err.to_string(), hint }
}

fn read_file(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| runtime_err(format!("cannot read {what} {}: {e}", path.display())))
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        log::debug!("no policy file given; using built-in defaults");
        return Ok(ReconConfig::default());
    };
    let config_str = read_file(path, "config")?;
    ReconConfig::from_toml(&config_str).map_err(config_err)
}

fn load_input(args: &MergeArgs) -> Result<MergeInput, CliError> {
    let mut input = MergeInput::new(args.address.clone());

    let files = [
        (SourceKind::Valuation, &args.valuation),
        (SourceKind::Listing, &args.listing),
        (SourceKind::Assessor, &args.assessor),
    ];
    for (source, path) in files {
        let Some(path) = path else { continue };
        let json = read_file(path, &format!("{source} record"))?;
        let record = RawRecord::from_json_str(source, &json).map_err(|e| CliError {
            code: EXIT_RUNTIME,
            message: e.to_string(),
            hint: Some(format!("{} must contain one JSON object", path.display())),
        })?;
        log::debug!("loaded {source} record from {}", path.display());
        input = input.record(source, record);
    }

    if let Some(path) = &args.meta {
        let json = read_file(path, "metadata")?;
        let meta: BTreeMap<SourceKind, SourceMeta> = serde_json::from_str(&json)
            .map_err(|e| runtime_err(format!("cannot parse metadata {}: {e}", path.display())))?;
        for source in meta.keys() {
            if !input.records.contains_key(source) {
                log::warn!("metadata given for {source} but no {source} record was supplied");
            }
        }
        input.meta = meta;
    }

    Ok(input)
}

pub fn cmd_merge(args: MergeArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let input = load_input(&args)?;

    let reconciler = if args.deterministic {
        Reconciler::with_identity(
            config,
            SequentialIds::new("parcel"),
            FixedClock(DateTime::<Utc>::UNIX_EPOCH),
        )
    } else {
        Reconciler::new(config)
    };

    let result = reconciler.merge(&input);
    let summary = summarize(&result);

    if args.json || args.output.is_some() {
        let report = MergeReport {
            meta: ReportMeta {
                policy: &reconciler.config().name,
                resolution: reconciler.config().resolution.to_string(),
                engine_version: env!("CARGO_PKG_VERSION"),
                run_at: result.entity.created_at,
            },
            result: &result,
            summary: summary.clone(),
        };
        let json_str = serde_json::to_string_pretty(&report).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;

        if let Some(ref path) = args.output {
            std::fs::write(path, &json_str)
                .map_err(|e| runtime_err(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if args.json {
            println!("{json_str}");
        }
    }

    print_summary(&input.address, &result, &summary);

    if args.fail_on_conflict && !result.conflicts.is_empty() {
        return Err(CliError {
            code: EXIT_MERGE_CONFLICTS,
            message: format!("{} field conflict(s) recorded", result.conflicts.len()),
            hint: Some("rerun with --json to see the competing candidates".to_string()),
        });
    }

    Ok(())
}

/// Human summary to stderr.
fn print_summary(address: &str, result: &MergeResult, summary: &MergeSummary) {
    eprintln!(
        "merged '{}' from {} source(s): {} field(s) resolved, {} conflict(s), completeness {}% ({})",
        address,
        summary.sources_consulted,
        summary.resolved_fields,
        summary.conflicts,
        summary.completeness,
        match summary.data_quality {
            DataQuality::Scraped => "scraped",
            DataQuality::Estimated => "estimated",
        },
    );

    for conflict in &result.conflicts {
        let candidates: Vec<String> = conflict
            .candidates
            .iter()
            .map(|c| format!("{}={}", c.source, c.value))
            .collect();
        eprintln!(
            "  conflict {}: {} -> {}",
            conflict.field,
            candidates.join(", "),
            conflict.resolved
        );
    }

    if !summary.wins_by_source.is_empty() {
        let wins: Vec<String> = summary
            .wins_by_source
            .iter()
            .map(|(source, n)| format!("{source} {n}"))
            .collect();
        eprintln!("  fields won: {}", wins.join(", "));
    }

    if !summary.missing.is_empty() {
        eprintln!("  missing: {}", summary.missing.join(", "));
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&config_path))?;
    eprintln!(
        "valid: policy '{}' ({}), {} per-field priority list(s), {} source key override(s)",
        config.name,
        config.resolution,
        config.priority.field_orders().len(),
        config.sources.values().map(|s| s.fields.len()).sum::<usize>(),
    );
    Ok(())
}
