use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use network_tap::{classify, BodyFetcher, CaptureDump};
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use super::output::emit_report;

#[derive(Args, Clone, Debug)]
pub struct ClassifyArgs {
    /// Capture dump written by `capture` or `replay --dump`
    #[arg(value_name = "DUMP")]
    pub dump: PathBuf,
}

/// Response bodies are not part of a dump, so exemplars come back without one.
pub async fn cmd_classify(args: ClassifyArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.dump)
        .await
        .with_context(|| format!("Failed to read capture dump {}", args.dump.display()))?;
    let dump = CaptureDump::from_json(&raw)
        .with_context(|| format!("Failed to parse capture dump {}", args.dump.display()))?;
    info!(
        path = %args.dump.display(),
        phases = dump.phases().len(),
        created_at = %dump.created_at(),
        "capture dump loaded"
    );

    let report = classify(&dump.combined(), ctx.rules(), &BodyFetcher::offline()).await;
    emit_report(&report, ctx.output(), ctx.config().max_body_chars)
}
