use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use checkout_probe::{CaptureSession, NullDriver, PhasePlan};
use clap::Args;
use network_tap::{unwrap_performance_log, BodyFetcher, RawLogEntry, ReplaySource};
use serde_json::Value;
use tokio::fs;
use tracing::info;

use super::context::CliContext;
use super::output::{emit_report, write_dump};

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Recorded phase as NAME=FILE; repeat in phase order
    #[arg(long = "phase", value_name = "NAME=FILE", required = true, value_parser = parse_phase)]
    pub phases: Vec<(String, PathBuf)>,

    /// Also write a capture dump of the replayed phases
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,
}

fn parse_phase(raw: &str) -> Result<(String, PathBuf), String> {
    let (name, file) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=FILE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() || file.trim().is_empty() {
        return Err(format!("expected NAME=FILE, got `{raw}`"));
    }
    Ok((name.to_string(), PathBuf::from(file.trim())))
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let mut batches = Vec::with_capacity(args.phases.len());
    for (name, path) in &args.phases {
        let entries = load_log(path).await?;
        info!(phase = %name, path = %path.display(), entries = entries.len(), "phase log loaded");
        batches.push(entries);
    }

    let plan = PhasePlan::observe_only(args.phases.iter().map(|(name, _)| name.clone()));
    plan.validate()?;

    let mut session = CaptureSession::new(Arc::new(ReplaySource::new(batches)), Arc::new(NullDriver));
    session.run(&plan).await?;

    let report = session.classify(ctx.rules(), &BodyFetcher::offline()).await;
    emit_report(&report, ctx.output(), ctx.config().max_body_chars)?;

    if let Some(dump_path) = args.dump {
        write_dump(&session.dump(), &dump_path).await?;
    }
    Ok(())
}

/// Reads one phase's log: a JSON array or JSON lines, each either a bare
/// `{method, params}` entry or a ChromeDriver performance-log line.
async fn load_log(path: &Path) -> Result<Vec<RawLogEntry>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read network log {}", path.display()))?;
    let trimmed = raw.trim_start();

    let lines: Vec<Value> = if trimmed.is_empty() {
        Vec::new()
    } else if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .with_context(|| format!("{} is not a JSON array", path.display()))?
    } else {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .map_err(|err| anyhow!("{}:{}: {err}", path.display(), idx + 1))
            })
            .collect::<Result<_>>()?
    };

    Ok(unwrap_performance_log(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_arguments_split_on_the_first_equals() {
        assert_eq!(
            parse_phase("cart=logs/cart=1.json"),
            Ok(("cart".to_string(), PathBuf::from("logs/cart=1.json")))
        );
        assert!(parse_phase("cart").is_err());
        assert!(parse_phase("=cart.json").is_err());
    }

    #[tokio::test]
    async fn logs_load_from_arrays_and_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let array = dir.path().join("pdp.json");
        fs::write(
            &array,
            r#"[{"method":"Network.requestWillBeSent","params":{"requestId":"1"}}]"#,
        )
        .await
        .unwrap();
        let lines = dir.path().join("cart.jsonl");
        fs::write(
            &lines,
            concat!(
                r#"{"message":"{\"message\":{\"method\":\"Network.responseReceived\",\"params\":{}}}"}"#,
                "\n\n",
                r#"{"level":"INFO"}"#,
                "\n"
            ),
        )
        .await
        .unwrap();

        assert_eq!(load_log(&array).await.unwrap().len(), 1);
        let entries = load_log(&lines).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method, "Network.responseReceived");
    }
}
