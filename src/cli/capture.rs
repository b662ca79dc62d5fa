use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use cdp_adapter::{ChromiumTransport, NetworkRecorder};
use checkout_probe::{CaptureSession, PhaseDriver, PhaseStep, ProbeError, ProbeResult};
use clap::Args;
use network_tap::BodyFetcher;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use super::context::CliContext;
use super::output::{emit_report, write_dump};

#[derive(Args, Clone, Debug)]
pub struct CaptureArgs {
    /// Attach to a running browser's DevTools websocket instead of launching one
    #[arg(long, value_name = "WS_URL")]
    pub ws_url: Option<String>,

    /// Launch the browser headless (operator steps will not be visible)
    #[arg(long)]
    pub headless: bool,

    /// Where to write the capture dump (defaults to `dump_file` from config)
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,

    /// Product page to start from
    #[arg(long, value_name = "URL")]
    pub start_url: Option<String>,

    /// Skip the sign-in probe phase
    #[arg(long)]
    pub no_signin: bool,
}

/// Drives phases in a live tab: navigations go through DevTools, everything else is
/// handed to the operator at the terminal.
struct LiveDriver {
    recorder: Arc<NetworkRecorder>,
}

#[async_trait]
impl PhaseDriver for LiveDriver {
    async fn perform(&self, phase: &str, step: &PhaseStep) -> ProbeResult<()> {
        match step {
            PhaseStep::Navigate(url) => {
                self.recorder.navigate(url).await?;
                Ok(())
            }
            PhaseStep::Operator(prompt) => wait_for_operator(phase, prompt).await,
            PhaseStep::Observe => Ok(()),
        }
    }
}

async fn wait_for_operator(phase: &str, prompt: &str) -> ProbeResult<()> {
    let mut stderr = tokio::io::stderr();
    let message = format!("[{phase}] {prompt}, then press Enter to continue... ");
    stderr
        .write_all(message.as_bytes())
        .await
        .map_err(|err| ProbeError::io("write operator prompt", "<stderr>", err))?;
    let _ = stderr.flush().await;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|err| ProbeError::io("read operator input", "<stdin>", err))?;
    Ok(())
}

pub async fn cmd_capture(args: CaptureArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().clone();
    if let Some(url) = args.start_url {
        config.start_url = url;
    }
    if args.no_signin {
        config.signin_probe = false;
    }
    let plan = config.phase_plan()?;

    let mut cdp = config.cdp_config();
    if args.headless {
        cdp.headless = true;
    }
    if let Some(ws_url) = args.ws_url {
        cdp.websocket_url = Some(ws_url);
    }
    if cdp.headless && plan.iter().any(|(_, step)| matches!(step, PhaseStep::Operator(_))) {
        warn!("running headless; operator phases will only capture background traffic");
    }

    let transport = ChromiumTransport::connect(cdp)
        .await
        .context("Failed to start the browser session")?;
    let recorder = Arc::new(
        NetworkRecorder::attach(Arc::new(transport))
            .await
            .context("Failed to attach the network recorder")?,
    );
    let started = Utc::now();
    info!(phases = plan.len(), target_id = recorder.target_id(), "capture started");

    let driver = Arc::new(LiveDriver {
        recorder: recorder.clone(),
    });
    let mut session = CaptureSession::new(recorder.clone(), driver)
        .with_settle(Duration::from_millis(config.settle_ms));
    if let Err(err) = session.run(&plan).await {
        warn!(
            error = %err,
            captured = session.snapshots().len(),
            "capture stopped early; classifying the phases captured so far"
        );
    }

    info!(
        captured = session.snapshots().len(),
        elapsed_secs = (Utc::now() - started).num_seconds(),
        "capture finished"
    );

    let fetcher = BodyFetcher::new(recorder.clone());
    let report = session.classify(ctx.rules(), &fetcher).await;
    emit_report(&report, ctx.output(), config.max_body_chars)?;

    let dump_path = args.dump.unwrap_or(config.dump_file);
    write_dump(&session.dump(), &dump_path).await?;

    if let Err(err) = recorder.close().await {
        debug!(error = %err, "closing the observed tab failed");
    }
    Ok(())
}
