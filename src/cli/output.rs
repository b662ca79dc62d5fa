use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use checkout_probe::render_report;
use network_tap::{ActionReport, CaptureDump};
use probe_privacy::apply_export;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Prints the report to stdout in the selected format.
pub fn emit_report(report: &ActionReport, format: OutputFormat, max_body_chars: usize) -> Result<()> {
    match format {
        OutputFormat::Human => print_stdout(&render_report(report, max_body_chars)),
        OutputFormat::Json | OutputFormat::Yaml => emit_structured(report, format),
    }
}

/// JSON or YAML view of any serializable payload, header-redacted before printing.
pub fn emit_structured<T: Serialize>(payload: &T, format: OutputFormat) -> Result<()> {
    let value = export_value(payload)?;
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(&value).context("Failed to encode YAML")?,
        OutputFormat::Json | OutputFormat::Human => {
            let mut text = serde_json::to_string_pretty(&value).context("Failed to encode JSON")?;
            text.push('\n');
            text
        }
    };
    print_stdout(&text)
}

/// Writes a capture dump as pretty JSON, creating parent directories as needed.
pub async fn write_dump(dump: &CaptureDump, path: &Path) -> Result<()> {
    let value = export_value(dump)?;
    let text = serde_json::to_string_pretty(&value).context("Failed to encode capture dump")?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write capture dump to {}", path.display()))?;
    info!(path = %path.display(), phases = dump.phases().len(), "capture dump written");
    Ok(())
}

fn export_value<T: Serialize>(payload: &T) -> Result<Value> {
    let mut value = serde_json::to_value(payload).context("Failed to serialize output")?;
    if value.is_object() || value.is_array() {
        let redaction = apply_export(&mut value)?;
        debug!(fields = redaction.fields.len(), "export redaction pass applied");
    }
    Ok(value)
}

fn print_stdout(text: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .and_then(|_| handle.flush())
        .context("Failed to write to stdout")
}
