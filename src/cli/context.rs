use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use checkout_probe::ProbeConfig;
use network_tap::RuleTable;

use super::output::OutputFormat;

pub struct CliContext {
    config: ProbeConfig,
    config_path: PathBuf,
    rules: RuleTable,
    output: OutputFormat,
}

impl CliContext {
    /// Compiles the rule table up front so a bad pattern fails before any browser work.
    pub fn new(config: ProbeConfig, config_path: PathBuf, output: OutputFormat) -> Result<Self> {
        let rules = config
            .rule_table()
            .with_context(|| format!("Invalid action rules in {}", config_path.display()))?;
        Ok(Self {
            config,
            config_path,
            rules,
            output,
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }
}
