use std::collections::BTreeMap;

use anyhow::Result;
use network_tap::ActionKind;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};

pub fn cmd_rules(ctx: &CliContext) -> Result<()> {
    let table: BTreeMap<ActionKind, Vec<&str>> = ctx
        .rules()
        .rules()
        .iter()
        .map(|rule| (rule.action(), rule.patterns().collect()))
        .collect();

    match ctx.output() {
        OutputFormat::Human => {
            println!("Action rules (first match wins, case-insensitive)");
            println!("config: {}", ctx.config_path().display());
            for (action, patterns) in &table {
                println!("\n{action}");
                for pattern in patterns {
                    println!("  {pattern}");
                }
            }
            Ok(())
        }
        format => emit_structured(&table, format),
    }
}
