use super::capture::cmd_capture;
use super::classify::cmd_classify;
use super::env::CliArgs;
use super::replay::cmd_replay;
use super::rules::cmd_rules;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Capture(args) => cmd_capture(args, ctx).await,
        Commands::Replay(args) => cmd_replay(args, ctx).await,
        Commands::Classify(args) => cmd_classify(args, ctx).await,
        Commands::Rules => cmd_rules(ctx),
    }
}
