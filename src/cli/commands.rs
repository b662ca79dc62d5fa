use clap::Subcommand;

use super::capture::CaptureArgs;
use super::classify::ClassifyArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Walk the checkout flow in a live browser and classify the captured traffic
    Capture(CaptureArgs),

    /// Classify network logs recorded earlier, one file per phase
    Replay(ReplayArgs),

    /// Re-classify a capture dump with the current rules
    Classify(ClassifyArgs),

    /// Show the effective action rules
    Rules,
}
