use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Serialized graph variants exported next to the descriptor files.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    #[default]
    #[value(name = "frozen_nchw")]
    FrozenNchw,
    #[value(name = "frozen_nhwc")]
    FrozenNhwc,
    #[value(name = "optimized")]
    Optimized,
    #[value(name = "quantized")]
    Quantized,
}

impl ModelVariant {
    pub const fn stem(self) -> &'static str {
        match self {
            Self::FrozenNchw => "frozen_nchw",
            Self::FrozenNhwc => "frozen_nhwc",
            Self::Optimized => "optimized",
            Self::Quantized => "quantized",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.pb", self.stem())
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Video to infer. Empty means webcam, which is not implemented.
    #[arg(short, long, default_value = "")]
    pub video: String,

    /// Directory to log output of predictions. Wiped on every run.
    #[arg(short, long, default_value = "/tmp/pb_predictions/")]
    pub log: PathBuf,

    /// Directory holding data/net/train/nodes.yaml and the frozen graphs.
    #[arg(short, long)]
    pub path: PathBuf,

    /// Type of model to load.
    #[arg(short, long, value_enum, default_value_t = ModelVariant::default())]
    pub model: ModelVariant,

    /// Verbose mode.
    #[arg(long)]
    pub verbose: bool,

    /// Do not open a preview window.
    #[arg(long)]
    pub headless: bool,

    /// Skip the graph optimizer pass when building the execution plan.
    #[arg(long)]
    pub no_optimize: bool,
}

impl Config {
    /// `None` when the webcam was requested.
    pub fn video_path(&self) -> Option<PathBuf> {
        let trimmed = self.video.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}
