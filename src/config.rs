use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const WIDTH: usize = 500;
pub const HEIGHT: usize = 500;
pub const FRAME_MS: u64 = 30;
pub const WINDOW_NAME: &str = "Feedback Fractal";

/// Frame size, pacing and window title are fixed; only how the animation is
/// drawn can be chosen.
#[derive(Parser, Debug, Clone)]
#[command(name = "feedback-fractal", version, about = "Endless video-feedback fractal animation in the terminal")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = PatchKind::Layered)]
    pub patch: PatchKind,

    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,
}

/// Key-wait after every frame; doubles as the frame-rate cap.
pub fn frame_interval() -> Duration {
    Duration::from_millis(FRAME_MS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatchKind {
    #[value(alias = "layer", alias = "modulated")]
    Layered,
    #[value(alias = "legacy", alias = "winding")]
    Classic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(alias = "ansi", alias = "text")]
    Ascii,
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
}
