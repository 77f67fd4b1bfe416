use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // stdout belongs to the renderer; send logs to stderr (`2>feedback.log`).
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cfg = feedback_fractal::config::Config::parse();
    feedback_fractal::app::run(cfg)
}
