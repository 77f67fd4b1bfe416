use crate::config::{self, Config, HEIGHT, RendererMode, WIDTH, WINDOW_NAME};
use crate::display::{Display, TerminalDisplay};
use crate::engine::FeedbackEngine;
use crate::render::{AsciiRenderer, HalfBlockRenderer, Renderer};
use crate::warp::Patch;
use anyhow::Context;
use std::time::{Duration, Instant};

pub struct LoopOptions {
    pub window_name: String,
    /// Key-wait after every frame; also caps the frame rate.
    pub frame_interval: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames stepped and shown.
    pub frames: u64,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let seed = fastrand::u64(..);
    log::info!("seed={seed} patch={:?} size={WIDTH}x{HEIGHT}", cfg.patch);
    let mut rng = fastrand::Rng::with_seed(seed);

    let patch = Patch::from_kind(cfg.patch, WIDTH, HEIGHT, &mut rng);
    let mut engine = FeedbackEngine::new(WIDTH, HEIGHT, patch, &mut rng)
        .context("allocate frame buffers")?;

    let renderer: Box<dyn Renderer> = match cfg.renderer {
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Ascii => Box::new(AsciiRenderer::new()),
    };
    let mut display = TerminalDisplay::new(renderer, cfg.sync_updates);

    let opts = LoopOptions {
        window_name: WINDOW_NAME.to_string(),
        frame_interval: config::frame_interval(),
    };
    let stats = run_loop(&mut engine, &mut display, &opts)?;
    log::info!("quit after {} frames (counter={})", stats.frames, engine.counter());
    Ok(())
}

/// Step, show, then wait for a key, until a quit key arrives.
///
/// The key is only checked between frames, so a quit never interrupts a frame
/// and the returned count is the number of frames fully shown.
pub fn run_loop<D: Display + ?Sized>(
    engine: &mut FeedbackEngine,
    display: &mut D,
    opts: &LoopOptions,
) -> anyhow::Result<LoopStats> {
    display.create_window(&opts.window_name)?;
    let result = drive(engine, display, opts);
    let closed = display.destroy_all_windows();
    let stats = result?;
    closed?;
    Ok(stats)
}

fn drive<D: Display + ?Sized>(
    engine: &mut FeedbackEngine,
    display: &mut D,
    opts: &LoopOptions,
) -> anyhow::Result<LoopStats> {
    let mut stats = LoopStats { frames: 0 };
    let mut fps = FpsCounter::new();

    loop {
        let frame_start = Instant::now();
        engine.step();
        let step_ms = frame_start.elapsed().as_secs_f32() * 1000.0;

        display.set_status(&status_line(engine, fps.fps(), step_ms));
        display.show(&opts.window_name, engine.render())?;
        stats.frames += 1;
        fps.tick();

        if let Some(key) = display.poll_key(opts.frame_interval)? {
            log::debug!("key {key:?} after frame {}", stats.frames);
            if key.is_quit() {
                return Ok(stats);
            }
        }
    }
}

fn status_line(engine: &FeedbackEngine, fps: f32, step_ms: f32) -> String {
    format!(
        "{} | frame {} | t {:.0} | zoom {:.3} | {:.1} fps | step {:.1} ms | q quit",
        engine.patch_name(),
        engine.frames(),
        engine.counter(),
        engine.last_zoom(),
        fps,
        step_ms,
    )
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = (self.frames as f32) / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
