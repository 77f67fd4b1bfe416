//! The per-frame feedback loop.
//!
//! Each [`FeedbackEngine::step`] warps the current frame once per entry in the
//! patch's warp graph, sums the copies, zooms, stretches contrast, tints with
//! the hue palette and mixes the result with history. The engine owns every
//! buffer it touches; callers only ever see a shared borrow of `current`.

use crate::raster::{
    ColorMap, Frame, FrameError, add_weighted, add_weighted_in_place, apply_color_map,
    normalize_min_max, rotation_matrix, warp_affine, warp_perspective,
};
use crate::warp::{Patch, WarpParams};
use fastrand::Rng;
use glam::DVec2;

/// Weight of the contrast-stretched frame against its palette tint.
pub const TONE_WEIGHT: f32 = 0.9;
pub const TINT_WEIGHT: f32 = 0.1;
/// Weight of the freshly coloured frame against history.
pub const FRAME_WEIGHT: f32 = 0.9;
pub const HISTORY_WEIGHT: f32 = 0.1;

pub struct FeedbackEngine {
    patch: Patch,
    palette: ColorMap,
    counter: f64,
    frames: u64,
    params: Vec<WarpParams>,
    zoom: f64,

    current: Frame,
    previous: Frame,
    // Scratch buffers, reused every step.
    warped: Frame,
    combined: Frame,
    zoomed: Frame,
    tint: Frame,
    colored: Frame,
}

impl FeedbackEngine {
    /// Engine seeded with per-pixel noise drawn from `rng`.
    pub fn new(width: usize, height: usize, patch: Patch, rng: &mut Rng) -> Result<Self, FrameError> {
        let current = Frame::noise(width, height, rng)?;
        Self::with_frame(current, patch)
    }

    /// Engine starting from an explicit first frame; `previous` starts black,
    /// so the first step blends against zero history.
    pub fn with_frame(current: Frame, patch: Patch) -> Result<Self, FrameError> {
        let blank = Frame::new(current.width(), current.height())?;
        log::info!(
            "feedback engine: patch={} size={}x{} warps={} counter_step={}",
            patch.name,
            current.width(),
            current.height(),
            patch.graph.len(),
            patch.counter_step
        );
        Ok(Self {
            palette: ColorMap::hsv(),
            counter: 0.0,
            frames: 0,
            params: Vec::with_capacity(patch.graph.len()),
            zoom: 1.0,
            patch,
            previous: blank.clone(),
            warped: blank.clone(),
            combined: blank.clone(),
            zoomed: blank.clone(),
            tint: blank.clone(),
            colored: blank,
            current,
        })
    }

    /// Advance one frame and return the new current frame.
    pub fn step(&mut self) -> &Frame {
        self.counter += self.patch.counter_step;
        let t = self.counter;

        self.patch.graph.evaluate_into(t, &mut self.params);
        self.combined.clear();
        for (i, params) in self.params.iter().enumerate() {
            if !params.is_finite() {
                log::debug!("warp {i} has non-finite parameters at t={t}: {params:?}");
            }
            let m = params.matrix();
            if i == 0 {
                warp_perspective(&self.current, &m, &mut self.combined);
            } else {
                warp_perspective(&self.current, &m, &mut self.warped);
                add_weighted_in_place(&mut self.combined, 1.0, &self.warped, 1.0, 0.0);
            }
        }

        self.zoom = self.patch.zoom.value(t);
        let center = DVec2::new(
            self.current.width() as f64 / 2.0,
            self.current.height() as f64 / 2.0,
        );
        let zoom = rotation_matrix(center, 0.0, self.zoom);
        warp_affine(&self.combined, &zoom, &mut self.zoomed);

        normalize_min_max(&mut self.zoomed, 0, 255);
        apply_color_map(&self.zoomed, &self.palette, &mut self.tint);
        add_weighted(
            &self.zoomed,
            TONE_WEIGHT,
            &self.tint,
            TINT_WEIGHT,
            0.0,
            &mut self.colored,
        );

        // `previous` holds the last output (black before the first step).
        add_weighted(
            &self.colored,
            FRAME_WEIGHT,
            &self.previous,
            HISTORY_WEIGHT,
            0.0,
            &mut self.current,
        );
        self.previous.clone_from(&self.current);

        self.frames += 1;
        log::trace!("frame {} t={t} zoom={:.4}", self.frames, self.zoom);
        &self.current
    }

    /// The most recent frame.
    pub fn render(&self) -> &Frame {
        &self.current
    }

    /// Copy of the last output frame, blended into the next one as history.
    pub fn previous(&self) -> &Frame {
        &self.previous
    }

    pub fn counter(&self) -> f64 {
        self.counter
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Warp parameters used by the last step.
    pub fn last_params(&self) -> &[WarpParams] {
        &self.params
    }

    pub fn last_zoom(&self) -> f64 {
        self.zoom
    }

    pub fn patch_name(&self) -> &'static str {
        self.patch.name
    }

    pub fn width(&self) -> usize {
        self.current.width()
    }

    pub fn height(&self) -> usize {
        self.current.height()
    }
}
