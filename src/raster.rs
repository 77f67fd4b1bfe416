//! RGB frame buffers and the pixel operations the feedback pipeline is built from.
//!
//! Pixels are stored row-major as three `u8` channels with no alpha. All
//! two-input operations expect frames of identical size and panic otherwise;
//! output frames are resized to match their input.

use fastrand::Rng;
use glam::{DAffine2, DMat3, DVec2, DVec3};
use thiserror::Error;

pub const CHANNELS: usize = 3;

/// Determinants below this are treated as a collapsed (singular) transform.
const SINGULAR_DET: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame must be at least 1x1 (got {width}x{height})")]
    Empty { width: usize, height: usize },
    #[error("frame is too large ({width}x{height})")]
    TooLarge { width: usize, height: usize },
    #[error("pixel data for {width}x{height} needs {expected} bytes, got {got}")]
    DataLength {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Black frame.
    pub fn new(width: usize, height: usize) -> Result<Self, FrameError> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Result<Self, FrameError> {
        let mut frame = Self::new(width, height)?;
        for px in frame.data.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&rgb);
        }
        Ok(frame)
    }

    /// Independent uniform noise for every channel of every pixel.
    pub fn noise(width: usize, height: usize, rng: &mut Rng) -> Result<Self, FrameError> {
        let mut frame = Self::new(width, height)?;
        for v in frame.data.iter_mut() {
            *v = rng.u8(..);
        }
        Ok(frame)
    }

    pub fn from_rgb(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::DataLength {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// # Panics
    /// If `(x, y)` is outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        match self.get(x, y) {
            Some(px) => px,
            None => panic!("pixel ({x}, {y}) outside {}x{} frame", self.width, self.height),
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * CHANNELS;
        self.data[i..i + CHANNELS].copy_from_slice(&rgb);
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(CHANNELS).map(|px| [px[0], px[1], px[2]])
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// `(min, max)` over every channel of every pixel.
    pub fn extents(&self) -> (u8, u8) {
        self.data
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Mean Rec.601 luminance, 0..=255.
    pub fn mean_luma(&self) -> f64 {
        let n = self.width * self.height;
        let total: u64 = self.pixels().map(|[r, g, b]| luma(r, g, b) as u64).sum();
        total as f64 / n as f64
    }

    fn match_size(&mut self, other: &Frame) {
        if !self.same_size(other) {
            self.width = other.width;
            self.height = other.height;
            self.data.resize(other.data.len(), 0);
        }
    }
}

fn byte_len(width: usize, height: usize) -> Result<usize, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Empty { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or(FrameError::TooLarge { width, height })
}

fn assert_same_size(a: &Frame, b: &Frame) {
    assert!(
        a.same_size(b),
        "frame size mismatch: {}x{} vs {}x{}",
        a.width,
        a.height,
        b.width,
        b.height
    );
}

/// Fixed-point Rec.601 luminance.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

#[inline]
fn saturate_u8(v: f32) -> u8 {
    // NaN casts to 0.
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

// ── Geometry ────────────────────────────────────────────────────────────────

/// 2x3 rotate-and-scale about `center`; positive angles (degrees) turn
/// counter-clockwise on screen, since y points down.
pub fn rotation_matrix(center: DVec2, angle_deg: f64, scale: f64) -> DAffine2 {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let alpha = scale * cos;
    let beta = scale * sin;
    let matrix2 = glam::DMat2::from_cols(DVec2::new(alpha, -beta), DVec2::new(beta, alpha));
    let translation = DVec2::new(
        (1.0 - alpha) * center.x - beta * center.y,
        beta * center.x + (1.0 - alpha) * center.y,
    );
    DAffine2::from_mat2_translation(matrix2, translation)
}

/// Lift a 2x3 affine into a 3x3 homogeneous matrix.
pub fn homogeneous(m: &DAffine2) -> DMat3 {
    DMat3::from_cols(
        m.matrix2.x_axis.extend(0.0),
        m.matrix2.y_axis.extend(0.0),
        m.translation.extend(1.0),
    )
}

/// Warp `src` through the forward map `m` (source pixel -> destination pixel).
///
/// Each destination pixel is inverse-mapped and sampled bilinearly; taps that
/// land outside the source read as black. A singular or non-finite `m` collapses
/// the whole source to a point, so the output is entirely black.
pub fn warp_perspective(src: &Frame, m: &DMat3, out: &mut Frame) {
    out.match_size(src);
    let det = m.determinant();
    if !m.is_finite() || !det.is_finite() || det.abs() < SINGULAR_DET {
        log::debug!("singular warp matrix (det={det}); emitting black frame");
        out.clear();
        return;
    }
    let inv = m.inverse();
    resample(src, out, |x, y| {
        let p = inv * DVec3::new(x, y, 1.0);
        if p.z.abs() < f64::EPSILON {
            return None;
        }
        Some(DVec2::new(p.x / p.z, p.y / p.z))
    });
}

/// Affine counterpart of [`warp_perspective`].
pub fn warp_affine(src: &Frame, m: &DAffine2, out: &mut Frame) {
    out.match_size(src);
    let det = m.matrix2.determinant();
    if !m.is_finite() || !det.is_finite() || det.abs() < SINGULAR_DET {
        log::debug!("singular affine matrix (det={det}); emitting black frame");
        out.clear();
        return;
    }
    let inv = m.inverse();
    resample(src, out, |x, y| Some(inv.transform_point2(DVec2::new(x, y))));
}

fn resample(src: &Frame, out: &mut Frame, map: impl Fn(f64, f64) -> Option<DVec2>) {
    let w = src.width;
    for y in 0..src.height {
        for x in 0..w {
            let rgb = match map(x as f64, y as f64) {
                Some(p) => sample_bilinear(src, p.x, p.y),
                None => [0; 3],
            };
            let i = (y * w + x) * CHANNELS;
            out.data[i..i + CHANNELS].copy_from_slice(&rgb);
        }
    }
}

fn sample_bilinear(src: &Frame, sx: f64, sy: f64) -> [u8; 3] {
    if !sx.is_finite() || !sy.is_finite() {
        return [0; 3];
    }
    let x0 = sx.floor();
    let y0 = sy.floor();
    // All four taps outside: skip the arithmetic.
    if x0 < -1.0 || y0 < -1.0 || x0 >= src.width as f64 || y0 >= src.height as f64 {
        return [0; 3];
    }
    let fx = (sx - x0) as f32;
    let fy = (sy - y0) as f32;
    let (x0, y0) = (x0 as isize, y0 as isize);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    let mut acc = [0f32; 3];
    for (tx, ty, wgt) in taps {
        if wgt == 0.0 || tx < 0 || ty < 0 {
            continue;
        }
        let Some(px) = src.get(tx as usize, ty as usize) else {
            continue;
        };
        for c in 0..CHANNELS {
            acc[c] += px[c] as f32 * wgt;
        }
    }
    [saturate_u8(acc[0]), saturate_u8(acc[1]), saturate_u8(acc[2])]
}

// ── Blending and tone ───────────────────────────────────────────────────────

/// `out = wa*a + wb*b + offset` per channel, rounded and saturated to 0..=255.
///
/// # Panics
/// If `a` and `b` differ in size.
pub fn add_weighted(a: &Frame, wa: f32, b: &Frame, wb: f32, offset: f32, out: &mut Frame) {
    assert_same_size(a, b);
    out.match_size(a);
    for ((o, &va), &vb) in out.data.iter_mut().zip(&a.data).zip(&b.data) {
        *o = saturate_u8(va as f32 * wa + vb as f32 * wb + offset);
    }
}

/// In-place form of [`add_weighted`] with `dst` as the first operand.
pub fn add_weighted_in_place(dst: &mut Frame, wd: f32, src: &Frame, ws: f32, offset: f32) {
    assert_same_size(dst, src);
    for (d, &s) in dst.data.iter_mut().zip(&src.data) {
        *d = saturate_u8(*d as f32 * wd + s as f32 * ws + offset);
    }
}

/// Stretch the frame's joint channel range onto `new_min..=new_max`.
///
/// One min/max pair is taken over all channels together. A flat frame has no
/// range to stretch and becomes uniformly `new_min`.
pub fn normalize_min_max(frame: &mut Frame, new_min: u8, new_max: u8) {
    let (lo, hi) = frame.extents();
    let (new_min, new_max) = (new_min as f32, new_max as f32);
    let scale = if hi > lo {
        (new_max - new_min) / (hi - lo) as f32
    } else {
        0.0
    };
    let shift = new_min - lo as f32 * scale;
    for v in frame.data.iter_mut() {
        *v = saturate_u8(*v as f32 * scale + shift);
    }
}

/// 256-entry intensity -> RGB lookup table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorMap {
    lut: [[u8; 3]; 256],
}

impl ColorMap {
    pub fn from_fn(f: impl Fn(u8) -> [u8; 3]) -> Self {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = f(i as u8);
        }
        Self { lut }
    }

    /// Fully saturated hue wheel: entry `i` has hue `i / 256`, so the table
    /// wraps from red back to (almost) red.
    pub fn hsv() -> Self {
        Self::from_fn(|i| hsv_to_rgb(i as f64 / 256.0, 1.0, 1.0))
    }

    pub fn lookup(&self, intensity: u8) -> [u8; 3] {
        self.lut[intensity as usize]
    }
}

/// Map each pixel's luminance through `map`.
pub fn apply_color_map(src: &Frame, map: &ColorMap, out: &mut Frame) {
    out.match_size(src);
    for (o, s) in out
        .data
        .chunks_exact_mut(CHANNELS)
        .zip(src.data.chunks_exact(CHANNELS))
    {
        o.copy_from_slice(&map.lookup(luma(s[0], s[1], s[2])));
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [u8; 3] {
    let h = (h - h.floor()) * 6.0;
    let i = h.floor() as i32;
    let f = h - i as f64;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [
        (r.clamp(0.0, 1.0) * 255.0).round() as u8,
        (g.clamp(0.0, 1.0) * 255.0).round() as u8,
        (b.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}
