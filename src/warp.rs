use crate::config::PatchKind;
use crate::modulator::{Modulator, constant, drift, lfo, product, ramp, sum};
use crate::raster::{homogeneous, rotation_matrix};
use fastrand::Rng;
use glam::{DMat3, DVec2};

/// Concrete parameters of one warp for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WarpParams {
    pub cx: f64,
    pub cy: f64,
    /// Degrees.
    pub angle: f64,
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl WarpParams {
    pub fn identity(width: usize, height: usize) -> Self {
        Self {
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            angle: 0.0,
            scale: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `Translate(tx, ty) * RotateScale(cx, cy, angle, scale)`.
    pub fn matrix(&self) -> DMat3 {
        let rot = rotation_matrix(DVec2::new(self.cx, self.cy), self.angle, self.scale);
        DMat3::from_translation(DVec2::new(self.tx, self.ty)) * homogeneous(&rot)
    }

    pub fn is_finite(&self) -> bool {
        [self.cx, self.cy, self.angle, self.scale, self.tx, self.ty]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Six modulators that together animate one warp.
pub struct WarpSpec {
    pub cx: Box<dyn Modulator>,
    pub cy: Box<dyn Modulator>,
    pub angle: Box<dyn Modulator>,
    pub scale: Box<dyn Modulator>,
    pub tx: Box<dyn Modulator>,
    pub ty: Box<dyn Modulator>,
}

impl WarpSpec {
    pub fn new(
        cx: Box<dyn Modulator>,
        cy: Box<dyn Modulator>,
        angle: Box<dyn Modulator>,
        scale: Box<dyn Modulator>,
        tx: Box<dyn Modulator>,
        ty: Box<dyn Modulator>,
    ) -> Self {
        Self {
            cx,
            cy,
            angle,
            scale,
            tx,
            ty,
        }
    }

    /// A warp that never moves.
    pub fn fixed(p: WarpParams) -> Self {
        Self::new(
            constant(p.cx),
            constant(p.cy),
            constant(p.angle),
            constant(p.scale),
            constant(p.tx),
            constant(p.ty),
        )
    }

    /// Queries each modulator exactly once, in field order. Drift sources
    /// advance on every call, so call this once per frame.
    pub fn evaluate(&mut self, t: f64) -> WarpParams {
        WarpParams {
            cx: self.cx.value(t),
            cy: self.cy.value(t),
            angle: self.angle.value(t),
            scale: self.scale.value(t),
            tx: self.tx.value(t),
            ty: self.ty.value(t),
        }
    }
}

/// The set of warps applied to the current frame each step.
#[derive(Default)]
pub struct WarpGraph {
    specs: Vec<WarpSpec>,
}

impl WarpGraph {
    pub fn new(specs: Vec<WarpSpec>) -> Self {
        Self { specs }
    }

    pub fn push(&mut self, spec: WarpSpec) {
        self.specs.push(spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Evaluates every spec once, in order, replacing the contents of `out`.
    pub fn evaluate_into(&mut self, t: f64, out: &mut Vec<WarpParams>) {
        out.clear();
        out.extend(self.specs.iter_mut().map(|s| s.evaluate(t)));
    }

    pub fn evaluate(&mut self, t: f64) -> Vec<WarpParams> {
        let mut out = Vec::with_capacity(self.specs.len());
        self.evaluate_into(t, &mut out);
        out
    }
}

/// Everything time-varying about a feedback setup: the warp graph, the zoom
/// pulse and how far the counter moves per frame.
pub struct Patch {
    pub name: &'static str,
    pub graph: WarpGraph,
    pub zoom: Box<dyn Modulator>,
    pub counter_step: f64,
}

impl Patch {
    pub fn from_kind(kind: PatchKind, width: usize, height: usize, rng: &mut Rng) -> Self {
        match kind {
            PatchKind::Layered => Self::layered(width, height, rng),
            PatchKind::Classic => Self::classic(width, height),
        }
    }

    /// Three warps mixing LFOs with slow drift on centre and scale.
    pub fn layered(width: usize, height: usize, rng: &mut Rng) -> Self {
        let w = width as f64;
        let h = height as f64;

        let graph = WarpGraph::new(vec![
            WarpSpec::new(
                sum(vec![lfo(w / 2.0, 20.0, 0.001), drift(0.0, 5.0, rng)]),
                sum(vec![lfo(h / 2.0, 20.0, 0.0015), drift(0.0, 5.0, rng)]),
                lfo(0.0, 180.0, 0.002),
                sum(vec![lfo(0.7, 0.2, 0.001), drift(0.0, 0.05, rng)]),
                lfo(0.0, w * 0.3, 0.0007),
                lfo(0.0, h * 0.2, 0.0009),
            ),
            WarpSpec::new(
                lfo(w / 2.0, 30.0, 0.0007),
                lfo(h / 2.0, 30.0, 0.0009),
                lfo(90.0, 90.0, 0.0013),
                sum(vec![lfo(0.5, 0.2, 0.0008), drift(0.0, 0.08, rng)]),
                lfo(0.0, -w * 0.4, 0.001),
                lfo(0.0, -h * 0.15, 0.0011),
            ),
            WarpSpec::new(
                lfo(w / 2.0, 40.0, 0.0005),
                lfo(h / 2.0, 40.0, 0.0006),
                lfo(30.0, 60.0, 0.002),
                lfo(0.3, 0.15, 0.001),
                lfo(0.0, -w * 0.5, 0.0006),
                lfo(0.0, -h * 0.4, 0.0007),
            ),
        ]);

        Self {
            name: "layered",
            graph,
            zoom: lfo(1.1, 0.1, 0.002),
            counter_step: 10.0,
        }
    }

    /// Single-LFO warps whose rotation keeps winding up with time and whose
    /// scales swing through zero.
    pub fn classic(width: usize, height: usize) -> Self {
        let w = width as f64;
        let h = height as f64;
        // Rotation winds up 2 degrees per counter unit, swung by cos(freq * t).
        let winding = |offset: f64, freq: f64| {
            sum(vec![
                constant(offset),
                product(vec![ramp(2.0), lfo(0.0, 1.0, freq)]),
            ])
        };

        let graph = WarpGraph::new(vec![
            WarpSpec::new(
                lfo(w / 2.0, 20.0, 0.001),
                lfo(h / 2.0, 20.0, 0.0001),
                winding(0.0, 0.001),
                lfo(0.0, 0.8, 0.001),
                lfo(0.0, w * 0.3, 0.001),
                lfo(0.0, h * 0.2, 0.0003),
            ),
            WarpSpec::new(
                lfo(w / 2.0, 20.0, 0.015),
                lfo(h / 2.0, 20.0, 0.0001),
                winding(125.0, 0.0001),
                lfo(0.0, 0.6, 0.0001),
                lfo(0.0, -w * 0.4, 0.015),
                lfo(0.0, -h * 0.1, 0.0003),
            ),
            WarpSpec::new(
                lfo(w / 2.0, 20.0, 0.0001),
                lfo(h / 2.0, 20.0, 0.0003),
                winding(25.0, 0.0003),
                lfo(0.0, 0.3, 0.015),
                lfo(0.0, -w * 0.5, 0.015),
                lfo(0.0, -h * 0.4, 0.0003),
            ),
        ]);

        Self {
            name: "classic",
            graph,
            zoom: lfo(1.2, 0.2, 0.015),
            counter_step: 1.0,
        }
    }

    /// One fixed warp and a fixed zoom; mostly useful for tests and calibration.
    pub fn still(params: WarpParams, zoom: f64, counter_step: f64) -> Self {
        Self {
            name: "still",
            graph: WarpGraph::new(vec![WarpSpec::fixed(params)]),
            zoom: constant(zoom),
            counter_step,
        }
    }
}
