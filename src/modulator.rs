//! Time-driven scalar sources used to animate warp parameters.
//!
//! Every source is queried through [`Modulator::value`] once per frame with the
//! engine counter as `t`. Periodic sources are pure functions of `t`; [`Drift`]
//! carries a random walk that advances on every call, so calling it twice for
//! the same frame yields two different values. Composites forward to their
//! sources exactly once per call, in order.

use fastrand::Rng;

pub const DEFAULT_DRIFT_SPEED: f64 = 0.0001;
pub const DEFAULT_DRIFT_DAMPING: f64 = 0.999;

pub trait Modulator {
    fn value(&mut self, t: f64) -> f64;
}

/// A bare number is a constant source.
impl Modulator for f64 {
    fn value(&mut self, _t: f64) -> f64 {
        *self
    }
}

impl<M: Modulator + ?Sized> Modulator for Box<M> {
    fn value(&mut self, t: f64) -> f64 {
        (**self).value(t)
    }
}

/// `base + amplitude * cos(frequency * t + phase)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lfo {
    pub base: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
}

impl Lfo {
    pub fn new(base: f64, amplitude: f64, frequency: f64) -> Self {
        Self {
            base,
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    /// Period in counter units, or `None` for a zero frequency (constant output).
    pub fn period(&self) -> Option<f64> {
        (self.frequency != 0.0).then(|| std::f64::consts::TAU / self.frequency.abs())
    }
}

impl Modulator for Lfo {
    fn value(&mut self, t: f64) -> f64 {
        self.base + self.amplitude * (self.frequency * t + self.phase).cos()
    }
}

/// Damped random walk.
///
/// Each call does `state += uniform(-1, 1) * speed; state *= damping` and
/// returns `base + scale * state`. The walk is not clamped: with `damping < 1`
/// it settles around zero, with `damping >= 1` it is free to wander off.
#[derive(Clone, Debug)]
pub struct Drift {
    pub base: f64,
    pub speed: f64,
    pub scale: f64,
    pub damping: f64,
    state: f64,
    rng: Rng,
}

impl Drift {
    /// Starts the walk at a uniform random point in `[-1, 1)`.
    pub fn new(base: f64, scale: f64, mut rng: Rng) -> Self {
        let state = uniform(&mut rng);
        Self {
            base,
            speed: DEFAULT_DRIFT_SPEED,
            scale,
            damping: DEFAULT_DRIFT_DAMPING,
            state,
            rng,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn state(&self) -> f64 {
        self.state
    }
}

impl Modulator for Drift {
    fn value(&mut self, _t: f64) -> f64 {
        self.state += uniform(&mut self.rng) * self.speed;
        self.state *= self.damping;
        self.base + self.scale * self.state
    }
}

/// Linear ramp `rate * t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ramp {
    pub rate: f64,
}

impl Modulator for Ramp {
    fn value(&mut self, t: f64) -> f64 {
        self.rate * t
    }
}

/// Sum of all sources, no renormalisation. An empty sum is 0.
pub struct Sum {
    sources: Vec<Box<dyn Modulator>>,
}

impl Sum {
    pub fn new(sources: Vec<Box<dyn Modulator>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Modulator for Sum {
    fn value(&mut self, t: f64) -> f64 {
        self.sources.iter_mut().map(|s| s.value(t)).sum()
    }
}

/// Product of all sources. An empty product is 1.
pub struct Product {
    sources: Vec<Box<dyn Modulator>>,
}

impl Product {
    pub fn new(sources: Vec<Box<dyn Modulator>>) -> Self {
        Self { sources }
    }
}

impl Modulator for Product {
    fn value(&mut self, t: f64) -> f64 {
        self.sources.iter_mut().map(|s| s.value(t)).product()
    }
}

// Shorthands used when wiring patches.

pub fn constant(v: f64) -> Box<dyn Modulator> {
    Box::new(v)
}

pub fn lfo(base: f64, amplitude: f64, frequency: f64) -> Box<dyn Modulator> {
    Box::new(Lfo::new(base, amplitude, frequency))
}

/// Drift with default speed and damping, on a generator forked from `rng`.
pub fn drift(base: f64, scale: f64, rng: &mut Rng) -> Box<dyn Modulator> {
    Box::new(Drift::new(base, scale, rng.fork()))
}

pub fn ramp(rate: f64) -> Box<dyn Modulator> {
    Box::new(Ramp { rate })
}

pub fn sum(sources: Vec<Box<dyn Modulator>>) -> Box<dyn Modulator> {
    Box::new(Sum::new(sources))
}

pub fn product(sources: Vec<Box<dyn Modulator>>) -> Box<dyn Modulator> {
    Box::new(Product::new(sources))
}

fn uniform(rng: &mut Rng) -> f64 {
    rng.f64() * 2.0 - 1.0
}
