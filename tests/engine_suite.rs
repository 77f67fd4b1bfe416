use std::cell::RefCell;
use std::rc::Rc;

use fastrand::Rng;
use feedback_fractal::engine::{
    FRAME_WEIGHT, FeedbackEngine, HISTORY_WEIGHT, TINT_WEIGHT, TONE_WEIGHT,
};
use feedback_fractal::modulator::Modulator;
use feedback_fractal::raster::{
    ColorMap, Frame, add_weighted, add_weighted_in_place, apply_color_map, normalize_min_max,
    rotation_matrix, warp_affine, warp_perspective,
};
use feedback_fractal::warp::{Patch, WarpGraph, WarpParams, WarpSpec};
use glam::DVec2;

fn still(width: usize, height: usize) -> Patch {
    Patch::still(WarpParams::identity(width, height), 1.0, 1.0)
}

/// One frame of the pipeline spelled out with raster primitives.
fn reference_step(input: &Frame, history: &Frame, params: &[WarpParams], zoom: f64) -> Frame {
    let (w, h) = (input.width(), input.height());
    let mut combined = Frame::new(w, h).unwrap();
    let mut warped = Frame::new(w, h).unwrap();
    for (i, p) in params.iter().enumerate() {
        if i == 0 {
            warp_perspective(input, &p.matrix(), &mut combined);
        } else {
            warp_perspective(input, &p.matrix(), &mut warped);
            add_weighted_in_place(&mut combined, 1.0, &warped, 1.0, 0.0);
        }
    }

    let mut zoomed = Frame::new(w, h).unwrap();
    let center = DVec2::new(w as f64 / 2.0, h as f64 / 2.0);
    warp_affine(&combined, &rotation_matrix(center, 0.0, zoom), &mut zoomed);
    normalize_min_max(&mut zoomed, 0, 255);

    let mut tint = Frame::new(w, h).unwrap();
    apply_color_map(&zoomed, &ColorMap::hsv(), &mut tint);
    let mut colored = Frame::new(w, h).unwrap();
    add_weighted(&zoomed, TONE_WEIGHT, &tint, TINT_WEIGHT, 0.0, &mut colored);

    let mut out = Frame::new(w, h).unwrap();
    add_weighted(&colored, FRAME_WEIGHT, history, HISTORY_WEIGHT, 0.0, &mut out);
    out
}

#[test]
fn single_white_pixel_first_frame() {
    let mut start = Frame::new(4, 4).unwrap();
    start.set_pixel(1, 1, [255, 255, 255]);
    let mut engine = FeedbackEngine::with_frame(start.clone(), still(4, 4)).unwrap();

    let out = engine.step().clone();
    for y in 0..4 {
        for x in 0..4 {
            let expected = if (x, y) == (1, 1) {
                // 0.9 * 255 lands exactly on 229.5 in f32 and rounds to even.
                [230, 207, 207]
            } else {
                // Black tints to pure red: 0.1 * 255 -> 26, then 0.9 * 26 -> 23.
                [23, 0, 0]
            };
            assert_eq!(out.pixel(x, y), expected, "pixel ({x}, {y})");
        }
    }
    assert_eq!(engine.previous(), &out);
}

#[test]
fn seeded_noise_first_two_frames() {
    let start = Frame::noise(4, 4, &mut Rng::with_seed(2024)).unwrap();
    #[rustfmt::skip]
    let noise: [u8; 48] = [
        201, 251, 204, 102, 71, 107, 27, 228, 50, 211, 48, 93,
        35, 219, 239, 76, 32, 235, 107, 24, 40, 57, 133, 72,
        87, 31, 112, 46, 124, 38, 59, 161, 81, 143, 159, 81,
        116, 51, 207, 236, 23, 42, 68, 158, 74, 217, 23, 82,
    ];
    assert_eq!(start.as_bytes(), &noise[..]);

    let mut engine = FeedbackEngine::with_frame(start, still(4, 4)).unwrap();

    // Stretch 23..=251 to 0..=255, tint 0.9/0.1, blend 0.9/0.1 with black.
    #[rustfmt::skip]
    let first: [[u8; 3]; 16] = [
        [184, 207, 176], [80, 67, 76], [4, 202, 47], [170, 46, 65],
        [11, 183, 219], [67, 31, 192], [99, 17, 15], [31, 122, 47],
        [81, 28, 81], [26, 114, 14], [32, 148, 66], [109, 141, 76],
        [91, 48, 166], [199, 23, 17], [40, 145, 59], [183, 23, 53],
    ];
    let out = engine.step().clone();
    assert_eq!(out.pixels().collect::<Vec<_>>(), first.to_vec());

    // Second frame blends with the first output, not the noise it came from.
    #[rustfmt::skip]
    let second: [[u8; 3]; 16] = [
        [214, 216, 198], [84, 90, 76], [0, 224, 69], [176, 68, 70],
        [7, 198, 251], [77, 52, 200], [123, 37, 12], [29, 149, 52],
        [99, 49, 82], [24, 139, 11], [30, 176, 85], [112, 161, 99],
        [94, 70, 172], [208, 44, 14], [39, 173, 76], [191, 44, 52],
    ];
    let out = engine.step().clone();
    assert_eq!(out.pixels().collect::<Vec<_>>(), second.to_vec());
}

#[test]
fn seeded_engine_matches_reference_pipeline() {
    let (w, h) = (16, 12);
    let mut rng = Rng::with_seed(2024);
    let patch = Patch::layered(w, h, &mut rng);
    let mut engine = FeedbackEngine::new(w, h, patch, &mut rng).unwrap();

    // History is the last output: black before the first step.
    let mut last = engine.render().clone();
    let mut history = Frame::new(w, h).unwrap();
    for step in 1..=6 {
        engine.step();
        let expected = reference_step(&last, &history, engine.last_params(), engine.last_zoom());
        assert_eq!(engine.render(), &expected, "step {step}");

        last = engine.render().clone();
        history = last.clone();
    }
}

#[test]
fn previous_is_an_independent_copy_of_the_last_output() {
    let mut rng = Rng::with_seed(31);
    let patch = Patch::layered(12, 9, &mut rng);
    let mut engine = FeedbackEngine::new(12, 9, patch, &mut rng).unwrap();
    assert!(engine.previous().pixels().all(|px| px == [0, 0, 0]));

    for _ in 0..4 {
        let out = engine.step().clone();
        assert_eq!(engine.previous(), &out);
    }

    // Stepping again rewrites `current`; the saved copy must not move with it.
    let saved = engine.previous().clone();
    let next = engine.step().clone();
    assert_ne!(next, saved);
    assert_ne!(engine.render(), &saved);
}

#[test]
fn degenerate_scale_settles_to_uniform_red() {
    let mut params = WarpParams::identity(6, 6);
    params.scale = 0.0;
    let patch = Patch::still(params, 1.0, 1.0);
    let start = Frame::noise(6, 6, &mut Rng::with_seed(3)).unwrap();
    let mut engine = FeedbackEngine::with_frame(start, patch).unwrap();

    let first = engine.step().clone();
    assert!(first.pixels().all(|px| px == [23, 0, 0]));

    // 0.9 * 26 + 0.1 * 23 = 25.7, then a fixed point at 26.
    for _ in 0..5 {
        let f = engine.step();
        assert!(f.pixels().all(|px| px == [26, 0, 0]));
    }
}

#[test]
fn history_is_the_previous_output_not_the_start_frame() {
    // With every warp collapsed, step 1 forgets the start frame entirely, so
    // two engines with different starts must agree from then on.
    let collapsed = || {
        let mut params = WarpParams::identity(5, 5);
        params.scale = 0.0;
        Patch::still(params, 1.0, 1.0)
    };
    let mut a = FeedbackEngine::new(5, 5, collapsed(), &mut Rng::with_seed(1)).unwrap();
    let mut b = FeedbackEngine::new(5, 5, collapsed(), &mut Rng::with_seed(2)).unwrap();
    assert_ne!(a.render(), b.render());

    for step in 1..=4 {
        let fa = a.step().clone();
        let fb = b.step().clone();
        assert_eq!(fa, fb, "step {step}");
    }
}

#[test]
fn each_output_mixes_a_tenth_of_the_one_before() {
    // Collapsed warps give a black frame, which tints to pure red: colored is
    // [26, 0, 0] every frame, so output(n) = 0.9 * colored + 0.1 * output(n - 1).
    let start = Frame::filled(3, 3, [77, 77, 77]).unwrap();
    let mut params = WarpParams::identity(3, 3);
    params.scale = 0.0;
    let mut engine = FeedbackEngine::with_frame(start, Patch::still(params, 1.0, 1.0)).unwrap();

    let mut last = Frame::new(3, 3).unwrap();
    let colored = Frame::filled(3, 3, [26, 0, 0]).unwrap();
    for step in 1..=5 {
        let mut expected = Frame::new(3, 3).unwrap();
        add_weighted(&colored, FRAME_WEIGHT, &last, HISTORY_WEIGHT, 0.0, &mut expected);
        let out = engine.step();
        assert_eq!(out, &expected, "step {step}");
        last = out.clone();
    }
}

#[test]
fn zero_zoom_does_not_panic() {
    let patch = Patch::still(WarpParams::identity(8, 8), 0.0, 1.0);
    let mut engine = FeedbackEngine::new(8, 8, patch, &mut Rng::with_seed(1)).unwrap();
    for _ in 0..3 {
        engine.step();
    }
    assert_eq!(engine.last_zoom(), 0.0);
    assert_eq!(engine.frames(), 3);
}

#[test]
fn counter_and_frames_advance_per_step() {
    let mut engine = FeedbackEngine::with_frame(
        Frame::new(3, 3).unwrap(),
        Patch::still(WarpParams::identity(3, 3), 1.0, 2.5),
    )
    .unwrap();
    assert_eq!(engine.counter(), 0.0);
    assert_eq!(engine.frames(), 0);

    for n in 1..=4u64 {
        engine.step();
        assert_eq!(engine.frames(), n);
        assert_eq!(engine.counter(), 2.5 * n as f64);
    }
    assert_eq!(engine.patch_name(), "still");
    assert_eq!((engine.width(), engine.height()), (3, 3));
}

#[test]
fn same_seed_same_frames() {
    let run = |seed: u64| {
        let mut rng = Rng::with_seed(seed);
        let patch = Patch::layered(20, 16, &mut rng);
        let mut engine = FeedbackEngine::new(20, 16, patch, &mut rng).unwrap();
        for _ in 0..5 {
            engine.step();
        }
        engine.render().clone()
    };
    assert_eq!(run(42), run(42));
    assert_ne!(run(42), run(43));
}

#[test]
fn both_patches_keep_producing_frames() {
    let mut rng = Rng::with_seed(8);
    for patch in [Patch::layered(32, 24, &mut rng), Patch::classic(32, 24)] {
        let name = patch.name;
        let mut engine = FeedbackEngine::new(32, 24, patch, &mut rng).unwrap();
        for _ in 0..20 {
            let f = engine.step();
            assert_eq!((f.width(), f.height()), (32, 24));
        }
        assert_eq!(engine.last_params().len(), 3, "{name}");
        assert!(
            engine.render().pixels().any(|px| px != [0, 0, 0]),
            "{name} went black"
        );
    }
}

#[test]
fn engine_rejects_empty_frames() {
    assert!(FeedbackEngine::new(0, 10, still(1, 1), &mut Rng::with_seed(0)).is_err());
}

// ── Modulator scheduling ────────────────────────────────────────────────────

struct Recorder {
    times: Rc<RefCell<Vec<f64>>>,
    value: f64,
}

impl Modulator for Recorder {
    fn value(&mut self, t: f64) -> f64 {
        self.times.borrow_mut().push(t);
        self.value
    }
}

fn recorder(value: f64) -> (Box<dyn Modulator>, Rc<RefCell<Vec<f64>>>) {
    let times = Rc::new(RefCell::new(Vec::new()));
    let m = Recorder {
        times: Rc::clone(&times),
        value,
    };
    (Box::new(m), times)
}

#[test]
fn every_modulator_is_queried_once_per_frame_at_the_counter() {
    let (cx, cx_t) = recorder(2.0);
    let (cy, cy_t) = recorder(2.0);
    let (angle, angle_t) = recorder(0.0);
    let (scale, scale_t) = recorder(1.0);
    let (tx, tx_t) = recorder(0.0);
    let (ty, ty_t) = recorder(0.0);
    let (zoom, zoom_t) = recorder(1.0);

    let patch = Patch {
        name: "probe",
        graph: WarpGraph::new(vec![WarpSpec::new(cx, cy, angle, scale, tx, ty)]),
        zoom,
        counter_step: 10.0,
    };
    let mut engine = FeedbackEngine::with_frame(Frame::new(4, 4).unwrap(), patch).unwrap();
    for _ in 0..5 {
        engine.step();
    }

    let expected = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    for times in [&cx_t, &cy_t, &angle_t, &scale_t, &tx_t, &ty_t, &zoom_t] {
        assert_eq!(*times.borrow(), expected);
    }
}
