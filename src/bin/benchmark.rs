use std::time::{Duration, Instant};

use anyhow::Result;
use feedback_fractal::config::PatchKind;
use feedback_fractal::engine::FeedbackEngine;
use feedback_fractal::warp::Patch;

struct Args {
    patches: Vec<PatchKind>,
    frames: usize,
    w: usize,
    h: usize,
    seed: u64,
    ci_smoke: bool,
    max_ms: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        patches: vec![PatchKind::Layered, PatchKind::Classic],
        frames: 120,
        w: 160,
        h: 120,
        seed: 7,
        ci_smoke: false,
        max_ms: 30.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        match (k, v) {
            ("--patch", Some("layered")) => {
                args.patches = vec![PatchKind::Layered];
                i += 2;
            }
            ("--patch", Some("classic")) => {
                args.patches = vec![PatchKind::Classic];
                i += 2;
            }
            ("--patch", Some("all")) => {
                args.patches = vec![PatchKind::Layered, PatchKind::Classic];
                i += 2;
            }
            ("--frames", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.frames = n.max(1);
                }
                i += 2;
            }
            ("--w", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.w = n.max(1);
                }
                i += 2;
            }
            ("--h", Some(x)) => {
                if let Ok(n) = x.parse::<usize>() {
                    args.h = n.max(1);
                }
                i += 2;
            }
            ("--seed", Some(x)) => {
                if let Ok(n) = x.parse::<u64>() {
                    args.seed = n;
                }
                i += 2;
            }
            ("--max-ms", Some(x)) => {
                if let Ok(n) = x.parse::<f64>() {
                    args.max_ms = n.max(0.1);
                }
                i += 2;
            }
            ("--ci-smoke", _) => {
                args.ci_smoke = true;
                i += 1;
            }
            _ => {
                eprintln!("ignoring unknown argument: {k}");
                i += 1;
            }
        }
    }
    args
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = parse_args();

    println!(
        "feedback benchmark: patches={} frames/patch={} size={}x{} seed={}",
        args.patches.len(),
        args.frames,
        args.w,
        args.h,
        args.seed
    );

    let mut total_time = Duration::ZERO;
    let mut total_frames = 0usize;
    let mut black = Vec::new();
    let mut slow = Vec::new();

    for &kind in &args.patches {
        let mut rng = fastrand::Rng::with_seed(args.seed);
        let patch = Patch::from_kind(kind, args.w, args.h, &mut rng);
        let mut engine = FeedbackEngine::new(args.w, args.h, patch, &mut rng)?;
        let name = engine.patch_name();

        let start = Instant::now();
        let mut lit = 0usize;
        for _ in 0..args.frames {
            let frame = engine.step();
            if frame.pixels().any(|px| px != [0, 0, 0]) {
                lit += 1;
            }
        }
        let elapsed = start.elapsed();
        total_time += elapsed;
        total_frames += args.frames;

        let ms = elapsed.as_secs_f64() * 1000.0 / args.frames as f64;
        println!(
            "{:<10} {:>8.3} ms/frame  lit={:>4}/{}  mean luma={:>6.1}  t={}",
            name,
            ms,
            lit,
            args.frames,
            engine.render().mean_luma(),
            engine.counter()
        );
        if lit == 0 {
            black.push(name);
        }
        if ms > args.max_ms {
            slow.push((name, ms));
        }
    }

    let avg_ms = total_time.as_secs_f64() * 1000.0 / total_frames.max(1) as f64;
    let fps = if avg_ms > 0.0 { 1000.0 / avg_ms } else { 0.0 };
    println!("summary: {:>8.3} ms/frame avg  {:>7.2} FPS", avg_ms, fps);

    if args.ci_smoke {
        if !black.is_empty() || !slow.is_empty() {
            eprintln!("CI smoke: FAIL");
            if !black.is_empty() {
                eprintln!("  black patches: {}", black.join(", "));
            }
            for (name, ms) in slow {
                eprintln!("  slow patch: {} ({:.3} ms/frame > {:.3})", name, ms, args.max_ms);
            }
            anyhow::bail!("ci smoke failed");
        }
        println!("CI smoke: PASS (max_ms={:.3})", args.max_ms);
    }

    Ok(())
}
