use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use strata_bench::report;
use strata_bench::runner::BenchmarkRunner;
use strata_bench::scenes;
use strata_core::GridConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut baseline_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut frame_count = 600u32;
    let mut workers = 4usize;
    let mut seed = 42u64;
    let mut only_scene: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--baseline" => baseline_path = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--output" => output_path = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--config" => config_path = Some(PathBuf::from(value(&args, &mut i, flag))),
            "--regression-threshold" => regression_threshold = parsed(&args, &mut i, flag),
            "--frames" => frame_count = parsed(&args, &mut i, flag),
            "--workers" => workers = parsed(&args, &mut i, flag),
            "--seed" => seed = parsed(&args, &mut i, flag),
            "--scene" => only_scene = Some(value(&args, &mut i, flag).to_string()),
            "--help" | "-h" => {
                eprintln!("Usage: stream-runner [OPTIONS]");
                eprintln!("  --config <path>                Grid config RON file (default: built-in)");
                eprintln!("  --baseline <path>              Load baseline JSON for comparison");
                eprintln!("  --output <path>                Save current results as JSON baseline");
                eprintln!(
                    "  --regression-threshold <pct>   Regression threshold percentage (default: 10)"
                );
                eprintln!("  --frames <n>                   Frames per scene (default: 600)");
                eprintln!("  --workers <n>                  Chunk worker threads (default: 4)");
                eprintln!("  --seed <n>                     Terrain seed (default: 42)");
                eprintln!("  --scene <name>                 Run only straight, oscillate or spiral");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(ref path) => load_config(path),
        None => GridConfig::default(),
    };

    let runner = BenchmarkRunner::new(config, frame_count, workers, seed);
    let mut results = Vec::new();

    for scene in scenes::standard_scenes() {
        if only_scene.as_deref().is_some_and(|name| name != scene.name) {
            continue;
        }
        match runner.run_scene(&scene) {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("ERROR: scene '{}' failed: {}", scene.name, e);
                process::exit(1);
            }
        }
    }

    println!("\n## Streaming Benchmark Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let baseline = report::Baseline {
            timestamp: timestamp(),
            results: results.clone(),
        };
        if let Err(e) = report::save_baseline(path, &baseline) {
            eprintln!("ERROR: failed to save baseline {}: {}", path.display(), e);
            process::exit(1);
        }
        log::info!("Saved baseline to {}", path.display());
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_baseline(path) {
            let regressions = report::compare(&results, &baseline, regression_threshold);
            println!(
                "{}",
                report::format_comparison(&regressions, regression_threshold)
            );
            if !regressions.is_empty() {
                eprintln!(
                    "ERROR: {} regressions detected, exiting with code 1",
                    regressions.len()
                );
                process::exit(1);
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    log::info!("Benchmark complete.");
}

/// Take the value following `flag`, or exit with a usage error.
fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.as_str(),
        None => {
            eprintln!("Missing value for {}", flag);
            process::exit(1);
        }
    }
}

fn parsed<T: FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    let raw = value(args, i, flag);
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Invalid {} value: {}", flag, raw);
            process::exit(1);
        }
    }
}

fn load_config(path: &Path) -> GridConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("ERROR: cannot read config {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    match GridConfig::from_ron_str(&text) {
        Ok(config) => {
            log::info!("Loaded grid config from {}", path.display());
            config
        }
        Err(e) => {
            eprintln!("ERROR: {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("bench-{}", secs)
}
