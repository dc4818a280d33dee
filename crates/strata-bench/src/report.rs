use std::path::Path;

use crate::runner::BenchmarkResult;

/// A complete baseline containing results from all scenes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Baseline {
    pub timestamp: String,
    pub results: Vec<BenchmarkResult>,
}

/// Load a baseline from a JSON file. Returns None if the file is missing or unreadable.
pub fn load_baseline(path: &Path) -> Option<Baseline> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(baseline) => Some(baseline),
        Err(e) => {
            log::warn!("Ignoring malformed baseline {}: {}", path.display(), e);
            None
        }
    }
}

pub fn save_baseline(path: &Path, baseline: &Baseline) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(baseline).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// A scene that got worse than the baseline by more than the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub scene_name: String,
    pub metric: &'static str,
    pub pct_change: f64,
}

/// Compare current results against a baseline on mean update time and
/// request volume. Scenes missing from the baseline are skipped.
pub fn compare(current: &[BenchmarkResult], baseline: &Baseline, threshold_pct: f64) -> Vec<Regression> {
    let mut regressions = Vec::new();

    for result in current {
        let Some(base) = baseline
            .results
            .iter()
            .find(|b| b.scene_name == result.scene_name)
        else {
            continue;
        };

        let checks = [
            ("mean_ms", result.timings.mean_ms, base.timings.mean_ms),
            ("requested", result.requested as f64, base.requested as f64),
        ];
        for (metric, now, before) in checks {
            if before <= 0.0 {
                continue;
            }
            let pct_change = (now - before) / before * 100.0;
            if pct_change > threshold_pct {
                regressions.push(Regression {
                    scene_name: result.scene_name.clone(),
                    metric,
                    pct_change,
                });
            }
        }
    }

    regressions
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    out.push_str("| Scene | Frames | Mean (ms) | Median (ms) | P95 (ms) | Max (ms) | Requested | Evicted | Failed | Peak | Restored |\n");
    out.push_str("|-------|--------|-----------|-------------|----------|----------|-----------|---------|--------|------|----------|\n");

    for r in results {
        out.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {:.3} | {:.3} | {} | {} | {} | {} | {}/{} |\n",
            r.scene_name,
            r.frame_count,
            r.timings.mean_ms,
            r.timings.median_ms,
            r.timings.p95_ms,
            r.timings.max_ms,
            r.requested,
            r.evicted,
            r.failed,
            r.peak_loaded,
            r.restored,
            r.final_loaded,
        ));
    }

    out
}

/// Format a comparison report showing regressions.
pub fn format_comparison(regressions: &[Regression], threshold_pct: f64) -> String {
    if regressions.is_empty() {
        return format!(
            "All scenes within {:.0}% threshold. No regressions detected.\n",
            threshold_pct
        );
    }

    let mut out = String::new();
    out.push_str(&format!(
        "REGRESSIONS DETECTED (>{:.0}% threshold):\n",
        threshold_pct
    ));
    for r in regressions {
        out.push_str(&format!("  - {} {}: +{:.1}%\n", r.scene_name, r.metric, r.pct_change));
    }
    out
}
