use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gacha_core::dispatch::DeviceClass;
use gacha_core::io::{report, request as request_io};
use gacha_core::request::SimulationRequest;
use gacha_core::rng::seed_from_phrase;
use gacha_core::{simulate, DispatchSettings};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "gachastep",
    about = "Batch runner for seeded gacha pull simulations"
)]
struct Args {
    /// Path to the simulation request JSON document.
    #[arg(long, value_name = "PATH")]
    request: PathBuf,

    /// Override the request's base seed.
    #[arg(long, value_name = "NUMBER", conflicts_with = "seed_phrase")]
    seed: Option<u32>,

    /// Derive the base seed from a memorable phrase instead.
    #[arg(long = "seed-phrase", value_name = "TEXT", conflicts_with = "seed")]
    seed_phrase: Option<String>,

    /// Override the request's trial count.
    #[arg(long, value_name = "N")]
    trials: Option<u32>,

    /// Worker threads; picked from the CPU count when omitted.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Device class used by the worker heuristic.
    #[arg(long, default_value_t = DeviceClass::Desktop)]
    device: DeviceClass,

    /// Override the percentile used for cutoff fields.
    #[arg(long, value_name = "P")]
    percentile: Option<f64>,

    /// Write the merged result here instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Optional path to emit one NDJSON summary line per banner.
    #[arg(long = "emit-summary", value_name = "PATH")]
    emit_summary: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            workers: self.workers,
            device: self.device,
        }
    }

    fn apply_overrides(&self, request: &mut SimulationRequest) {
        if let Some(seed) = self.seed {
            request.seed = Some(seed);
        } else if let Some(phrase) = &self.seed_phrase {
            request.seed = Some(seed_from_phrase(phrase));
        }
        if let Some(trials) = self.trials {
            request.trial_count = trials;
        }
        if let Some(percentile) = self.percentile {
            request.percentile = percentile;
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut request = request_io::load_from_path(&args.request)
        .with_context(|| format!("failed to read request {:?}", args.request))?;
    args.apply_overrides(&mut request);

    let merged = simulate(&request, &args.settings()).context("simulation failed")?;

    match &args.out {
        Some(path) => {
            report::save_json(path, &merged)?;
            info!(path = ?path, "wrote merged result");
        }
        None => {
            let stdout = io::stdout();
            report::write_json(BufWriter::new(stdout.lock()), &merged)?;
            println!();
        }
    }
    if let Some(path) = &args.emit_summary {
        report::save_summary(path, &merged)?;
        info!(path = ?path, banners = merged.banners.len(), "wrote banner summary");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    run(&args)
}

#[cfg(test)]
mod tests {
    use super::{run, Args};
    use clap::{error::ErrorKind, Parser};
    use gacha_core::dispatch::DeviceClass;
    use gacha_core::io::request::load_from_path;
    use gacha_core::reduce::MergedResult;
    use gacha_core::rng::seed_from_phrase;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata/requests")
            .join(name)
    }

    #[test]
    fn requires_request_file() {
        let err = Args::try_parse_from(["gachastep", "--trials", "8"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_both_seed_flags() {
        let err = Args::try_parse_from([
            "gachastep",
            "--request",
            "request.json",
            "--seed",
            "1",
            "--seed-phrase",
            "spring festival",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_unknown_device_class() {
        let err = Args::try_parse_from(["gachastep", "--request", "r.json", "--device", "tablet"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn overrides_replace_request_fields() {
        let args = Args::try_parse_from([
            "gachastep",
            "--request",
            "r.json",
            "--seed-phrase",
            "spring festival",
            "--trials",
            "50",
            "--percentile",
            "90",
            "--device",
            "mobile",
        ])
        .unwrap();
        assert_eq!(args.device, DeviceClass::Mobile);

        let mut request = load_from_path(&fixture("limited_single_target.json")).unwrap();
        args.apply_overrides(&mut request);
        assert_eq!(request.seed, Some(seed_from_phrase("spring festival")));
        assert_eq!(request.trial_count, 50);
        assert_eq!(request.percentile, 90.0);
    }

    #[test]
    fn writes_report_and_summary_files() {
        let dir = std::env::temp_dir().join(format!("gachastep-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("result.json");
        let summary = dir.join("summary.ndjson");
        let request = fixture("rotation_pair.json");

        let args = Args::try_parse_from([
            "gachastep",
            "--request",
            request.to_str().unwrap(),
            "--trials",
            "300",
            "--workers",
            "2",
            "--out",
            out.to_str().unwrap(),
            "--emit-summary",
            summary.to_str().unwrap(),
        ])
        .unwrap();
        run(&args).unwrap();

        let merged: MergedResult =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(merged.trial_count, 300);
        assert_eq!(merged.base_seed, 7);
        assert_eq!(merged.percentile, 95.0);
        // The inactive rerun banner is skipped.
        assert_eq!(merged.banners.len(), 1);

        let lines = std::fs::read_to_string(&summary).unwrap();
        assert_eq!(lines.lines().count(), 1);
        assert!(lines.contains("\"bannerId\":\"joint-ops\""));
        std::fs::remove_dir_all(&dir).ok();
    }
}
