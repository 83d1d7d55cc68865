use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::reduce::{BannerReport, MergedResult};

/// Compact per-banner line for dashboards and log shippers.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BannerSummary<'a> {
    pub banner_id: &'a str,
    pub trials: u64,
    pub success_rate: f64,
    pub mean_pulls: f64,
    pub mean_pulls_to_success: f64,
    pub percentile: f64,
    pub cutoff_index: usize,
    pub min_index: usize,
    pub max_index: usize,
    pub currency_shortage_failures: u64,
    pub max_attempts_failures: u64,
}

impl<'a> BannerSummary<'a> {
    pub fn new(report: &'a BannerReport, percentile: f64) -> Self {
        Self {
            banner_id: &report.totals.banner_id,
            trials: report.totals.trials,
            success_rate: report.success_rate,
            mean_pulls: report.mean_pulls,
            mean_pulls_to_success: report.mean_pulls_to_success,
            percentile,
            cutoff_index: report.cutoff_index,
            min_index: report.min_index,
            max_index: report.max_index,
            currency_shortage_failures: report.totals.currency_shortage_failures,
            max_attempts_failures: report.totals.max_attempts_failures,
        }
    }

    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string(self)?;
        json.push('\n');
        Ok(json)
    }
}

pub fn summaries(result: &MergedResult) -> Vec<BannerSummary<'_>> {
    result
        .banners
        .iter()
        .map(|banner| BannerSummary::new(banner, result.percentile))
        .collect()
}

pub fn write_json<W: Write>(writer: W, result: &MergedResult) -> Result<()> {
    serde_json::to_writer_pretty(writer, result).context("failed to serialize merged result")
}

pub fn write_summary<W: Write>(mut writer: W, result: &MergedResult) -> Result<()> {
    for summary in summaries(result) {
        let line = summary
            .to_ndjson()
            .context("failed to serialize banner summary")?;
        writer.write_all(line.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_json(path: &Path, result: &MergedResult) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create report file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_json(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn save_summary(path: &Path, result: &MergedResult) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create summary file {:?}", path))?;
    write_summary(BufWriter::new(file), result)
}
