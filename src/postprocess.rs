//! Transforms applied to an assembled sample matrix.

use ndarray::Axis;

use crate::error::{ConvertError, Result};
use crate::types::*;

/// Subtracts the cross-channel mean from every sample column, in place.
///
/// The column mean is rounded to the nearest integer; subtraction saturates
/// at the i16 range. Columns that already average to zero are left untouched.
pub fn common_average_reference(matrix: &mut SampleMatrix) {
    let n_channels = matrix.nrows();
    if n_channels == 0 {
        return;
    }

    let mut adjusted = 0usize;
    for mut column in matrix.columns_mut() {
        let sum: i64 = column.iter().map(|&v| v as i64).sum();
        let mean = (sum as f64 / n_channels as f64).round() as i64;
        if mean == 0 {
            continue;
        }
        for sample in column.iter_mut() {
            *sample = (*sample as i64 - mean).clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        }
        adjusted += 1;
    }

    log::info!(
        "Common average reference applied to {} channels ({} of {} columns shifted)",
        n_channels,
        adjusted,
        matrix.ncols()
    );
}

/// Flags and excises artifact columns.
///
/// For every column the median of `|sample|` across channels is taken; the
/// standard deviation of that series over the whole recording, times
/// `threshold_multiplier`, is the single global threshold. Columns above it
/// are dropped from both the matrix and the time map, so the returned pair
/// stays aligned. A series with zero spread flags nothing.
///
/// Set `keep_series` to return the per-column series in the report.
pub fn remove_artifacts(
    matrix: &SampleMatrix,
    time_map: &TimeMap,
    threshold_multiplier: f64,
    keep_series: bool,
) -> Result<(SampleMatrix, TimeMap, ArtifactReport)> {
    if matrix.ncols() != time_map.len() {
        return Err(ConvertError::MisalignedTimeMap {
            samples: matrix.ncols(),
            timestamps: time_map.len(),
        });
    }

    let series = median_abs_series(matrix);
    let deviation = standard_deviation(&series);
    let threshold = threshold_multiplier * deviation;

    let (removed, kept): (Vec<usize>, Vec<usize>) = (0..series.len())
        .partition(|&column| deviation > 0.0 && series[column] > threshold);

    let cleaned = matrix.select(Axis(1), &kept);
    let cleaned_times = time_map.select(Axis(0), &kept);

    let report = ArtifactReport {
        samples_before: matrix.ncols(),
        removed_indices: removed,
        deviation,
        threshold,
        median_abs_series: keep_series.then_some(series),
    };

    log::info!(
        "Removed {} of {} samples ({:.3}%) above artifact threshold {:.2}",
        report.removed_count(),
        report.samples_before,
        report.removed_percent(),
        threshold
    );

    Ok((cleaned, cleaned_times, report))
}

/// Per-row voltage summary of the final matrix.
pub fn probe_voltage_summary(
    matrix: &SampleMatrix,
    selection: &ChannelSelection,
) -> Vec<ProbeVoltage> {
    matrix
        .rows()
        .into_iter()
        .zip(&selection.channels)
        .map(|(row, channel)| {
            let n = row.len().max(1) as f64;
            let sum: f64 = row.iter().map(|&v| v as f64).sum();
            let sum_sq: f64 = row.iter().map(|&v| (v as f64) * (v as f64)).sum();
            ProbeVoltage {
                vendor_channel_number: channel.vendor_channel_number,
                min: row.iter().copied().min().unwrap_or(0),
                max: row.iter().copied().max().unwrap_or(0),
                mean: sum / n,
                rms: (sum_sq / n).sqrt(),
            }
        })
        .collect()
}

/// Median of absolute values for every column, computed in i32.
fn median_abs_series(matrix: &SampleMatrix) -> Vec<f64> {
    let mut scratch: Vec<i32> = Vec::with_capacity(matrix.nrows());
    matrix
        .columns()
        .into_iter()
        .map(|column| {
            scratch.clear();
            scratch.extend(column.iter().map(|&v| (v as i32).abs()));
            median(&mut scratch)
        })
        .collect()
}

fn median(values: &mut [i32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    }
}

/// Sample standard deviation (n - 1 normalization).
fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}
