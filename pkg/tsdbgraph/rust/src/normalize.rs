// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Dense fixed-step resampling of sparse series, as consumed by horizon
//! charts.

use crate::response::TsdbSeries;

/// Aligns every series to `start + i * step` for `start..=end`.
///
/// Points off a step boundary or outside the window are dropped. Missing
/// steps are `None`, or linearly interpolated between the neighbouring
/// known values when `interpolate` is set. `squash_negative` clamps
/// negatives to zero after interpolation.
///
/// There is always at least one output entry; a series with no usable
/// point yields an empty vector.
pub fn normalize(
    series: &[TsdbSeries],
    start: i64,
    step: i64,
    end: i64,
    interpolate: bool,
    squash_negative: bool,
) -> Vec<Vec<Option<f64>>> {
    if series.is_empty() {
        return vec![Vec::new()];
    }
    series
        .iter()
        .map(|s| normalize_one(s, start, step, end, interpolate, squash_negative))
        .collect()
}

fn normalize_one(
    series: &TsdbSeries,
    start: i64,
    step: i64,
    end: i64,
    interpolate: bool,
    squash_negative: bool,
) -> Vec<Option<f64>> {
    if step <= 0 || end < start {
        return Vec::new();
    }
    let Some(len) = end
        .checked_sub(start)
        .and_then(|span| (span / step).checked_add(1))
        .and_then(|n| usize::try_from(n).ok())
    else {
        return Vec::new();
    };

    let mut values: Vec<Option<f64>> = vec![None; len];
    let mut placed = false;
    for dp in &series.dps {
        let Some(offset) = dp.timestamp.checked_sub(start) else {
            continue;
        };
        if offset < 0 || offset % step != 0 {
            continue;
        }
        let Ok(index) = usize::try_from(offset / step) else {
            continue;
        };
        if let Some(slot) = values.get_mut(index) {
            *slot = Some(dp.value);
            placed = true;
        }
    }
    if !placed {
        return Vec::new();
    }

    if interpolate {
        fill_gaps(&mut values);
    }
    if squash_negative {
        for v in values.iter_mut().flatten() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
    }
    values
}

/// Linear interpolation across interior gaps; leading and trailing gaps stay empty.
fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last_known: Option<(usize, f64)> = None;
    for j in 0..values.len() {
        let Some(Some(current)) = values.get(j).copied() else {
            continue;
        };
        if let Some((i, previous)) = last_known
            && j - i > 1
        {
            let span = (j - i) as f64;
            for k in i + 1..j {
                if let Some(slot) = values.get_mut(k) {
                    *slot = Some(previous + (current - previous) * (k - i) as f64 / span);
                }
            }
        }
        last_known = Some((j, current));
    }
}
