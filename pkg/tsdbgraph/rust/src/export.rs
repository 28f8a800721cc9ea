// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Image-export URLs for the backend's own graphing UI, and the y-axis
//! range helpers shared with the line-chart renderer.

use log::debug;
use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::model::{GlobalTimeConfig, GnuplotOptions, MetricSpec};
use crate::query::{self, QueryStringOptions};
use crate::render_context::RenderContext;
use crate::session::QuerySession;

const LEFT_AXIS: &str = "x1y1";
const RIGHT_AXIS: &str = "x1y2";
const DEFAULT_PATH: &str = "/#";
const DEFAULT_KEY_LOCATION: &str = "top left";

/// Form-encodes a free-text parameter value (spaces become `+`).
pub fn form_encode(value: &str) -> String {
    value.replace(' ', "+")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisParams {
    pub label: Option<String>,
    pub format: Option<String>,
    pub range: Option<String>,
    /// Pins the lower bound at zero when no explicit range is given.
    pub squash_negative: bool,
    pub log_scale: bool,
}

impl AxisParams {
    fn push_params(&self, url: &mut String, prefix: &str) {
        if let Some(label) = &self.label {
            url.push_str(&format!("&{prefix}label={}", form_encode(label)));
        }
        if let Some(format) = &self.format {
            url.push_str(&format!("&{prefix}format={}", form_encode(format)));
        }
        if let Some(range) = &self.range {
            url.push_str(&format!("&{prefix}range={}", form_encode(range)));
        } else if self.squash_negative {
            url.push_str(&format!("&{prefix}range={}", form_encode("[0:]")));
        }
        if self.log_scale {
            url.push_str(&format!("&{prefix}log"));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyParams {
    pub location: Option<String>,
    /// `"horizontal"` lays entries out on one line.
    pub alignment: Option<String>,
    pub boxed: bool,
}

impl KeyParams {
    fn position(&self) -> String {
        let mut position = self
            .location
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_KEY_LOCATION)
            .to_string();
        if self.alignment.as_deref() == Some("horizontal") {
            position.push_str(" horiz");
        }
        if self.boxed {
            position.push_str(" box");
        }
        position
    }
}

#[derive(Default, Clone)]
pub struct ExportParams<'a> {
    /// Path appended to the base URL, `/#` when unset.
    pub path: Option<&'a str>,
    /// Puts every metric on this axis regardless of its own setting.
    pub force_axis: Option<&'a str>,
    pub downsample_override: Option<&'a dyn Fn(&str) -> String>,
    pub y_axis: Option<AxisParams>,
    pub y2_axis: Option<AxisParams>,
    /// `None` hides the key.
    pub key: Option<KeyParams>,
    pub line_smoothing: bool,
    pub style: Option<String>,
    pub global_annotations: bool,
    pub add_ignore: bool,
    pub reference: Option<OffsetDateTime>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

impl ExportParams<'_> {
    /// Maps the options of a gnuplot graph onto export parameters.
    pub fn from_gnuplot(options: &GnuplotOptions) -> Self {
        Self {
            y_axis: Some(AxisParams {
                label: non_empty(&options.y_axis_label),
                format: non_empty(&options.y_axis_format),
                range: non_empty(&options.y_axis_range),
                squash_negative: false,
                log_scale: options.y_axis_log_scale,
            }),
            y2_axis: Some(AxisParams {
                label: non_empty(&options.y2_axis_label),
                format: non_empty(&options.y2_axis_format),
                range: non_empty(&options.y2_axis_range),
                squash_negative: false,
                log_scale: options.y2_axis_log_scale,
            }),
            key: options.show_key.then(|| KeyParams {
                location: options.key_location.clone(),
                alignment: options.key_alignment.clone(),
                boxed: options.key_box,
            }),
            line_smoothing: options.line_smoothing,
            style: non_empty(&options.style),
            global_annotations: options.global_annotations,
            ..Default::default()
        }
    }
}

/// Builds the image-export URL for a graph: `<base><path>` followed by the
/// main query string, with an `o=axis+...` option after every metric and
/// the axis, key and style parameters.
pub fn tsdb_graph_url(
    ctx: &mut RenderContext,
    session: &QuerySession,
    global: &GlobalTimeConfig,
    graph_id: &str,
    metrics: &[&MetricSpec],
    params: &ExportParams<'_>,
) -> Result<String> {
    let axis_option = |metric: &MetricSpec| {
        let axis = params
            .force_axis
            .or(metric.graph_options.axis.as_deref())
            .unwrap_or(LEFT_AXIS);
        format!("&o=axis+{axis}")
    };
    let options = QueryStringOptions {
        per_metric_suffix: Some(&axis_option),
        downsample_override: params.downsample_override,
        no_ignore: !params.add_ignore,
        reference: params.reference,
    };
    let qs = query::main_query_string(ctx, session, global, graph_id, metrics, &options)?;

    let mut url = format!(
        "{}{}{qs}",
        session.base_read_url,
        params.path.unwrap_or(DEFAULT_PATH)
    );

    let mut using_left = false;
    let mut using_right = false;
    for metric in metrics {
        let axis = metric.graph_options.axis.as_deref();
        if axis.is_none() || axis == Some(LEFT_AXIS) || params.force_axis == Some(LEFT_AXIS) {
            using_left = true;
        } else if axis == Some(RIGHT_AXIS) || params.force_axis == Some(RIGHT_AXIS) {
            using_right = true;
        } else {
            ctx.error(graph_id, Error::InvalidAxis.to_string());
            return Err(Error::InvalidAxis);
        }
    }

    if using_left && let Some(y) = &params.y_axis {
        y.push_params(&mut url, "y");
    }
    if using_right && let Some(y2) = &params.y2_axis {
        y2.push_params(&mut url, "y2");
    }

    match &params.key {
        Some(key) => url.push_str(&format!("&key={}", form_encode(&key.position()))),
        None => url.push_str("&nokey"),
    }
    if params.line_smoothing {
        url.push_str("&smooth=csplines");
    }
    if let Some(style) = &params.style {
        url.push_str(&format!("&style={style}"));
    }
    if params.global_annotations {
        url.push_str("&global_annotations");
    }

    debug!("[{graph_id}] export url: {url}");
    Ok(url)
}

/// Parses a `[low:high]` y-axis range; either bound may be empty.
///
/// An unset or empty string is unbounded. A malformed one is unbounded too
/// and leaves a warning against the graph.
pub fn parse_axis_range(
    ctx: &mut RenderContext,
    graph_id: &str,
    range: Option<&str>,
) -> (Option<f64>, Option<f64>) {
    let Some(range) = range.filter(|r| !r.is_empty()) else {
        return (None, None);
    };
    let inner = range.replacen('[', "", 1).replacen(']', "", 1);
    let parsed = inner.split_once(':').and_then(|(low, high)| {
        let bound = |s: &str| -> Option<Option<f64>> {
            let s = s.trim();
            if s.is_empty() {
                Some(None)
            } else {
                s.parse::<f64>().ok().map(Some)
            }
        };
        Some((bound(low)?, bound(high)?))
    });
    match parsed {
        Some(bounds) => bounds,
        None => {
            ctx.warning(graph_id, "Y-axis value range invalid, defaulting to [:]");
            (None, None)
        }
    }
}

/// Inverse of [`parse_axis_range`].
pub fn axis_range_to_string(range: (Option<f64>, Option<f64>)) -> String {
    let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
    format!("[{}:{}]", bound(range.0), bound(range.1))
}
