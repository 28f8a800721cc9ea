// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Query-language encoding of metrics and whole query strings.
//!
//! A metric line has the shape
//! `<agg>:[<to>-<by>:][rate[{counter[,max][,reset]}]:]<name>[{groupby}][{filters}]`
//! and a query string is `start=<from>[&end=<to>|&ignore=<n>](&m=<line>)+`.

use log::debug;
use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::model::{GlobalTimeConfig, GraphOptions, MetricSpec};
use crate::render_context::RenderContext;
use crate::session::QuerySession;
use crate::timeframe;

pub const DEFAULT_AGGREGATOR: &str = "sum";

/// Tag values that select everything and so never restrict as a filter.
const WILDCARD_VALUES: [&str; 2] = ["*", "wildcard(*)"];

/// Where the downsample prefix of a metric line comes from, in order of
/// precedence.
#[derive(Clone, Copy)]
pub enum Downsampling<'a> {
    /// Renderer-imposed downsample, given the metric's `downsampleBy`.
    Override(&'a dyn Fn(&str) -> String),
    /// Dashboard-wide interval combined with each metric's function.
    Global { to: &'a str },
    /// The metric's own settings, when its `downsample` flag is set.
    PerMetric,
}

impl<'a> Downsampling<'a> {
    pub fn resolve(
        global: &'a GlobalTimeConfig,
        downsample_override: Option<&'a dyn Fn(&str) -> String>,
    ) -> Self {
        match downsample_override {
            Some(f) => Downsampling::Override(f),
            None if global.global_downsampling => Downsampling::Global {
                to: global.global_downsample_to.as_deref().unwrap_or_default(),
            },
            None => Downsampling::PerMetric,
        }
    }
}

/// `rate` with the optional counter block. An absent max keeps its comma
/// so the reset value stays in third position.
pub fn rate_string(options: &GraphOptions) -> String {
    let mut rate = String::from("rate");
    if options.rate_counter {
        rate.push_str("{counter");
        let mut reset_sep = ",";
        match options.rate_counter_max.as_deref() {
            Some(max) if !max.is_empty() => {
                rate.push(',');
                rate.push_str(max);
            }
            _ => reset_sep = ",,",
        }
        if let Some(reset) = options.rate_counter_reset.as_deref()
            && !reset.is_empty()
        {
            rate.push_str(reset_sep);
            rate.push_str(reset);
        }
        rate.push('}');
    }
    rate
}

/// Encodes one metric as a query line.
///
/// `filters` enables the second tag block understood by filter-capable
/// backends. A rate counter set without a rate is ignored and reported as
/// a warning against `graph_id`.
pub fn encode_metric(
    ctx: &mut RenderContext,
    graph_id: &str,
    metric: &MetricSpec,
    downsampling: Downsampling<'_>,
    filters: bool,
) -> String {
    let options = &metric.graph_options;
    let mut line = format!(
        "{}:",
        options.aggregator.as_deref().unwrap_or(DEFAULT_AGGREGATOR)
    );

    let by = options.downsample_by.as_deref().unwrap_or_default();
    match downsampling {
        Downsampling::Override(f) => line.push_str(&format!("{}:", f(by))),
        Downsampling::Global { to } => line.push_str(&format!("{to}-{by}:")),
        Downsampling::PerMetric if options.downsample => line.push_str(&format!(
            "{}-{by}:",
            options.downsample_to.as_deref().unwrap_or_default()
        )),
        Downsampling::PerMetric => {}
    }

    if options.rate {
        line.push_str(&rate_string(options));
        line.push(':');
    } else if options.rate_counter {
        ctx.warning(
            graph_id,
            "You have specified a rate counter without a rate, ignoring",
        );
    }

    line.push_str(&metric.name);

    let group_by: Vec<String> = metric
        .tags
        .iter()
        .filter(|t| !t.value.is_empty() && t.is_group_by())
        .map(|t| format!("{}={}", t.name, t.value))
        .collect();
    if !group_by.is_empty() {
        line.push_str(&format!("{{{}}}", group_by.join(",")));
    }

    if filters {
        let filter_tags: Vec<String> = metric
            .tags
            .iter()
            .filter(|t| {
                t.group_by == Some(false)
                    && !t.value.is_empty()
                    && !WILDCARD_VALUES.contains(&t.value.as_str())
            })
            .map(|t| format!("{}={}", t.name, t.value))
            .collect();
        if !filter_tags.is_empty() {
            // the filter block is positional, so an empty group-by block must precede it
            if group_by.is_empty() {
                line.push_str("{}");
            }
            line.push_str(&format!("{{{}}}", filter_tags.join(",")));
        }
    }

    line
}

/// Caller-supplied knobs for [`main_query_string`] and [`baseline_query_string`].
#[derive(Default, Clone, Copy)]
pub struct QueryStringOptions<'a> {
    /// Appended after each metric line, e.g. axis assignments for image URLs.
    pub per_metric_suffix: Option<&'a dyn Fn(&MetricSpec) -> String>,
    pub downsample_override: Option<&'a dyn Fn(&str) -> String>,
    /// Suppresses the cache-busting `ignore` token on open-ended windows.
    pub no_ignore: bool,
    /// Stands in for "now"; defaults to the current UTC time.
    pub reference: Option<OffsetDateTime>,
}

struct Window {
    from: Option<String>,
    to: Option<String>,
    /// Auto-reloading graphs may replace the end with "now".
    allow_end_override: bool,
}

fn record(ctx: &mut RenderContext, graph_id: &str, err: Error) -> Error {
    ctx.error(graph_id, err.to_string());
    err
}

/// Query string for the main window of a graph.
pub fn main_query_string(
    ctx: &mut RenderContext,
    session: &QuerySession,
    global: &GlobalTimeConfig,
    graph_id: &str,
    metrics: &[&MetricSpec],
    options: &QueryStringOptions<'_>,
) -> Result<String> {
    let (from, to) =
        timeframe::main_window_as_api_string(global).map_err(|e| record(ctx, graph_id, e))?;
    let window = Window {
        from: Some(from),
        to,
        allow_end_override: true,
    };
    build(ctx, session, global, graph_id, window, metrics, options)
}

/// Query string for the baseline window of a graph. Auto-reload never
/// overrides the baseline end.
pub fn baseline_query_string(
    ctx: &mut RenderContext,
    session: &QuerySession,
    global: &GlobalTimeConfig,
    graph_id: &str,
    metrics: &[&MetricSpec],
    options: &QueryStringOptions<'_>,
) -> Result<String> {
    let (from, to) = timeframe::baseline_window_as_api_string(global, options.reference)
        .map_err(|e| record(ctx, graph_id, e))?;
    let window = Window {
        from,
        to,
        allow_end_override: false,
    };
    build(ctx, session, global, graph_id, window, metrics, options)
}

fn build(
    ctx: &mut RenderContext,
    session: &QuerySession,
    global: &GlobalTimeConfig,
    graph_id: &str,
    window: Window,
    metrics: &[&MetricSpec],
    options: &QueryStringOptions<'_>,
) -> Result<String> {
    let Some(from) = window.from.filter(|f| !f.is_empty()) else {
        return Err(record(ctx, graph_id, Error::NoStartDate));
    };
    if metrics.is_empty() {
        return Err(record(ctx, graph_id, Error::NoMetrics));
    }

    let mut qs = format!("start={from}");
    if global.auto_reload && window.allow_end_override {
        let now = options.reference.unwrap_or_else(OffsetDateTime::now_utc);
        let now = timeframe::format_api_time(now).map_err(|e| record(ctx, graph_id, e))?;
        qs.push_str(&format!("&end={now}"));
    } else if let Some(to) = window.to {
        qs.push_str(&format!("&end={to}"));
    } else if !options.no_ignore {
        qs.push_str(&format!("&ignore={}", session.counter().next()));
    }

    let downsampling = Downsampling::resolve(global, options.downsample_override);
    let filters = session.supports_filters();
    for metric in metrics {
        let line = encode_metric(ctx, graph_id, metric, downsampling, filters);
        qs.push_str(&format!("&m={line}"));
        if let Some(suffix) = options.per_metric_suffix {
            qs.push_str(&suffix(metric));
        }
    }

    debug!("[{graph_id}] query string: {qs}");
    Ok(qs)
}
