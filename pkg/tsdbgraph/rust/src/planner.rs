// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Query fan-out for one graph.
//!
//! The API cannot tell apart two sub-queries for the same metric name in a
//! single request, so the graph's metrics are split into parallel sets
//! holding at most one metric per name. Each set becomes one request for
//! the main window and, when baselining, one for the baseline window.
//! Responses are merged per batch in set order, whatever order they
//! arrive in.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, info};
use time::OffsetDateTime;

use crate::errors::{Error, Result};
use crate::executor::{QueryError, QueryExecutor};
use crate::model::{GlobalTimeConfig, GraphSpec, GraphType, HeatmapStyle, MetricSpec};
use crate::query::{self, QueryStringOptions};
use crate::render_context::RenderContext;
use crate::response::TsdbSeries;
use crate::session::QuerySession;

/// Per-graph-type request options.
#[derive(Default, Clone, Copy)]
pub struct PlannerOptions<'a> {
    pub supports_baselining: bool,
    pub supports_annotations: bool,
    pub annotations: bool,
    pub global_annotations: bool,
    /// Ask for `[ts, value]` arrays instead of timestamp-keyed maps.
    pub require_arrays: bool,
    pub downsample_override: Option<&'a dyn Fn(&str) -> String>,
    pub reference: Option<OffsetDateTime>,
}

// Heatmap styles force a fixed downsample onto every metric.
fn hourly(_: &str) -> String {
    String::from("1h-avg")
}

fn daily(_: &str) -> String {
    String::from("1d-avg")
}

impl PlannerOptions<'_> {
    pub fn for_graph(graph: &GraphSpec) -> Self {
        let Some(graph_type) = graph.graph_type else {
            return Self::default();
        };
        let dygraph = graph.dygraph.clone().unwrap_or_default();
        let downsample_override: Option<&dyn Fn(&str) -> String> = match graph_type {
            GraphType::Heatmap => match graph.heatmap.as_ref().and_then(|h| h.style) {
                Some(HeatmapStyle::DayHour) => Some(&hourly as &dyn Fn(&str) -> String),
                Some(HeatmapStyle::WeekDay) => Some(&daily as &dyn Fn(&str) -> String),
                Some(HeatmapStyle::Auto) | None => None,
            },
            _ => None,
        };
        Self {
            supports_baselining: graph_type.supports_baselining(),
            supports_annotations: graph_type.supports_annotations(),
            annotations: dygraph.annotations,
            global_annotations: dygraph.global_annotations,
            require_arrays: graph_type.requires_arrays(),
            downsample_override,
            reference: None,
        }
    }
}

/// Splits metrics so that no set holds two metrics with the same name.
///
/// Set `i` holds the `i`-th occurrence of every name that occurs more than
/// `i` times, names in order of first appearance.
pub fn partition_metrics<'m>(metrics: &[&'m MetricSpec]) -> Vec<Vec<&'m MetricSpec>> {
    let mut by_name: Vec<(&str, Vec<&'m MetricSpec>)> = Vec::new();
    for &metric in metrics {
        match by_name.iter_mut().find(|(name, _)| *name == metric.name) {
            Some((_, occurrences)) => occurrences.push(metric),
            None => by_name.push((&metric.name, vec![metric])),
        }
    }
    let set_count = by_name.iter().map(|(_, o)| o.len()).max().unwrap_or(0);
    (0..set_count)
        .map(|i| {
            by_name
                .iter()
                .filter_map(|(_, occurrences)| occurrences.get(i).copied())
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Batch {
    Main,
    Baseline,
}

#[derive(Debug, Clone)]
pub struct QuerySet<'m> {
    pub metrics: Vec<&'m MetricSpec>,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct QueryPlan<'m> {
    pub main: Vec<QuerySet<'m>>,
    /// Present when baselining is on and the graph type supports it.
    pub baseline: Option<Vec<QuerySet<'m>>>,
}

impl QueryPlan<'_> {
    /// Every request of the plan, main batch first.
    pub fn requests(&self) -> impl Iterator<Item = (Batch, usize, &str)> {
        let main = self
            .main
            .iter()
            .enumerate()
            .map(|(i, set)| (Batch::Main, i, set.url.as_str()));
        let baseline = self
            .baseline
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, set)| (Batch::Baseline, i, set.url.as_str()));
        main.chain(baseline)
    }
}

/// Builds the request URLs for a graph. Fails without building anything
/// further as soon as one query string cannot be built; the reason is in
/// `ctx`.
pub fn plan_queries<'m>(
    ctx: &mut RenderContext,
    session: &QuerySession,
    global: &GlobalTimeConfig,
    graph_id: &str,
    metrics: &[&'m MetricSpec],
    options: &PlannerOptions<'_>,
) -> Result<QueryPlan<'m>> {
    let mut sets = partition_metrics(metrics);
    if sets.is_empty() {
        // empty metric list, let the query builder report it
        sets.push(Vec::new());
    }

    let qs_options = QueryStringOptions {
        per_metric_suffix: None,
        downsample_override: options.downsample_override,
        no_ignore: false,
        reference: options.reference,
    };

    let mut main = Vec::with_capacity(sets.len());
    for set in &sets {
        let qs = query::main_query_string(ctx, session, global, graph_id, set, &qs_options)?;
        main.push(QuerySet {
            metrics: set.clone(),
            url: query_url(session, &qs, options),
        });
    }

    let baseline = if global.baselining && options.supports_baselining {
        let mut baseline = Vec::with_capacity(sets.len());
        for set in &sets {
            let qs =
                query::baseline_query_string(ctx, session, global, graph_id, set, &qs_options)?;
            baseline.push(QuerySet {
                metrics: set.clone(),
                url: query_url(session, &qs, options),
            });
        }
        Some(baseline)
    } else {
        None
    };

    Ok(QueryPlan { main, baseline })
}

fn query_url(session: &QuerySession, qs: &str, options: &PlannerOptions<'_>) -> String {
    let mut url = format!("{}/api/query?{qs}", session.base_read_url);
    if options.supports_annotations && (options.annotations || options.global_annotations) {
        url.push_str("&show_tsuids=true");
        if options.global_annotations {
            url.push_str("&global_annotations=true");
        }
    } else {
        url.push_str("&no_annotations=true");
    }
    url.push_str("&ms=true");
    if options.require_arrays {
        url.push_str("&arrays=true");
    }
    url.push_str("&show_query=true");
    url
}

/// A returned series with the metric that asked for it, when it can be
/// matched by name within its set.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSeries<'m> {
    pub series: TsdbSeries,
    pub metric: Option<&'m MetricSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults<'m> {
    pub main: Vec<TaggedSeries<'m>>,
    pub baseline: Option<Vec<TaggedSeries<'m>>>,
}

#[derive(Debug)]
struct BatchState<'m> {
    sets: Vec<Vec<&'m MetricSpec>>,
    responses: Vec<Option<Vec<TsdbSeries>>>,
    received: usize,
}

impl<'m> BatchState<'m> {
    fn new(sets: &[QuerySet<'m>]) -> Self {
        Self {
            sets: sets.iter().map(|s| s.metrics.clone()).collect(),
            responses: vec![None; sets.len()],
            received: 0,
        }
    }

    fn is_ready(&self) -> bool {
        self.received == self.sets.len()
    }

    fn record(&mut self, set_index: usize, series: Vec<TsdbSeries>) {
        if let Some(slot) = self.responses.get_mut(set_index)
            && slot.is_none()
        {
            *slot = Some(series);
            self.received += 1;
        }
    }

    fn merge(&mut self) -> Vec<TaggedSeries<'m>> {
        let mut merged = Vec::new();
        for (set, response) in self.sets.iter().zip(self.responses.iter_mut()) {
            for series in response.take().into_iter().flatten() {
                let metric = set.iter().copied().find(|m| m.name == series.metric);
                merged.push(TaggedSeries { series, metric });
            }
        }
        merged
    }
}

/// What the caller should do after feeding a response to the collector.
#[derive(Debug)]
pub enum Progress<'m> {
    /// More responses are expected.
    Pending,
    /// Every expected response arrived; reported once.
    Complete(QueryResults<'m>),
    /// First failure for this render; reported once.
    Failed(QueryError),
    /// The render already completed or failed.
    Ignored,
}

/// Fan-in state for one render of one graph.
///
/// Main and baseline batches are counted independently. Completion is
/// reported exactly once, when both are ready. The first failure makes the
/// collector ignore everything that follows.
#[derive(Debug)]
pub struct ResponseCollector<'m> {
    main: BatchState<'m>,
    baseline: Option<BatchState<'m>>,
    failed: bool,
    completed: bool,
}

impl<'m> ResponseCollector<'m> {
    pub fn new(plan: &QueryPlan<'m>) -> Self {
        Self {
            main: BatchState::new(&plan.main),
            baseline: plan.baseline.as_deref().map(BatchState::new),
            failed: false,
            completed: false,
        }
    }

    pub fn on_success(
        &mut self,
        batch: Batch,
        set_index: usize,
        series: Vec<TsdbSeries>,
    ) -> Progress<'m> {
        if self.failed || self.completed {
            return Progress::Ignored;
        }
        match (batch, self.baseline.as_mut()) {
            (Batch::Main, _) => self.main.record(set_index, series),
            (Batch::Baseline, Some(baseline)) => baseline.record(set_index, series),
            (Batch::Baseline, None) => return Progress::Ignored,
        }

        let baseline_ready = self.baseline.as_ref().is_none_or(BatchState::is_ready);
        if !(self.main.is_ready() && baseline_ready) {
            return Progress::Pending;
        }
        self.completed = true;
        Progress::Complete(QueryResults {
            main: self.main.merge(),
            baseline: self.baseline.as_mut().map(BatchState::merge),
        })
    }

    pub fn on_error(&mut self, batch: Batch, set_index: usize, error: QueryError) -> Progress<'m> {
        if self.failed || self.completed {
            return Progress::Ignored;
        }
        debug!("{batch:?} query set {set_index} failed: {error}");
        self.failed = true;
        Progress::Failed(error)
    }
}

/// Plans, issues and collects every query for a graph.
///
/// Requests run concurrently. A failure is recorded as a render message for
/// the graph and returned; responses still in flight are dropped.
pub async fn execute_queries<'m>(
    ctx: &mut RenderContext,
    session: &QuerySession,
    executor: &dyn QueryExecutor,
    global: &GlobalTimeConfig,
    graph_id: &str,
    metrics: &[&'m MetricSpec],
    options: &PlannerOptions<'_>,
) -> Result<QueryResults<'m>> {
    let plan = plan_queries(ctx, session, global, graph_id, metrics, options)?;
    let mut collector = ResponseCollector::new(&plan);
    let with_credentials = session.authenticated_reads;

    let mut pending: FuturesUnordered<_> = plan
        .requests()
        .map(|(batch, index, url)| async move {
            (batch, index, executor.get(url, with_credentials).await)
        })
        .collect();
    info!("[{graph_id}] issuing {} queries", pending.len());

    while let Some((batch, index, result)) = pending.next().await {
        let progress = match result {
            Ok(series) => collector.on_success(batch, index, series),
            Err(error) => collector.on_error(batch, index, error),
        };
        match progress {
            Progress::Complete(results) => return Ok(results),
            Progress::Failed(error) => {
                let error = Error::Query(error);
                ctx.message(graph_id, error.to_string());
                return Err(error);
            }
            Progress::Pending | Progress::Ignored => {}
        }
    }

    let error = Error::Query(QueryError::Transport(
        "query fan-out ended before every response arrived".to_string(),
    ));
    ctx.message(graph_id, error.to_string());
    Err(error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
mod tests {
    use std::ptr;

    use time::macros::datetime;

    use super::*;
    use crate::model::{BaselineDatumStyle, GraphOptions, HeatmapOptions};

    fn metric(id: &str, name: &str) -> MetricSpec {
        MetricSpec {
            id: id.to_string(),
            name: name.to_string(),
            tags: vec![],
            graph_options: GraphOptions {
                aggregator: Some("sum".to_string()),
                ..Default::default()
            },
        }
    }

    fn baselining() -> GlobalTimeConfig {
        GlobalTimeConfig {
            baselining: true,
            baseline_datum_style: Some(BaselineDatumStyle::Relative),
            baseline_relative_period: Some("1w".to_string()),
            ..GlobalTimeConfig::relative("2h")
        }
    }

    fn line_chart() -> PlannerOptions<'static> {
        PlannerOptions {
            supports_baselining: true,
            reference: Some(datetime!(2017-01-08 12:00 UTC)),
            ..Default::default()
        }
    }

    #[test]
    fn test_partition_same_names() {
        let a1 = metric("1", "A");
        let a2 = metric("2", "A");
        let b = metric("3", "B");
        let sets = partition_metrics(&[&a1, &a2, &b]);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 2);
        assert!(ptr::eq(sets[0][0], &a1));
        assert!(ptr::eq(sets[0][1], &b));
        assert_eq!(sets[1].len(), 1);
        assert!(ptr::eq(sets[1][0], &a2));
    }

    #[test]
    fn test_partition_orders_names_by_first_appearance() {
        let b1 = metric("1", "B");
        let a1 = metric("2", "A");
        let a2 = metric("3", "A");
        let b2 = metric("4", "B");
        let a3 = metric("5", "A");
        let sets = partition_metrics(&[&b1, &a1, &a2, &b2, &a3]);
        let ids: Vec<Vec<&str>> = sets
            .iter()
            .map(|s| s.iter().map(|m| m.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["1", "2"], vec!["4", "3"], vec!["5"]]);
        assert!(partition_metrics(&[]).is_empty());
    }

    #[test]
    fn test_plan_urls() {
        let session = QuerySession::new("http://tsdb:4242");
        let global = GlobalTimeConfig::absolute("2017/01/01", "00:00:00", "2017/01/01", "00:05:00");
        let m = metric("1", "metric1");
        let step = |by: &str| format!("20s-{}", if by.is_empty() { "avg" } else { by });
        let options = PlannerOptions {
            require_arrays: true,
            downsample_override: Some(&step),
            ..Default::default()
        };
        let mut ctx = RenderContext::new();
        let plan = plan_queries(&mut ctx, &session, &global, "abc", &[&m], &options).unwrap();
        assert_eq!(
            plan.main[0].url,
            "http://tsdb:4242/api/query?start=2017/01/01 00:00:00&end=2017/01/01 00:05:00\
             &m=sum:20s-avg:metric1&no_annotations=true&ms=true&arrays=true&show_query=true"
        );
        assert!(plan.baseline.is_none());
    }

    #[test]
    fn test_plan_annotations() {
        let session = QuerySession::new("http://tsdb:4242");
        let m = metric("1", "m");
        let mut options = PlannerOptions {
            supports_annotations: true,
            annotations: true,
            ..Default::default()
        };
        let mut ctx = RenderContext::new();
        let global = GlobalTimeConfig::relative("1h");
        let plan = plan_queries(&mut ctx, &session, &global, "g", &[&m], &options).unwrap();
        assert!(plan.main[0].url.ends_with("&show_tsuids=true&ms=true&show_query=true"));

        options.global_annotations = true;
        let plan = plan_queries(&mut ctx, &session, &global, "g", &[&m], &options).unwrap();
        assert!(
            plan.main[0]
                .url
                .ends_with("&show_tsuids=true&global_annotations=true&ms=true&show_query=true")
        );

        options.supports_annotations = false;
        let plan = plan_queries(&mut ctx, &session, &global, "g", &[&m], &options).unwrap();
        assert!(plan.main[0].url.contains("&no_annotations=true"));
    }

    #[test]
    fn test_plan_baseline_batch() {
        let session = QuerySession::new("http://tsdb:4242");
        let a1 = metric("1", "A");
        let a2 = metric("2", "A");
        let mut ctx = RenderContext::new();
        let plan =
            plan_queries(&mut ctx, &session, &baselining(), "g", &[&a1, &a2], &line_chart())
                .unwrap();
        let baseline = plan.baseline.as_ref().unwrap();
        assert_eq!(plan.main.len(), 2);
        assert_eq!(baseline.len(), 2);
        assert!(
            baseline[0]
                .url
                .starts_with("http://tsdb:4242/api/query?start=2017/01/01 10:00:00&end=2017/01/01 12:00:00&m=sum:A")
        );
        assert_eq!(plan.requests().count(), 4);

        // not supported by the graph type
        let plan = plan_queries(
            &mut ctx,
            &session,
            &baselining(),
            "g",
            &[&a1],
            &PlannerOptions::default(),
        )
        .unwrap();
        assert!(plan.baseline.is_none());
    }

    #[test]
    fn test_plan_failure_records_error() {
        let session = QuerySession::new("http://tsdb:4242");
        let mut ctx = RenderContext::new();
        let result = plan_queries(
            &mut ctx,
            &session,
            &GlobalTimeConfig::relative("2h"),
            "g",
            &[],
            &PlannerOptions::default(),
        );
        assert!(matches!(result, Err(Error::NoMetrics)));
        assert!(ctx.has_error("g"));
    }

    fn plan_for<'m>(metrics: &[&'m MetricSpec]) -> QueryPlan<'m> {
        let session = QuerySession::new("http://tsdb:4242");
        let mut ctx = RenderContext::new();
        plan_queries(&mut ctx, &session, &baselining(), "g", metrics, &line_chart()).unwrap()
    }

    fn reply(name: &str, host: &str) -> Vec<TsdbSeries> {
        vec![TsdbSeries::new(name, &[(0, 1.0)]).with_tag("host", host)]
    }

    #[test]
    fn test_collector_any_arrival_order() {
        let a1 = metric("1", "A");
        let a2 = metric("2", "A");
        let b = metric("3", "B");
        let plan = plan_for(&[&a1, &a2, &b]);

        let orders: [[(Batch, usize); 4]; 3] = [
            [(Batch::Main, 0), (Batch::Main, 1), (Batch::Baseline, 0), (Batch::Baseline, 1)],
            [(Batch::Baseline, 1), (Batch::Baseline, 0), (Batch::Main, 1), (Batch::Main, 0)],
            [(Batch::Main, 1), (Batch::Baseline, 0), (Batch::Main, 0), (Batch::Baseline, 1)],
        ];
        for order in orders {
            let mut collector = ResponseCollector::new(&plan);
            let mut completions = 0;
            for (step, (batch, index)) in order.into_iter().enumerate() {
                let response = if index == 0 {
                    [reply("A", "a1"), reply("B", "b")].concat()
                } else {
                    reply("A", "a2")
                };
                match collector.on_success(batch, index, response) {
                    Progress::Complete(results) => {
                        completions += 1;
                        assert_eq!(step, 3);
                        let ids: Vec<&str> = results
                            .main
                            .iter()
                            .map(|t| t.metric.unwrap().id.as_str())
                            .collect();
                        assert_eq!(ids, vec!["1", "3", "2"]);
                        assert_eq!(results.baseline.unwrap().len(), 3);
                    }
                    Progress::Pending => {}
                    other => panic!("unexpected progress {other:?}"),
                }
            }
            assert_eq!(completions, 1);
            assert!(matches!(
                collector.on_success(Batch::Main, 0, vec![]),
                Progress::Ignored
            ));
        }
    }

    #[test]
    fn test_collector_failure_is_sticky() {
        let a = metric("1", "A");
        let plan = plan_for(&[&a]);
        let mut collector = ResponseCollector::new(&plan);

        assert!(matches!(
            collector.on_success(Batch::Baseline, 0, reply("A", "x")),
            Progress::Pending
        ));
        let err = QueryError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(matches!(
            collector.on_error(Batch::Main, 0, err.clone()),
            Progress::Failed(_)
        ));
        assert!(matches!(
            collector.on_error(Batch::Main, 0, err),
            Progress::Ignored
        ));
        assert!(matches!(
            collector.on_success(Batch::Main, 0, reply("A", "x")),
            Progress::Ignored
        ));
    }

    #[test]
    fn test_duplicate_response_is_counted_once() {
        let a = metric("1", "A");
        let b = metric("2", "A");
        let session = QuerySession::new("http://tsdb:4242");
        let mut ctx = RenderContext::new();
        let plan = plan_queries(
            &mut ctx,
            &session,
            &GlobalTimeConfig::relative("1h"),
            "g",
            &[&a, &b],
            &PlannerOptions::default(),
        )
        .unwrap();
        let mut collector = ResponseCollector::new(&plan);
        assert!(matches!(
            collector.on_success(Batch::Main, 0, reply("A", "x")),
            Progress::Pending
        ));
        assert!(matches!(
            collector.on_success(Batch::Main, 0, reply("A", "x")),
            Progress::Pending
        ));
        assert!(matches!(
            collector.on_success(Batch::Main, 1, reply("A", "y")),
            Progress::Complete(_)
        ));
    }

    #[test]
    fn test_options_for_graph() {
        let heatmap = GraphSpec {
            id: "h".to_string(),
            graph_type: Some(GraphType::Heatmap),
            heatmap: Some(HeatmapOptions {
                style: Some(HeatmapStyle::DayHour),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = PlannerOptions::for_graph(&heatmap);
        assert!(options.require_arrays);
        assert!(!options.supports_baselining);
        assert_eq!(options.downsample_override.map(|f| f("sum")).as_deref(), Some("1h-avg"));

        let dygraph = GraphSpec {
            id: "d".to_string(),
            graph_type: Some(GraphType::Dygraph),
            ..Default::default()
        };
        let options = PlannerOptions::for_graph(&dygraph);
        assert!(options.supports_baselining);
        assert!(options.downsample_override.is_none());

        let untyped = PlannerOptions::for_graph(&GraphSpec::default());
        assert!(!untyped.require_arrays);
    }

    #[test]
    fn test_tagging_uses_set_membership() {
        let tagged = metric("9", "cpu");
        let other = metric("8", "mem");
        let plan = QueryPlan {
            main: vec![QuerySet {
                metrics: vec![&tagged, &other],
                url: String::new(),
            }],
            baseline: None,
        };
        let mut collector = ResponseCollector::new(&plan);
        let response = vec![
            TsdbSeries::new("mem", &[]),
            TsdbSeries::new("unknown", &[]),
            TsdbSeries::new("cpu", &[]),
        ];
        let Progress::Complete(results) = collector.on_success(Batch::Main, 0, response) else {
            panic!("expected completion");
        };
        assert!(ptr::eq(results.main[0].metric.unwrap(), &other));
        assert!(results.main[1].metric.is_none());
        assert!(ptr::eq(results.main[2].metric.unwrap(), &tagged));
    }
}
