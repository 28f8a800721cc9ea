// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::macros::datetime;
use tsdb_graph::planner::{PlannerOptions, execute_queries};
use tsdb_graph::{
    BaselineDatumStyle, Error, GlobalTimeConfig, GraphOptions, MetricSpec, QueryError,
    QueryExecutor, QuerySession, RenderContext, Tag, TsdbSeries,
};

const GRAPH: &str = "graph-1";

/// Which request a scripted response answers: the batch, and whether the
/// set is the one carrying `sys.mem`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Route {
    baseline: bool,
    first_set: bool,
}

const MAIN_0: Route = Route {
    baseline: false,
    first_set: true,
};
const MAIN_1: Route = Route {
    baseline: false,
    first_set: false,
};
const BASE_0: Route = Route {
    baseline: true,
    first_set: true,
};
const BASE_1: Route = Route {
    baseline: true,
    first_set: false,
};

struct ScriptedExecutor {
    script: Vec<(Route, u64, Result<Vec<TsdbSeries>, QueryError>)>,
    calls: Mutex<Vec<Route>>,
}

impl ScriptedExecutor {
    fn new(script: Vec<(Route, u64, Result<Vec<TsdbSeries>, QueryError>)>) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn get(&self, url: &str, _with_credentials: bool) -> Result<Vec<TsdbSeries>, QueryError> {
        let route = Route {
            baseline: !url.contains("start=2h-ago"),
            first_set: url.contains("m=sum:sys.mem"),
        };
        self.calls.lock().unwrap().push(route);
        let (_, delay, response) = self
            .script
            .iter()
            .find(|(r, _, _)| *r == route)
            .ok_or_else(|| QueryError::Transport(format!("unscripted url {url}")))?;
        tokio::time::sleep(Duration::from_millis(*delay)).await;
        response.clone()
    }
}

fn metric(id: &str, name: &str, host: &str) -> MetricSpec {
    MetricSpec {
        id: id.to_string(),
        name: name.to_string(),
        tags: vec![Tag::new("host", host)],
        graph_options: GraphOptions {
            graph_id: Some(GRAPH.to_string()),
            aggregator: Some("sum".to_string()),
            ..Default::default()
        },
    }
}

fn metrics() -> [MetricSpec; 3] {
    [
        metric("1", "sys.cpu", "web01"),
        metric("2", "sys.cpu", "web02"),
        metric("3", "sys.mem", "web01"),
    ]
}

fn baselining() -> GlobalTimeConfig {
    GlobalTimeConfig {
        baselining: true,
        baseline_datum_style: Some(BaselineDatumStyle::Relative),
        baseline_relative_period: Some("1d".to_string()),
        ..GlobalTimeConfig::relative("2h")
    }
}

fn options() -> PlannerOptions<'static> {
    PlannerOptions {
        supports_baselining: true,
        require_arrays: true,
        reference: Some(datetime!(2017-01-08 12:00 UTC)),
        ..Default::default()
    }
}

fn ok(names: &[&str]) -> Result<Vec<TsdbSeries>, QueryError> {
    Ok(names
        .iter()
        .map(|n| TsdbSeries::new(n, &[(1483876800000, 1.0)]))
        .collect())
}

async fn run_with_delays(delays: [(Route, u64); 4]) -> Vec<Vec<(String, Option<String>)>> {
    let script = delays
        .into_iter()
        .map(|(route, delay)| {
            let body = if route.first_set {
                ok(&["sys.cpu", "sys.mem"])
            } else {
                ok(&["sys.cpu"])
            };
            (route, delay, body)
        })
        .collect();
    let executor = ScriptedExecutor::new(script);
    let metrics = metrics();
    let refs: Vec<&MetricSpec> = metrics.iter().collect();
    let session = QuerySession::new("http://tsdb:4242");
    let mut ctx = RenderContext::new();

    let results = execute_queries(
        &mut ctx,
        &session,
        &executor,
        &baselining(),
        GRAPH,
        &refs,
        &options(),
    )
    .await
    .unwrap();

    assert!(ctx.is_clean());
    assert_eq!(executor.calls.lock().unwrap().len(), 4);

    let describe = |batch: &[tsdb_graph::planner::TaggedSeries<'_>]| {
        batch
            .iter()
            .map(|t| (t.series.metric.clone(), t.metric.map(|m| m.id.clone())))
            .collect::<Vec<_>>()
    };
    vec![
        describe(&results.main),
        describe(results.baseline.as_deref().unwrap()),
    ]
}

fn expected_batch() -> Vec<(String, Option<String>)> {
    vec![
        ("sys.cpu".to_string(), Some("1".to_string())),
        ("sys.mem".to_string(), Some("3".to_string())),
        ("sys.cpu".to_string(), Some("2".to_string())),
    ]
}

#[tokio::test]
async fn test_main_before_baseline() {
    let batches = run_with_delays([(MAIN_0, 1), (MAIN_1, 5), (BASE_0, 30), (BASE_1, 40)]).await;
    assert_eq!(batches, vec![expected_batch(), expected_batch()]);
}

#[tokio::test]
async fn test_baseline_before_main() {
    let batches = run_with_delays([(MAIN_0, 40), (MAIN_1, 30), (BASE_0, 5), (BASE_1, 1)]).await;
    assert_eq!(batches, vec![expected_batch(), expected_batch()]);
}

#[tokio::test]
async fn test_interleaved_arrival() {
    let batches = run_with_delays([(MAIN_0, 30), (MAIN_1, 1), (BASE_0, 5), (BASE_1, 40)]).await;
    assert_eq!(batches, vec![expected_batch(), expected_batch()]);
}

#[tokio::test]
async fn test_first_failure_is_reported_once() {
    let executor = ScriptedExecutor::new(vec![
        (MAIN_0, 1, ok(&["sys.cpu", "sys.mem"])),
        (
            MAIN_1,
            5,
            Err(QueryError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
        ),
        (
            BASE_0,
            20,
            Err(QueryError::Status {
                status: 503,
                body: "later".to_string(),
            }),
        ),
        (BASE_1, 30, ok(&["sys.cpu"])),
    ]);
    let metrics = metrics();
    let refs: Vec<&MetricSpec> = metrics.iter().collect();
    let session = QuerySession::new("http://tsdb:4242");
    let mut ctx = RenderContext::new();

    let err = execute_queries(
        &mut ctx,
        &session,
        &executor,
        &baselining(),
        GRAPH,
        &refs,
        &options(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        Error::Query(QueryError::Status { status: 500, .. })
    ));
    assert_eq!(
        ctx.render_messages.get(GRAPH).map(String::as_str),
        Some("Error loading data: 500 boom")
    );
    assert!(ctx.render_errors.is_empty());
}

#[tokio::test]
async fn test_failure_after_baseline_completed() {
    let executor = ScriptedExecutor::new(vec![
        (MAIN_0, 1, ok(&["sys.cpu", "sys.mem"])),
        (
            MAIN_1,
            30,
            Err(QueryError::Transport("connection reset".to_string())),
        ),
        (BASE_0, 1, ok(&["sys.cpu", "sys.mem"])),
        (BASE_1, 5, ok(&["sys.cpu"])),
    ]);
    let metrics = metrics();
    let refs: Vec<&MetricSpec> = metrics.iter().collect();
    let session = QuerySession::new("http://tsdb:4242");
    let mut ctx = RenderContext::new();

    let result = execute_queries(
        &mut ctx,
        &session,
        &executor,
        &baselining(),
        GRAPH,
        &refs,
        &options(),
    )
    .await;

    assert!(result.is_err());
    assert!(ctx.render_messages.contains_key(GRAPH));
}

#[tokio::test]
async fn test_configuration_error_issues_no_requests() {
    let executor = ScriptedExecutor::new(Vec::new());
    let session = QuerySession::new("http://tsdb:4242");
    let mut ctx = RenderContext::new();

    let err = execute_queries(
        &mut ctx,
        &session,
        &executor,
        &baselining(),
        GRAPH,
        &[],
        &options(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NoMetrics));
    assert_eq!(
        ctx.render_errors.get(GRAPH).map(String::as_str),
        Some("No metrics specified")
    );
    assert!(executor.calls.lock().unwrap().is_empty());
}
