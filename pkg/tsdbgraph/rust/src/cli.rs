// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tsdb_graph::export::{self, ExportParams};
use tsdb_graph::naming::sort_by_name;
use tsdb_graph::planner::{self, PlannerOptions, TaggedSeries};
use tsdb_graph::{
    DashboardModel, GraphSpec, GraphType, MetricSpec, QueryExecutor, QuerySession, RenderContext,
    codec,
};

#[derive(Parser, Debug)]
#[command(name = "tsdb-graph")]
#[command(about = "Builds, exports and runs the queries behind time-series dashboards", long_about = None)]
pub struct Args {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the URL token of a dashboard model (JSON file)
    Encode { model: PathBuf },
    /// Print the dashboard model held by a URL token, as JSON
    Decode { token: String },
    /// Print the query URLs planned for a graph
    Urls {
        model: PathBuf,
        #[arg(short, long)]
        graph: String,
    },
    /// Print the image-export URL of a gnuplot graph
    ExportUrl {
        model: PathBuf,
        #[arg(short, long)]
        graph: String,
    },
    /// Run the queries of a graph and list the returned series
    Query {
        model: PathBuf,
        #[arg(short, long)]
        graph: String,
    },
}

fn read_model(path: &Path) -> Result<DashboardModel> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn find_graph<'a>(model: &'a DashboardModel, graph_id: &str) -> Result<&'a GraphSpec> {
    model
        .graph(graph_id)
        .with_context(|| format!("no graph with id {graph_id} in the model"))
}

fn series_lines(label: &str, series: &[TaggedSeries<'_>]) -> Vec<String> {
    sort_by_name(series.iter().map(|s| &s.series))
        .into_iter()
        .map(|(name, s)| format!("{label}{name}  {}", s.dps.len()))
        .collect()
}

/// Runs one subcommand and returns what it prints, line by line.
pub async fn run(
    command: Command,
    session: &QuerySession,
    executor: &dyn QueryExecutor,
) -> Result<Vec<String>> {
    match command {
        Command::Encode { model } => Ok(vec![codec::serialize(&read_model(&model)?)]),
        Command::Decode { token } => {
            let model = codec::deserialize(&token).context("decoding token")?;
            Ok(vec![serde_json::to_string_pretty(&model)?])
        }
        Command::Urls { model, graph } => {
            let model = read_model(&model)?;
            let spec = find_graph(&model, &graph)?;
            let metrics = model.metrics_for_graph(&graph);
            let mut ctx = RenderContext::new();
            let plan = planner::plan_queries(
                &mut ctx,
                session,
                &model.global,
                &graph,
                &metrics,
                &PlannerOptions::for_graph(spec),
            )
            .with_context(|| format!("planning graph {graph}"))?;
            Ok(plan
                .requests()
                .map(|(batch, _, url)| format!("{}: {url}", batch_label(batch)))
                .collect())
        }
        Command::ExportUrl { model, graph } => {
            let model = read_model(&model)?;
            let spec = find_graph(&model, &graph)?;
            if spec.graph_type != Some(GraphType::Gnuplot) {
                bail!("graph {graph} is not a gnuplot graph");
            }
            let metrics: Vec<&MetricSpec> = model.metrics_for_graph(&graph);
            let params = spec
                .gnuplot
                .as_ref()
                .map(ExportParams::from_gnuplot)
                .unwrap_or_default();
            let mut ctx = RenderContext::new();
            let url =
                export::tsdb_graph_url(&mut ctx, session, &model.global, &graph, &metrics, &params)
                    .with_context(|| format!("exporting graph {graph}"))?;
            Ok(vec![url])
        }
        Command::Query { model, graph } => {
            let model = read_model(&model)?;
            let spec = find_graph(&model, &graph)?;
            let metrics = model.metrics_for_graph(&graph);
            let mut ctx = RenderContext::new();
            let results = planner::execute_queries(
                &mut ctx,
                session,
                executor,
                &model.global,
                &graph,
                &metrics,
                &PlannerOptions::for_graph(spec),
            )
            .await
            .with_context(|| format!("querying graph {graph}"))?;

            let mut lines = series_lines("", &results.main);
            if let Some(baseline) = &results.baseline {
                lines.extend(series_lines("baseline ", baseline));
            }
            Ok(lines)
        }
    }
}

fn batch_label(batch: planner::Batch) -> &'static str {
    match batch {
        planner::Batch::Main => "main",
        planner::Batch::Baseline => "baseline",
    }
}
