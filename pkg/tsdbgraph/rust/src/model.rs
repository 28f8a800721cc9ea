// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Dashboard model: global time settings, graphs and metrics.
//!
//! The JSON shape (camelCase keys) is the one the browser dashboard keeps
//! in memory, so a model exported from the UI deserializes as-is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardModel {
    pub global: GlobalTimeConfig,
    pub graphs: Vec<GraphSpec>,
    pub metrics: Vec<MetricSpec>,
}

impl DashboardModel {
    pub fn graph(&self, id: &str) -> Option<&GraphSpec> {
        self.graphs.iter().find(|g| g.id == id)
    }

    /// Metrics linked to the graph through `graphOptions.graphId`, in model order.
    pub fn metrics_for_graph(&self, graph_id: &str) -> Vec<&MetricSpec> {
        self.metrics
            .iter()
            .filter(|m| m.graph_options.graph_id.as_deref() == Some(graph_id))
            .collect()
    }
}

/// Time window settings shared by every graph on the dashboard.
///
/// When `absolute_time_specification` is set the `from_*`/`to_*` fields
/// govern the main window, otherwise `relative_period` does. Baseline
/// fields only matter while `baselining` is on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalTimeConfig {
    pub absolute_time_specification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_period: Option<String>,
    pub auto_reload: bool,
    pub auto_graph_height: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_graph_height: Option<u32>,
    pub global_downsampling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_downsample_to: Option<String>,
    pub baselining: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_datum_style: Option<BaselineDatumStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_from_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_from_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_to_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_to_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_relative_period: Option<String>,
}

impl GlobalTimeConfig {
    pub fn relative(period: &str) -> Self {
        Self {
            relative_period: Some(period.to_string()),
            ..Default::default()
        }
    }

    pub fn absolute(from_date: &str, from_time: &str, to_date: &str, to_time: &str) -> Self {
        Self {
            absolute_time_specification: true,
            from_date: Some(from_date.to_string()),
            from_time: Some(from_time.to_string()),
            to_date: Some(to_date.to_string()),
            to_time: Some(to_time.to_string()),
            ..Default::default()
        }
    }
}

/// Which end of the baseline window is pinned by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BaselineDatumStyle {
    /// Baseline starts at a literal date/time and lasts as long as the main window.
    From,
    /// Baseline ends at a literal date/time and lasts as long as the main window.
    To,
    /// Baseline is the main window shifted back by a relative period.
    Relative,
}

impl BaselineDatumStyle {
    pub const ALL: [BaselineDatumStyle; 3] = [
        BaselineDatumStyle::From,
        BaselineDatumStyle::To,
        BaselineDatumStyle::Relative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineDatumStyle::From => "from",
            BaselineDatumStyle::To => "to",
            BaselineDatumStyle::Relative => "relative",
        }
    }
}

impl FromStr for BaselineDatumStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from" => Ok(BaselineDatumStyle::From),
            "to" => Ok(BaselineDatumStyle::To),
            "relative" => Ok(BaselineDatumStyle::Relative),
            other => Err(Error::UnrecognizedBaselineStyle(other.to_string())),
        }
    }
}

impl TryFrom<String> for BaselineDatumStyle {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BaselineDatumStyle> for String {
    fn from(style: BaselineDatumStyle) -> Self {
        style.as_str().to_string()
    }
}

impl fmt::Display for BaselineDatumStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GraphType {
    Debug,
    Gnuplot,
    Horizon,
    Dygraph,
    Scatter,
    Heatmap,
}

impl GraphType {
    pub const ALL: [GraphType; 6] = [
        GraphType::Debug,
        GraphType::Gnuplot,
        GraphType::Horizon,
        GraphType::Dygraph,
        GraphType::Scatter,
        GraphType::Heatmap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Debug => "debug",
            GraphType::Gnuplot => "gnuplot",
            GraphType::Horizon => "horizon",
            GraphType::Dygraph => "dygraph",
            GraphType::Scatter => "scatter",
            GraphType::Heatmap => "heatmap",
        }
    }

    /// Line charts can overlay a time-shifted baseline window.
    pub fn supports_baselining(&self) -> bool {
        matches!(self, GraphType::Dygraph)
    }

    pub fn supports_annotations(&self) -> bool {
        matches!(self, GraphType::Dygraph)
    }

    /// Renderers that consume `[timestamp, value]` arrays rather than maps.
    pub fn requires_arrays(&self) -> bool {
        !matches!(self, GraphType::Debug | GraphType::Gnuplot)
    }
}

impl FromStr for GraphType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GraphType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownGraphType(s.to_string()))
    }
}

impl TryFrom<String> for GraphType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GraphType> for String {
    fn from(t: GraphType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph on the dashboard. Only the option block matching `graph_type`
/// is consulted when rendering; the others are kept so switching type in
/// the UI does not lose settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    pub id: String,
    #[serde(rename = "type", default)]
    pub graph_type: Option<GraphType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub show_title: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnuplot: Option<GnuplotOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon: Option<HorizonOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dygraph: Option<DygraphOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scatter: Option<ScatterGraphOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<HeatmapOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GnuplotOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis_range: Option<String>,
    pub y_axis_log_scale: bool,
    pub y2_axis_log_scale: bool,
    pub show_key: bool,
    pub key_box: bool,
    pub line_smoothing: bool,
    pub global_annotations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HorizonOptions {
    pub interpolate_gaps: bool,
    pub squash_negative: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DygraphOptions {
    pub interpolate_gaps: bool,
    pub highlight_lines: bool,
    pub stacked_lines: bool,
    pub squash_negative: bool,
    pub auto_scale: bool,
    pub ylog: bool,
    pub mean_adjusted: bool,
    pub annotations: bool,
    pub global_annotations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_filter: Option<CountFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_filter: Option<ValueFilter>,
}

/// Keep only the top/bottom `count` series ranked by `measure`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CountFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
}

/// Keep only series whose `measure` lies within the bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueFilter {
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub lower_bound: Option<String>,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub upper_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScatterGraphOptions {
    pub exclude_negative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapStyle {
    Auto,
    WeekDay,
    DayHour,
}

impl HeatmapStyle {
    pub const ALL: [HeatmapStyle; 3] = [
        HeatmapStyle::Auto,
        HeatmapStyle::WeekDay,
        HeatmapStyle::DayHour,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeatmapOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<HeatmapStyle>,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub filter_lower_bound: Option<String>,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub filter_upper_bound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour_scheme: Option<String>,
    pub reverse_colours: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub graph_options: GraphOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub value: String,
    /// `None` comes from specs saved before filters existed and means "group by".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<bool>,
}

impl Tag {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            group_by: None,
        }
    }

    pub fn filter(name: &str, value: &str) -> Self {
        Self {
            group_by: Some(false),
            ..Self::new(name, value)
        }
    }

    pub fn is_group_by(&self) -> bool {
        self.group_by.unwrap_or(true)
    }
}

/// Per-metric query and display options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    pub rate: bool,
    pub rate_counter: bool,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate_counter_max: Option<String>,
    #[serde(
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate_counter_reset: Option<String>,
    pub downsample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsample_to: Option<String>,
    /// `"x1y1"` or `"x1y2"`; anything else is rejected when building image URLs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
    /// Plot on the right-hand axis of line charts.
    pub right_axis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter: Option<MetricScatterOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricScatterOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
}

/// Several numeric-looking fields are saved by the UI either as JSON
/// numbers or as strings; both land here as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_ui_model() {
        let json = r#"{
            "global": {"absoluteTimeSpecification": false, "relativePeriod": "2h", "autoReload": false},
            "graphs": [{"id": "1", "type": "horizon", "title": "Graph 1",
                        "horizon": {"interpolateGaps": true, "squashNegative": false}}],
            "metrics": [{"id": "7", "name": "cpu.percent",
                         "tags": [{"name": "host", "value": "*"}],
                         "graphOptions": {"graphId": "1", "aggregator": "sum", "rate": true,
                                          "rateCounter": true, "rateCounterMax": 12345,
                                          "rateCounterReset": ""}}]
        }"#;
        let model: DashboardModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.global.relative_period.as_deref(), Some("2h"));
        assert_eq!(model.graphs[0].graph_type, Some(GraphType::Horizon));
        assert!(model.graphs[0].horizon.as_ref().unwrap().interpolate_gaps);

        let options = &model.metrics[0].graph_options;
        assert_eq!(options.rate_counter_max.as_deref(), Some("12345"));
        assert_eq!(options.rate_counter_reset.as_deref(), Some(""));
        assert!(model.metrics[0].tags[0].is_group_by());
        assert_eq!(model.metrics_for_graph("1").len(), 1);
        assert!(model.metrics_for_graph("2").is_empty());
    }

    #[test]
    fn test_unknown_baseline_style_is_rejected() {
        let json = r#"{"baselining": true, "baselineDatumStyle": "sideways"}"#;
        let err = serde_json::from_str::<GlobalTimeConfig>(json).unwrap_err();
        assert!(
            err.to_string()
                .contains("Unrecognized baseline datum style: sideways")
        );
    }

    #[test]
    fn test_null_graph_type() {
        let graph: GraphSpec = serde_json::from_str(r#"{"id": "1", "type": null}"#).unwrap();
        assert_eq!(graph.graph_type, None);
        assert!(!graph.show_title);
    }

    #[test]
    fn test_graph_type_round_trip() {
        for t in GraphType::ALL {
            assert_eq!(t.as_str().parse::<GraphType>().unwrap(), t);
        }
        assert!("pie".parse::<GraphType>().is_err());
    }

    #[test]
    fn test_tag_group_by_defaults() {
        assert!(Tag::new("host", "*").is_group_by());
        assert!(!Tag::filter("host", "web01").is_group_by());
    }

    #[test]
    fn test_heatmap_style_names() {
        let style: HeatmapStyle = serde_json::from_str(r#""week_day""#).unwrap();
        assert_eq!(style, HeatmapStyle::WeekDay);
    }
}
