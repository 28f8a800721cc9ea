// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! JSON bodies returned by `/api/query`.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// One series of an `/api/query` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsdbSeries {
    pub metric: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub aggregate_tags: Vec<String>,
    /// Either `[[ts, value], ...]` (`arrays=true`) or `{"ts": value, ...}`.
    #[serde(default, deserialize_with = "deserialize_dps")]
    pub dps: Vec<DataPoint>,
    /// Echo of the sub-query that produced this series (`show_query=true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryEcho>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tsuids: Vec<String>,
}

impl TsdbSeries {
    pub fn new(metric: &str, points: &[(i64, f64)]) -> Self {
        Self {
            metric: metric.to_string(),
            dps: points
                .iter()
                .map(|&(timestamp, value)| DataPoint { timestamp, value })
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Converts millisecond timestamps (`ms=true`) to seconds.
    pub fn into_seconds(mut self) -> Self {
        for dp in &mut self.dps {
            dp.timestamp = dp.timestamp.div_euclid(1000);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i64, f64)", into = "(i64, f64)")]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl From<(i64, f64)> for DataPoint {
    fn from((timestamp, value): (i64, f64)) -> Self {
        Self { timestamp, value }
    }
}

impl From<DataPoint> for (i64, f64) {
    fn from(dp: DataPoint) -> Self {
        (dp.timestamp, dp.value)
    }
}

fn deserialize_dps<'de, D>(deserializer: D) -> Result<Vec<DataPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDps {
        Pairs(Vec<DataPoint>),
        Map(BTreeMap<String, f64>),
    }

    match RawDps::deserialize(deserializer)? {
        RawDps::Pairs(points) => Ok(points),
        RawDps::Map(map) => {
            let mut points = map
                .into_iter()
                .map(|(ts, value)| {
                    ts.parse::<i64>()
                        .map(|timestamp| DataPoint { timestamp, value })
                        .map_err(|_| D::Error::custom(format!("invalid timestamp key {ts:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            // keys were ordered as strings
            points.sort_by_key(|dp| dp.timestamp);
            Ok(points)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEcho {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
}

/// A tag filter as echoed back by filter-capable backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub tagk: String,
    #[serde(rename = "type")]
    pub filter_type: String,
    pub filter: String,
    #[serde(default)]
    pub group_by: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsuid: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}
