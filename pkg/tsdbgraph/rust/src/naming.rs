// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Display names for returned series.

use crate::response::{Filter, TsdbSeries};

/// Canonical name of a series: `metric{groupby}{ungrouped}`.
///
/// With a filter echo, a tag key is grouped when any of its filters groups
/// by it, and takes the value returned for that key. Keys whose filters all
/// restrict without grouping are listed as `tagk=type(filter)` in the second
/// block, in encounter order. Without an echo every returned tag is grouped.
/// Grouped keys are sorted; empty blocks are left out.
pub fn series_name(series: &TsdbSeries) -> String {
    let mut grouped: Vec<&str> = Vec::new();
    let mut ungrouped: Vec<String> = Vec::new();

    match &series.query {
        Some(echo) => {
            if let Some(filters) = &echo.filters {
                for (tagk, filters) in filters_by_tagk(filters) {
                    if filters.iter().any(|f| f.group_by) {
                        grouped.push(tagk);
                    } else {
                        ungrouped.extend(
                            filters
                                .iter()
                                .map(|f| format!("{tagk}={}({})", f.filter_type, f.filter)),
                        );
                    }
                }
            }
        }
        None => grouped.extend(series.tags.keys().map(String::as_str)),
    }
    grouped.sort_unstable();

    let group_block: Vec<String> = grouped
        .into_iter()
        .filter_map(|k| series.tags.get(k).map(|v| format!("{k}={v}")))
        .collect();

    let mut name = series.metric.clone();
    if !group_block.is_empty() {
        name.push_str(&format!("{{{}}}", group_block.join(",")));
    }
    if !ungrouped.is_empty() {
        name.push_str(&format!("{{{}}}", ungrouped.join(",")));
    }
    name
}

fn filters_by_tagk(filters: &[Filter]) -> Vec<(&str, Vec<&Filter>)> {
    let mut by_tagk: Vec<(&str, Vec<&Filter>)> = Vec::new();
    for filter in filters {
        match by_tagk.iter_mut().find(|(k, _)| *k == filter.tagk) {
            Some((_, group)) => group.push(filter),
            None => by_tagk.push((&filter.tagk, vec![filter])),
        }
    }
    by_tagk
}

/// Names every series and orders them by name. Equal names keep their
/// relative order.
pub fn sort_by_name<'a, I>(series: I) -> Vec<(String, &'a TsdbSeries)>
where
    I: IntoIterator<Item = &'a TsdbSeries>,
{
    let mut named: Vec<(String, &TsdbSeries)> =
        series.into_iter().map(|s| (series_name(s), s)).collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    named
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::response::QueryEcho;

    fn filter(tagk: &str, filter_type: &str, expr: &str, group_by: bool) -> Filter {
        Filter {
            tagk: tagk.to_string(),
            filter_type: filter_type.to_string(),
            filter: expr.to_string(),
            group_by,
        }
    }

    fn with_filters(series: TsdbSeries, filters: Vec<Filter>) -> TsdbSeries {
        TsdbSeries {
            query: Some(QueryEcho {
                filters: Some(filters),
                ..Default::default()
            }),
            ..series
        }
    }

    #[test]
    fn test_plain_metric() {
        assert_eq!(series_name(&TsdbSeries::new("metric1", &[])), "metric1");
    }

    #[test]
    fn test_legacy_tags_sorted() {
        let s = TsdbSeries::new("cpu", &[])
            .with_tag("host", "web01")
            .with_tag("dc", "lon");
        assert_eq!(series_name(&s), "cpu{dc=lon,host=web01}");
    }

    #[test]
    fn test_group_by_wildcard_names() {
        let host = |h: &str| {
            with_filters(
                TsdbSeries::new("metric", &[]).with_tag("host", h),
                vec![filter("host", "wildcard", "*", true)],
            )
        };
        let series = [host("host2"), host("host1")];
        let names: Vec<String> = sort_by_name(&series).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["metric{host=host1}", "metric{host=host2}"]);
    }

    #[test]
    fn test_ungrouped_filters() {
        let s = with_filters(
            TsdbSeries::new("cpu", &[])
                .with_tag("host", "web01")
                .with_tag("dc", "lon"),
            vec![
                filter("dc", "literal_or", "lon", false),
                filter("host", "wildcard", "web*", true),
                filter("dc", "not_literal_or", "ams", false),
                filter("role", "regexp", "db.*", false),
            ],
        );
        assert_eq!(
            series_name(&s),
            "cpu{host=web01}{dc=literal_or(lon),dc=not_literal_or(ams),role=regexp(db.*)}"
        );
    }

    #[test]
    fn test_only_ungrouped() {
        let s = with_filters(
            TsdbSeries::new("cpu", &[]),
            vec![filter("dc", "literal_or", "lon", false)],
        );
        assert_eq!(series_name(&s), "cpu{dc=literal_or(lon)}");
    }

    #[test]
    fn test_echo_without_filters_ignores_tags() {
        let s = TsdbSeries {
            query: Some(QueryEcho::default()),
            ..TsdbSeries::new("cpu", &[]).with_tag("host", "web01")
        };
        assert_eq!(series_name(&s), "cpu");
    }
}
