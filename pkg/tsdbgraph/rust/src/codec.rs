// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Compact URL-safe token holding a whole dashboard model, suitable for a
//! URL fragment.
//!
//! Layout before base64: a version byte, the string table (entry count,
//! then length-prefixed UTF-8 entries in first-use order), then the model
//! body. Every struct in the body opens with one flag word carrying its
//! booleans and the presence bits of its optional fields, in field order;
//! the present values follow in that same order. Strings are table
//! indices. Fields listed in [`TextField`] are split on their separator
//! and stored as a list of segment indices, so `some.app.metric1` and
//! `some.app.metric2` share two entries.
//!
//! Ids are not carried. Decoding numbers graphs and metrics from `"0"` and
//! points each metric at its graph by position, which is exactly what
//! [`compact_ids`] does to the source model. Tags with an empty value are
//! not carried either.

mod wire;

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

use crate::model::{
    BaselineDatumStyle, CountFilter, DashboardModel, DygraphOptions, GlobalTimeConfig,
    GnuplotOptions, GraphOptions, GraphSpec, GraphType, HeatmapOptions, HeatmapStyle,
    HorizonOptions, MetricScatterOptions, MetricSpec, ScatterGraphOptions, Tag, ValueFilter,
};
use wire::{Flags, Reader, Writer};

const TOKEN_VERSION: u8 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token is empty")]
    Empty,

    #[error("Unsupported token version {0}")]
    UnsupportedVersion(u8),

    #[error("Token is truncated")]
    Truncated,

    #[error("Varint does not fit in 64 bits")]
    VarintOverflow,

    #[error("Value {0} is out of range")]
    OutOfRange(u64),

    #[error("String table index {0} is out of range")]
    BadIndex(u64),

    #[error("Unknown {kind} discriminant {value}")]
    UnknownDiscriminant { kind: &'static str, value: u64 },

    #[error("String table entry is not valid UTF-8")]
    Utf8,

    #[error("{0} unexpected bytes after the model")]
    TrailingBytes(usize),
}

/// Free-text fields stored as separator-split segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    GraphTitle,
    GnuplotYAxisLabel,
    GnuplotY2AxisLabel,
    GnuplotYAxisFormat,
    GnuplotY2AxisFormat,
    GnuplotYAxisRange,
    GnuplotY2AxisRange,
    MetricName,
    TagName,
    TagValue,
}

impl TextField {
    pub const ALL: [TextField; 10] = [
        TextField::GraphTitle,
        TextField::GnuplotYAxisLabel,
        TextField::GnuplotY2AxisLabel,
        TextField::GnuplotYAxisFormat,
        TextField::GnuplotY2AxisFormat,
        TextField::GnuplotYAxisRange,
        TextField::GnuplotY2AxisRange,
        TextField::MetricName,
        TextField::TagName,
        TextField::TagValue,
    ];

    /// Dotted path of the field in the JSON model.
    pub fn path(&self) -> &'static str {
        match self {
            TextField::GraphTitle => "graphs.title",
            TextField::GnuplotYAxisLabel => "graphs.gnuplot.yAxisLabel",
            TextField::GnuplotY2AxisLabel => "graphs.gnuplot.y2AxisLabel",
            TextField::GnuplotYAxisFormat => "graphs.gnuplot.yAxisFormat",
            TextField::GnuplotY2AxisFormat => "graphs.gnuplot.y2AxisFormat",
            TextField::GnuplotYAxisRange => "graphs.gnuplot.yAxisRange",
            TextField::GnuplotY2AxisRange => "graphs.gnuplot.y2AxisRange",
            TextField::MetricName => "metrics.name",
            TextField::TagName => "metrics.tags.name",
            TextField::TagValue => "metrics.tags.value",
        }
    }

    pub fn separator(&self) -> char {
        match self {
            TextField::GraphTitle
            | TextField::GnuplotYAxisLabel
            | TextField::GnuplotY2AxisLabel
            | TextField::GnuplotYAxisFormat
            | TextField::GnuplotY2AxisFormat => ' ',
            TextField::GnuplotYAxisRange | TextField::GnuplotY2AxisRange => ':',
            TextField::MetricName | TextField::TagName | TextField::TagValue => '.',
        }
    }
}

/// Encodes `model` as a URL-safe token. Equal models give equal tokens.
pub fn serialize(model: &DashboardModel) -> String {
    let mut encoder = Encoder::default();
    encoder.model(model);
    encoder.finish()
}

/// Decodes a token produced by [`serialize`].
pub fn deserialize(token: &str) -> Result<DashboardModel, CodecError> {
    let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;
    let mut reader = Reader::new(&bytes);
    let version = reader.byte().map_err(|_| CodecError::Empty)?;
    if version != TOKEN_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let mut strings = Vec::new();
    for _ in 0..reader.varint()? {
        let len = reader.varint()?;
        let len = usize::try_from(len).map_err(|_| CodecError::OutOfRange(len))?;
        let raw = reader.bytes(len)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::Utf8)?;
        strings.push(s.to_string());
    }

    let mut decoder = Decoder { strings, reader };
    let model = decoder.model()?;
    match decoder.reader.remaining() {
        0 => Ok(model),
        n => Err(CodecError::TrailingBytes(n)),
    }
}

/// Renumbers graphs and metrics from `"0"` in list order and repoints each
/// metric's `graphId` at the new id of its graph. A `graphId` naming no
/// graph is cleared.
pub fn compact_ids(model: &mut DashboardModel) {
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (i, graph) in model.graphs.iter_mut().enumerate() {
        positions.entry(std::mem::take(&mut graph.id)).or_insert(i);
        graph.id = i.to_string();
    }
    for (i, metric) in model.metrics.iter_mut().enumerate() {
        metric.id = i.to_string();
        let options = &mut metric.graph_options;
        options.graph_id = options
            .graph_id
            .as_deref()
            .and_then(|id| positions.get(id))
            .map(|p| p.to_string());
    }
}

fn discriminant<T: PartialEq>(all: &[T], value: &T) -> u64 {
    all.iter().position(|v| v == value).unwrap_or_default() as u64
}

#[derive(Debug, Default)]
struct Encoder {
    strings: Vec<String>,
    index: HashMap<String, u64>,
    graph_positions: HashMap<String, u64>,
    body: Writer,
}

impl Encoder {
    fn finish(self) -> String {
        let mut out = Writer::default();
        out.byte(TOKEN_VERSION);
        out.varint(self.strings.len() as u64);
        for s in &self.strings {
            out.varint(s.len() as u64);
            out.bytes(s.as_bytes());
        }
        out.bytes(&self.body.into_inner());
        URL_SAFE_NO_PAD.encode(out.into_inner())
    }

    fn intern(&mut self, s: &str) -> u64 {
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.strings.len() as u64;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), i);
        i
    }

    fn flags(&mut self, flags: Flags) {
        self.body.varint(flags.bits());
    }

    fn count(&mut self, n: usize) {
        self.body.varint(n as u64);
    }

    fn string(&mut self, s: &str) {
        let i = self.intern(s);
        self.body.varint(i);
    }

    fn text(&mut self, field: TextField, s: &str) {
        let segments: Vec<&str> = s.split(field.separator()).collect();
        self.count(segments.len());
        for segment in segments {
            self.string(segment);
        }
    }

    fn opt_string(&mut self, value: &Option<String>) {
        if let Some(s) = value {
            self.string(s);
        }
    }

    fn opt_text(&mut self, field: TextField, value: &Option<String>) {
        if let Some(s) = value {
            self.text(field, s);
        }
    }

    fn opt_u32(&mut self, value: Option<u32>) {
        if let Some(n) = value {
            self.body.varint(u64::from(n));
        }
    }

    fn model(&mut self, model: &DashboardModel) {
        for (i, graph) in model.graphs.iter().enumerate() {
            self.graph_positions
                .entry(graph.id.clone())
                .or_insert(i as u64);
        }

        self.global(&model.global);
        self.count(model.graphs.len());
        for graph in &model.graphs {
            self.graph(graph);
        }
        self.count(model.metrics.len());
        for metric in &model.metrics {
            self.metric(metric);
        }
    }

    fn global(&mut self, g: &GlobalTimeConfig) {
        let mut f = Flags::default();
        f.push(g.absolute_time_specification);
        f.push(g.from_date.is_some());
        f.push(g.from_time.is_some());
        f.push(g.to_date.is_some());
        f.push(g.to_time.is_some());
        f.push(g.relative_period.is_some());
        f.push(g.auto_reload);
        f.push(g.auto_graph_height);
        f.push(g.min_graph_height.is_some());
        f.push(g.global_downsampling);
        f.push(g.global_downsample_to.is_some());
        f.push(g.baselining);
        f.push(g.baseline_datum_style.is_some());
        f.push(g.baseline_from_date.is_some());
        f.push(g.baseline_from_time.is_some());
        f.push(g.baseline_to_date.is_some());
        f.push(g.baseline_to_time.is_some());
        f.push(g.baseline_relative_period.is_some());
        self.flags(f);

        self.opt_string(&g.from_date);
        self.opt_string(&g.from_time);
        self.opt_string(&g.to_date);
        self.opt_string(&g.to_time);
        self.opt_string(&g.relative_period);
        self.opt_u32(g.min_graph_height);
        self.opt_string(&g.global_downsample_to);
        if let Some(style) = &g.baseline_datum_style {
            self.body
                .varint(discriminant(&BaselineDatumStyle::ALL, style));
        }
        self.opt_string(&g.baseline_from_date);
        self.opt_string(&g.baseline_from_time);
        self.opt_string(&g.baseline_to_date);
        self.opt_string(&g.baseline_to_time);
        self.opt_string(&g.baseline_relative_period);
    }

    fn graph(&mut self, g: &GraphSpec) {
        let mut f = Flags::default();
        f.push(g.graph_type.is_some());
        f.push(g.title.is_some());
        f.push(g.show_title);
        f.push(g.graph_width.is_some());
        f.push(g.graph_height.is_some());
        f.push(g.gnuplot.is_some());
        f.push(g.horizon.is_some());
        f.push(g.dygraph.is_some());
        f.push(g.scatter.is_some());
        f.push(g.heatmap.is_some());
        self.flags(f);

        if let Some(t) = &g.graph_type {
            self.body.varint(discriminant(&GraphType::ALL, t));
        }
        self.opt_text(TextField::GraphTitle, &g.title);
        self.opt_u32(g.graph_width);
        self.opt_u32(g.graph_height);
        if let Some(o) = &g.gnuplot {
            self.gnuplot(o);
        }
        if let Some(o) = &g.horizon {
            self.horizon(o);
        }
        if let Some(o) = &g.dygraph {
            self.dygraph(o);
        }
        if let Some(o) = &g.scatter {
            self.scatter(o);
        }
        if let Some(o) = &g.heatmap {
            self.heatmap(o);
        }
    }

    fn gnuplot(&mut self, o: &GnuplotOptions) {
        let mut f = Flags::default();
        f.push(o.y_axis_label.is_some());
        f.push(o.y2_axis_label.is_some());
        f.push(o.y_axis_format.is_some());
        f.push(o.y2_axis_format.is_some());
        f.push(o.y_axis_range.is_some());
        f.push(o.y2_axis_range.is_some());
        f.push(o.y_axis_log_scale);
        f.push(o.y2_axis_log_scale);
        f.push(o.show_key);
        f.push(o.key_box);
        f.push(o.line_smoothing);
        f.push(o.global_annotations);
        f.push(o.key_alignment.is_some());
        f.push(o.key_location.is_some());
        f.push(o.style.is_some());
        self.flags(f);

        self.opt_text(TextField::GnuplotYAxisLabel, &o.y_axis_label);
        self.opt_text(TextField::GnuplotY2AxisLabel, &o.y2_axis_label);
        self.opt_text(TextField::GnuplotYAxisFormat, &o.y_axis_format);
        self.opt_text(TextField::GnuplotY2AxisFormat, &o.y2_axis_format);
        self.opt_text(TextField::GnuplotYAxisRange, &o.y_axis_range);
        self.opt_text(TextField::GnuplotY2AxisRange, &o.y2_axis_range);
        self.opt_string(&o.key_alignment);
        self.opt_string(&o.key_location);
        self.opt_string(&o.style);
    }

    fn horizon(&mut self, o: &HorizonOptions) {
        let mut f = Flags::default();
        f.push(o.interpolate_gaps);
        f.push(o.squash_negative);
        self.flags(f);
    }

    fn dygraph(&mut self, o: &DygraphOptions) {
        let mut f = Flags::default();
        f.push(o.interpolate_gaps);
        f.push(o.highlight_lines);
        f.push(o.stacked_lines);
        f.push(o.squash_negative);
        f.push(o.auto_scale);
        f.push(o.ylog);
        f.push(o.mean_adjusted);
        f.push(o.annotations);
        f.push(o.global_annotations);
        f.push(o.y_axis_range.is_some());
        f.push(o.y2_axis_range.is_some());
        f.push(o.count_filter.is_some());
        f.push(o.value_filter.is_some());
        self.flags(f);

        self.opt_string(&o.y_axis_range);
        self.opt_string(&o.y2_axis_range);
        if let Some(c) = &o.count_filter {
            let mut f = Flags::default();
            f.push(c.end.is_some());
            f.push(c.count.is_some());
            f.push(c.measure.is_some());
            self.flags(f);
            self.opt_string(&c.end);
            self.opt_string(&c.count);
            self.opt_string(&c.measure);
        }
        if let Some(v) = &o.value_filter {
            let mut f = Flags::default();
            f.push(v.lower_bound.is_some());
            f.push(v.upper_bound.is_some());
            f.push(v.measure.is_some());
            self.flags(f);
            self.opt_string(&v.lower_bound);
            self.opt_string(&v.upper_bound);
            self.opt_string(&v.measure);
        }
    }

    fn scatter(&mut self, o: &ScatterGraphOptions) {
        let mut f = Flags::default();
        f.push(o.exclude_negative);
        self.flags(f);
    }

    fn heatmap(&mut self, o: &HeatmapOptions) {
        let mut f = Flags::default();
        f.push(o.style.is_some());
        f.push(o.filter_lower_bound.is_some());
        f.push(o.filter_upper_bound.is_some());
        f.push(o.colour_scheme.is_some());
        f.push(o.reverse_colours);
        self.flags(f);

        if let Some(style) = &o.style {
            self.body.varint(discriminant(&HeatmapStyle::ALL, style));
        }
        self.opt_string(&o.filter_lower_bound);
        self.opt_string(&o.filter_upper_bound);
        self.opt_string(&o.colour_scheme);
    }

    fn metric(&mut self, m: &MetricSpec) {
        self.text(TextField::MetricName, &m.name);
        let tags: Vec<&Tag> = m.tags.iter().filter(|t| !t.value.is_empty()).collect();
        self.count(tags.len());
        for tag in tags {
            let mut f = Flags::default();
            f.push(tag.group_by.is_some());
            f.push(tag.group_by.unwrap_or_default());
            self.flags(f);
            self.text(TextField::TagName, &tag.name);
            self.text(TextField::TagValue, &tag.value);
        }
        self.graph_options(&m.graph_options);
    }

    fn graph_options(&mut self, o: &GraphOptions) {
        let graph_index = o
            .graph_id
            .as_deref()
            .and_then(|id| self.graph_positions.get(id))
            .copied();

        let mut f = Flags::default();
        f.push(graph_index.is_some());
        f.push(o.aggregator.is_some());
        f.push(o.rate);
        f.push(o.rate_counter);
        f.push(o.rate_counter_max.is_some());
        f.push(o.rate_counter_reset.is_some());
        f.push(o.downsample);
        f.push(o.downsample_by.is_some());
        f.push(o.downsample_to.is_some());
        f.push(o.axis.is_some());
        f.push(o.right_axis);
        f.push(o.scatter.is_some());
        self.flags(f);

        if let Some(i) = graph_index {
            self.body.varint(i);
        }
        self.opt_string(&o.aggregator);
        self.opt_string(&o.rate_counter_max);
        self.opt_string(&o.rate_counter_reset);
        self.opt_string(&o.downsample_by);
        self.opt_string(&o.downsample_to);
        self.opt_string(&o.axis);
        if let Some(s) = &o.scatter {
            let mut f = Flags::default();
            f.push(s.axis.is_some());
            self.flags(f);
            self.opt_string(&s.axis);
        }
    }
}

/// Reads fields back in the order [`Encoder`] wrote them. Struct literals
/// evaluate their fields top to bottom, so each literal below lists its
/// fields in encoding order.
struct Decoder<'a> {
    strings: Vec<String>,
    reader: Reader<'a>,
}

impl Decoder<'_> {
    fn flags(&mut self) -> Result<Flags, CodecError> {
        Ok(Flags::from_bits(self.reader.varint()?))
    }

    fn count(&mut self) -> Result<u64, CodecError> {
        self.reader.varint()
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let i = self.reader.varint()?;
        usize::try_from(i)
            .ok()
            .and_then(|i| self.strings.get(i))
            .cloned()
            .ok_or(CodecError::BadIndex(i))
    }

    fn text(&mut self, field: TextField) -> Result<String, CodecError> {
        let mut segments = Vec::new();
        for _ in 0..self.count()? {
            segments.push(self.string()?);
        }
        Ok(segments.join(&field.separator().to_string()))
    }

    fn opt_string(&mut self, present: bool) -> Result<Option<String>, CodecError> {
        present.then(|| self.string()).transpose()
    }

    fn opt_text(&mut self, present: bool, field: TextField) -> Result<Option<String>, CodecError> {
        present.then(|| self.text(field)).transpose()
    }

    fn opt_u32(&mut self, present: bool) -> Result<Option<u32>, CodecError> {
        if !present {
            return Ok(None);
        }
        let v = self.reader.varint()?;
        u32::try_from(v)
            .map(Some)
            .map_err(|_| CodecError::OutOfRange(v))
    }

    fn opt_variant<T: Copy>(
        &mut self,
        present: bool,
        kind: &'static str,
        all: &[T],
    ) -> Result<Option<T>, CodecError> {
        if !present {
            return Ok(None);
        }
        let value = self.reader.varint()?;
        usize::try_from(value)
            .ok()
            .and_then(|i| all.get(i))
            .copied()
            .map(Some)
            .ok_or(CodecError::UnknownDiscriminant { kind, value })
    }

    fn model(&mut self) -> Result<DashboardModel, CodecError> {
        let global = self.global()?;
        let graphs = (0..self.count()?)
            .map(|i| self.graph(i))
            .collect::<Result<Vec<_>, _>>()?;
        let metrics = (0..self.count()?)
            .map(|i| self.metric(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DashboardModel {
            global,
            graphs,
            metrics,
        })
    }

    fn global(&mut self) -> Result<GlobalTimeConfig, CodecError> {
        let mut f = self.flags()?;
        let absolute_time_specification = f.next();
        let has_from_date = f.next();
        let has_from_time = f.next();
        let has_to_date = f.next();
        let has_to_time = f.next();
        let has_relative_period = f.next();
        let auto_reload = f.next();
        let auto_graph_height = f.next();
        let has_min_graph_height = f.next();
        let global_downsampling = f.next();
        let has_global_downsample_to = f.next();
        let baselining = f.next();
        let has_baseline_datum_style = f.next();

        Ok(GlobalTimeConfig {
            absolute_time_specification,
            from_date: self.opt_string(has_from_date)?,
            from_time: self.opt_string(has_from_time)?,
            to_date: self.opt_string(has_to_date)?,
            to_time: self.opt_string(has_to_time)?,
            relative_period: self.opt_string(has_relative_period)?,
            auto_reload,
            auto_graph_height,
            min_graph_height: self.opt_u32(has_min_graph_height)?,
            global_downsampling,
            global_downsample_to: self.opt_string(has_global_downsample_to)?,
            baselining,
            baseline_datum_style: self.opt_variant(
                has_baseline_datum_style,
                "baseline datum style",
                &BaselineDatumStyle::ALL,
            )?,
            baseline_from_date: self.opt_string(f.next())?,
            baseline_from_time: self.opt_string(f.next())?,
            baseline_to_date: self.opt_string(f.next())?,
            baseline_to_time: self.opt_string(f.next())?,
            baseline_relative_period: self.opt_string(f.next())?,
        })
    }

    fn graph(&mut self, index: u64) -> Result<GraphSpec, CodecError> {
        let mut f = self.flags()?;
        let has_type = f.next();
        let has_title = f.next();
        let show_title = f.next();
        Ok(GraphSpec {
            id: index.to_string(),
            graph_type: self.opt_variant(has_type, "graph type", &GraphType::ALL)?,
            title: self.opt_text(has_title, TextField::GraphTitle)?,
            show_title,
            graph_width: self.opt_u32(f.next())?,
            graph_height: self.opt_u32(f.next())?,
            gnuplot: f.next().then(|| self.gnuplot()).transpose()?,
            horizon: f.next().then(|| self.horizon()).transpose()?,
            dygraph: f.next().then(|| self.dygraph()).transpose()?,
            scatter: f.next().then(|| self.scatter()).transpose()?,
            heatmap: f.next().then(|| self.heatmap()).transpose()?,
        })
    }

    fn gnuplot(&mut self) -> Result<GnuplotOptions, CodecError> {
        let mut f = self.flags()?;
        let has_y_label = f.next();
        let has_y2_label = f.next();
        let has_y_format = f.next();
        let has_y2_format = f.next();
        let has_y_range = f.next();
        let has_y2_range = f.next();
        Ok(GnuplotOptions {
            y_axis_label: self.opt_text(has_y_label, TextField::GnuplotYAxisLabel)?,
            y2_axis_label: self.opt_text(has_y2_label, TextField::GnuplotY2AxisLabel)?,
            y_axis_format: self.opt_text(has_y_format, TextField::GnuplotYAxisFormat)?,
            y2_axis_format: self.opt_text(has_y2_format, TextField::GnuplotY2AxisFormat)?,
            y_axis_range: self.opt_text(has_y_range, TextField::GnuplotYAxisRange)?,
            y2_axis_range: self.opt_text(has_y2_range, TextField::GnuplotY2AxisRange)?,
            y_axis_log_scale: f.next(),
            y2_axis_log_scale: f.next(),
            show_key: f.next(),
            key_box: f.next(),
            line_smoothing: f.next(),
            global_annotations: f.next(),
            key_alignment: self.opt_string(f.next())?,
            key_location: self.opt_string(f.next())?,
            style: self.opt_string(f.next())?,
        })
    }

    fn horizon(&mut self) -> Result<HorizonOptions, CodecError> {
        let mut f = self.flags()?;
        Ok(HorizonOptions {
            interpolate_gaps: f.next(),
            squash_negative: f.next(),
        })
    }

    fn dygraph(&mut self) -> Result<DygraphOptions, CodecError> {
        let mut f = self.flags()?;
        Ok(DygraphOptions {
            interpolate_gaps: f.next(),
            highlight_lines: f.next(),
            stacked_lines: f.next(),
            squash_negative: f.next(),
            auto_scale: f.next(),
            ylog: f.next(),
            mean_adjusted: f.next(),
            annotations: f.next(),
            global_annotations: f.next(),
            y_axis_range: self.opt_string(f.next())?,
            y2_axis_range: self.opt_string(f.next())?,
            count_filter: f.next().then(|| self.count_filter()).transpose()?,
            value_filter: f.next().then(|| self.value_filter()).transpose()?,
        })
    }

    fn count_filter(&mut self) -> Result<CountFilter, CodecError> {
        let mut f = self.flags()?;
        Ok(CountFilter {
            end: self.opt_string(f.next())?,
            count: self.opt_string(f.next())?,
            measure: self.opt_string(f.next())?,
        })
    }

    fn value_filter(&mut self) -> Result<ValueFilter, CodecError> {
        let mut f = self.flags()?;
        Ok(ValueFilter {
            lower_bound: self.opt_string(f.next())?,
            upper_bound: self.opt_string(f.next())?,
            measure: self.opt_string(f.next())?,
        })
    }

    fn scatter(&mut self) -> Result<ScatterGraphOptions, CodecError> {
        let mut f = self.flags()?;
        Ok(ScatterGraphOptions {
            exclude_negative: f.next(),
        })
    }

    fn heatmap(&mut self) -> Result<HeatmapOptions, CodecError> {
        let mut f = self.flags()?;
        Ok(HeatmapOptions {
            style: self.opt_variant(f.next(), "heatmap style", &HeatmapStyle::ALL)?,
            filter_lower_bound: self.opt_string(f.next())?,
            filter_upper_bound: self.opt_string(f.next())?,
            colour_scheme: self.opt_string(f.next())?,
            reverse_colours: f.next(),
        })
    }

    fn metric(&mut self, index: u64) -> Result<MetricSpec, CodecError> {
        let name = self.text(TextField::MetricName)?;
        let mut tags = Vec::new();
        for _ in 0..self.count()? {
            let mut f = self.flags()?;
            let has_group_by = f.next();
            let group_by = f.next();
            tags.push(Tag {
                name: self.text(TextField::TagName)?,
                value: self.text(TextField::TagValue)?,
                group_by: has_group_by.then_some(group_by),
            });
        }
        Ok(MetricSpec {
            id: index.to_string(),
            name,
            tags,
            graph_options: self.graph_options()?,
        })
    }

    fn graph_options(&mut self) -> Result<GraphOptions, CodecError> {
        let mut f = self.flags()?;
        let has_graph = f.next();
        let graph_id = if has_graph {
            Some(self.reader.varint()?.to_string())
        } else {
            None
        };
        let has_aggregator = f.next();
        let rate = f.next();
        let rate_counter = f.next();
        Ok(GraphOptions {
            graph_id,
            aggregator: self.opt_string(has_aggregator)?,
            rate,
            rate_counter,
            rate_counter_max: self.opt_string(f.next())?,
            rate_counter_reset: self.opt_string(f.next())?,
            downsample: f.next(),
            downsample_by: self.opt_string(f.next())?,
            downsample_to: self.opt_string(f.next())?,
            axis: self.opt_string(f.next())?,
            right_axis: f.next(),
            scatter: f.next().then(|| self.metric_scatter()).transpose()?,
        })
    }

    fn metric_scatter(&mut self) -> Result<MetricScatterOptions, CodecError> {
        let mut f = self.flags()?;
        Ok(MetricScatterOptions {
            axis: self.opt_string(f.next())?,
        })
    }
}
