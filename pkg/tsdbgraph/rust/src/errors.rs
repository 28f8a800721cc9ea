// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

use crate::codec::CodecError;
use crate::executor::QueryError;

/// Errors raised while turning a dashboard configuration into queries or
/// while consuming the results.
///
/// The `Display` form of the configuration variants is the exact message
/// recorded into [`crate::RenderContext`] for the affected graph.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No start date specified")]
    NoStartDate,

    #[error("No metrics specified")]
    NoMetrics,

    #[error("Invalid axis specified")]
    InvalidAxis,

    #[error("Invalid {field}: {value:?}")]
    InvalidDateTime { field: &'static str, value: String },

    #[error("Unresolvable period: {0:?}")]
    UnresolvablePeriod(String),

    #[error("Unrecognized baseline datum style: {0}")]
    UnrecognizedBaselineStyle(String),

    #[error("Unknown graph type: {0}")]
    UnknownGraphType(String),

    #[error("Invalid API version: {0:?}")]
    InvalidVersion(String),

    #[error("Failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),

    #[error("Error loading data: {0}")]
    Query(#[from] QueryError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
