// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod codec;
pub mod config;
mod errors;
pub mod executor;
pub mod export;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod planner;
pub mod query;
mod render_context;
pub mod response;
pub mod session;
pub mod timeframe;

// Re-export the public API
pub use errors::{Error, Result};
pub use executor::{HttpQueryExecutor, QueryError, QueryExecutor};
pub use model::{
    BaselineDatumStyle, DashboardModel, GlobalTimeConfig, GraphOptions, GraphSpec, GraphType,
    MetricSpec, Tag,
};
pub use render_context::RenderContext;
pub use response::{DataPoint, TsdbSeries};
pub use session::{ApiCapabilities, QuerySession, RenderCounter, TsdbVersion};
