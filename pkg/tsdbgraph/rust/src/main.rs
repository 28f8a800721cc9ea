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

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use tsdb_graph::config;
use tsdb_graph::{HttpQueryExecutor, QuerySession};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(&config::config_path(args.config.clone()));
    let log_level = config::get_log_level(config.as_ref().ok());
    simple_logger::init_with_level(log_level)?;
    debug!("Log level set to: {:?}", log_level);

    let config = config?;
    let session = QuerySession::from_config(&config).context("invalid backend settings")?;
    let executor = HttpQueryExecutor::from_config(&config)?;

    let lines = cli::run(args.command, &session, &executor).await?;
    let mut out = std::io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
