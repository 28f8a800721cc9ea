// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Per-dashboard query session: backend location, API capabilities and the
//! cache-busting counter shared by every render in the session.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::errors::Error;

/// `major.minor` generation of the metrics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TsdbVersion {
    pub major: u32,
    pub minor: u32,
}

impl TsdbVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for TsdbVersion {
    type Err = Error;

    /// Accepts `"2"`, `"2.2"` or `"2.2.0"`; patch levels are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

impl fmt::Display for TsdbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What the configured backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCapabilities {
    pub version: TsdbVersion,
    pub filters_since: TsdbVersion,
    /// Explicit toggle that wins over the version gate when set.
    pub filters_enabled: Option<bool>,
}

impl Default for ApiCapabilities {
    fn default() -> Self {
        Self {
            version: TsdbVersion::new(2, 3),
            filters_since: TsdbVersion::new(2, 2),
            filters_enabled: None,
        }
    }
}

impl ApiCapabilities {
    pub fn supports_filters(&self) -> bool {
        self.filters_enabled
            .unwrap_or(self.version >= self.filters_since)
    }
}

/// Strictly increasing token appended to open-ended queries so that
/// intermediate HTTP caches never serve a stale response.
#[derive(Debug, Default)]
pub struct RenderCounter(AtomicU64);

impl RenderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increments and returns the new value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct QuerySession {
    pub base_read_url: String,
    pub authenticated_reads: bool,
    pub capabilities: ApiCapabilities,
    counter: RenderCounter,
}

impl QuerySession {
    pub fn new(base_read_url: &str) -> Self {
        Self {
            base_read_url: base_read_url.trim_end_matches('/').to_string(),
            authenticated_reads: false,
            capabilities: ApiCapabilities::default(),
            counter: RenderCounter::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let capabilities = ApiCapabilities {
            version: config.api_version.parse()?,
            filters_since: config.filters_since.parse()?,
            filters_enabled: config.filters_enabled,
        };
        Ok(Self {
            authenticated_reads: config.authenticated_reads,
            capabilities,
            ..Self::new(&config.tsdb_base_read_url)
        })
    }

    pub fn with_capabilities(mut self, capabilities: ApiCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_counter(mut self, counter: RenderCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn counter(&self) -> &RenderCounter {
        &self.counter
    }

    pub fn supports_filters(&self) -> bool {
        self.capabilities.supports_filters()
    }
}
