// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::BTreeMap;

use log::warn;

/// Per-render diagnostics, keyed by graph id.
///
/// Created fresh by the caller for every render pass and passed down by
/// mutable reference. Each map holds at most one entry per graph; a later
/// write for the same graph replaces the earlier one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderContext {
    pub render_errors: BTreeMap<String, String>,
    pub render_warnings: BTreeMap<String, String>,
    pub render_messages: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, graph_id: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("[{graph_id}] render error: {message}");
        self.render_errors.insert(graph_id.to_string(), message);
    }

    pub fn warning(&mut self, graph_id: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("[{graph_id}] render warning: {message}");
        self.render_warnings.insert(graph_id.to_string(), message);
    }

    pub fn message(&mut self, graph_id: &str, message: impl Into<String>) {
        self.render_messages
            .insert(graph_id.to_string(), message.into());
    }

    pub fn has_error(&self, graph_id: &str) -> bool {
        self.render_errors.contains_key(graph_id)
    }

    pub fn is_clean(&self) -> bool {
        self.render_errors.is_empty() && self.render_messages.is_empty()
    }
}
