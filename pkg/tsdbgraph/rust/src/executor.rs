// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Query executor port and its HTTP adapter.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::config::Config;
use crate::response::TsdbSeries;

/// Failure of a single query request. The display form is the raw payload
/// shown to the user after "Error loading data: ".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Issues one `GET` against the metrics API and decodes the series list.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// `with_credentials` is passed through from the session unchanged.
    async fn get(&self, url: &str, with_credentials: bool) -> Result<Vec<TsdbSeries>, QueryError>;
}

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// [`QueryExecutor`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpQueryExecutor {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpQueryExecutor {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            credentials: None,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut executor = Self::new(Duration::from_secs(config.request_timeout_secs))?;
        executor.credentials = config.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: config.password.clone(),
        });
        Ok(executor)
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn get(&self, url: &str, with_credentials: bool) -> Result<Vec<TsdbSeries>, QueryError> {
        debug!("GET {url}");
        let mut request = self.client.get(url);
        if with_credentials && let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| QueryError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_payload() {
        let err = QueryError::Status {
            status: 400,
            body: "{\"error\":\"No such name\"}".to_string(),
        };
        assert_eq!(err.to_string(), "400 {\"error\":\"No such name\"}");
        let wrapped = crate::Error::from(err);
        assert!(wrapped.to_string().starts_with("Error loading data: 400"));
    }

    #[test]
    fn test_from_config_keeps_credentials() {
        let config = Config {
            username: Some("reader".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let executor = HttpQueryExecutor::from_config(&config).unwrap();
        assert_eq!(executor.credentials.unwrap().username, "reader");
    }

    #[tokio::test]
    async fn test_transport_error() {
        let executor = HttpQueryExecutor::new(Duration::from_millis(200)).unwrap();
        // nothing listens on the discard port
        let err = executor
            .get("http://127.0.0.1:9/api/query?start=1h-ago", false)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
    }
}
