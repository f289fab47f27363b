use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{PredictError, Predictor};

#[derive(Serialize)]
struct PredictPayload<'a> {
    text: &'a str,
}

/// Calls the model server with `POST {url}` and a `{"text": ...}` body
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!("mindgate/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, text: &str) -> Result<serde_json::Value, PredictError> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictPayload { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PredictError::Timeout(self.timeout)
                } else {
                    PredictError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PredictError::UpstreamStatus(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PredictError::InvalidResponse(e.to_string()))
    }
}
