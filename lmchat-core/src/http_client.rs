use std::time::Duration;

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::config::HttpCfg;
use crate::error::{CoreResult, RelayError};
use crate::frame::{FrameDecoder, FrameStream};

const USER_AGENT: &str = concat!("lmchat/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_config(&HttpCfg::default())
    }

    pub fn from_config(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .user_agent(USER_AGENT);
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| RelayError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self { inner })
    }

    /// POST JSON and return the response body as a lazy frame stream.
    /// Connection failures and non-success statuses are returned here, before
    /// any frame is produced.
    pub async fn post_event_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> CoreResult<FrameStream> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header("Accept", "text/event-stream");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        let resp = req.send().await.map_err(|e| transport_error(url, &e))?;
        let resp = ensure_success(resp).await?;
        debug!(url, "event stream opened");

        Ok(Box::pin(FrameDecoder::<reqwest::Error>::new(Box::pin(
            resp.bytes_stream(),
        ))))
    }

    pub async fn get_json<R: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> CoreResult<R> {
        let mut req = self.inner.get(url);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        let resp = req.send().await.map_err(|e| transport_error(url, &e))?;
        let resp = ensure_success(resp).await?;
        resp.json::<R>()
            .await
            .map_err(|e| RelayError::Decode(format!("json decode error: {e}")))
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> RelayError {
    error!(url, error = %e, "inference server unreachable");
    RelayError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    }
}

async fn ensure_success(resp: Response) -> CoreResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    error!(status = status.as_u16(), body = %body, "inference server rejected request");
    Err(RelayError::Upstream {
        status: status.as_u16(),
        body: truncate(&body, 300),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut t = s[..end].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}
