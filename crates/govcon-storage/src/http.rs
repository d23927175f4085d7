use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(err) if err.is_timeout())
    }
}

/// JSON-over-HTTP client with a per-request timeout. Requests are issued
/// once; retrying is left to the caller.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let span = info_span!("http_get", url);
        async {
            let resp = self.client.get(url).query(query).send().await?;
            Self::decode(resp).await
        }
        .instrument(span)
        .await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let span = info_span!("http_post", url);
        async {
            let resp = self.client.post(url).json(body).send().await?;
            Self::decode(resp).await
        }
        .instrument(span)
        .await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, FetchError> {
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(status_error(status, final_url));
        }
        let body = resp.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: final_url,
            source,
        })
    }
}

fn status_error(status: StatusCode, url: String) -> FetchError {
    FetchError::HttpStatus {
        status: status.as_u16(),
        url,
    }
}
