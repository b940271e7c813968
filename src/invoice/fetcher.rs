use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::InvoiceError;

const MAX_REDIRECTS: usize = 10;

/// Downloads template bytes.
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, InvoiceError>;
}

/// `TemplateFetcher` over HTTP(S) with redirect following and a timeout.
#[derive(Clone)]
pub struct HttpTemplateFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpTemplateFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent(concat!("invoice-generator-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, max_bytes))
    }

    pub fn with_client(client: reqwest::Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }
}

#[async_trait]
impl TemplateFetcher for HttpTemplateFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, InvoiceError> {
        log::debug!("Downloading template from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InvoiceError::TemplateFetch(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceError::TemplateFetch(format!(
                "server responded with status {status}"
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(InvoiceError::TemplateFetch(format!(
                    "template is {length} bytes, limit is {} bytes",
                    self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| InvoiceError::TemplateFetch(describe_reqwest_error(&e)))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(InvoiceError::TemplateFetch(format!(
                    "template exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        log::debug!("Downloaded {} template bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_redirect() {
        format!("too many redirects: {err}")
    } else {
        err.to_string()
    }
}
