use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{DocHandle, DocumentStore};

/// HTTP implementation of [`DocumentStore`]: POST to create (handle comes back
/// in the `Location` header), GET by handle, PUT to replace. Transient
/// failures are retried a bounded number of times with a short fixed backoff;
/// definitive client errors fail fast.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base: String,
    retries: u32,
    retry_backoff: Duration,
    rate_limit_backoff: Duration,
}

impl HttpDocumentStore {
    pub fn new(
        base: impl Into<String>,
        timeout: Duration,
        retries: u32,
        retry_backoff: Duration,
        rate_limit_backoff: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base: base.into(),
            retries,
            retry_backoff,
            rate_limit_backoff,
        })
    }

    fn doc_url(&self, handle: &DocHandle) -> String {
        format!("{}/{}", self.base, handle.as_str())
    }

    async fn retrying<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut left = self.retries;
        loop {
            match op().await {
                Err(e) if e.is_transient() && left > 0 => {
                    left -= 1;
                    let delay = if matches!(e, StoreError::RateLimited) {
                        self.rate_limit_backoff
                    } else {
                        self.retry_backoff
                    };
                    tracing::debug!(error = %e, retries_left = left, "store call failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn classify_transport(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else if e.is_connect() {
        StoreError::Offline
    } else {
        StoreError::Other(e.to_string())
    }
}

fn classify_status(status: reqwest::StatusCode) -> StoreError {
    match status.as_u16() {
        404 => StoreError::NotFound,
        429 => StoreError::RateLimited,
        400 | 413 | 422 => StoreError::Malformed(format!("rejected with {status}")),
        500..=599 => StoreError::Unavailable,
        other => StoreError::Other(format!("unexpected status {other}")),
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create_document(&self, payload: &Value) -> Result<DocHandle, StoreError> {
        self.retrying(|| async {
            let res = self
                .client
                .post(&self.base)
                .json(payload)
                .send()
                .await
                .map_err(classify_transport)?;
            if !res.status().is_success() {
                return Err(classify_status(res.status()));
            }
            let handle = res
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| loc.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(|s| DocHandle(s.to_string()))
                .ok_or_else(|| StoreError::Other("create response missing Location".into()))?;
            Ok(handle)
        })
        .await
    }

    async fn read_document(&self, handle: &DocHandle) -> Result<Value, StoreError> {
        self.retrying(|| async {
            let res = self
                .client
                .get(self.doc_url(handle))
                .send()
                .await
                .map_err(classify_transport)?;
            if !res.status().is_success() {
                return Err(classify_status(res.status()));
            }
            res.json::<Value>()
                .await
                .map_err(|e| StoreError::Malformed(e.to_string()))
        })
        .await
    }

    async fn replace_document(
        &self,
        handle: &DocHandle,
        payload: &Value,
    ) -> Result<(), StoreError> {
        self.retrying(|| async {
            let res = self
                .client
                .put(self.doc_url(handle))
                .json(payload)
                .send()
                .await
                .map_err(classify_transport)?;
            if !res.status().is_success() {
                return Err(classify_status(res.status()));
            }
            Ok(())
        })
        .await
    }
}
