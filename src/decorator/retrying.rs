//! Automatic retries on transient failures.

use crate::async_response::{filter_fn, AsyncResponse, ChunkFilter};
use crate::base::clienterror::ClientError;
use crate::client::HttpClient;
use crate::decorator::AsyncDecoratorClient;
use crate::http::options::RequestOptions;
use crate::http::retry::{calculate_backoff, retry_after, should_retry, RetryConfig, RetryReason};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Retries requests that fail with a retryable transport error or status
/// code, waiting with exponential backoff between attempts.
///
/// The decision is taken on the first chunk of each attempt. A `Retry-After`
/// header (in seconds) overrides the computed delay, capped at
/// `max_delay_ms`. The number of retries is recorded in the `retry_count`
/// info.
#[derive(Clone)]
pub struct RetryingClient {
    decorator: AsyncDecoratorClient,
}

impl RetryingClient {
    pub fn new<C>(inner: C, config: RetryConfig) -> Self
    where
        C: HttpClient + 'static,
    {
        let config = Arc::new(config);
        let decorator = AsyncDecoratorClient::new(inner, move |method, url, options| {
            Some(retry_filter(config.clone(), method.clone(), url.clone(), options.clone()))
        });
        Self { decorator }
    }
}

impl HttpClient for RetryingClient {
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError> {
        self.decorator.request(method, url, options)
    }
}

fn retry_filter(
    config: Arc<RetryConfig>,
    method: Method,
    url: Url,
    options: RequestOptions,
) -> Box<dyn ChunkFilter> {
    let mut attempts = 0usize;
    filter_fn(move |chunk, context| {
        let reason = if chunk.is_first() {
            RetryReason::from_status(&method, context.status()?)
        } else if let Some(error) = chunk.error() {
            RetryReason::from_client_error(error)
        } else {
            return Ok(vec![chunk]);
        };
        let Some(reason) = reason.filter(|_| should_retry(attempts, &config)) else {
            context.passthru();
            return Ok(vec![chunk]);
        };

        attempts += 1;
        let max_delay = Duration::from_millis(config.max_delay_ms);
        let delay = context
            .headers()
            .ok()
            .and_then(|headers| retry_after(&headers))
            .map(|requested| requested.min(max_delay))
            .unwrap_or_else(|| calculate_backoff(attempts, &config));
        tracing::debug!(
            url = %url,
            attempt = attempts,
            reason = ?reason,
            delay_ms = delay.as_millis() as u64,
            "retrying request"
        );

        context.cancel();
        context.set_info("retry_count", attempts);
        context.pause(delay);
        context.replace_request(method.clone(), url.as_str(), options.clone())?;
        Ok(Vec::new())
    })
}
