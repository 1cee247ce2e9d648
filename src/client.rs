//! HTTP clients with builder pattern.
//!
//! [`HttpClient`] is the seam every client implements: the network
//! [`Client`], the [`MockHttpClient`](crate::mock::MockHttpClient) and the
//! decorators in [`crate::decorator`]. Requests return an [`AsyncResponse`]
//! immediately; nothing is sent until the response is driven.
//!
//! # Example
//!
//! ```rust,ignore
//! use asyncnet::Client;
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build();
//!
//! let response = client.get("http://example.com").send()?;
//! let body = response.text().await?;
//! ```

use crate::async_response::AsyncResponse;
use crate::base::clienterror::ClientError;
use crate::http::netresponse::NetResponse;
use crate::http::options::RequestOptions;
use crate::http::requestbody::RequestBody;
use crate::http::streamfactory::HttpStreamFactory;
use crate::http::ResponseInfo;
use crate::stream::ResponseStream;
use http::header::{HeaderName, HeaderValue};
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Something that turns requests into responses.
pub trait HttpClient: Send + Sync {
    /// Create the response for a request. Fails only on invalid input; I/O
    /// errors surface through the response.
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError>;

    /// Stream the chunks of several responses as they arrive.
    fn stream(&self, responses: &[AsyncResponse]) -> ResponseStream {
        ResponseStream::new(responses.iter().cloned())
    }
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError> {
        (**self).request(method, url, options)
    }

    fn stream(&self, responses: &[AsyncResponse]) -> ResponseStream {
        (**self).stream(responses)
    }
}

/// HTTP/1.1 client over plain TCP.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone, Debug, Default)]
pub struct Client {
    factory: HttpStreamFactory,
    defaults: RequestOptions,
}

impl Client {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Options applied to every request unless overridden.
    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::HEAD, url)
    }

    /// Start building a PATCH request.
    pub fn patch<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.build_request(Method::PATCH, url)
    }

    /// Start building a request with custom method.
    pub fn build_request<U: AsRef<str>>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            url: url.as_ref().to_string(),
            options: RequestOptions::new(),
        }
    }
}

impl HttpClient for Client {
    fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<AsyncResponse, ClientError> {
        let options = options.with_defaults(&self.defaults);
        options.validate()?;
        let url = Url::parse(url)?;
        tracing::debug!(method = %method, url = %url, "creating request");

        let response =
            NetResponse::new(self.factory.clone(), method.clone(), url.clone(), &options);
        Ok(AsyncResponse::from_transport(response, method, url, options))
    }
}

/// Builder for creating a [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    defaults: RequestOptions,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Set the default idle timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults = self.defaults.timeout(timeout);
        self
    }

    /// Set the default limit on the total duration of a request.
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.defaults = self.defaults.max_duration(max_duration);
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.defaults = self.defaults.max_redirects(max_redirects);
        self
    }

    /// Set whether responses buffer their content by default.
    pub fn buffer(mut self, buffer: bool) -> Self {
        self.defaults = self.defaults.buffer(buffer);
        self
    }

    /// Add a header sent with every request.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        self.defaults = self.defaults.header(key, value);
        self
    }

    /// Limit how long establishing a TCP connection may take.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        Client {
            factory: HttpStreamFactory::new(self.connect_timeout),
            defaults: self.defaults,
        }
    }
}

/// Builder for a single request.
pub struct RequestBuilder {
    client: Client,
    method: Method,
    url: String,
    options: RequestOptions,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        self.options = self.options.header(key, value);
        self
    }

    /// Set request body.
    pub fn body<B: Into<RequestBody>>(mut self, body: B) -> Self {
        self.options = self.options.body(body);
        self
    }

    /// Set JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize>(mut self, json: &T) -> Self {
        if let Ok(bytes) = serde_json::to_vec(json) {
            self.options = self
                .options
                .body(bytes)
                .header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        self
    }

    /// Set the idle timeout of this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.timeout(timeout);
        self
    }

    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.options = self.options.max_duration(max_duration);
        self
    }

    pub fn buffer(mut self, buffer: bool) -> Self {
        self.options = self.options.buffer(buffer);
        self
    }

    pub fn user_data(mut self, user_data: impl Into<Value>) -> Self {
        self.options = self.options.user_data(user_data);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>, &ResponseInfo) + Send + Sync + 'static,
    {
        self.options = self.options.on_progress(callback);
        self
    }

    /// Create the response. The request starts when the response is first
    /// driven.
    pub fn send(self) -> Result<AsyncResponse, ClientError> {
        self.client.request(self.method, &self.url, self.options)
    }
}
