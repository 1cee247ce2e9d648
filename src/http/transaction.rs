use crate::base::clienterror::ClientError;
use crate::base::neterror::NetError;
use crate::http::options::RequestOptions;
use crate::http::streamfactory::{map_hyper_error, HttpStream, HttpStreamFactory};
use bytes::Bytes;
use http::header::{
    HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION,
};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Progress reported by a running transaction.
#[derive(Debug)]
pub(crate) enum TransactionEvent {
    Headers {
        status: StatusCode,
        headers: HeaderMap,
        url: Url,
        redirect_count: usize,
    },
    Data(Bytes),
    Done,
    Failed(ClientError),
}

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CreateStream,
    SendRequest,
    ReadHeaders,
    ReadBody,
    Done,
}

/// Runs one request, following redirects, and reports its progress as
/// events. Dropping the receiver stops the transaction at the next event.
pub(crate) struct HttpNetworkTransaction {
    factory: HttpStreamFactory,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    max_redirects: usize,
    redirect_count: usize,
    state: State,
    stream: Option<HttpStream>,
    response: Option<Response<Incoming>>,
    events: UnboundedSender<TransactionEvent>,
}

impl HttpNetworkTransaction {
    pub(crate) fn new(
        factory: HttpStreamFactory,
        method: Method,
        url: Url,
        options: &RequestOptions,
        events: UnboundedSender<TransactionEvent>,
    ) -> Self {
        Self {
            factory,
            method,
            url,
            headers: options.get_headers().clone(),
            body: options.get_body().to_bytes(),
            max_redirects: options.get_max_redirects(),
            redirect_count: 0,
            state: State::CreateStream,
            stream: None,
            response: None,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        if let Err(e) = self.do_loop().await {
            tracing::debug!(url = %self.url, error = %e, "transaction failed");
            let _ = self.events.send(TransactionEvent::Failed(e));
        }
    }

    async fn do_loop(&mut self) -> Result<(), ClientError> {
        loop {
            match self.state {
                State::CreateStream => {
                    self.stream = Some(self.factory.create_stream(&self.url).await?);
                    self.state = State::SendRequest;
                }
                State::SendRequest => {
                    let request = self.build_request()?;
                    let stream = self
                        .stream
                        .as_mut()
                        .ok_or_else(|| ClientError::from(NetError::SocketNotConnected))?;
                    self.response = Some(stream.send_request(request).await?);
                    self.state = State::ReadHeaders;
                }
                State::ReadHeaders => {
                    let response = self
                        .response
                        .as_ref()
                        .ok_or_else(|| ClientError::from(NetError::EmptyResponse))?;
                    let status = response.status();

                    if let Some(next) = self.redirect_target(response)? {
                        self.follow_redirect(status, next);
                        continue;
                    }

                    let event = TransactionEvent::Headers {
                        status,
                        headers: response.headers().clone(),
                        url: self.url.clone(),
                        redirect_count: self.redirect_count,
                    };
                    if self.events.send(event).is_err() {
                        return Ok(());
                    }
                    self.state = State::ReadBody;
                }
                State::ReadBody => {
                    let response = self
                        .response
                        .as_mut()
                        .ok_or_else(|| ClientError::from(NetError::EmptyResponse))?;
                    match response.body_mut().frame().await {
                        Some(Ok(frame)) => {
                            if let Ok(data) = frame.into_data() {
                                if !data.is_empty()
                                    && self.events.send(TransactionEvent::Data(data)).is_err()
                                {
                                    return Ok(());
                                }
                            }
                        }
                        Some(Err(e)) => return Err(map_hyper_error(&e)),
                        None => self.state = State::Done,
                    }
                }
                State::Done => {
                    let _ = self.events.send(TransactionEvent::Done);
                    return Ok(());
                }
            }
        }
    }

    fn build_request(&self) -> Result<Request<Full<Bytes>>, ClientError> {
        let target = match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        };
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(target)
            .body(Full::new(self.body.clone()))
            .map_err(|e| ClientError::transport(NetError::InvalidUrl, e.to_string()))?;

        let headers = request.headers_mut();
        *headers = self.headers.clone();
        if !headers.contains_key(HOST) {
            let host = self
                .url
                .host_str()
                .ok_or_else(|| ClientError::from(NetError::InvalidUrl))?;
            let authority = match self.url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            let value = HeaderValue::from_str(&authority)
                .map_err(|_| ClientError::from(NetError::InvalidUrl))?;
            headers.insert(HOST, value);
        }
        Ok(request)
    }

    /// Where to go next, if the response is a redirect that should be
    /// followed. Once the limit is reached the redirect itself is returned.
    fn redirect_target(&self, response: &Response<Incoming>) -> Result<Option<Url>, ClientError> {
        let status = response.status();
        let followed = matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308);
        if !followed || self.redirect_count >= self.max_redirects {
            return Ok(None);
        }
        let Some(location) = response.headers().get(LOCATION) else {
            return Ok(None);
        };
        let location = location.to_str().map_err(|_| {
            ClientError::transport(NetError::InvalidRedirect, "Invalid Location header.")
        })?;
        let next = self.url.join(location).map_err(|e| {
            ClientError::transport(
                NetError::InvalidRedirect,
                format!("Invalid redirect target \"{}\": {}", location, e),
            )
        })?;
        Ok(Some(next))
    }

    fn follow_redirect(&mut self, status: StatusCode, next: Url) {
        tracing::debug!(
            from = %self.url,
            to = %next,
            status = status.as_u16(),
            "following redirect"
        );

        let switch_to_get = status == StatusCode::SEE_OTHER
            || (self.method == Method::POST
                && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND));
        if switch_to_get {
            if self.method != Method::HEAD {
                self.method = Method::GET;
            }
            self.body = Bytes::new();
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
        }
        let same_origin = next.host_str() == self.url.host_str()
            && next.port_or_known_default() == self.url.port_or_known_default();
        if !same_origin {
            self.headers.remove(AUTHORIZATION);
            self.headers.remove(COOKIE);
        }
        self.headers.remove(HOST);

        self.redirect_count += 1;
        self.url = next;
        self.response = None;
        self.stream = None;
        self.state = State::CreateStream;
    }
}
