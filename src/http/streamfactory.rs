use crate::base::clienterror::ClientError;
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::spawn;
use url::{Host, Url};

/// An HTTP/1.1 connection ready to carry one request.
/// Equivalent to net::HttpStream.
pub struct HttpStream {
    sender: http1::SendRequest<Full<Bytes>>,
}

impl HttpStream {
    pub async fn send_request(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, ClientError> {
        self.sender.send_request(req).await.map_err(|e| {
            tracing::debug!(error = %e, "request failed");
            map_hyper_error(&e)
        })
    }
}

/// Classify a hyper error.
pub(crate) fn map_hyper_error(e: &hyper::Error) -> ClientError {
    let code = if e.is_parse() {
        NetError::InvalidHttpResponse
    } else if e.is_incomplete_message() {
        NetError::ConnectionClosed
    } else if e.is_canceled() {
        NetError::Aborted
    } else if e.is_timeout() {
        NetError::TimedOut
    } else if e.is_closed() {
        NetError::ConnectionReset
    } else {
        NetError::HttpBodyError
    };
    ClientError::transport(code, e.to_string())
}

/// Opens plain TCP connections and performs the HTTP/1.1 handshake.
#[derive(Debug, Clone, Default)]
pub struct HttpStreamFactory {
    connect_timeout: Option<Duration>,
}

impl HttpStreamFactory {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    pub async fn create_stream(&self, url: &Url) -> Result<HttpStream, ClientError> {
        if url.scheme() != "http" {
            return Err(ClientError::transport(
                NetError::DisallowedUrlScheme,
                format!("Unsupported URL scheme \"{}\".", url.scheme()),
            ));
        }
        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => return Err(ClientError::transport(NetError::InvalidUrl, "URL has no host.")),
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let connect = TcpStream::connect((host.as_str(), port));
        let socket = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                ClientError::transport(
                    NetError::ConnectionTimedOut,
                    format!("Connection to {}:{} timed out", host, port),
                )
            })?,
            None => connect.await,
        }
        .connection_context(&host, port)?;
        tracing::debug!(host = %host, port, "connected");

        let io = TokioIo::new(socket);
        let (sender, conn) = http1::handshake(io).await.map_err(|e| map_hyper_error(&e))?;

        // The driver ends once the sender and the body are dropped.
        spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "connection closed with error");
            }
        });

        Ok(HttpStream { sender })
    }
}
