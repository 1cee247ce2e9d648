use asyncnet::base::neterror::NetError;
use asyncnet::http::retry::RetryConfig;
use asyncnet::{Client, HttpClient, RequestOptions, RetryingClient};
use http::{Method, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn quick_retries(max_attempts: usize) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay_ms: 10,
        max_delay_ms: 50,
        jitter_factor: 0.0,
    }
}

#[tokio::test]
async fn test_retry_on_closed_connection() {
    // 1. Setup server that drops the first connection without answering
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            if attempt == 0 {
                drop(socket);
                continue;
            }
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nRETRY")
                .await;
        }
    });

    // 2. Request through the retrying decorator
    let client = RetryingClient::new(Client::new(), quick_retries(3));
    let response = client
        .request(Method::GET, &format!("http://{}/", addr), RequestOptions::new())
        .unwrap();

    assert_eq!(response.status().await.unwrap(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "RETRY");
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert_eq!(response.info_value("retry_count"), Some(serde_json::json!(1)));
}

#[tokio::test]
async fn test_retry_on_service_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response: &[u8] = if attempt < 2 {
                b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy"
            } else {
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
            };
            let _ = socket.write_all(response).await;
        }
    });

    let client = RetryingClient::new(Client::new(), quick_retries(3));
    let response = client
        .request(Method::GET, &format!("http://{}/", addr), RequestOptions::new())
        .unwrap();

    assert_eq!(response.text().await.unwrap(), "ok");
    assert_eq!(accepted.load(Ordering::SeqCst), 3);

    let previous = response.info().previous_info();
    assert_eq!(previous.len(), 2);
    assert!(previous.iter().all(|info| info.http_code() == Some(503)));
}

#[tokio::test]
async fn test_refused_connection_exhausts_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RetryingClient::new(Client::new(), quick_retries(2));
    let response = client
        .request(Method::GET, &format!("http://{}/", addr), RequestOptions::new())
        .unwrap();

    let err = response.content().await.unwrap_err();
    assert_eq!(err.net_error(), Some(NetError::ConnectionRefused));
    assert_eq!(response.info_value("retry_count"), Some(serde_json::json!(2)));
}
