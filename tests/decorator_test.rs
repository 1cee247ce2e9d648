//! Behavior of decorated responses, driven by scripted mock responses.

use asyncnet::base::neterror::NetError;
use asyncnet::{
    filter_fn, AsyncDecoratorClient, Chunk, ClientError, HttpClient, LoadState, MockHttpClient,
    MockResponse, RequestOptions,
};
use futures::StreamExt;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use std::error::Error as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

async fn collect(response: &asyncnet::AsyncResponse) -> Vec<Result<Chunk, ClientError>> {
    let mut stream = response.stream();
    let mut items = Vec::new();
    while let Some((_, item)) = stream.next().await {
        items.push(item);
    }
    items
}

#[tokio::test]
async fn test_passthru_matches_undecorated() {
    let plain = MockHttpClient::new(|_, _, _| MockResponse::new(["Hello ", "", "world"]));
    let undecorated = plain
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();

    let decorated_client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["Hello ", "", "world"])),
        |_, _, _| {
            Some(filter_fn(|chunk, context| {
                context.passthru();
                Ok(vec![chunk])
            }))
        },
    );
    let decorated = decorated_client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();

    let expected = collect(&undecorated).await;
    assert_eq!(
        expected,
        vec![
            Ok(Chunk::First),
            Ok(Chunk::data(0, "Hello ")),
            Ok(Chunk::timeout(6)),
            Ok(Chunk::data(6, "world")),
            Ok(Chunk::last(11)),
        ]
    );
    assert_eq!(collect(&decorated).await, expected);
}

#[tokio::test]
async fn test_filter_called_once_per_raw_chunk() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b", "c"])),
        |_, _, _| Some(filter_fn(|chunk, _| Ok(vec![chunk]))),
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();

    assert_eq!(response.filter_calls(), 0);
    assert_eq!(response.load_state(), LoadState::Pending);
    assert_eq!(response.content().await.unwrap(), "abc");
    // First, three data chunks, Last.
    assert_eq!(response.filter_calls(), 5);
    assert_eq!(response.load_state(), LoadState::Terminal);
}

#[tokio::test]
async fn test_retry_404_keeps_previous_info() {
    let mock = MockHttpClient::new(|_, url, _| {
        if url.path() == "/404" {
            MockResponse::new(["missing"]).with_status(StatusCode::NOT_FOUND)
        } else {
            MockResponse::new(["found"])
        }
    });
    let client = AsyncDecoratorClient::new(mock, |_, _, _| {
        Some(filter_fn(|chunk, context| {
            if chunk.is_first() && context.status()? == StatusCode::NOT_FOUND {
                context.cancel();
                let options = RequestOptions::new();
                context.replace_request(Method::GET, "http://example.com/200", options)?;
                return Ok(Vec::new());
            }
            Ok(vec![chunk])
        }))
    });

    let response = client
        .request(Method::GET, "http://example.com/404", RequestOptions::new())
        .unwrap();
    assert_eq!(response.status().await.unwrap(), StatusCode::OK);
    assert_eq!(response.content().await.unwrap(), "found");

    let info = response.info();
    assert_eq!(info.http_code(), Some(200));
    assert_eq!(info.url(), Some("http://example.com/200"));
    let previous = info.previous_info();
    assert_eq!(previous.len(), 1);
    assert_eq!(previous[0].http_code(), Some(404));
    assert_eq!(previous[0].url(), Some("http://example.com/404"));
}

#[tokio::test]
async fn test_replacement_uses_inner_client() {
    let inner = Arc::new(MockHttpClient::new(|_, url, _| {
        MockResponse::new([url.path().to_string()])
    }));
    let filters = Arc::new(AtomicUsize::new(0));
    let created = filters.clone();
    let client = AsyncDecoratorClient::new(inner.clone(), move |_, _, _| {
        created.fetch_add(1, Ordering::SeqCst);
        let mut replaced = false;
        Some(filter_fn(move |chunk, context| {
            if chunk.is_first() && !replaced {
                replaced = true;
                let options = RequestOptions::new();
                context.replace_request(Method::GET, "http://example.com/second", options)?;
                return Ok(Vec::new());
            }
            Ok(vec![chunk])
        }))
    });

    let response = client
        .request(Method::GET, "http://example.com/first", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "/second");
    assert_eq!(inner.requests_count(), 2);
    assert_eq!(filters.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_replace_request_carries_user_data() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let mock = MockHttpClient::new(move |_, _, options| {
        recorder.lock().unwrap().push(options.get_user_data().cloned());
        MockResponse::new(["x"])
    });
    let client = AsyncDecoratorClient::new(mock, |_, _, _| {
        let mut replaced = false;
        Some(filter_fn(move |chunk, context| {
            if chunk.is_first() && !replaced {
                replaced = true;
                let url = context.url().to_string();
                context.replace_request(Method::GET, &url, RequestOptions::new())?;
                return Ok(Vec::new());
            }
            Ok(vec![chunk])
        }))
    });

    let options = RequestOptions::new().user_data(json!({"tag": 7}));
    let response = client.request(Method::GET, "http://example.com/", options).unwrap();
    response.content().await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], Some(json!({"tag": 7})));
}

#[tokio::test]
async fn test_inner_responses_are_not_buffered() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let mock = MockHttpClient::new(move |_, _, options| {
        recorder.lock().unwrap().push(options.is_buffered());
        MockResponse::new(["ab", "cd"])
    });
    let client = AsyncDecoratorClient::new(mock, |_, _, _| {
        let mut replaced = false;
        Some(filter_fn(move |chunk, context| {
            if chunk.is_first() && !replaced {
                replaced = true;
                let url = context.url().to_string();
                context.replace_request(Method::GET, &url, RequestOptions::new().buffer(true))?;
                return Ok(Vec::new());
            }
            Ok(vec![chunk])
        }))
    });

    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "abcd");
    assert_eq!(response.content().await.unwrap(), "abcd");
    assert_eq!(*seen.lock().unwrap(), vec![false, false]);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b"])),
        |_, _, _| None,
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();

    response.cancel();
    response.cancel();

    let err = response.content().await.unwrap_err();
    assert_eq!(err, ClientError::canceled());
    assert_eq!(response.content().await.unwrap_err(), err);
    assert!(response.info().is_canceled());
    assert_eq!(response.load_state(), LoadState::Terminal);

    let items = collect(&response).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().ok().and_then(Chunk::error), Some(&err));
}

#[tokio::test]
async fn test_timeout_retry_converges() {
    const RETRIES: usize = 3;
    let mock = Arc::new(MockHttpClient::from_responses(
        (0..RETRIES)
            .map(|_| MockResponse::new(["", "late"]))
            .chain([MockResponse::new(["done"])]),
    ));
    let client = AsyncDecoratorClient::new(mock.clone(), |_, _, _| {
        let mut retries = 0;
        Some(filter_fn(move |chunk, context| {
            if chunk.is_timeout() && retries < RETRIES {
                retries += 1;
                context.cancel();
                let url = context.url().to_string();
                context.replace_request(Method::GET, &url, RequestOptions::new())?;
                return Ok(Vec::new());
            }
            Ok(vec![chunk])
        }))
    });

    let response = client
        .request(Method::GET, "http://example.com/slow", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "done");
    assert_eq!(mock.requests_count(), RETRIES + 1);
    assert_eq!(response.info().previous_info().len(), RETRIES);
}

#[tokio::test]
async fn test_multi_step_json_injection() {
    let mock = MockHttpClient::new(|_, url, _| match url.path() {
        "/page/1" => MockResponse::new([r#"{"id":1}"#]),
        _ => MockResponse::new([r#"{"id":"#, "2}"]),
    });
    let client = AsyncDecoratorClient::new(mock, |_, _, _| {
        let mut page = 1;
        Some(filter_fn(move |chunk, context| match chunk {
            Chunk::First if page == 1 => Ok(vec![chunk, context.create_chunk("[")]),
            Chunk::First => Ok(Vec::new()),
            Chunk::Last { .. } if page == 1 => {
                page = 2;
                let options = RequestOptions::new();
                context.replace_request(Method::GET, "http://example.com/page/2", options)?;
                Ok(vec![context.create_chunk(",")])
            }
            Chunk::Last { .. } => Ok(vec![context.create_chunk("]"), chunk]),
            other => Ok(vec![other]),
        }))
    });

    let response = client
        .request(Method::GET, "http://example.com/page/1", RequestOptions::new())
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!([{"id": 1}, {"id": 2}]));

    let offsets: Vec<u64> = collect(&response)
        .await
        .into_iter()
        .map(|item| item.unwrap().offset())
        .collect();
    assert_eq!(offsets, vec![19]);
}

#[tokio::test]
async fn test_offsets_are_logical() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["abc", "de"])),
        |_, _, _| {
            Some(filter_fn(|chunk, context| match chunk {
                Chunk::Data { .. } => Ok(vec![context.create_chunk(">"), chunk]),
                other => Ok(vec![other]),
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let items: Vec<Chunk> = collect(&response).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(
        items,
        vec![
            Chunk::First,
            Chunk::data(0, ">"),
            Chunk::data(1, "abc"),
            Chunk::data(4, ">"),
            Chunk::data(5, "de"),
            Chunk::last(7),
        ]
    );
}

#[tokio::test]
async fn test_first_inserted_and_duplicates_dropped() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["body"])),
        |_, _, _| {
            Some(filter_fn(|chunk, _| match chunk {
                // Hold back the first chunk: data arrives first.
                Chunk::First => Ok(Vec::new()),
                Chunk::Data { .. } => Ok(vec![chunk, Chunk::First]),
                Chunk::Last { offset } => Ok(vec![chunk, Chunk::data(offset, "late")]),
                other => Ok(vec![other]),
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let items: Vec<Chunk> = collect(&response).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(items, vec![Chunk::First, Chunk::data(0, "body"), Chunk::last(4)]);
    assert_eq!(response.status().await.unwrap(), StatusCode::OK);
}

#[tokio::test]
async fn test_swallowed_error_propagates() {
    let error = ClientError::from(NetError::ConnectionReset);
    let failing = error.clone();
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(move |_, _, _| {
            MockResponse::new(["partial"]).fail_after_body(failing.clone())
        }),
        |_, _, _| {
            Some(filter_fn(|chunk, _| {
                if chunk.error().is_some() {
                    return Ok(Vec::new());
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap_err(), error);
}

#[tokio::test]
async fn test_last_synthesized_when_filter_drops_it() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["ok"])),
        |_, _, _| {
            Some(filter_fn(|chunk, _| {
                if chunk.is_last() {
                    return Ok(Vec::new());
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let items: Vec<Chunk> = collect(&response).await.into_iter().map(Result::unwrap).collect();
    assert_eq!(items.last(), Some(&Chunk::last(2)));
}

#[tokio::test]
async fn test_filter_cancel_without_replacement() {
    // Before headers: the response fails as canceled.
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b"])),
        |_, _, _| {
            Some(filter_fn(|_, context| {
                context.cancel();
                context.cancel();
                Ok(Vec::new())
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.status().await.unwrap_err(), ClientError::canceled());
    assert!(response.info().is_canceled());

    // After headers: the response ends early.
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b"])),
        |_, _, _| {
            Some(filter_fn(|chunk, context| {
                if chunk.content() == "a" {
                    context.cancel();
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "a");
}

#[tokio::test]
async fn test_filter_fault_wraps_raw_error() {
    let raw = ClientError::from(NetError::ConnectionClosed);
    let failing = raw.clone();
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(move |_, _, _| {
            MockResponse::new(["x"]).fail_after_body(failing.clone())
        }),
        |_, _, _| {
            Some(filter_fn(|chunk, _| {
                if chunk.error().is_some() {
                    return Err(ClientError::invalid_argument("cannot handle errors"));
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let err = response.content().await.unwrap_err();

    assert!(matches!(err, ClientError::Filter { .. }));
    assert_eq!(err.to_string(), "cannot handle errors");
    assert_eq!(err.source().map(|source| source.to_string()), Some(raw.to_string()));
}

#[tokio::test]
async fn test_reraised_raw_error_is_untouched() {
    let raw = ClientError::from(NetError::ConnectionClosed);
    let failing = raw.clone();
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(move |_, _, _| MockResponse::failing(failing.clone())),
        |_, _, _| Some(filter_fn(|chunk, _| Ok(vec![chunk.into_result()?]))),
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.status().await.unwrap_err(), raw);
}

#[tokio::test]
async fn test_context_status_before_headers() {
    let raw = ClientError::from(NetError::ConnectionRefused);
    let failing = raw.clone();
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(move |_, _, _| MockResponse::failing(failing.clone())),
        move |_, _, _| {
            let sink = sink.clone();
            Some(filter_fn(move |chunk, context| {
                *sink.lock().unwrap() = Some(context.status());
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let _ = response.content().await;

    assert_eq!(observed.lock().unwrap().clone(), Some(Err(raw)));
}

#[tokio::test]
async fn test_passthru_with_second_stage() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b"])),
        |_, _, _| {
            Some(filter_fn(|chunk, context| {
                context.passthru_with(|chunk, _| match chunk {
                    Chunk::Data { offset, content } => {
                        Ok(vec![Chunk::data(offset, content.to_ascii_uppercase())])
                    }
                    other => Ok(vec![other]),
                });
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "AB");
}

#[tokio::test]
async fn test_info_set_by_filter() {
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a"])),
        |_, _, _| {
            Some(filter_fn(|chunk, context| {
                if chunk.is_first() {
                    context.set_info("decorated", true);
                    assert_eq!(context.info("decorated"), Some(json!(true)));
                    assert_eq!(context.info("http_method"), Some(json!("GET")));
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    response.content().await.unwrap();
    assert_eq!(response.info_value("decorated"), Some(json!(true)));
}

#[tokio::test]
async fn test_progress_reported_per_raw_chunk() {
    let calls = Arc::new(AtomicU64::new(0));
    let downloaded = Arc::new(AtomicU64::new(0));
    let (calls_seen, downloaded_seen) = (calls.clone(), downloaded.clone());

    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| {
            MockResponse::new(["12", "345"]).with_header("content-length", "5")
        }),
        |_, _, _| None,
    );
    let options = RequestOptions::new().on_progress(move |now, total, _| {
        calls_seen.fetch_add(1, Ordering::SeqCst);
        downloaded_seen.store(now, Ordering::SeqCst);
        assert_eq!(total, Some(5));
    });
    let response = client.request(Method::GET, "http://example.com/", options).unwrap();
    response.content().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(downloaded.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_timeout_fails_status_access() {
    let client = MockHttpClient::new(|_, _, _| MockResponse::new(["", "x"]));
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    // Headers are known before the timeout.
    assert_eq!(response.status().await.unwrap(), StatusCode::OK);
    let err = response.content().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err, ClientError::timeout("http://example.com/"));
}

#[tokio::test]
async fn test_timeout_is_not_terminal_in_streams() {
    let client = MockHttpClient::new(|_, _, _| MockResponse::new(["", "", "x"]));
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    let items: Vec<Chunk> = collect(&response).await.into_iter().map(Result::unwrap).collect();
    assert_eq!(items.iter().filter(|chunk| chunk.is_timeout()).count(), 2);
    assert_eq!(items.last(), Some(&Chunk::last(1)));
}

#[tokio::test]
async fn test_unbuffered_content_after_stream() {
    let client = MockHttpClient::new(|_, _, _| MockResponse::new(["a", "b"]));
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new().buffer(false))
        .unwrap();

    let mut stream = response.stream();
    let _ = stream.next().await;
    let _ = stream.next().await;
    assert!(matches!(response.content().await, Err(ClientError::InvalidState(_))));

    let fresh = client
        .request(Method::GET, "http://example.com/", RequestOptions::new().buffer(false))
        .unwrap();
    assert_eq!(fresh.content().await.unwrap(), "ab");
}

#[tokio::test]
async fn test_terminal_error_raised_once_in_streams() {
    let error = ClientError::from(NetError::ConnectionRefused);
    let failing = error.clone();
    let client = MockHttpClient::new(move |_, _, _| MockResponse::failing(failing.clone()));
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();

    let first = collect(&response).await;
    assert_eq!(first, vec![Err(error.clone())]);
    let second = collect(&response).await;
    assert_eq!(second, vec![Ok(Chunk::failure(0, error.clone()))]);
    assert_eq!(response.content().await.unwrap_err(), error);
    assert_eq!(response.headers().await.unwrap_err(), error);
}

#[tokio::test]
async fn test_status_kept_after_body_error() {
    let error = ClientError::from(NetError::ConnectionReset);
    let failing = error.clone();
    let client = MockHttpClient::new(move |_, _, _| {
        MockResponse::new(["x"]).with_status(StatusCode::ACCEPTED).fail_after_body(failing.clone())
    });
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap_err(), error);
    assert_eq!(response.status().await.unwrap(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_replace_response() {
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    let client = AsyncDecoratorClient::new(
        MockHttpClient::new(|_, _, _| MockResponse::new(["a"])),
        move |_, _, _| {
            let sink = sink.clone();
            let mut swapped = false;
            Some(filter_fn(move |chunk, context| {
                if chunk.is_first() && !swapped {
                    swapped = true;
                    let replacement = MockResponse::new(["swapped"]);
                    context.replace_response(replacement);
                    *sink.lock().unwrap() = Some(context.offset());
                    return Ok(Vec::new());
                }
                Ok(vec![chunk])
            }))
        },
    );
    let response = client
        .request(Method::GET, "http://example.com/", RequestOptions::new())
        .unwrap();
    assert_eq!(response.content().await.unwrap(), "swapped");
    assert_eq!(*observed.lock().unwrap(), Some(0));
}
