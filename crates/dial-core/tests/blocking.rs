//! Blocking client: same observable behaviour as the async one
#![cfg(feature = "blocking")]

use dial_core::blocking::Dial;
use dial_core::{ChatCompletionRequest, Error, FilePart, Message, RetryPolicy};
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS: &str = "/openai/deployments/gpt-4o/chat/completions";

/// The mock gateway runs on its own runtime; the client is driven from the
/// plain test thread.
fn gateway() -> (Runtime, MockServer) {
    let runtime = Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::start());
    (runtime, server)
}

fn client(server: &MockServer) -> Dial {
    Dial::builder()
        .base_url(server.uri())
        .api_key("test-key")
        .retry_policy(RetryPolicy::immediate())
        .build_blocking()
        .unwrap()
}

fn request() -> ChatCompletionRequest {
    ChatCompletionRequest::new(vec![Message::user("hi")])
}

#[test]
fn test_blocking_completion_with_retry() {
    let (runtime, server) = gateway();
    runtime.block_on(async {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .and(header("Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hey"}, "finish_reason": "stop"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    });

    let client = client(&server);
    let completion = client.chat().completions().create("gpt-4o", &request()).unwrap();
    assert_eq!(completion.content(), Some("hey"));
}

#[test]
fn test_blocking_stream_iterates_chunks() {
    let (runtime, server) = gateway();
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path(COMPLETIONS))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server),
    );

    let client = client(&server);
    let text: String = client
        .chat()
        .completions()
        .create_stream("gpt-4o", &request())
        .unwrap()
        .map(|chunk| chunk.unwrap().content().unwrap_or_default().to_string())
        .collect();
    assert_eq!(text, "ab");
}

#[test]
fn test_blocking_error_mapping_matches_async() {
    let (runtime, server) = gateway();
    runtime.block_on(async {
        Mock::given(method("GET"))
            .and(path("/v1/files/b1/gone.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/openai/deployments"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;
    });

    let client = client(&server);
    let err = client.files().download("files/b1/gone.txt", None).unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));

    let err = client.deployments().list().unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.to_string(), "maintenance");
}

#[test]
fn test_blocking_client_usable_from_threads() {
    let (runtime, server) = gateway();
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/v1/bucket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bucket": "b1"})))
            .expect(4)
            .mount(&server),
    );

    let client = client(&server);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let client = client.clone();
            scope.spawn(move || {
                assert_eq!(client.files().bucket().unwrap().bucket, "b1");
            });
        }
    });
}

#[test]
fn test_blocking_applications_and_conditional_files() {
    let (runtime, server) = gateway();
    runtime.block_on(async {
        Mock::given(method("GET"))
            .and(path("/openai/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "app-1"}, {"id": "app-2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files/b1/a.txt"))
            .and(header("If-Match", "etag-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/files/b1/a.txt"))
            .and(header("If-None-Match", "*"))
            .respond_with(ResponseTemplate::new(412))
            .expect(1)
            .mount(&server)
            .await;
    });

    let client = client(&server);
    let ids: Vec<String> = client
        .applications()
        .list()
        .unwrap()
        .into_iter()
        .map(|app| app.id)
        .collect();
    assert_eq!(ids, vec!["app-1", "app-2"]);

    let bytes = client.files().download("files/b1/a.txt", Some("etag-1")).unwrap();
    assert_eq!(bytes.as_ref(), b"hello");

    let err = client
        .files()
        .upload_new("files/b1/a.txt", FilePart::new("a.txt", "x"))
        .unwrap_err();
    assert!(matches!(err, Error::EtagMismatch { .. }));
}
