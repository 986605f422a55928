//! Gemini provider tests against a local mock of the REST API.

use relay_service::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use relay_service::services::providers::{
    FinishReason, GenerationParams, ProviderError, TextProvider,
};
use reqwest::StatusCode;
use service_core::error::UpstreamPayload;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-1.5-flash";
const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

fn provider_for(base_url: &str) -> GeminiTextProvider {
    GeminiTextProvider::new(GeminiConfig {
        api_key: "test-key".to_string(),
        model: MODEL.to_string(),
        base_url: base_url.to_string(),
    })
    .expect("Failed to create provider")
}

fn candidate_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 3,
            "candidatesTokenCount": 2,
            "totalTokenCount": 5
        }
    })
}

#[tokio::test]
async fn test_generate_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_reply("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider_for(&server.uri())
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .expect("generation succeeds");

    assert_eq!(response.text, "hi there");
    assert_eq!(response.input_tokens, 3);
    assert_eq!(response.output_tokens, 2);
    assert_eq!(response.finish_reason, FinishReason::Complete);
}

#[tokio::test]
async fn test_request_carries_single_user_turn_and_fixed_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "generationConfig": {
                "topK": 64,
                "maxOutputTokens": 8192,
                "responseMimeType": "text/plain"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    provider_for(&server.uri())
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .expect("generation succeeds");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: Value = requests[0].body_json().expect("JSON request body");
    assert_eq!(
        body["contents"],
        json!([{ "role": "user", "parts": [{ "text": "Say hi" }] }])
    );
}

#[tokio::test]
async fn test_each_generate_starts_a_fresh_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_reply("hi there")))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider_for(&server.uri());
    let params = GenerationParams::relay_defaults();
    provider.generate("Say hi", &params).await.unwrap();
    provider.generate("Say hi", &params).await.unwrap();

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    for request in requests {
        let body: Value = request.body_json().unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_chat_session_accumulates_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_reply("hello")))
        .mount(&server)
        .await;

    let provider = provider_for(&server.uri());
    let mut session = provider.start_chat(&GenerationParams::relay_defaults());
    assert_eq!(session.turns(), 0);

    session.send_message("first").await.unwrap();
    assert_eq!(session.turns(), 2);

    session.send_message("second").await.unwrap();
    assert_eq!(session.turns(), 4);

    let requests = server.received_requests().await.unwrap();
    let last: Value = requests[1].body_json().unwrap();
    let roles: Vec<&str> = last["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user"]);
}

#[tokio::test]
async fn test_upstream_error_keeps_status_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": "rate limited" })))
        .mount(&server)
        .await;

    let err = provider_for(&server.uri())
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    match err {
        ProviderError::Upstream { status, payload } => {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(payload, UpstreamPayload::Json(json!({ "error": "rate limited" })));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_json_string_error_body_stays_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(503).set_body_string(r#""oops""#),
        )
        .mount(&server)
        .await;

    let err = provider_for(&server.uri())
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    match err {
        ProviderError::Upstream { status, payload } => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(payload, UpstreamPayload::Json(json!("oops")));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_send_leaves_history_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let provider = provider_for(&server.uri());
    let mut session = provider.start_chat(&GenerationParams::relay_defaults());

    let err = session.send_message("hello").await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Upstream { status, payload }
            if status == StatusCode::INTERNAL_SERVER_ERROR
                && payload == UpstreamPayload::Text("boom".to_string())
    ));
    assert_eq!(session.turns(), 0);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = provider_for(&format!("http://{}", addr))
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_base_url_is_unexpected_error() {
    let err = provider_for("not a url")
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Other(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_malformed_success_body_is_unexpected_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = provider_for(&server.uri())
        .generate("Say hi", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Other(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_blocked_prompt_is_unexpected_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&server)
        .await;

    let err = provider_for(&server.uri())
        .generate("something unsafe", &GenerationParams::relay_defaults())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Other(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_health_check_requires_api_key() {
    let provider = GeminiTextProvider::new(GeminiConfig {
        api_key: String::new(),
        model: MODEL.to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
    })
    .unwrap();

    assert!(matches!(
        provider.health_check().await,
        Err(ProviderError::Other(_))
    ));
}

#[tokio::test]
async fn test_health_check_lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .expect(1)
        .mount(&server)
        .await;

    provider_for(&server.uri())
        .health_check()
        .await
        .expect("health check succeeds");
}
