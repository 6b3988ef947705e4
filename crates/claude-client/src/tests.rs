#[cfg(test)]
mod unit {
    use crate::types::{ContentBlock, MessagesResponse};

    #[test]
    fn parse_text_response() {
        let json = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "{\"topics\": {}}"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(resp.content[0], ContentBlock::Other));
        assert_eq!(resp.first_text(), Some("{\"topics\": {}}"));
        assert_eq!(resp.usage.unwrap().output_tokens, 5);
    }

    #[test]
    fn empty_content_has_no_text() {
        let resp: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert_eq!(resp.first_text(), None);
    }
}

#[cfg(test)]
mod http {
    use crate::{ClaudeClient, ClaudeError};
    use mockito::Matcher;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            ClaudeClient::new("  "),
            Err(ClaudeError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn complete_sends_headers_and_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 100,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": [{"type": "text", "text": "hello"}]}"#)
            .create_async()
            .await;

        let client = ClaudeClient::with_base_url("sk-test", &server.url()).unwrap();
        let text = client.complete("claude-test", 100, "hi").await.unwrap();
        assert_eq!(text, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_carries_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#)
            .create_async()
            .await;

        let client = ClaudeClient::with_base_url("sk-bad", &server.url()).unwrap();
        let err = client.complete("m", 10, "hi").await.unwrap_err();
        match err {
            ClaudeError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_without_text_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content": []}"#)
            .create_async()
            .await;

        let client = ClaudeClient::with_base_url("sk", &server.url()).unwrap();
        let err = client.complete("m", 10, "hi").await.unwrap_err();
        assert!(matches!(err, ClaudeError::EmptyResponse));
    }
}
