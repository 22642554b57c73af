//! Protocol layer tests: JSON-RPC envelope validation, errors, methods, handshake types.

#[cfg(test)]
mod tests {
    use pmcp_protocol::jsonrpc::*;
    use pmcp_protocol::methods::is_known_method;
    use pmcp_protocol::*;
    use serde_json::json;

    // ─────────────────────────────────────────────────────────────────────
    // RequestId
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_id_number_serialization() {
        let id = RequestId::Number(42);
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, json!(42));
    }

    #[test]
    fn request_id_string_deserialization() {
        let id: RequestId = serde_json::from_value(json!("req-1")).unwrap();
        assert_eq!(id, RequestId::String("req-1".into()));
    }

    #[test]
    fn request_id_display() {
        assert_eq!(RequestId::Number(7).to_string(), "7");
        assert_eq!(RequestId::String("a".into()).to_string(), "a");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Envelope validation
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn parses_request_from_wire_format() {
        let wire = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"list_models"}}"#;
        let msg = parse_message(wire).unwrap();
        assert_eq!(msg.method, "tools/call");
        assert_eq!(msg.id, Some(RequestId::Number(1)));
        assert_eq!(msg.params.as_ref().unwrap()["name"], "list_models");
        assert!(!msg.is_notification());
    }

    #[test]
    fn message_without_id_is_notification() {
        let msg = parse_message(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .unwrap();
        assert!(msg.is_notification());
        assert!(msg.params.is_none());
    }

    #[test]
    fn null_id_is_notification() {
        let msg = parse_message(br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn missing_version_rejected_with_id_echoed() {
        let err = parse_message(br#"{"id":9,"method":"initialize"}"#).unwrap_err();
        let resp = err.into_response();
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["error"]["code"], -32600);
        assert_eq!(parsed["id"], 9);
    }

    #[test]
    fn wrong_version_rejected() {
        let err = parse_message(br#"{"jsonrpc":"1.0","id":"x","method":"initialize"}"#)
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Invalid { id: Some(RequestId::String(ref s)), .. } if s == "x"));
    }

    #[test]
    fn empty_method_rejected() {
        let err = parse_message(br#"{"jsonrpc":"2.0","id":1,"method":""}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::Invalid { .. }));
    }

    #[test]
    fn non_object_rejected() {
        let err = parse_message(b"[1,2,3]").unwrap_err();
        let parsed = serde_json::to_value(err.into_response()).unwrap();
        assert_eq!(parsed["error"]["code"], -32600);
        assert!(parsed["id"].is_null());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_message(b"{not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::Parse(_)));
        let parsed = serde_json::to_value(err.into_response()).unwrap();
        assert_eq!(parsed["error"]["code"], -32700);
    }

    // ─────────────────────────────────────────────────────────────────────
    // McpResponse
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn success_response_serialization() {
        let resp = McpResponse::success(RequestId::Number(1), json!({"tools": []}));
        assert!(resp.is_success());
        assert!(!resp.is_error());

        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert!(parsed["result"]["tools"].is_array());
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn error_response_null_id() {
        let resp = McpResponse::error(None, McpError::parse_error("bad json"));
        let parsed = serde_json::to_value(&resp).unwrap();
        assert!(parsed["id"].is_null());
        assert_eq!(parsed["error"]["code"], -32700);
        assert!(parsed.get("result").is_none());
    }

    #[test]
    fn from_result_echoes_id_on_error() {
        let resp = McpResponse::from_result(
            RequestId::String("abc".into()),
            Err(McpError::internal("upstream returned 502")),
        );
        assert_eq!(resp.id(), Some(&RequestId::String("abc".into())));
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["error"]["code"], -32603);
        assert_eq!(parsed["error"]["data"]["details"], "upstream returned 502");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Error codes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn error_code_values() {
        assert_eq!(McpErrorCode::ParseError.code(), -32700);
        assert_eq!(McpErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(McpErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(McpErrorCode::InvalidParams.code(), -32602);
        assert_eq!(McpErrorCode::InternalError.code(), -32603);
        assert_eq!(McpErrorCode::ServerNotInitialized.code(), -32002);
        assert_eq!(McpErrorCode::Other(-42).code(), -42);
    }

    #[test]
    fn error_code_roundtrip() {
        assert_eq!(McpErrorCode::from_code(-32601), McpErrorCode::MethodNotFound);
        assert_eq!(McpErrorCode::from_code(-32002), McpErrorCode::ServerNotInitialized);
        assert_eq!(McpErrorCode::from_code(-99999), McpErrorCode::Other(-99999));
    }

    #[test]
    fn named_codes_map_back_to_themselves() {
        for code in [
            McpErrorCode::ParseError,
            McpErrorCode::InvalidRequest,
            McpErrorCode::MethodNotFound,
            McpErrorCode::InvalidParams,
            McpErrorCode::InternalError,
            McpErrorCode::ServerNotInitialized,
        ] {
            assert_eq!(McpErrorCode::from_code(code.code()), code);
            assert_ne!(code.code(), 0);
        }
    }

    #[test]
    fn unknown_tool_uses_not_found_code() {
        let e = McpError::unknown_tool("draw");
        assert_eq!(e.error_code(), McpErrorCode::MethodNotFound);
        assert_eq!(e.message, "Unknown tool: draw");
    }

    #[test]
    fn internal_error_keeps_details_out_of_message() {
        let e = McpError::internal("upstream returned HTTP 502: bad gateway");
        assert_eq!(e.code, -32603);
        assert_eq!(e.message, "Internal error");
        assert_eq!(e.data.unwrap()["details"], "upstream returned HTTP 502: bad gateway");
    }

    #[test]
    fn error_display() {
        let s = format!("{}", McpError::invalid_params("prompt is required"));
        assert!(s.contains("-32602"));
        assert!(s.contains("prompt is required"));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Methods
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn method_names_roundtrip() {
        for method in Method::ALL {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
        assert!(is_known_method("tools/call"));
        assert!(!is_known_method("resources/list"));
        assert!(!is_known_method(""));
    }

    #[test]
    fn only_tool_methods_are_gated() {
        assert!(Method::ToolsList.requires_initialized());
        assert!(Method::ToolsCall.requires_initialized());
        assert!(!Method::Initialize.requires_initialized());
        assert!(!Method::Ping.requires_initialized());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Handshake types
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn initialize_result_wire_format() {
        let result = InitializeResult::new("0.1.0");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(json["serverInfo"]["name"], "pollinations-mcp-server");
        assert_eq!(json["capabilities"]["tools"]["listChanged"], false);
        assert!(json.get("instructions").is_none());
    }

    #[test]
    fn initialize_params_tolerate_empty_object() {
        let params: InitializeParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.client_info.is_none());
    }

    #[test]
    fn call_tool_result_text_block() {
        let json = serde_json::to_value(CallToolResult::text("{\"ok\":true}")).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "{\"ok\":true}");
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn session_state_is_sticky() {
        let session = SessionState::new();
        assert!(!session.is_initialized());
        session.mark_initialized();
        session.mark_initialized();
        assert!(session.is_initialized());
    }
}
