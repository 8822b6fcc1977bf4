use flow_ox::{
    DecodeError, StopReason, decode_str,
    sse::read_frames,
    session::FrameDecoder,
};

const SIMPLE_CAPTURE: &str = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_1\",\"model\":\"claude-x\",\"usage\":{\"input_tokens\":10,\"output_tokens\":0}}}\n\
\n\
event: content_block_start\n\
data: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\
\n\
event: content_block_stop\n\
data: {\"index\":0}\n\
\n\
event: message_delta\n\
data: {\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\
\n\
event: message_stop\n\
data: {}\n\
\n";

#[test]
fn decodes_a_complete_text_capture() {
    let decoded = decode_str(SIMPLE_CAPTURE);

    assert!(!decoded.truncated);
    assert!(!decoded.errored);
    assert!(decoded.issues.is_empty());

    let message = &decoded.message;
    assert_eq!(message.id, "msg_1");
    assert_eq!(message.model, "claude-x");
    assert_eq!(message.text_content(), vec!["Hi"]);
    assert_eq!(message.stop_reason, Some(StopReason::EndTurn));
    assert_eq!(message.usage.input_tokens, Some(10));
    assert_eq!(message.usage.output_tokens, Some(2));
}

#[test]
fn replaying_the_same_capture_is_deterministic() {
    let first = decode_str(SIMPLE_CAPTURE);
    let second = decode_str(SIMPLE_CAPTURE);
    assert_eq!(first.message, second.message);
    assert_eq!(first.issues, second.issues);
    assert_eq!(first.truncated, second.truncated);
}

#[test]
fn decodes_a_tool_use_capture() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_2\",\"model\":\"claude-x\",\"role\":\"assistant\",\"usage\":{\"input_tokens\":50,\"output_tokens\":0}}}\n\
\n\
event: content_block_start\n\
data: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Checking the weather.\"}}\n\
\n\
event: content_block_stop\n\
data: {\"index\":0}\n\
\n\
event: content_block_start\n\
data: {\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"get_weather\",\"input\":{}}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"city\\\":\"}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"Paris\\\"}\"}}\n\
\n\
event: content_block_stop\n\
data: {\"index\":1}\n\
\n\
event: message_delta\n\
data: {\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":17}}\n\
\n\
event: message_stop\n\
data: {}\n\
\n";

    let decoded = decode_str(capture);
    assert!(decoded.issues.is_empty());

    let message = &decoded.message;
    assert_eq!(message.content.len(), 2);
    assert_eq!(message.stop_reason, Some(StopReason::ToolUse));

    let tool_use = message.tool_uses().next().expect("tool block");
    assert_eq!(tool_use.name, "get_weather");
    assert_eq!(tool_use.input, Some(serde_json::json!({"city": "Paris"})));
    assert_eq!(tool_use.partial_json, "{\"city\":\"Paris\"}");
}

#[test]
fn capture_cut_off_after_block_start_is_a_partial_message() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_3\",\"model\":\"claude-x\",\"usage\":{\"input_tokens\":5,\"output_tokens\":0}}}\n\
\n\
event: content_block_start\n\
data: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\
\n";

    let decoded = decode_str(capture);
    assert!(decoded.truncated);
    assert!(!decoded.errored);
    assert_eq!(decoded.message.id, "msg_3");
    assert_eq!(decoded.message.content.len(), 1);
    assert_eq!(decoded.message.text_content(), vec![""]);
}

#[test]
fn capture_cut_off_mid_record_keeps_the_tail_as_a_diagnostic() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_4\",\"model\":\"claude-x\",\"usage\":{}}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":0,\"delta\":{\"type\":\"text_del";

    let decoded = decode_str(capture);
    assert!(decoded.truncated);
    assert_eq!(decoded.message.id, "msg_4");
    // Both the framing anomaly and the unparseable tail are on record.
    assert!(
        decoded
            .issues
            .iter()
            .any(|issue| matches!(issue, DecodeError::TruncatedFrame))
    );
    assert!(
        decoded
            .issues
            .iter()
            .any(|issue| matches!(issue, DecodeError::EventParse(_)))
    );
}

#[test]
fn upstream_error_event_ends_the_session_with_partial_content() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_5\",\"model\":\"claude-x\",\"usage\":{}}}\n\
\n\
event: content_block_start\n\
data: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\
\n\
event: content_block_delta\n\
data: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"so far\"}}\n\
\n\
event: error\n\
data: {\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\
\n";

    let decoded = decode_str(capture);
    assert!(decoded.errored);
    assert_eq!(decoded.message.text_content(), vec!["so far"]);
    assert_eq!(
        decoded.message.error.as_ref().map(|e| e.message.as_str()),
        Some("Overloaded")
    );
}

#[test]
fn unparseable_events_are_skipped_not_fatal() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_6\",\"model\":\"claude-x\",\"usage\":{}}}\n\
\n\
event: content_block_start\n\
data: {this is not json}\n\
\n\
event: message_stop\n\
data: {}\n\
\n";

    let decoded = decode_str(capture);
    assert!(!decoded.truncated);
    assert_eq!(decoded.message.id, "msg_6");
    assert_eq!(decoded.issues.len(), 1);
    assert!(matches!(decoded.issues[0], DecodeError::EventParse(_)));
}

#[test]
fn frame_decoder_yields_snapshots_per_event() {
    let frames = read_frames(SIMPLE_CAPTURE.as_bytes());
    let decoder = FrameDecoder::new(frames);

    let pairs: Vec<_> = decoder.collect();
    assert_eq!(pairs.len(), 6);

    // Text grows monotonically across snapshots.
    let texts: Vec<String> = pairs
        .iter()
        .map(|(_, snapshot)| snapshot.text_content().concat())
        .collect();
    assert!(texts.windows(2).all(|w| w[1].starts_with(&w[0])));
    assert_eq!(texts.last().map(String::as_str), Some("Hi"));
}

#[test]
fn output_tokens_equal_the_sum_of_all_deltas() {
    let capture = "\
event: message_start\n\
data: {\"message\":{\"id\":\"msg_7\",\"model\":\"claude-x\",\"usage\":{\"input_tokens\":1,\"output_tokens\":0}}}\n\
\n\
event: message_delta\n\
data: {\"delta\":{},\"usage\":{\"output_tokens\":3}}\n\
\n\
event: message_delta\n\
data: {\"delta\":{},\"usage\":{\"output_tokens\":4}}\n\
\n\
event: message_delta\n\
data: {\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":5}}\n\
\n\
event: message_stop\n\
data: {}\n\
\n";

    let decoded = decode_str(capture);
    assert_eq!(decoded.message.usage.output_tokens, Some(12));
    assert_eq!(decoded.message.stop_reason, Some(StopReason::MaxTokens));
}
