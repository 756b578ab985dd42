use super::*;

#[test]
fn response_completed_event_yields_its_response_field() {
    let raw = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"hi\"}\n\
               data: {\"type\":\"response.completed\",\"response\":{\"id\":\"r1\",\"status\":\"completed\"}}\n";
    let converted = convert_to_json(raw, 200);
    assert_eq!(converted.status, 200);
    assert_eq!(converted.content_type, JSON_CONTENT_TYPE);
    let parsed: serde_json::Value = serde_json::from_str(&converted.body).unwrap();
    assert_eq!(parsed["id"], "r1");
}

#[test]
fn response_done_event_also_matches() {
    let raw = "data: {\"type\":\"response.done\",\"response\":{\"id\":\"r2\"}}\n";
    let converted = convert_to_json(raw, 200);
    let parsed: serde_json::Value = serde_json::from_str(&converted.body).unwrap();
    assert_eq!(parsed["id"], "r2");
}

#[test]
fn first_matching_event_wins_when_multiple_present() {
    let raw = "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"first\"}}\n\
               data: {\"type\":\"response.completed\",\"response\":{\"id\":\"second\"}}\n";
    let converted = convert_to_json(raw, 200);
    let parsed: serde_json::Value = serde_json::from_str(&converted.body).unwrap();
    assert_eq!(parsed["id"], "first");
}

#[test]
fn no_completion_event_emits_raw_text_with_original_status() {
    let raw = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"partial\"}\n";
    let converted = convert_to_json(raw, 502);
    assert_eq!(converted.status, 502);
    assert_eq!(converted.body, raw);
}

#[test]
fn ignores_non_data_lines_and_malformed_json() {
    let raw = "event: ping\ndata: not json\ndata: {\"type\":\"response.completed\",\"response\":{\"ok\":true}}\n";
    let converted = convert_to_json(raw, 200);
    let parsed: serde_json::Value = serde_json::from_str(&converted.body).unwrap();
    assert_eq!(parsed["ok"], true);
}

#[test]
fn streaming_passthrough_fills_missing_content_type_only() {
    assert_eq!(ensure_event_stream_content_type(None), EVENT_STREAM_CONTENT_TYPE);
    assert_eq!(ensure_event_stream_content_type(Some("text/event-stream")), "text/event-stream");
}
