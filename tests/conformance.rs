//! Gateway conformance scenarios
//!
//! Drives the filter the way the gateway does: one body per direction,
//! resolved by host, checking the exact bytes handed back.

use a3s_data_masking::{
    Category, Degradation, Direction, FilterConfig, MaskingFilter, PolicyStore, Verdict,
    DENY_MESSAGE,
};

const ROUTES: &str = r#"
routes:
  - hosts: ["replace.openai.com"]
    format: chat
  - hosts: ["ok.openai.com"]
    format: chat
    deny_words: ["costom_word1"]
    allow_words: ["costom_word"]
  - hosts: ["system_deny.openai.com"]
    format: chat
    always_deny: true
    deny_style: empty
  - hosts: ["jsonpath.raw.com"]
    format:
      jsonpath: ["$.test[*].test"]
    deny_words: ['costom"word']
  - hosts: ["strict.raw.com"]
    format:
      jsonpath: ["$.test[*].test"]
    deny_on_missing_field: true
  - hosts: ["replace.raw.com"]
    format: raw
  - hosts: ["ok.raw.com"]
    format: raw
    deny_words: ["costom_word1", "costom_word"]
    allow_words: ["costom_word"]
"#;

fn filter() -> MaskingFilter {
    let config = FilterConfig::from_yaml(ROUTES).unwrap();
    MaskingFilter::new(PolicyStore::from_config(&config).unwrap())
}

fn chat(content: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "messages": [{"role": "user", "content": content}]
    }))
    .unwrap()
}

fn reply(content: &str) -> String {
    format!(
        r#"{{"choices":[{{"index":0,"message":{{"role":"assistant","content":"{}"}}}}],"usage":{{}}}}"#,
        content
    )
}

fn errmsg() -> String {
    format!(r#"{{"errmsg":"{}"}}"#, DENY_MESSAGE)
}

// ─── Chat Format ────────────────────────────────────────────────

#[test]
fn test_chat_pii_masked_in_request() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Request,
            "replace.openai.com",
            &chat("127.0.0.1 admin@gmail.com sk-12345"),
        )
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Masked);
    assert_eq!(
        outcome.body_text(),
        r#"{"messages":[{"role":"user","content":"127.0.0.1 admin@gmail.com sk12345"}]}"#
    );
    assert_eq!(outcome.categories, vec![Category::Ip, Category::Email, Category::ApiKey]);
}

#[test]
fn test_chat_echoed_response_becomes_reply_envelope() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Response,
            "replace.openai.com",
            &chat("127.0.0.1 admin@gmail.com sk-12345"),
        )
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Masked);
    assert_eq!(outcome.body_text(), reply("127.0.0.1 admin@gmail.com sk12345"));
}

#[test]
fn test_chat_echoed_response_with_kept_pii_becomes_reply_envelope() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Response,
            "replace.openai.com",
            &chat("127.0.0.1 admin@gmail.com"),
        )
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Masked);
    assert_eq!(outcome.body_text(), reply("127.0.0.1 admin@gmail.com"));
    assert_eq!(outcome.categories, vec![Category::Ip, Category::Email]);
}

#[test]
fn test_chat_response_choices_masked_in_place() {
    let filter = filter();
    let body = br#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"use sk-abc"}}],"usage":{"total_tokens":3}}"#;
    let outcome = filter.filter(Direction::Response, "replace.openai.com", body).unwrap();

    assert_eq!(
        outcome.body_text(),
        r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"use skabc"}}],"usage":{"total_tokens":3}}"#
    );
}

#[test]
fn test_chat_system_word_denied_with_envelope() {
    let filter = filter();
    let outcome = filter
        .filter(Direction::Request, "ok.openai.com", &chat("fuck"))
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Denied);
    assert_eq!(outcome.body_text(), reply(DENY_MESSAGE));
    assert_eq!(outcome.content_type, Some("application/json"));
    assert_eq!(outcome.categories, vec![Category::SystemWord]);
}

#[test]
fn test_chat_custom_words() {
    let filter = filter();

    let denied = filter
        .filter(Direction::Request, "ok.openai.com", &chat("costom_word1"))
        .unwrap();
    assert_eq!(denied.verdict, Verdict::Denied);
    assert_eq!(denied.body_text(), reply(DENY_MESSAGE));

    let body = chat("costom_word");
    let allowed = filter.filter(Direction::Request, "ok.openai.com", &body).unwrap();
    assert_eq!(allowed.verdict, Verdict::Allow);
    assert_eq!(&allowed.body[..], &body[..]);
}

#[test]
fn test_system_deny_host_blocks_everything() {
    let filter = filter();
    for body in [chat("test"), b"test".to_vec(), Vec::new()] {
        for direction in [Direction::Request, Direction::Response] {
            let outcome = filter
                .filter(direction, "system_deny.openai.com", &body)
                .unwrap();
            assert_eq!(outcome.verdict, Verdict::Denied);
            assert!(outcome.body.is_empty());
            assert_eq!(outcome.content_type, None);
        }
    }
}

// ─── JSON Path Format ───────────────────────────────────────────

#[test]
fn test_jsonpath_field_denied() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Request,
            "jsonpath.raw.com",
            br#"{"test":[{"test":"costom\"word"}]}"#,
        )
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Denied);
    assert_eq!(outcome.body_text(), errmsg());
}

#[test]
fn test_jsonpath_missing_field_passes_through() {
    let filter = filter();
    let body = br#"{"test1":[{"test1":"costom\"word"}]}"#;
    let outcome = filter.filter(Direction::Request, "jsonpath.raw.com", body).unwrap();

    assert_eq!(outcome.verdict, Verdict::Allow);
    assert_eq!(outcome.degraded, Some(Degradation::NoFieldToScan));
    assert_eq!(&outcome.body[..], &body[..]);
}

#[test]
fn test_jsonpath_missing_field_denied_when_configured() {
    let filter = filter();
    let outcome = filter
        .filter(Direction::Request, "strict.raw.com", br#"{"test1":[]}"#)
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Denied);
    assert_eq!(outcome.degraded, Some(Degradation::NoFieldToScan));
    assert_eq!(outcome.body_text(), errmsg());
}

// ─── Raw Format ─────────────────────────────────────────────────

#[test]
fn test_raw_pii_masked() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Request,
            "replace.raw.com",
            b"127.0.0.1 admin@gmail.com sk-12345",
        )
        .unwrap();

    assert_eq!(outcome.verdict, Verdict::Masked);
    assert_eq!(outcome.body_text(), "127.0.0.1 admin@gmail.com sk12345");
}

#[test]
fn test_raw_system_word_denied() {
    let filter = filter();
    let outcome = filter.filter(Direction::Request, "ok.raw.com", b"fuck").unwrap();
    assert_eq!(outcome.verdict, Verdict::Denied);
    assert_eq!(outcome.body_text(), errmsg());
}

#[test]
fn test_raw_custom_word_granularity() {
    let filter = filter();

    let allowed = filter.filter(Direction::Request, "ok.raw.com", b"costom_word").unwrap();
    assert_eq!(allowed.verdict, Verdict::Allow);
    assert_eq!(&allowed.body[..], b"costom_word");

    let denied = filter.filter(Direction::Request, "ok.raw.com", b"costom_word1").unwrap();
    assert_eq!(denied.verdict, Verdict::Denied);
    assert_eq!(denied.body_text(), errmsg());
}

#[test]
fn test_raw_matches_inside_json_escaped_text() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Request,
            "ok.raw.com",
            br#"{"content":"prefix costom_word1 suffix"}"#,
        )
        .unwrap();
    assert_eq!(outcome.verdict, Verdict::Denied);
}

// ─── Properties ─────────────────────────────────────────────────

#[test]
fn test_identity_for_clean_bodies() {
    let filter = filter();
    let cases: [(&str, &[u8]); 4] = [
        ("replace.openai.com", br#"{ "messages": [ {"role":"user","content":"hello"} ], "x": 1 }"#),
        ("replace.raw.com", b"nothing to see"),
        ("jsonpath.raw.com", br#"{"test":[{"test":"fine"}],"z":[1,2]}"#),
        ("ok.raw.com", "中文内容".as_bytes()),
    ];
    for (host, body) in cases {
        for direction in [Direction::Request, Direction::Response] {
            let outcome = filter.filter(direction, host, body).unwrap();
            assert_eq!(outcome.verdict, Verdict::Allow, "{} {}", host, direction);
            assert_eq!(&outcome.body[..], body, "{} {}", host, direction);
        }
    }
}

#[test]
fn test_deny_overrides_other_content() {
    let filter = filter();
    let outcome = filter
        .filter(
            Direction::Request,
            "ok.raw.com",
            b"10.0.0.1 admin@gmail.com sk-1 and costom_word1",
        )
        .unwrap();
    assert_eq!(outcome.verdict, Verdict::Denied);
    assert_eq!(outcome.body_text(), errmsg());
}

#[test]
fn test_host_port_and_case_ignored() {
    let filter = filter();
    let outcome = filter.filter(Direction::Request, "OK.RAW.COM:8080", b"fuck").unwrap();
    assert_eq!(outcome.verdict, Verdict::Denied);
}

#[test]
fn test_unknown_host_is_not_defaulted() {
    let filter = filter();
    let err = filter
        .filter(Direction::Request, "unknown.example.com", b"fuck")
        .unwrap_err();
    assert!(matches!(
        err,
        a3s_data_masking::MaskingError::PolicyResolution { .. }
    ));
}

#[test]
fn test_malformed_chat_body_passes_through() {
    let filter = filter();
    let outcome = filter.filter(Direction::Request, "ok.openai.com", b"fuck").unwrap();
    assert_eq!(outcome.verdict, Verdict::Allow);
    assert_eq!(outcome.degraded, Some(Degradation::MalformedBody));
    assert_eq!(&outcome.body[..], b"fuck");
}
