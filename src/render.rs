//! Human-readable rendering of an [`ActionReport`].

use std::fmt::Write;

use network_tap::{ActionReport, Headers, SelectedExchange};
use probe_privacy::{redact_headers, snippet, truncate_chars};
use serde_json::Value;

pub const SUMMARY_BANNER: &str = "===== SUMMARY: Proper requests per action =====";

/// Renders every action in enumeration order. Bodies are cut at `max_body_chars`.
pub fn render_report(report: &ActionReport, max_body_chars: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SUMMARY_BANNER}");
    for (action, selected) in report.iter() {
        let _ = writeln!(out, "\n### {action}");
        match selected {
            Some(exchange) => render_exchange(&mut out, exchange, max_body_chars),
            None => out.push_str("not observed\n"),
        }
    }
    out
}

fn render_exchange(out: &mut String, exchange: &SelectedExchange, max_body_chars: usize) {
    let request = &exchange.request;
    let _ = writeln!(out, "METHOD: {}", request.method);
    let _ = writeln!(out, "URL: {}", request.url);
    if let Some(phase) = &exchange.phase {
        let _ = writeln!(out, "PHASE: {phase}");
    }
    let _ = writeln!(out, "REQUEST_HEADERS:\n{}", pretty_headers(&request.headers));

    if let Some(post_data) = request.post_data.as_deref().filter(|data| !data.is_empty()) {
        match serde_json::from_str::<Value>(post_data) {
            Ok(json) => {
                let pretty = serde_json::to_string_pretty(&json).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "REQUEST_BODY_JSON:\n{}",
                    truncate_chars(&pretty, max_body_chars)
                );
            }
            Err(_) => {
                let _ = writeln!(
                    out,
                    "REQUEST_BODY_RAW:\n{}",
                    truncate_chars(post_data, max_body_chars)
                );
            }
        }
    }

    match &exchange.response {
        Some(response) => {
            let _ = writeln!(out, "STATUS: {}", response.status);
            let _ = writeln!(out, "RESPONSE_HEADERS:\n{}", pretty_headers(&response.headers));
        }
        None => {
            let _ = writeln!(out, "STATUS: none");
            let _ = writeln!(out, "RESPONSE_HEADERS:\n{{}}");
        }
    }

    if !exchange.body.is_empty() {
        if exchange.is_binary_encoded {
            out.push_str("RESPONSE_BODY_SNIPPET:\n[base64 not expanded]\n");
        } else {
            let _ = writeln!(
                out,
                "RESPONSE_BODY_SNIPPET:\n{}",
                snippet(&exchange.body, max_body_chars)
            );
        }
    }
}

// Redacts again so the renderer is safe even for hand-built exchanges.
fn pretty_headers(headers: &Headers) -> String {
    serde_json::to_string_pretty(&redact_headers(headers)).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_tap::{
        aggregate, classify, ActionKind, BodyFetcher, BodySource, ExchangeId, FetchError,
        FetchedBody, PhaseSnapshot, RequestRecord, ResponseRecord, RuleTable,
    };
    use probe_privacy::TRUNCATION_SUFFIX;
    use std::sync::Arc;

    struct LongBody;

    #[async_trait::async_trait]
    impl BodySource for LongBody {
        async fn response_body(&self, id: &ExchangeId) -> Result<FetchedBody, FetchError> {
            Ok(FetchedBody {
                body: "x".repeat(50),
                base64_encoded: id.as_str() == "img",
            })
        }
    }

    async fn report() -> ActionReport {
        let mut phase = PhaseSnapshot::new("add_to_cart");
        phase.requests.insert(
            ExchangeId::from("a"),
            RequestRecord {
                sequence: 1,
                url: "https://shop.test/cart/add".into(),
                method: "POST".into(),
                headers: Headers::from([
                    ("Cookie".to_string(), "sid=1".to_string()),
                    ("Content-Type".to_string(), "application/json".to_string()),
                ]),
                post_data: Some(r#"{"itemNumber":"500PKFLAGMXCASE","qty":1}"#.into()),
            },
        );
        phase.responses.insert(
            ExchangeId::from("a"),
            ResponseRecord {
                status: 200,
                headers: Headers::new(),
                mime_type: "application/json".into(),
            },
        );
        phase.requests.insert(
            ExchangeId::from("img"),
            RequestRecord {
                sequence: 2,
                url: "https://shop.test/login".into(),
                method: "GET".into(),
                headers: Headers::new(),
                post_data: Some("plain=text".into()),
            },
        );
        let view = aggregate([&phase]);
        classify(&view, &RuleTable::default(), &BodyFetcher::new(Arc::new(LongBody))).await
    }

    #[tokio::test]
    async fn renders_observed_and_missing_actions() {
        let text = render_report(&report().await, 20);
        assert!(text.starts_with(SUMMARY_BANNER));
        assert!(text.contains("\n### view_cart\nnot observed\n"));
        assert!(text.contains("METHOD: POST\nURL: https://shop.test/cart/add\n"));
        assert!(text.contains("REQUEST_BODY_JSON:\n"));
        assert!(text.contains("\"Cookie\": \"<redacted>\""));
        assert!(!text.contains("sid=1"));
        assert!(text.contains(&format!("{}{}", "x".repeat(20), TRUNCATION_SUFFIX)));
    }

    #[tokio::test]
    async fn base64_bodies_are_not_expanded() {
        let text = render_report(&report().await, 2000);
        let sign_in = text.split("### sign_in").nth(1).expect("sign_in section");
        assert!(sign_in.contains("REQUEST_BODY_RAW:\nplain=text"));
        assert!(sign_in.contains("STATUS: none"));
        assert!(sign_in.contains("[base64 not expanded]"));
        assert!(report().await.get(ActionKind::SignIn).is_some());
    }
}
