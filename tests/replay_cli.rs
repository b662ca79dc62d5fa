use std::fs;
use std::path::Path;

use assert_cmd::Command;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn request(id: &str, method: &str, url: &str) -> Value {
    json!({
        "method": "Network.requestWillBeSent",
        "params": {
            "requestId": id,
            "request": {
                "url": url,
                "method": method,
                "headers": { "Cookie": "session=top-secret", "Accept": "application/json" },
                "postData": "{\"itemNumber\":\"500PKFLAGMXCASE\",\"quantity\":1}"
            }
        }
    })
}

fn response(id: &str, status: i64) -> Value {
    json!({
        "method": "Network.responseReceived",
        "params": {
            "requestId": id,
            "response": {
                "status": status,
                "headers": { "Authorization": "Bearer top-secret", "Content-Type": "application/json" },
                "mimeType": "application/json"
            }
        }
    })
}

/// ChromeDriver performance-log framing, one JSON object per line.
fn performance_lines(entries: &[Value]) -> String {
    entries
        .iter()
        .map(|entry| {
            let inner = json!({ "message": entry, "webview": "ABC" }).to_string();
            json!({ "level": "INFO", "message": inner, "timestamp": 1 }).to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_phases(dir: &Path) -> Vec<String> {
    let pdp = dir.join("pdp.json");
    fs::write(
        &pdp,
        Value::Array(vec![
            request("1", "GET", "https://www.shop.test/item/42"),
            request("2", "POST", "https://www.shop.test/graphql"),
            response("2", 200),
        ])
        .to_string(),
    )
    .unwrap();

    let cart = dir.join("add_to_cart.jsonl");
    fs::write(
        &cart,
        performance_lines(&[
            request("3", "POST", "https://www.shop.test/cart/add"),
            response("3", 200),
        ]),
    )
    .unwrap();

    vec![
        format!("pdp={}", pdp.display()),
        format!("add_to_cart={}", cart.display()),
    ]
}

fn probe(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("checkout-probe").unwrap();
    cmd.current_dir(dir)
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(dir.join("missing.yaml"));
    cmd
}

#[test]
fn replay_prints_every_action_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let phases = write_phases(dir.path());
    let dump = dir.path().join("out/capture_dump.json");

    let mut cmd = probe(dir.path());
    cmd.args(["--output", "json", "replay"]);
    for phase in &phases {
        cmd.args(["--phase", phase]);
    }
    let output = cmd.arg("--dump").arg(&dump).assert().success().get_output().stdout.clone();

    let report: Value = serde_json::from_slice(&output).expect("report is JSON");
    let mut keys: Vec<_> = report.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    assert_eq!(
        keys,
        vec!["add_to_cart", "fetch_product", "go_to_checkout", "sign_in", "view_cart"]
    );
    assert_eq!(report["fetch_product"]["request"]["url"], "https://www.shop.test/graphql");
    assert_eq!(report["add_to_cart"]["phase"], "add_to_cart");
    assert_eq!(report["add_to_cart"]["response"]["status"], 200);
    assert!(report["view_cart"].is_null());
    assert!(report["sign_in"].is_null());

    let text = String::from_utf8(output).unwrap();
    assert!(!text.contains("top-secret"));

    let written = fs::read_to_string(&dump).expect("dump written");
    assert!(!written.contains("top-secret"));
    let dump: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(dump["phases"].as_array().map(Vec::len), Some(2));
}

#[test]
fn classify_reads_a_dump_back() {
    let dir = tempfile::tempdir().unwrap();
    let phases = write_phases(dir.path());
    let dump = dir.path().join("capture_dump.json");

    let mut cmd = probe(dir.path());
    cmd.arg("replay");
    for phase in &phases {
        cmd.args(["--phase", phase]);
    }
    cmd.arg("--dump").arg(&dump).assert().success();

    let output = probe(dir.path())
        .arg("classify")
        .arg(&dump)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.starts_with("===== SUMMARY: Proper requests per action ====="));
    assert!(text.contains("\n### view_cart\nnot observed\n"));
    assert!(text.contains("URL: https://www.shop.test/cart/add"));
    assert!(text.contains("REQUEST_BODY_JSON:"));
}

#[test]
fn replay_requires_name_and_file() {
    let dir = tempfile::tempdir().unwrap();
    probe(dir.path())
        .args(["replay", "--phase", "pdp"])
        .assert()
        .failure();
}

#[test]
fn rules_reflect_config_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("probe.yaml");
    fs::write(&config, "actions:\n  sign_in: [\"/members/enter\"]\n").unwrap();

    let output = Command::cargo_bin("checkout-probe")
        .unwrap()
        .current_dir(dir.path())
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(&config)
        .args(["--output", "json", "rules"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rules: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(rules["sign_in"], json!(["/members/enter"]));
    assert_eq!(rules["fetch_product"][0], "/graphql");
}

#[test]
fn invalid_rule_patterns_fail_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("probe.yaml");
    fs::write(&config, "actions:\n  view_cart: [\"(\"]\n").unwrap();

    Command::cargo_bin("checkout-probe")
        .unwrap()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("rules")
        .assert()
        .failure();
}
