//! Archival dump of every phase snapshot of a capture session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, CombinedView};
use crate::errors::TapError;
use crate::model::PhaseSnapshot;

/// Phases in execution order plus the capture time. Header maps are always redacted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDump {
    #[serde(alias = "created_at")]
    created_at: DateTime<Utc>,
    phases: Vec<PhaseSnapshot>,
}

impl CaptureDump {
    pub fn new(phases: &[PhaseSnapshot]) -> Self {
        Self::at(Utc::now(), phases)
    }

    pub fn at(created_at: DateTime<Utc>, phases: &[PhaseSnapshot]) -> Self {
        Self {
            created_at,
            phases: phases.iter().map(PhaseSnapshot::redacted).collect(),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phases(&self) -> &[PhaseSnapshot] {
        &self.phases
    }

    /// Re-folds the archived phases in their recorded order.
    pub fn combined(&self) -> CombinedView {
        aggregate(&self.phases)
    }

    pub fn to_json_pretty(&self) -> Result<String, TapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a dump. Headers are redacted again in case the file was edited by hand.
    pub fn from_json(raw: &str) -> Result<Self, TapError> {
        let dump: CaptureDump = serde_json::from_str(raw)?;
        Ok(Self::at(dump.created_at, &dump.phases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExchangeId, Headers, RequestRecord};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use probe_privacy::REDACTED_MARKER;
    use serde_json::json;

    fn phase_with_cookie() -> PhaseSnapshot {
        let mut phase = PhaseSnapshot::new("cart");
        phase.requests.insert(
            ExchangeId::from("9"),
            RequestRecord {
                sequence: 1,
                url: "https://shop.test/cart/".into(),
                method: "GET".into(),
                headers: Headers::from([
                    ("Cookie".to_string(), "session=abc".to_string()),
                    ("Accept".to_string(), "text/html".to_string()),
                ]),
                post_data: None,
            },
        );
        phase
    }

    #[test]
    fn serializes_with_archival_field_names() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let dump = CaptureDump::at(created, &[phase_with_cookie()]);
        let value = serde_json::to_value(&dump).expect("serialize");
        assert_eq!(
            value,
            json!({
                "createdAt": "2024-05-01T12:00:00Z",
                "phases": [{
                    "phase": "cart",
                    "requests": {
                        "9": {
                            "sequence": 1,
                            "url": "https://shop.test/cart/",
                            "method": "GET",
                            "headers": { "Accept": "text/html", "Cookie": REDACTED_MARKER }
                        }
                    },
                    "responses": {}
                }]
            })
        );
    }

    #[test]
    fn loading_redacts_hand_edited_files() {
        let raw = json!({
            "created_at": "2024-05-01T12:00:00Z",
            "phases": [{
                "phase": "signin",
                "reqs": { "1": { "seq": 1, "url": "/login", "method": "POST",
                                 "headers": { "authorization": "Basic Zm9v" } } },
                "resps": {}
            }]
        })
        .to_string();
        let dump = CaptureDump::from_json(&raw).expect("parse");
        let request = &dump.phases()[0].requests[&ExchangeId::from("1")];
        assert_eq!(request.headers["authorization"], REDACTED_MARKER);
        assert_eq!(dump.combined().requests().len(), 1);
    }

    #[test]
    fn malformed_dump_is_an_error() {
        assert!(matches!(
            CaptureDump::from_json("{\"phases\": 3}"),
            Err(TapError::Dump(_))
        ));
    }
}
