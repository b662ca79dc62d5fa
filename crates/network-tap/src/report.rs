//! Classification report: one optional exemplar per action.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::CombinedView;
use crate::body::BodyFetcher;
use crate::classify::bucket_requests;
use crate::model::{ExchangeId, RequestRecord, ResponseRecord};
use crate::rules::{ActionKind, RuleTable};
use crate::select::select_best;

/// The exchange chosen for an action. Headers are redacted at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedExchange {
    pub action: ActionKind,
    pub id: ExchangeId,
    /// Phase whose snapshot supplied the request.
    pub phase: Option<String>,
    pub request: RequestRecord,
    pub response: Option<ResponseRecord>,
    pub body: String,
    pub is_binary_encoded: bool,
}

/// Every [`ActionKind`] is a key; `None` means the action was not observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionReport {
    actions: BTreeMap<ActionKind, Option<SelectedExchange>>,
}

impl ActionReport {
    fn not_observed_everywhere() -> Self {
        Self {
            actions: ActionKind::ALL.into_iter().map(|action| (action, None)).collect(),
        }
    }

    pub fn get(&self, action: ActionKind) -> Option<&SelectedExchange> {
        self.actions.get(&action).and_then(Option::as_ref)
    }

    /// All actions in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (ActionKind, Option<&SelectedExchange>)> {
        self.actions
            .iter()
            .map(|(action, selected)| (*action, selected.as_ref()))
    }

    pub fn observed_count(&self) -> usize {
        self.actions.values().filter(|selected| selected.is_some()).count()
    }

    pub fn not_observed(&self) -> Vec<ActionKind> {
        self.iter()
            .filter(|(_, selected)| selected.is_none())
            .map(|(action, _)| action)
            .collect()
    }
}

/// Buckets, selects and resolves bodies for the winners only.
pub async fn classify(view: &CombinedView, rules: &RuleTable, fetcher: &BodyFetcher) -> ActionReport {
    let buckets = bucket_requests(view, rules);
    let mut report = ActionReport::not_observed_everywhere();

    for (action, candidates) in buckets.iter() {
        let Some(best) = select_best(candidates) else {
            debug!(target: "network-tap", %action, "action not observed");
            continue;
        };
        let fetched = fetcher.fetch(best.id).await;
        let selected = SelectedExchange {
            action,
            id: best.id.clone(),
            phase: view.origin(best.id).map(|origin| origin.phase.clone()),
            request: best.request.redacted(),
            response: view.response(best.id).map(ResponseRecord::redacted),
            body: fetched.body,
            is_binary_encoded: fetched.base64_encoded,
        };
        debug!(
            target: "network-tap",
            %action,
            id = %selected.id,
            candidates = candidates.len(),
            "exemplar selected"
        );
        report.actions.insert(action, Some(selected));
    }

    info!(
        target: "network-tap",
        observed = report.observed_count(),
        classified = buckets.classified(),
        "classification finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::model::{Headers, PhaseSnapshot};
    use probe_privacy::REDACTED_MARKER;

    #[tokio::test]
    async fn empty_view_reports_every_action_as_not_observed() {
        let report = classify(
            &CombinedView::default(),
            &RuleTable::default(),
            &BodyFetcher::offline(),
        )
        .await;
        assert_eq!(report.iter().count(), 5);
        assert_eq!(report.observed_count(), 0);
        assert_eq!(report.not_observed(), ActionKind::ALL.to_vec());

        let value = serde_json::to_value(&report).expect("serialize");
        for action in ActionKind::ALL {
            assert!(value[action.as_str()].is_null(), "{action} should be null");
        }
    }

    #[tokio::test]
    async fn selected_exchange_is_redacted_and_carries_response() {
        let id = ExchangeId::from("42.1");
        let mut phase = PhaseSnapshot::new("signin");
        phase.requests.insert(
            id.clone(),
            RequestRecord {
                sequence: 1,
                url: "https://shop.test/login".into(),
                method: "POST".into(),
                headers: Headers::from([("AUTHORIZATION".to_string(), "Bearer s3cr3t".to_string())]),
                post_data: Some("{\"email\":\"probe@example.com\"}".into()),
            },
        );
        phase.responses.insert(
            id.clone(),
            ResponseRecord {
                status: 401,
                headers: Headers::from([("x-xsrf-token".to_string(), "abc".to_string())]),
                mime_type: "application/json".into(),
            },
        );
        let view = aggregate([&phase]);
        let report = classify(&view, &RuleTable::default(), &BodyFetcher::offline()).await;

        let selected = report.get(ActionKind::SignIn).expect("sign_in observed");
        assert_eq!(selected.phase.as_deref(), Some("signin"));
        assert_eq!(selected.request.headers["AUTHORIZATION"], REDACTED_MARKER);
        let response = selected.response.as_ref().expect("response");
        assert_eq!(response.status, 401);
        assert_eq!(response.headers["x-xsrf-token"], REDACTED_MARKER);
        assert!(selected.body.is_empty());
        assert!(!selected.is_binary_encoded);
        assert_eq!(report.observed_count(), 1);
    }
}
