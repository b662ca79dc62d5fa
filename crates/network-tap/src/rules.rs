//! Action rule table: which URL patterns identify which checkout action.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::errors::TapError;

/// The semantic checkout steps, in first-match-wins order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FetchProduct,
    AddToCart,
    ViewCart,
    GoToCheckout,
    SignIn,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::FetchProduct,
        ActionKind::AddToCart,
        ActionKind::ViewCart,
        ActionKind::GoToCheckout,
        ActionKind::SignIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::FetchProduct => "fetch_product",
            ActionKind::AddToCart => "add_to_cart",
            ActionKind::ViewCart => "view_cart",
            ActionKind::GoToCheckout => "go_to_checkout",
            ActionKind::SignIn => "sign_in",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = TapError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| TapError::UnknownAction(raw.to_string()))
    }
}

/// Default patterns. Liberal on purpose: storefront paths drift between releases.
pub const DEFAULT_PATTERNS: [(ActionKind, &[&str]); 5] = [
    (
        ActionKind::FetchProduct,
        &[
            r"/graphql",
            r"/api/.*product",
            r"/ajax/.*product",
            r"/product.*price",
            r"/inventory",
            r"/availability",
        ],
    ),
    (
        ActionKind::AddToCart,
        &[
            r"/cart.*add",
            r"/cart/line",
            r"/ajax/.*cart",
            r"/api/.*cart",
            r"/cart\?",
        ],
    ),
    (
        ActionKind::ViewCart,
        &[r"^https://[^/]+/cart/?$", r"/cart(\?|$)", r"/api/.*cart"],
    ),
    (
        ActionKind::GoToCheckout,
        &[
            r"/checkout",
            r"/checkout/start",
            r"/api/.*checkout",
            r"/ajax/.*checkout",
        ],
    ),
    (
        ActionKind::SignIn,
        &[
            r"/login",
            r"/sign-?in",
            r"/session",
            r"/oauth",
            r"/identity",
            r"/api/.*auth",
            r"/auth",
        ],
    ),
];

lazy_static! {
    static ref DEFAULT_TABLE: RuleTable =
        RuleTable::from_patterns(DEFAULT_PATTERNS).expect("default action patterns compile");
}

/// Patterns for one action, matched case-insensitively anywhere in the URL.
#[derive(Clone, Debug)]
pub struct ActionRule {
    action: ActionKind,
    patterns: Vec<Regex>,
}

impl ActionRule {
    pub fn new<S: AsRef<str>>(action: ActionKind, patterns: &[S]) -> Result<Self, TapError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| TapError::InvalidPattern {
                        action,
                        pattern: pattern.as_ref().to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { action, patterns })
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(url))
    }
}

/// Ordered rule table. Rules are kept in [`ActionKind`] order regardless of how they
/// were supplied, so first-match-wins always follows the enumeration.
#[derive(Clone, Debug)]
pub struct RuleTable {
    rules: Vec<ActionRule>,
}

impl RuleTable {
    pub fn new(mut rules: Vec<ActionRule>) -> Self {
        rules.sort_by_key(ActionRule::action);
        Self { rules }
    }

    pub fn from_patterns<I, P, S>(entries: I) -> Result<Self, TapError>
    where
        I: IntoIterator<Item = (ActionKind, P)>,
        P: AsRef<[S]>,
        S: AsRef<str>,
    {
        let rules = entries
            .into_iter()
            .map(|(action, patterns)| ActionRule::new(action, patterns.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Default table with the given actions' pattern lists replaced wholesale.
    pub fn with_overrides(overrides: &BTreeMap<ActionKind, Vec<String>>) -> Result<Self, TapError> {
        if overrides.is_empty() {
            return Ok(Self::default());
        }
        let mut rules = Vec::with_capacity(DEFAULT_PATTERNS.len());
        for (action, defaults) in DEFAULT_PATTERNS {
            let rule = match overrides.get(&action) {
                Some(patterns) => ActionRule::new(action, patterns.as_slice())?,
                None => ActionRule::new(action, defaults)?,
            };
            rules.push(rule);
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// First action whose pattern set matches `url`.
    pub fn classify_url(&self, url: &str) -> Option<ActionKind> {
        self.rules
            .iter()
            .find(|rule| rule.matches(url))
            .map(ActionRule::action)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_follows_enumeration_order() {
        let table = RuleTable::default();
        let order: Vec<_> = table.rules().iter().map(ActionRule::action).collect();
        assert_eq!(order, ActionKind::ALL.to_vec());
    }

    #[test]
    fn matching_is_case_insensitive_search() {
        let table = RuleTable::default();
        assert_eq!(
            table.classify_url("https://shop.test/API/v2/Product/55"),
            Some(ActionKind::FetchProduct)
        );
        assert_eq!(
            table.classify_url("https://shop.test/Account/LOGIN?next=/"),
            Some(ActionKind::SignIn)
        );
        assert_eq!(table.classify_url("https://cdn.test/fonts/a.woff2"), None);
    }

    #[test]
    fn first_match_wins_across_actions() {
        // "/api/cart" matches add_to_cart and view_cart; add_to_cart comes first.
        let table = RuleTable::default();
        assert_eq!(
            table.classify_url("https://shop.test/api/cart"),
            Some(ActionKind::AddToCart)
        );
        assert_eq!(
            table.classify_url("https://shop.test/cart/"),
            Some(ActionKind::ViewCart)
        );
    }

    #[test]
    fn supplied_order_does_not_change_priority() {
        let table = RuleTable::from_patterns([
            (ActionKind::SignIn, vec!["/shared"]),
            (ActionKind::FetchProduct, vec!["/shared"]),
        ])
        .expect("table");
        assert_eq!(
            table.classify_url("https://x.test/shared"),
            Some(ActionKind::FetchProduct)
        );
    }

    #[test]
    fn overrides_replace_only_named_actions() {
        let overrides = BTreeMap::from([(ActionKind::SignIn, vec![r"/members/enter".to_string()])]);
        let table = RuleTable::with_overrides(&overrides).expect("table");
        assert_eq!(table.classify_url("https://x.test/login"), None);
        assert_eq!(
            table.classify_url("https://x.test/members/enter"),
            Some(ActionKind::SignIn)
        );
        assert_eq!(
            table.classify_url("https://x.test/checkout"),
            Some(ActionKind::GoToCheckout)
        );
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ActionRule::new(ActionKind::ViewCart, &["(unclosed"]).unwrap_err();
        assert!(matches!(
            err,
            TapError::InvalidPattern {
                action: ActionKind::ViewCart,
                ..
            }
        ));
    }

    #[test]
    fn action_names_round_trip_through_from_str() {
        for action in ActionKind::ALL {
            assert_eq!(action.as_str().parse::<ActionKind>().unwrap(), action);
        }
        assert!("checkout".parse::<ActionKind>().is_err());
    }
}
