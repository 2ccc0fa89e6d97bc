//! Whitelist/blacklist deciding which method names may be chained over.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::errors::{OverrideError, Result};

/// One or more method names supplied to an `only` / `except` option
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodNames(Vec<String>);

impl MethodNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Parse a comma separated list, ignoring empty segments
    pub fn parse_list(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<&str> for MethodNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for MethodNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<&str>> for MethodNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for MethodNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl<const N: usize> From<[&str; N]> for MethodNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Eligibility configuration for one host type or propagating unit.
///
/// An empty `only` means unconstrained: every declared method is eligible
/// unless listed in `except`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePolicy {
    only: IndexSet<String>,
    except: IndexSet<String>,
}

impl OverridePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy restricted to exactly `names`
    pub fn only(names: impl Into<MethodNames>) -> Self {
        let mut policy = Self::default();
        policy.only = names.into().iter().map(str::to_string).collect();
        policy
    }

    /// Apply `only` / `except` options. Each supplied option replaces the
    /// stored value; names listed in both end up excluded.
    ///
    /// Any key other than `only` or `except` rejects the whole call without
    /// touching the stored state.
    pub fn restrict<I, K>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, MethodNames)>,
        K: AsRef<str>,
    {
        let mut only = None;
        let mut except = None;
        for (key, names) in options {
            let set: IndexSet<String> = names.iter().map(str::to_string).collect();
            match key.as_ref() {
                "only" => only = Some(set),
                "except" => except = Some(set),
                other => return Err(OverrideError::invalid_configuration(other)),
            }
        }

        if let Some(only) = only {
            self.only = only;
        }
        if let Some(except) = except {
            self.except = except;
        }
        let except = &self.except;
        self.only.retain(|name| !except.contains(name));
        Ok(())
    }

    /// Eligible subset of `declared`, in declaration order
    pub fn eligible_names<'a, I>(&self, declared: I) -> IndexSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        declared
            .into_iter()
            .filter(|name| self.is_eligible(name))
            .map(str::to_string)
            .collect()
    }

    /// Names of `declared` that at least one of `policies` allows, in
    /// declaration order. A host's own policy and a propagating unit's
    /// derived policy both apply to the same composition this way.
    pub fn eligible_under_any<'a, I>(policies: &[OverridePolicy], declared: I) -> IndexSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        declared
            .into_iter()
            .filter(|name| policies.iter().any(|policy| policy.is_eligible(name)))
            .map(str::to_string)
            .collect()
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        if self.except.contains(name) {
            return false;
        }
        self.only.is_empty() || self.only.contains(name)
    }

    pub fn only_names(&self) -> &IndexSet<String> {
        &self.only
    }

    pub fn except_names(&self) -> &IndexSet<String> {
        &self.except
    }

    pub fn is_unconstrained(&self) -> bool {
        self.only.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(set: &IndexSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_unconstrained_policy_allows_all_declared() {
        let policy = OverridePolicy::new();
        let eligible = policy.eligible_names(["f", "g", "h"]);
        assert_eq!(names(&eligible), vec!["f", "g", "h"]);
    }

    #[test]
    fn test_only_restricts_and_keeps_declaration_order() {
        let mut policy = OverridePolicy::new();
        policy
            .restrict([("only", MethodNames::from(vec!["h", "f"]))])
            .unwrap();
        let eligible = policy.eligible_names(["f", "g", "h"]);
        assert_eq!(names(&eligible), vec!["f", "h"]);
    }

    #[test]
    fn test_except_wins_over_only() {
        let mut conflicting = OverridePolicy::new();
        conflicting
            .restrict([
                ("only", MethodNames::from(["f", "g"])),
                ("except", MethodNames::from("g")),
            ])
            .unwrap();
        let plain = OverridePolicy::only("f");

        let declared = ["f", "g", "h"];
        assert_eq!(
            conflicting.eligible_names(declared),
            plain.eligible_names(declared)
        );
        assert_eq!(names(conflicting.only_names()), vec!["f"]);
    }

    #[test]
    fn test_except_alone_blacklists() {
        let mut policy = OverridePolicy::new();
        policy
            .restrict([("except", MethodNames::from(["g"]))])
            .unwrap();
        assert_eq!(names(&policy.eligible_names(["f", "g"])), vec!["f"]);
    }

    #[test]
    fn test_last_restrict_call_wins() {
        let mut policy = OverridePolicy::new();
        policy.restrict([("only", MethodNames::from("f"))]).unwrap();
        policy.restrict([("only", MethodNames::from("g"))]).unwrap();
        assert_eq!(names(&policy.eligible_names(["f", "g"])), vec!["g"]);

        // an option that is not supplied keeps its previous value
        policy.restrict([("except", MethodNames::from("h"))]).unwrap();
        assert_eq!(names(policy.only_names()), vec!["g"]);
    }

    #[test]
    fn test_unknown_key_is_rejected_without_state_change() {
        let mut policy = OverridePolicy::only("f");
        let err = policy
            .restrict([
                ("except", MethodNames::from("f")),
                ("include", MethodNames::from("g")),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            OverrideError::InvalidConfiguration { ref key } if key == "include"
        ));
        assert_eq!(policy, OverridePolicy::only("f"));
    }

    #[test]
    fn test_eligible_under_any_unions_policies() {
        let mut unit = OverridePolicy::new();
        unit.restrict([("except", MethodNames::from("f"))]).unwrap();
        let host = OverridePolicy::only("f");
        let declared = ["f", "g", "h"];

        assert_eq!(
            names(&OverridePolicy::eligible_under_any(&[unit.clone(), host], declared)),
            vec!["f", "g", "h"]
        );
        assert_eq!(
            names(&OverridePolicy::eligible_under_any(&[unit], declared)),
            vec!["g", "h"]
        );
        assert!(OverridePolicy::eligible_under_any(&[], declared).is_empty());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            MethodNames::parse_list("f, g,,h"),
            MethodNames::from(vec!["f", "g", "h"])
        );
    }
}
