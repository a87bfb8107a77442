//! Policy engine for automatic conflict resolution
//!
//! Maps each differing field to a [`ConflictPolicy`] (a default plus
//! per-field overrides from configuration) and turns that policy into a
//! concrete [`ResolutionAction`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use mvidarr_core::config::{parse_policy, ConflictsConfig, FieldPolicyConfig};
use mvidarr_core::domain::{ConflictPolicy, ConflictReason, FieldValue, SyncField};

use crate::detector::FieldDiff;

/// What to do about one differing field
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionAction {
    /// Write the catalog value to the media server
    PushToServer(FieldValue),
    /// Write the server value into the catalog
    PullFromServer(FieldValue),
    /// Leave both sides alone and queue for a human decision
    Queue(ConflictReason),
}

/// Engine that evaluates per-field conflict policies
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    overrides: BTreeMap<SyncField, ConflictPolicy>,
    default_policy: ConflictPolicy,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default policy string and field overrides
    ///
    /// Invalid overrides are logged and skipped; an invalid default falls
    /// back to manual review.
    pub fn new(default_policy: &str, rules: &[FieldPolicyConfig]) -> Self {
        let default = parse_policy(default_policy).unwrap_or(ConflictPolicy::ManualReview);

        let overrides: BTreeMap<SyncField, ConflictPolicy> = rules
            .iter()
            .filter_map(|rule| {
                let field = match rule.field.parse::<SyncField>() {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::warn!(
                            field = %rule.field,
                            error = %e,
                            "Skipping conflict policy for unknown field"
                        );
                        return None;
                    }
                };
                let policy = match parse_policy(&rule.policy) {
                    Some(p) => p,
                    None => {
                        tracing::warn!(
                            policy = %rule.policy,
                            "Skipping invalid conflict policy"
                        );
                        return None;
                    }
                };
                Some((field, policy))
            })
            .collect();

        debug!(
            overrides_count = overrides.len(),
            default = %default,
            "PolicyEngine initialized"
        );

        Self {
            overrides,
            default_policy: default,
        }
    }

    /// Builds the engine from the `conflicts` config section
    pub fn from_config(config: &ConflictsConfig) -> Self {
        Self::new(&config.default_policy, &config.field_policies)
    }

    /// An engine applying one policy to every field
    pub fn uniform(policy: ConflictPolicy) -> Self {
        Self {
            overrides: BTreeMap::new(),
            default_policy: policy,
        }
    }

    /// Returns the policy in effect for `field`
    pub fn evaluate(&self, field: SyncField) -> ConflictPolicy {
        match self.overrides.get(&field) {
            Some(policy) => {
                trace!(field = %field, policy = %policy, "Field policy override matched");
                *policy
            }
            None => self.default_policy,
        }
    }

    /// Decides how to resolve one differing field
    ///
    /// `internal_modified` is the catalog row's last-modified time and
    /// `external_modified` the server's; newest-wins needs both and queues
    /// the conflict when either is missing. A policy that needs a catalog
    /// value to push queues the conflict when the catalog has none.
    pub fn decide(
        &self,
        diff: &FieldDiff,
        internal_modified: Option<DateTime<Utc>>,
        external_modified: Option<DateTime<Utc>>,
    ) -> (ConflictPolicy, ResolutionAction) {
        let policy = self.evaluate(diff.field);

        let action = match policy {
            ConflictPolicy::MvidarrWins => push_or_queue(diff),
            ConflictPolicy::ServerWins => ResolutionAction::PullFromServer(diff.external.clone()),
            ConflictPolicy::NewestWins => match (internal_modified, external_modified) {
                (Some(internal), Some(external)) if internal > external => push_or_queue(diff),
                (Some(_), Some(_)) => ResolutionAction::PullFromServer(diff.external.clone()),
                _ => ResolutionAction::Queue(ConflictReason::MissingTimestamp),
            },
            ConflictPolicy::ManualReview => ResolutionAction::Queue(ConflictReason::ManualReview),
        };

        trace!(field = %diff.field, policy = %policy, action = ?action, "Resolution decided");
        (policy, action)
    }

    /// Returns the default policy
    pub fn default_policy(&self) -> ConflictPolicy {
        self.default_policy
    }

    /// Returns the number of valid per-field overrides
    pub fn overrides_count(&self) -> usize {
        self.overrides.len()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::uniform(ConflictPolicy::ManualReview)
    }
}

fn push_or_queue(diff: &FieldDiff) -> ResolutionAction {
    match &diff.internal {
        Some(value) => ResolutionAction::PushToServer(value.clone()),
        None => ResolutionAction::Queue(ConflictReason::ApplyFailed(
            "catalog has no value to push".to_string(),
        )),
    }
}
