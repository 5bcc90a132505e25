use keyrail_core::AppResult;
use keyrail_domain::{
    EnvironmentId, NetworkAccessPolicy, PermissionPolicy, SecretId,
};
use serde::Serialize;

use crate::{DraftEntry, SecretDraftState};

#[cfg(test)]
mod tests;

/// One environment's value inside a secret write payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentValueWrite {
    /// Target environment.
    pub environment_id: EnvironmentId,
    /// Value string to store.
    pub value: String,
}

/// Full replacement payload for one secret: the current key and every
/// present, non-staged environment value. Last-write-wins at secret
/// granularity; no per-field patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretWrite {
    /// Secret identifier (client-local for creates).
    pub id: SecretId,
    /// Current key.
    pub key: String,
    /// Present environment values, in environment order.
    pub values: Vec<EnvironmentValueWrite>,
}

/// Minimal changeset derived from draft state for submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecretChangeSet {
    /// Brand-new secrets with no server snapshot.
    pub creates: Vec<SecretWrite>,
    /// Existing secrets whose draft differs from the snapshot.
    pub updates: Vec<SecretWrite>,
    /// Persisted secret and environment-value ids staged for delete.
    pub deletes: Vec<String>,
}

impl SecretChangeSet {
    /// Returns whether there is nothing to save.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Role policy submission: the role id plus the full permissions document
/// re-serialised. Policy saves are whole-document, never per-row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePolicyWrite {
    /// Target role.
    pub role_id: String,
    /// Serialised permissions document.
    pub permissions: String,
}

/// Network policy submission row, limited to entries whose global flag
/// changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPolicyWrite {
    /// Policy identifier.
    pub id: String,
    /// Policy display name.
    pub name: String,
    /// Allowlist in transport form.
    pub allowed_ips: String,
    /// New global flag.
    pub is_global: bool,
}

/// Partitions the draft state into creates, updates and deletes.
///
/// Applied twice to the same unchanged state this yields the same
/// changeset, and a freshly initialised state yields an empty one, so a
/// "nothing to save" condition is reliably detectable.
#[must_use]
pub fn build_secret_change_set(state: &SecretDraftState) -> SecretChangeSet {
    let mut change_set = SecretChangeSet::default();

    for entry in state.entries() {
        if entry.is_new() {
            change_set.creates.push(secret_write(entry, state));
        } else if state.is_staged_for_delete(entry.draft().id()) {
            // Whole-secret deletes subsume any per-value edits.
        } else if state.is_modified(entry.draft().id()) {
            change_set.updates.push(secret_write(entry, state));
        }
    }

    change_set
        .deletes
        .extend(state.staged_secret_deletes().iter().cloned());
    change_set
        .deletes
        .extend(state.staged_value_deletes().iter().cloned());

    change_set
}

fn secret_write(entry: &DraftEntry, state: &SecretDraftState) -> SecretWrite {
    let draft = entry.draft();
    let values = draft
        .slots()
        .iter()
        .filter_map(|slot| {
            let value = slot.value()?;
            let staged = value
                .id()
                .persisted()
                .is_some_and(|persisted| state.staged_value_deletes().contains(persisted));
            (!staged).then(|| EnvironmentValueWrite {
                environment_id: slot.environment().id().clone(),
                value: value.value().to_owned(),
            })
        })
        .collect();

    SecretWrite {
        id: draft.id().clone(),
        key: draft.key().to_owned(),
        values,
    }
}

/// Builds the whole-document policy submission for a role.
pub fn build_role_policy_write(
    role_id: impl Into<String>,
    policy: &PermissionPolicy,
) -> AppResult<RolePolicyWrite> {
    Ok(RolePolicyWrite {
        role_id: role_id.into(),
        permissions: policy.to_document()?,
    })
}

/// Returns submission rows for only the policies whose global flag changed
/// between the server list and the draft list, to avoid resubmitting
/// unchanged rows.
#[must_use]
pub fn build_network_policy_change_set(
    server: &[NetworkAccessPolicy],
    draft: &[NetworkAccessPolicy],
) -> Vec<NetworkPolicyWrite> {
    server
        .iter()
        .filter_map(|before| {
            let after = draft.iter().find(|policy| policy.id() == before.id())?;
            (after.is_global() != before.is_global()).then(|| NetworkPolicyWrite {
                id: after.id().to_owned(),
                name: after.name().as_str().to_owned(),
                allowed_ips: after.allowed_ips().to_owned(),
                is_global: after.is_global(),
            })
        })
        .collect()
}

/// Returns whether the draft's set of globally enabled policies differs
/// from the server's. Order-independent, duplicate-sensitive.
#[must_use]
pub fn network_policy_save_required(
    server: &[NetworkAccessPolicy],
    draft: &[NetworkAccessPolicy],
) -> bool {
    global_ids(server) != global_ids(draft)
}

fn global_ids(policies: &[NetworkAccessPolicy]) -> Vec<&str> {
    let mut ids: Vec<&str> = policies
        .iter()
        .filter(|policy| policy.is_global())
        .map(NetworkAccessPolicy::id)
        .collect();
    ids.sort_unstable();
    ids
}
