use std::collections::BTreeSet;

use keyrail_domain::{
    AppSecret, Environment, EnvironmentId, SecretId, SecretValue, normalize_key,
};
use tracing::warn;


/// One secret's working copy paired with the last-fetched server snapshot.
/// Brand-new, unsaved secrets have no snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftEntry {
    draft: AppSecret,
    snapshot: Option<AppSecret>,
    imported: bool,
}

impl DraftEntry {
    /// Returns the client working copy.
    #[must_use]
    pub fn draft(&self) -> &AppSecret {
        &self.draft
    }

    /// Returns the server snapshot, absent for unsaved secrets.
    #[must_use]
    pub fn snapshot(&self) -> Option<&AppSecret> {
        self.snapshot.as_ref()
    }

    /// Returns whether the secret has never been persisted.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Returns whether the secret came from a bulk import. The
    /// presentation layer skips auto-expand and focus for imported rows.
    #[must_use]
    pub fn is_imported(&self) -> bool {
        self.imported
    }
}

/// Client-side working copy of an app's secrets.
///
/// Tracks structural differences against the last server snapshot and
/// stages deletes reversibly until commit. Every operation is a pure value
/// transition invoked synchronously from a discrete user action; resetting
/// back to server state is only ever the explicit [`Self::initialize`],
/// never implicit.
///
/// Operations referencing an unknown secret or environment are defensive
/// no-ops: the UI cannot construct such a reference under normal
/// operation. Each one emits a `tracing` warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretDraftState {
    entries: Vec<DraftEntry>,
    staged_value_deletes: BTreeSet<String>,
    staged_secret_deletes: BTreeSet<String>,
}

impl SecretDraftState {
    /// Seeds the draft list as a structural copy of the server list and
    /// establishes the snapshot used for all later diffing.
    #[must_use]
    pub fn initialize(server_secrets: Vec<AppSecret>) -> Self {
        let entries = server_secrets
            .into_iter()
            .map(|secret| DraftEntry {
                draft: secret.clone(),
                snapshot: Some(secret),
                imported: false,
            })
            .collect();

        Self {
            entries,
            staged_value_deletes: BTreeSet::new(),
            staged_secret_deletes: BTreeSet::new(),
        }
    }

    /// Returns all draft entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[DraftEntry] {
        &self.entries
    }

    /// Returns the staged-for-delete environment-value ids.
    #[must_use]
    pub fn staged_value_deletes(&self) -> &BTreeSet<String> {
        &self.staged_value_deletes
    }

    /// Returns the staged-for-delete secret ids.
    #[must_use]
    pub fn staged_secret_deletes(&self) -> &BTreeSet<String> {
        &self.staged_secret_deletes
    }

    fn entry(&self, secret_id: &SecretId) -> Option<&DraftEntry> {
        self.entries.iter().find(|entry| entry.draft.id() == secret_id)
    }

    fn position(&self, secret_id: &SecretId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.draft.id() == secret_id)
    }

    /// Replaces a draft secret's key with the normalised form of
    /// `new_key` (spaces to underscores, upper-cased).
    #[must_use]
    pub fn with_updated_key(mut self, secret_id: &SecretId, new_key: &str) -> Self {
        let Some(index) = self.position(secret_id) else {
            warn!(secret_id = ?secret_id, "update_key ignored: unknown secret");
            return self;
        };

        let entry = &mut self.entries[index];
        entry.draft = entry.draft.with_key(normalize_key(new_key));
        self
    }

    /// Adds a blank client-only value to a missing environment slot. When
    /// the slot's persisted value is staged for delete, the staging is
    /// removed instead: add supersedes delete.
    #[must_use]
    pub fn with_added_value(
        mut self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
    ) -> Self {
        let Some(index) = self.position(secret_id) else {
            warn!(secret_id = ?secret_id, "add_value ignored: unknown secret");
            return self;
        };
        let Some(slot) = self.entries[index].draft.slot(environment_id) else {
            warn!(
                secret_id = ?secret_id,
                environment_id = %environment_id,
                "add_value ignored: unknown environment"
            );
            return self;
        };

        match slot.value().cloned() {
            Some(value) => {
                if let Some(persisted) = value.id().persisted() {
                    self.staged_value_deletes.remove(persisted);
                }
            }
            None => {
                let entry = &mut self.entries[index];
                entry.draft = entry
                    .draft
                    .with_slot_value(environment_id, Some(SecretValue::pending("")));
            }
        }

        self
    }

    /// Sets the value string for an existing slot without changing its
    /// pending/persisted identity.
    #[must_use]
    pub fn with_updated_value(
        mut self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
        value: &str,
    ) -> Self {
        let Some(index) = self.position(secret_id) else {
            warn!(secret_id = ?secret_id, "update_value ignored: unknown secret");
            return self;
        };
        let Some(current) = self.entries[index]
            .draft
            .slot(environment_id)
            .and_then(|slot| slot.value().cloned())
        else {
            warn!(
                secret_id = ?secret_id,
                environment_id = %environment_id,
                "update_value ignored: no value in environment"
            );
            return self;
        };

        let entry = &mut self.entries[index];
        entry.draft = entry
            .draft
            .with_slot_value(environment_id, Some(current.with_value(value)));
        self
    }

    /// Deletes one environment's value: server-confirmed values are staged
    /// for delete (reversible), client-only values are removed outright.
    #[must_use]
    pub fn with_deleted_value(
        mut self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
    ) -> Self {
        let Some(index) = self.position(secret_id) else {
            warn!(secret_id = ?secret_id, "delete_value ignored: unknown secret");
            return self;
        };
        let Some(value) = self.entries[index]
            .draft
            .slot(environment_id)
            .and_then(|slot| slot.value().cloned())
        else {
            warn!(
                secret_id = ?secret_id,
                environment_id = %environment_id,
                "delete_value ignored: no value in environment"
            );
            return self;
        };

        match value.id().persisted() {
            Some(persisted) => {
                self.staged_value_deletes.insert(persisted.to_owned());
            }
            None => {
                let entry = &mut self.entries[index];
                entry.draft = entry.draft.with_slot_value(environment_id, None);
            }
        }

        self
    }

    /// Un-stages a previously staged environment-value delete.
    #[must_use]
    pub fn with_restored_value(
        mut self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
    ) -> Self {
        let Some(persisted) = self
            .entry(secret_id)
            .and_then(|entry| entry.draft.slot(environment_id))
            .and_then(|slot| slot.value())
            .and_then(|value| value.id().persisted())
            .map(str::to_owned)
        else {
            warn!(
                secret_id = ?secret_id,
                environment_id = %environment_id,
                "restore_value ignored: no persisted value in environment"
            );
            return self;
        };

        self.staged_value_deletes.remove(persisted.as_str());
        self
    }

    /// Appends a new unsaved secret with an empty key and one blank
    /// client-only value per known environment.
    #[must_use]
    pub fn with_created_secret(mut self, environments: &[Environment]) -> Self {
        self.entries.push(DraftEntry {
            draft: AppSecret::pending_with_environments(environments),
            snapshot: None,
            imported: false,
        });
        self
    }

    /// Appends an unsaved secret produced by a bulk import, marked so the
    /// presentation layer skips auto-expand and focus. Environments absent
    /// from `values` stay missing.
    #[must_use]
    pub fn with_imported_secret(
        mut self,
        environments: &[Environment],
        key: &str,
        values: &[(EnvironmentId, String)],
    ) -> Self {
        let mut draft = AppSecret::pending_with_environments(environments);
        draft = draft.with_key(normalize_key(key));
        for environment in environments {
            let value = values
                .iter()
                .find(|(environment_id, _)| environment_id == environment.id())
                .map(|(_, value)| SecretValue::pending(value.clone()));
            draft = draft.with_slot_value(environment.id(), value);
        }

        self.entries.push(DraftEntry {
            draft,
            snapshot: None,
            imported: true,
        });
        self
    }

    /// Toggles whole-secret staged delete for a persisted secret; an
    /// unsaved secret is removed from the draft list entirely.
    #[must_use]
    pub fn with_deleted_secret(mut self, secret_id: &SecretId) -> Self {
        let Some(index) = self.position(secret_id) else {
            warn!(secret_id = ?secret_id, "delete_secret ignored: unknown secret");
            return self;
        };

        match self.entries[index].draft.id().persisted() {
            Some(persisted) => {
                let persisted = persisted.to_owned();
                if !self.staged_secret_deletes.remove(persisted.as_str()) {
                    self.staged_secret_deletes.insert(persisted);
                }
            }
            None => {
                self.entries.remove(index);
            }
        }

        self
    }

    /// Returns whether the secret has never been persisted.
    #[must_use]
    pub fn is_new(&self, secret_id: &SecretId) -> bool {
        self.entry(secret_id).is_some_and(DraftEntry::is_new)
    }

    /// Returns whether the secret came from a bulk import.
    #[must_use]
    pub fn is_imported(&self, secret_id: &SecretId) -> bool {
        self.entry(secret_id).is_some_and(DraftEntry::is_imported)
    }

    /// Returns whether the whole secret is staged for delete.
    #[must_use]
    pub fn is_staged_for_delete(&self, secret_id: &SecretId) -> bool {
        secret_id
            .persisted()
            .is_some_and(|persisted| self.staged_secret_deletes.contains(persisted))
    }

    /// Returns whether one environment's value is staged for delete.
    #[must_use]
    pub fn is_value_staged_for_delete(
        &self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
    ) -> bool {
        self.entry(secret_id)
            .and_then(|entry| entry.draft.slot(environment_id))
            .and_then(|slot| slot.value())
            .and_then(|value| value.id().persisted())
            .is_some_and(|persisted| self.staged_value_deletes.contains(persisted))
    }

    /// Returns whether the draft differs structurally from its snapshot:
    /// the key changed, any environment value differs (absent is distinct
    /// from blank), any of its value ids is staged for delete, or any slot
    /// holds a client-only value. Secrets without a snapshot are new,
    /// never modified.
    #[must_use]
    pub fn is_modified(&self, secret_id: &SecretId) -> bool {
        let Some(entry) = self.entry(secret_id) else {
            return false;
        };
        let Some(snapshot) = entry.snapshot() else {
            return false;
        };
        let draft = entry.draft();

        if draft.key() != snapshot.key() {
            return true;
        }
        if draft.value_strings() != snapshot.value_strings() {
            return true;
        }

        draft.slots().iter().any(|slot| {
            slot.value().is_some_and(|value| {
                value.is_pending()
                    || value
                        .id()
                        .persisted()
                        .is_some_and(|persisted| self.staged_value_deletes.contains(persisted))
            })
        })
    }

    /// Returns whether a non-production environment's value equals the
    /// production value for the same secret. A caution signal only.
    #[must_use]
    pub fn is_same_as_production(
        &self,
        secret_id: &SecretId,
        environment_id: &EnvironmentId,
    ) -> bool {
        self.entry(secret_id)
            .is_some_and(|entry| entry.draft.same_as_production(environment_id))
    }

    /// Returns whether any entry is new or modified or any delete is
    /// staged, i.e. whether a save would submit anything.
    #[must_use]
    pub fn save_required(&self) -> bool {
        if !self.staged_value_deletes.is_empty() || !self.staged_secret_deletes.is_empty() {
            return true;
        }

        self.entries
            .iter()
            .any(|entry| entry.is_new() || self.is_modified(entry.draft.id()))
    }
}
