use keyrail_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Environment, EnvironmentId};

/// Identifier for an app secret.
///
/// Client-created secrets carry a locally generated id until the server
/// persists them and assigns its own; the tag replaces the original
/// string-marker convention for "is this new".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum SecretId {
    /// Client-generated id for a secret not yet persisted.
    Pending(Uuid),
    /// Server-assigned id for a persisted secret.
    Persisted(String),
}

impl SecretId {
    /// Creates a fresh client-local identifier.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    /// Returns whether the secret has never been persisted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the server id, if the secret is persisted.
    #[must_use]
    pub fn persisted(&self) -> Option<&str> {
        match self {
            Self::Pending(_) => None,
            Self::Persisted(id) => Some(id.as_str()),
        }
    }
}

/// Identifier for one environment's secret value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum SecretValueId {
    /// Client-generated id for a value not yet persisted.
    Pending(Uuid),
    /// Server-assigned id for a persisted value.
    Persisted(String),
}

impl SecretValueId {
    /// Creates a fresh client-local identifier.
    #[must_use]
    pub fn pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    /// Returns whether the value has never been persisted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the server id, if the value is persisted.
    #[must_use]
    pub fn persisted(&self) -> Option<&str> {
        match self {
            Self::Pending(_) => None,
            Self::Persisted(id) => Some(id.as_str()),
        }
    }
}

/// One environment's secret value. The string may be empty, meaning the
/// value is present but blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretValue {
    id: SecretValueId,
    value: String,
}

impl SecretValue {
    /// Creates a client-only value that has not been persisted.
    #[must_use]
    pub fn pending(value: impl Into<String>) -> Self {
        Self {
            id: SecretValueId::pending(),
            value: value.into(),
        }
    }

    /// Creates a server-confirmed value.
    #[must_use]
    pub fn persisted(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: SecretValueId::Persisted(id.into()),
            value: value.into(),
        }
    }

    /// Returns the value identifier.
    #[must_use]
    pub fn id(&self) -> &SecretValueId {
        &self.id
    }

    /// Returns the value string.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Returns whether the value has never been persisted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    /// Returns a copy with the same identity and a new value string.
    #[must_use]
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            value: value.into(),
        }
    }
}

/// One secret's slot for a known environment. `None` means the secret is
/// missing in that environment, which is distinct from a blank value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentValueSlot {
    environment: Environment,
    value: Option<SecretValue>,
}

impl EnvironmentValueSlot {
    /// Creates a slot for an environment.
    #[must_use]
    pub fn new(environment: Environment, value: Option<SecretValue>) -> Self {
        Self { environment, value }
    }

    /// Returns the slot's environment.
    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the slot's value, if present.
    #[must_use]
    pub fn value(&self) -> Option<&SecretValue> {
        self.value.as_ref()
    }

    /// Returns whether the secret is missing in this environment.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }

    /// Returns a copy with the value replaced.
    #[must_use]
    pub fn with_value(&self, value: Option<SecretValue>) -> Self {
        Self {
            environment: self.environment.clone(),
            value,
        }
    }
}

/// An app secret: a key plus one value slot per known environment, ordered
/// by environment index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSecret {
    id: SecretId,
    key: String,
    slots: Vec<EnvironmentValueSlot>,
}

impl AppSecret {
    /// Creates a validated app secret. Slots are ordered by environment
    /// index; duplicate environments are rejected.
    pub fn new(
        id: SecretId,
        key: impl Into<String>,
        mut slots: Vec<EnvironmentValueSlot>,
    ) -> AppResult<Self> {
        slots.sort_by_key(|slot| slot.environment().index());
        for window in slots.windows(2) {
            if window[0].environment().id() == window[1].environment().id() {
                return Err(AppError::Validation(format!(
                    "duplicate environment '{}' in secret slots",
                    window[0].environment().id()
                )));
            }
        }

        Ok(Self {
            id,
            key: key.into(),
            slots,
        })
    }

    /// Creates a client-only secret with an empty key and one blank,
    /// client-only value per environment.
    #[must_use]
    pub fn pending_with_environments(environments: &[Environment]) -> Self {
        let mut slots: Vec<EnvironmentValueSlot> = environments
            .iter()
            .map(|environment| {
                EnvironmentValueSlot::new(environment.clone(), Some(SecretValue::pending("")))
            })
            .collect();
        slots.sort_by_key(|slot| slot.environment().index());

        Self {
            id: SecretId::pending(),
            key: String::new(),
            slots,
        }
    }

    /// Returns the secret identifier.
    #[must_use]
    pub fn id(&self) -> &SecretId {
        &self.id
    }

    /// Returns the secret key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns all environment slots, ordered by environment index.
    #[must_use]
    pub fn slots(&self) -> &[EnvironmentValueSlot] {
        &self.slots
    }

    /// Returns the slot for an environment, if the environment is known.
    #[must_use]
    pub fn slot(&self, environment_id: &EnvironmentId) -> Option<&EnvironmentValueSlot> {
        self.slots
            .iter()
            .find(|slot| slot.environment().id() == environment_id)
    }

    /// Returns the production environment's value, if present.
    #[must_use]
    pub fn production_value(&self) -> Option<&SecretValue> {
        self.slots
            .iter()
            .find(|slot| slot.environment().is_production())
            .and_then(EnvironmentValueSlot::value)
    }

    /// Returns whether a non-production environment's value string equals
    /// the production value string. A caution signal, not an invariant.
    #[must_use]
    pub fn same_as_production(&self, environment_id: &EnvironmentId) -> bool {
        let Some(slot) = self.slot(environment_id) else {
            return false;
        };
        if slot.environment().is_production() {
            return false;
        }
        let Some(value) = slot.value() else {
            return false;
        };

        self.production_value()
            .is_some_and(|production| production.value() == value.value())
    }

    /// Returns the per-slot value strings in slot order, with `None` for
    /// missing values. Absent is distinct from an explicit empty string.
    #[must_use]
    pub fn value_strings(&self) -> Vec<Option<&str>> {
        self.slots
            .iter()
            .map(|slot| slot.value().map(SecretValue::value))
            .collect()
    }

    /// Returns a copy with the key replaced.
    #[must_use]
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            key: key.into(),
            slots: self.slots.clone(),
        }
    }

    /// Returns a copy with one environment's value replaced. Unknown
    /// environments leave the secret unchanged.
    #[must_use]
    pub fn with_slot_value(
        &self,
        environment_id: &EnvironmentId,
        value: Option<SecretValue>,
    ) -> Self {
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                if slot.environment().id() == environment_id {
                    slot.with_value(value.clone())
                } else {
                    slot.clone()
                }
            })
            .collect();

        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            slots,
        }
    }
}

/// Normalises a secret key the way the console input does: spaces become
/// underscores and the result is upper-cased.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    raw.replace(' ', "_").to_uppercase()
}
