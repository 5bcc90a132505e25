use std::fmt::{Display, Formatter};

use keyrail_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Opaque server-assigned environment identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvironmentId(String);

impl EnvironmentId {
    /// Creates an environment identifier from a transport value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the underlying identifier value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for EnvironmentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Environment classification used for same-as-production detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Development environment.
    Dev,
    /// Staging environment.
    Staging,
    /// Production environment.
    Prod,
    /// User-defined environment type.
    #[serde(other)]
    Custom,
}

impl EnvironmentKind {
    /// Decodes a transport value. Unknown values are user-defined
    /// environment types, never an error.
    #[must_use]
    pub fn from_transport(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "dev" => Self::Dev,
            "staging" => Self::Staging,
            "prod" => Self::Prod,
            _ => Self::Custom,
        }
    }

    /// Returns whether this is the production environment type.
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// A deployment environment within an app, fetched once per app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    id: EnvironmentId,
    name: NonEmptyString,
    kind: EnvironmentKind,
    index: i32,
}

impl Environment {
    /// Creates a validated environment.
    pub fn new(
        id: EnvironmentId,
        name: impl Into<String>,
        kind: EnvironmentKind,
        index: i32,
    ) -> AppResult<Self> {
        if index < 0 {
            return Err(AppError::Validation(
                "environment index must be greater than or equal to zero".to_owned(),
            ));
        }

        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            kind,
            index,
        })
    }

    /// Returns the environment identifier.
    #[must_use]
    pub fn id(&self) -> &EnvironmentId {
        &self.id
    }

    /// Returns the environment display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the environment kind.
    #[must_use]
    pub fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    /// Returns the display ordering index.
    #[must_use]
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Returns whether this is the production environment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.kind.is_production()
    }
}
