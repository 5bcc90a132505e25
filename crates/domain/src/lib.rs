//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod environment;
mod network;
mod policy;
mod secret;

pub use environment::{Environment, EnvironmentId, EnvironmentKind};
pub use network::{NetworkAccessPolicy, client_ip_allowed};
pub use policy::{PermissionPolicy, ResourceAction, ResourceScope};
pub use secret::{
    AppSecret, EnvironmentValueSlot, SecretId, SecretValue, SecretValueId, normalize_key,
};
