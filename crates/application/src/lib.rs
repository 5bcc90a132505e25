//! Application state engines for the Keyrail console.

#![forbid(unsafe_code)]

mod access_guard;
mod change_set_service;
mod secret_draft_service;

pub use access_guard::can_perform;
pub use change_set_service::{
    EnvironmentValueWrite, NetworkPolicyWrite, RolePolicyWrite, SecretChangeSet, SecretWrite,
    build_network_policy_change_set, build_role_policy_write, build_secret_change_set,
    network_policy_save_required,
};
pub use secret_draft_service::{DraftEntry, SecretDraftState};
