//! Keyrail role-policy audit tool.
//!
//! Checks a stored role-policy document against the organisation's basis
//! (Owner) policy and reports every grant the basis does not allow. The
//! backend re-enforces the same ceiling on save; this tool lets operators
//! inspect stored roles after a basis schema change.

#![forbid(unsafe_code)]

use std::env;
use std::fs;

use keyrail_core::{AppError, AppResult};
use keyrail_domain::{PermissionPolicy, ResourceAction, ResourceScope};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct CeilingViolation {
    scope: ResourceScope,
    resource: String,
    action: ResourceAction,
}

fn main() -> Result<(), AppError> {
    init_tracing();

    let basis_path = required_arg(1, "basis policy document path")?;
    let policy_path = required_arg(2, "role policy document path")?;

    let basis = load_policy(basis_path.as_str())?;
    let policy = load_policy(policy_path.as_str())?;

    let violations = audit(&basis, &policy);
    for violation in &violations {
        warn!(
            scope = violation.scope.as_str(),
            resource = %violation.resource,
            action = violation.action.as_str(),
            "grant exceeds basis policy"
        );
    }

    if policy.global_access() && !basis.global_access() {
        warn!("global access is enabled but the basis does not grant it");
        return Err(AppError::Validation(
            "role policy enables global access beyond the basis".to_owned(),
        ));
    }

    if violations.is_empty() {
        info!(policy = %policy_path, "role policy is within the basis ceiling");
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} grant(s) exceed the basis policy",
            violations.len()
        )))
    }
}

fn audit(basis: &PermissionPolicy, policy: &PermissionPolicy) -> Vec<CeilingViolation> {
    let mut violations = Vec::new();

    for scope in [ResourceScope::Organisation, ResourceScope::App] {
        for (resource, actions) in policy.scope_permissions(scope) {
            for action in actions {
                if !basis.is_action_granted(resource.as_str(), *action, scope) {
                    violations.push(CeilingViolation {
                        scope,
                        resource: resource.clone(),
                        action: *action,
                    });
                }
            }
        }
    }

    violations
}

fn load_policy(path: &str) -> AppResult<PermissionPolicy> {
    let document = fs::read_to_string(path)
        .map_err(|error| AppError::NotFound(format!("failed to read '{path}': {error}")))?;
    PermissionPolicy::parse(document.as_str())
}

fn required_arg(position: usize, description: &str) -> AppResult<String> {
    env::args().nth(position).ok_or_else(|| {
        AppError::Validation(format!(
            "missing argument {position} ({description}); usage: keyrail-audit <basis.json> <policy.json>"
        ))
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
