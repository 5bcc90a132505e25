use keyrail_domain::{PermissionPolicy, ResourceAction, ResourceScope};

/// Returns whether the policy allows the action on the resource.
///
/// Closed-world default-deny: an absent policy (data not yet loaded) and a
/// resource key the policy does not know are both denied. Safe to call at
/// any point during initial load.
#[must_use]
pub fn can_perform(
    policy: Option<&PermissionPolicy>,
    resource: &str,
    action: ResourceAction,
    scope: ResourceScope,
) -> bool {
    policy.is_some_and(|policy| policy.is_action_granted(resource, action, scope))
}
