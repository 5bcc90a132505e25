use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use keyrail_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Atomic unit of permission over a named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    /// Read the resource.
    Read,
    /// Create new instances of the resource.
    Create,
    /// Update existing instances of the resource.
    Update,
    /// Delete instances of the resource.
    Delete,
}

impl ResourceAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceAction] = &[
            ResourceAction::Read,
            ResourceAction::Create,
            ResourceAction::Update,
            ResourceAction::Delete,
        ];

        ALL
    }
}

impl FromStr for ResourceAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown resource action '{value}'"
            ))),
        }
    }
}

/// Scope a permission resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Organisation-level resources.
    Organisation,
    /// App-level resources.
    App,
}

impl ResourceScope {
    /// Returns a stable name for log and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organisation => "organisation",
            Self::App => "app",
        }
    }
}

/// A role's access policy: granted actions per resource at organisation and
/// app scope, plus an implicit global-access flag.
///
/// Every mutating operation is pure and returns a new policy. Operations
/// that would grant an action beyond the supplied basis policy (the policy
/// of the organisation's highest-privilege role) are defined as no-ops, so
/// in-memory state is never more permissive than what will be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPolicy {
    permissions: BTreeMap<String, BTreeSet<ResourceAction>>,
    app_permissions: BTreeMap<String, BTreeSet<ResourceAction>>,
    // Older stored documents predate the flag.
    #[serde(default)]
    global_access: bool,
}

impl PermissionPolicy {
    /// Parses a stored or basis policy document.
    pub fn parse(document: &str) -> AppResult<Self> {
        serde_json::from_str(document)
            .map_err(|error| AppError::MalformedPolicy(error.to_string()))
    }

    /// Serialises the policy back into its document form for submission.
    pub fn to_document(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|error| AppError::Internal(format!("failed to serialise policy: {error}")))
    }

    /// Returns a policy with the same resource keys as the basis, every
    /// action set cleared, and global access disabled.
    ///
    /// New roles are initialised from this so their schema always mirrors
    /// the current basis: new resources appear, deprecated ones disappear.
    #[must_use]
    pub fn empty_from(basis: &Self) -> Self {
        Self {
            permissions: basis
                .permissions
                .keys()
                .map(|resource| (resource.clone(), BTreeSet::new()))
                .collect(),
            app_permissions: basis
                .app_permissions
                .keys()
                .map(|resource| (resource.clone(), BTreeSet::new()))
                .collect(),
            global_access: false,
        }
    }

    /// Returns the resource/action map for one scope.
    #[must_use]
    pub fn scope_permissions(
        &self,
        scope: ResourceScope,
    ) -> &BTreeMap<String, BTreeSet<ResourceAction>> {
        match scope {
            ResourceScope::Organisation => &self.permissions,
            ResourceScope::App => &self.app_permissions,
        }
    }

    fn scope_permissions_mut(
        &mut self,
        scope: ResourceScope,
    ) -> &mut BTreeMap<String, BTreeSet<ResourceAction>> {
        match scope {
            ResourceScope::Organisation => &mut self.permissions,
            ResourceScope::App => &mut self.app_permissions,
        }
    }

    /// Returns whether the global-access flag is set.
    #[must_use]
    pub fn global_access(&self) -> bool {
        self.global_access
    }

    /// Returns whether the policy grants the action on the resource.
    /// Resources absent from the policy grant nothing.
    #[must_use]
    pub fn is_action_granted(
        &self,
        resource: &str,
        action: ResourceAction,
        scope: ResourceScope,
    ) -> bool {
        self.scope_permissions(scope)
            .get(resource)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Returns a policy with the action toggled for the resource.
    ///
    /// No-op when the basis does not grant the action for that resource:
    /// the basis is the authorization ceiling, not a silent grant.
    #[must_use]
    pub fn with_toggled_action(
        &self,
        basis: &Self,
        resource: &str,
        action: ResourceAction,
        scope: ResourceScope,
    ) -> Self {
        if !basis.is_action_granted(resource, action, scope) {
            return self.clone();
        }

        let mut updated = self.clone();
        let actions = updated
            .scope_permissions_mut(scope)
            .entry(resource.to_owned())
            .or_default();
        if !actions.remove(&action) {
            actions.insert(action);
        }

        updated
    }

    /// Returns a policy with the global-access flag flipped.
    #[must_use]
    pub fn with_toggled_global_access(&self) -> Self {
        let mut updated = self.clone();
        updated.global_access = !updated.global_access;
        updated
    }

    /// Returns a policy with the resource's action set replaced wholesale
    /// by the template, intersected with what the basis grants.
    ///
    /// No-op when the basis does not know the resource.
    #[must_use]
    pub fn with_template(
        &self,
        basis: &Self,
        resource: &str,
        template: &BTreeSet<ResourceAction>,
        scope: ResourceScope,
    ) -> Self {
        let Some(ceiling) = basis.scope_permissions(scope).get(resource) else {
            return self.clone();
        };

        let mut updated = self.clone();
        updated.scope_permissions_mut(scope).insert(
            resource.to_owned(),
            template.intersection(ceiling).copied().collect(),
        );

        updated
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::{PermissionPolicy, ResourceAction, ResourceScope};

    const OWNER_DOCUMENT: &str = r#"{
        "permissions": {
            "Roles": ["read", "create", "update", "delete"],
            "Members": ["read", "create"],
            "NetworkAccessPolicies": ["read", "update"]
        },
        "app_permissions": {
            "Secrets": ["read", "create", "update", "delete"],
            "Environments": ["read"]
        },
        "global_access": true
    }"#;

    fn owner_policy() -> PermissionPolicy {
        PermissionPolicy::parse(OWNER_DOCUMENT).unwrap_or_default()
    }

    #[test]
    fn parse_rejects_malformed_document() {
        let parsed = PermissionPolicy::parse("{\"permissions\": [1, 2]}");
        assert!(parsed.is_err());
    }

    #[test]
    fn parse_round_trips_through_document_form() {
        let policy = owner_policy();
        let document = policy.to_document();
        assert!(document.is_ok());
        let reparsed = PermissionPolicy::parse(document.unwrap_or_default().as_str());
        assert_eq!(reparsed.ok(), Some(policy));
    }

    #[test]
    fn empty_from_mirrors_basis_keys_with_no_grants() {
        let basis = owner_policy();
        let empty = PermissionPolicy::empty_from(&basis);

        for scope in [ResourceScope::Organisation, ResourceScope::App] {
            let basis_keys: Vec<&String> = basis.scope_permissions(scope).keys().collect();
            let empty_keys: Vec<&String> = empty.scope_permissions(scope).keys().collect();
            assert_eq!(basis_keys, empty_keys);
            assert!(
                empty
                    .scope_permissions(scope)
                    .values()
                    .all(BTreeSet::is_empty)
            );
        }
        assert!(!empty.global_access());
    }

    #[test]
    fn toggle_grants_then_revokes() {
        let basis = owner_policy();
        let policy = PermissionPolicy::empty_from(&basis);

        let granted = policy.with_toggled_action(
            &basis,
            "Secrets",
            ResourceAction::Update,
            ResourceScope::App,
        );
        assert!(granted.is_action_granted("Secrets", ResourceAction::Update, ResourceScope::App));

        let revoked = granted.with_toggled_action(
            &basis,
            "Secrets",
            ResourceAction::Update,
            ResourceScope::App,
        );
        assert_eq!(revoked, policy);
    }

    #[test]
    fn toggle_outside_basis_ceiling_is_a_no_op() {
        let basis = owner_policy();
        let policy = PermissionPolicy::empty_from(&basis);

        // Members has no update grant in the basis.
        let unchanged = policy.with_toggled_action(
            &basis,
            "Members",
            ResourceAction::Update,
            ResourceScope::Organisation,
        );
        assert_eq!(unchanged, policy);

        // Unknown resources are equally out of reach.
        let unchanged = policy.with_toggled_action(
            &basis,
            "Billing",
            ResourceAction::Read,
            ResourceScope::Organisation,
        );
        assert_eq!(unchanged, policy);
    }

    #[test]
    fn template_is_clamped_to_basis_ceiling() {
        let basis = owner_policy();
        let policy = PermissionPolicy::empty_from(&basis);

        let template: BTreeSet<ResourceAction> = ResourceAction::all().iter().copied().collect();
        let applied = policy.with_template(
            &basis,
            "NetworkAccessPolicies",
            &template,
            ResourceScope::Organisation,
        );

        let expected: BTreeSet<ResourceAction> =
            [ResourceAction::Read, ResourceAction::Update].into();
        assert_eq!(
            applied
                .scope_permissions(ResourceScope::Organisation)
                .get("NetworkAccessPolicies"),
            Some(&expected)
        );
    }

    #[test]
    fn template_replaces_wholesale() {
        let basis = owner_policy();
        let policy = PermissionPolicy::empty_from(&basis).with_toggled_action(
            &basis,
            "Roles",
            ResourceAction::Delete,
            ResourceScope::Organisation,
        );

        let template: BTreeSet<ResourceAction> = [ResourceAction::Read].into();
        let applied =
            policy.with_template(&basis, "Roles", &template, ResourceScope::Organisation);
        assert!(applied.is_action_granted("Roles", ResourceAction::Read, ResourceScope::Organisation));
        assert!(!applied.is_action_granted(
            "Roles",
            ResourceAction::Delete,
            ResourceScope::Organisation
        ));
    }

    #[test]
    fn global_access_toggle_flips_flag() {
        let policy = PermissionPolicy::empty_from(&owner_policy());
        let toggled = policy.with_toggled_global_access();
        assert!(toggled.global_access());
        assert_eq!(toggled.with_toggled_global_access(), policy);
    }

    #[test]
    fn action_round_trips_storage_value() {
        for action in ResourceAction::all() {
            let restored = ResourceAction::from_str(action.as_str());
            assert_eq!(restored.ok(), Some(*action));
        }
    }

    fn action_strategy() -> impl Strategy<Value = ResourceAction> {
        prop_oneof![
            Just(ResourceAction::Read),
            Just(ResourceAction::Create),
            Just(ResourceAction::Update),
            Just(ResourceAction::Delete),
        ]
    }

    proptest! {
        #[test]
        fn double_toggle_within_ceiling_is_identity(
            granted in proptest::collection::btree_set(action_strategy(), 0..=4),
            action in action_strategy(),
        ) {
            let basis = owner_policy();
            let mut policy = PermissionPolicy::empty_from(&basis);
            for action in granted {
                policy = policy.with_toggled_action(
                    &basis,
                    "Secrets",
                    action,
                    ResourceScope::App,
                );
            }

            let toggled_twice = policy
                .with_toggled_action(&basis, "Secrets", action, ResourceScope::App)
                .with_toggled_action(&basis, "Secrets", action, ResourceScope::App);
            prop_assert_eq!(toggled_twice, policy);
        }

        #[test]
        fn toggles_never_exceed_the_basis(
            toggles in proptest::collection::vec(action_strategy(), 0..8),
        ) {
            let basis = owner_policy();
            let mut policy = PermissionPolicy::empty_from(&basis);
            for action in toggles {
                policy = policy.with_toggled_action(
                    &basis,
                    "Environments",
                    action,
                    ResourceScope::App,
                );
            }

            for action in ResourceAction::all() {
                if policy.is_action_granted("Environments", *action, ResourceScope::App) {
                    prop_assert!(basis.is_action_granted(
                        "Environments",
                        *action,
                        ResourceScope::App
                    ));
                }
            }
        }
    }
}
