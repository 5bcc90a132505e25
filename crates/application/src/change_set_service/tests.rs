use keyrail_domain::{
    AppSecret, Environment, EnvironmentId, EnvironmentKind, EnvironmentValueSlot,
    NetworkAccessPolicy, PermissionPolicy, SecretId, SecretValue,
};

use crate::SecretDraftState;

use super::{
    build_network_policy_change_set, build_role_policy_write, build_secret_change_set,
    network_policy_save_required,
};

fn environment(id: &str, kind: EnvironmentKind, index: i32) -> Environment {
    Environment::new(EnvironmentId::new(id), id, kind, index)
        .unwrap_or_else(|_| panic!("test environment '{id}' must be valid"))
}

fn environments() -> Vec<Environment> {
    vec![
        environment("dev", EnvironmentKind::Dev, 0),
        environment("prod", EnvironmentKind::Prod, 1),
    ]
}

fn server_secret(id: &str, key: &str, values: [Option<(&str, &str)>; 2]) -> AppSecret {
    let slots = environments()
        .into_iter()
        .zip(values)
        .map(|(environment, value)| {
            EnvironmentValueSlot::new(
                environment,
                value.map(|(value_id, value)| SecretValue::persisted(value_id, value)),
            )
        })
        .collect();

    AppSecret::new(SecretId::Persisted(id.to_owned()), key, slots)
        .unwrap_or_else(|_| panic!("test secret '{id}' must be valid"))
}

fn sid(id: &str) -> SecretId {
    SecretId::Persisted(id.to_owned())
}

fn eid(id: &str) -> EnvironmentId {
    EnvironmentId::new(id)
}

fn network_policy(id: &str, is_global: bool) -> NetworkAccessPolicy {
    NetworkAccessPolicy::new(id, id, "10.0.0.0/8", is_global)
        .unwrap_or_else(|_| panic!("test policy '{id}' must be valid"))
}

#[test]
fn fresh_state_yields_an_empty_change_set() {
    let state = SecretDraftState::initialize(vec![server_secret(
        "1",
        "FOO",
        [Some(("s1", "bar")), Some(("s2", "baz"))],
    )]);

    let change_set = build_secret_change_set(&state);
    assert!(change_set.is_empty());
}

#[test]
fn building_twice_on_unchanged_state_is_idempotent() {
    let state = SecretDraftState::initialize(vec![
        server_secret("1", "FOO", [Some(("s1", "bar")), Some(("s2", "baz"))]),
        server_secret("2", "BAR", [None, Some(("s3", "qux"))]),
    ])
    .with_updated_key(&sid("1"), "FOO_2")
    .with_deleted_value(&sid("2"), &eid("prod"))
    .with_created_secret(environments().as_slice());

    assert_eq!(build_secret_change_set(&state), build_secret_change_set(&state));
}

#[test]
fn staged_value_delete_appears_until_restored() {
    let state = SecretDraftState::initialize(vec![server_secret(
        "1",
        "FOO",
        [Some(("s1", "bar")), Some(("s2", "baz"))],
    )])
    .with_deleted_value(&sid("1"), &eid("dev"));

    let change_set = build_secret_change_set(&state);
    assert_eq!(change_set.deletes, vec!["s1".to_owned()]);
    // The secret is modified, and its update payload omits the staged value.
    assert_eq!(change_set.updates.len(), 1);
    let environment_ids: Vec<&str> = change_set.updates[0]
        .values
        .iter()
        .map(|value| value.environment_id.as_str())
        .collect();
    assert_eq!(environment_ids, vec!["prod"]);

    let state = state.with_restored_value(&sid("1"), &eid("dev"));
    assert!(build_secret_change_set(&state).is_empty());
}

#[test]
fn updates_carry_the_full_key_and_value_list() {
    let state = SecretDraftState::initialize(vec![server_secret(
        "1",
        "FOO",
        [Some(("s1", "bar")), Some(("s2", "baz"))],
    )])
    .with_updated_value(&sid("1"), &eid("dev"), "new-value");

    let change_set = build_secret_change_set(&state);
    assert!(change_set.creates.is_empty());
    assert_eq!(change_set.updates.len(), 1);

    let update = &change_set.updates[0];
    assert_eq!(update.id, sid("1"));
    assert_eq!(update.key, "FOO");
    let values: Vec<(&str, &str)> = update
        .values
        .iter()
        .map(|value| (value.environment_id.as_str(), value.value.as_str()))
        .collect();
    assert_eq!(values, vec![("dev", "new-value"), ("prod", "baz")]);
}

#[test]
fn new_secrets_partition_into_creates() {
    let state = SecretDraftState::initialize(Vec::new())
        .with_created_secret(environments().as_slice());
    let id = state.entries()[0].draft().id().clone();
    let state = state
        .with_updated_key(&id, "db url")
        .with_updated_value(&id, &eid("dev"), "postgres://dev");

    let change_set = build_secret_change_set(&state);
    assert_eq!(change_set.creates.len(), 1);
    assert!(change_set.updates.is_empty());
    assert!(change_set.deletes.is_empty());
    assert_eq!(change_set.creates[0].key, "DB_URL");
    assert!(change_set.creates[0].id.is_pending());
}

#[test]
fn deleting_an_unsaved_secret_leaves_no_trace() {
    let state = SecretDraftState::initialize(Vec::new())
        .with_created_secret(environments().as_slice());
    let id = state.entries()[0].draft().id().clone();

    let change_set = build_secret_change_set(&state.with_deleted_secret(&id));
    assert!(change_set.is_empty());
}

#[test]
fn whole_secret_delete_subsumes_value_edits() {
    let state = SecretDraftState::initialize(vec![server_secret(
        "1",
        "FOO",
        [Some(("s1", "bar")), Some(("s2", "baz"))],
    )])
    .with_updated_value(&sid("1"), &eid("dev"), "edited")
    .with_deleted_secret(&sid("1"));

    let change_set = build_secret_change_set(&state);
    assert!(change_set.updates.is_empty());
    assert_eq!(change_set.deletes, vec!["1".to_owned()]);
}

#[test]
fn role_policy_write_reserialises_the_full_document() {
    let document = r#"{
        "permissions": {"Roles": ["read"]},
        "app_permissions": {"Secrets": ["read", "update"]},
        "global_access": false
    }"#;
    let policy = PermissionPolicy::parse(document).ok();
    let Some(policy) = policy else {
        panic!("test policy document must parse");
    };

    let write = build_role_policy_write("role-1", &policy);
    assert!(write.is_ok());
    let reparsed = write
        .ok()
        .and_then(|write| PermissionPolicy::parse(write.permissions.as_str()).ok());
    assert_eq!(reparsed, Some(policy));
}

#[test]
fn network_change_set_contains_only_toggled_policies() {
    let server = vec![network_policy("np-1", true), network_policy("np-2", false)];
    let draft = vec![
        network_policy("np-1", true),
        network_policy("np-2", false).with_toggled_global(),
    ];

    let writes = build_network_policy_change_set(server.as_slice(), draft.as_slice());
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].id, "np-2");
    assert!(writes[0].is_global);
}

#[test]
fn untouched_network_policies_need_no_save() {
    let server = vec![network_policy("np-1", true), network_policy("np-2", false)];
    // Same global set in a different order.
    let draft = vec![network_policy("np-2", false), network_policy("np-1", true)];

    assert!(!network_policy_save_required(server.as_slice(), draft.as_slice()));
    assert!(build_network_policy_change_set(server.as_slice(), draft.as_slice()).is_empty());

    let toggled: Vec<NetworkAccessPolicy> = server
        .iter()
        .map(|policy| {
            if policy.id() == "np-2" {
                policy.with_toggled_global()
            } else {
                policy.clone()
            }
        })
        .collect();
    assert!(network_policy_save_required(server.as_slice(), toggled.as_slice()));
}
