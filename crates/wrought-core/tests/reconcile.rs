//! End-to-end reconciliation against the mock chain: deploy/upgrade state
//! machine, role and config passes, idempotence, and failure behavior.

use serde_json::json;
use std::collections::HashMap;
use wrought_backend::{ChainBackend, Instance, MockBackend};
use wrought_core::{ConfigItem, ConfigSpec, CoreError, DeploySpec, Engine, EngineConfig};
use wrought_schema::{parse_manifest_str, ContractEntry, Manifest};
use wrought_store::ManifestStore;

fn engine_config() -> EngineConfig {
    EngineConfig {
        proxy_admin: "Admin".to_owned(),
        proxy_contract: "UpgradeProxy".to_owned(),
    }
}

fn test_store() -> (tempfile::TempDir, ManifestStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ManifestStore::new(dir.path().join("deploy.json"));
    (dir, store)
}

fn manifest(json: &str) -> Manifest {
    parse_manifest_str(json).unwrap()
}

fn token_instance() -> Instance {
    Instance::new("Token", "0xT0")
}

// Fresh proxied contract: deploy impl, deploy proxy with the 3-argument
// constructor, reconcile admin, initialize, persist both fields.
#[test]
fn fresh_proxy_deploys_initializes_and_persists() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "", "Token": { "impl": "", "proxy": "" } } }"#,
    );
    let backend =
        MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .deploy_all(&[], &HashMap::new())
        .unwrap();

    let ContractEntry::Proxied(entry) = &m.contracts["Token"] else {
        panic!("Token should stay a proxied entry");
    };
    assert!(entry.has_implementation());
    assert!(entry.has_proxy());
    assert_ne!(entry.implementation, entry.proxy);

    // Admin, impl, proxy, and nothing else, were deployed.
    assert_eq!(backend.deploy_count(), 3);

    // the proxy was initialized through the implementation ABI
    assert_eq!(
        backend.storage_value(&entry.proxy, "initialized"),
        Some(json!(true))
    );

    // the proxy artifact reports 3 constructor inputs, so the 3-argument
    // constructor was chosen, with an empty init-data payload
    let ctor = backend.ctor_args(&entry.proxy).unwrap();
    assert_eq!(ctor.len(), 3);
    assert_eq!(ctor[0], json!(entry.implementation));
    assert_eq!(ctor[2], json!("0x"));

    // the proxy admin is the configured Admin contract
    let ContractEntry::Simple(admin_addr) = &m.contracts["Admin"] else {
        panic!("Admin should be a simple entry");
    };
    let proxy = Instance::new("UpgradeProxy", entry.proxy.clone());
    assert_eq!(
        backend.call(&proxy, "admin", &[]).unwrap(),
        json!(admin_addr)
    );

    // progress is durable
    assert_eq!(store.load().unwrap(), m);
}

#[test]
fn initialize_receives_resolved_init_args() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Admin": "", "Token": { "impl": "", "proxy": "" } },
    "config": { "token.cap": "ether:5" }
}
"#,
    );
    let backend =
        MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .deploy_manifest("Admin", &DeploySpec::default())
        .unwrap();
    let spec = DeploySpec {
        init_args: vec![json!("config:token.cap"), json!("address:Admin")],
        ..DeploySpec::default()
    };
    engine.deploy_manifest("Token", &spec).unwrap();

    let ContractEntry::Proxied(entry) = &m.contracts["Token"] else {
        panic!("proxied entry expected");
    };
    let ContractEntry::Simple(admin_addr) = &m.contracts["Admin"] else {
        panic!("simple entry expected");
    };
    assert_eq!(
        backend.storage_value(&entry.proxy, "init_args"),
        Some(json!(["5000000000000000000", admin_addr]))
    );
}

#[test]
fn legacy_proxy_uses_the_two_argument_constructor() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "", "Token": { "impl": "", "proxy": "" } } }"#,
    );
    let backend =
        MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 2)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.deploy_all(&[], &HashMap::new()).unwrap();

    let ContractEntry::Proxied(entry) = &m.contracts["Token"] else {
        panic!("proxied entry expected");
    };
    let ctor = backend.ctor_args(&entry.proxy).unwrap();
    assert_eq!(ctor.len(), 2);
    assert_eq!(ctor[0], json!(entry.implementation));
}

// A second run over a converged manifest issues zero
// deployment/transaction calls and leaves the document byte-for-byte intact.
#[test]
fn second_run_is_idempotent_and_byte_stable() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "", "Token": { "impl": "", "proxy": "" } } }"#,
    );
    let backend =
        MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);

    {
        let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
        engine.deploy_all(&[], &HashMap::new()).unwrap();
    }
    let txs_after_first = backend.tx_count();
    let bytes_after_first = std::fs::read(store.path()).unwrap();

    // a restarted run re-reads the manifest from the store
    let mut reloaded = store.load().unwrap();
    {
        let mut engine = Engine::new(&mut reloaded, &backend, &store, engine_config());
        engine.deploy_all(&[], &HashMap::new()).unwrap();
    }

    assert_eq!(backend.tx_count(), txs_after_first);
    assert_eq!(std::fs::read(store.path()).unwrap(), bytes_after_first);
}

// A populated simple entry never redeploys, whatever args are supplied.
#[test]
fn populated_simple_entry_never_redeploys() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Registry": "0xBEEF" } }"#);
    let backend = MockBackend::with_artifacts(&[("Registry", 2)]);
    backend.seed_contract("0xBEEF", "Registry");

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    let spec = DeploySpec {
        impl_args: vec![json!(1), json!("two")],
        ..DeploySpec::default()
    };
    let instance = engine.deploy_manifest("Registry", &spec).unwrap().unwrap();

    assert_eq!(instance.address(), "0xBEEF");
    assert_eq!(backend.deploy_count(), 0);
    assert_eq!(backend.tx_count(), 0);
    assert_eq!(m.contracts["Registry"], ContractEntry::Simple("0xBEEF".to_owned()));
}

#[test]
fn existing_proxy_missing_impl_records_and_upgrades() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "0xA1", "Token": { "impl": "", "proxy": "0xP1" } } }"#,
    );
    let backend = MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);
    backend.seed_contract("0xP1", "UpgradeProxy");
    backend.set_storage("0xP1", "admin", json!("0xA1"));

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .deploy_manifest("Token", &DeploySpec::default())
        .unwrap()
        .unwrap();

    let ContractEntry::Proxied(entry) = &m.contracts["Token"] else {
        panic!("proxied entry expected");
    };
    assert!(entry.has_implementation());
    assert_eq!(entry.proxy, "0xP1");
    // one deploy (the impl) and one upgrade
    assert_eq!(backend.deploy_count(), 1);
    assert_eq!(backend.tx_count(), 2);
    assert_eq!(
        backend.storage_value("0xP1", "implementation"),
        Some(json!(entry.implementation))
    );
    // the existing proxy is never re-initialized
    assert_eq!(backend.storage_value("0xP1", "initialized"), None);
}

// The engine compares the on-chain implementation before upgrading.
#[test]
fn converged_proxy_upgrades_only_on_implementation_drift() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "0xA1", "Token": { "impl": "0xNEW", "proxy": "0xP1" } } }"#,
    );
    let backend = MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);
    backend.seed_contract("0xP1", "UpgradeProxy");
    backend.set_storage("0xP1", "admin", json!("0xA1"));
    backend.set_storage("0xP1", "implementation", json!("0xOLD"));

    {
        let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
        engine
            .deploy_manifest("Token", &DeploySpec::default())
            .unwrap()
            .unwrap();
    }
    // impl address was recorded, so nothing was deployed, just the upgrade
    assert_eq!(backend.deploy_count(), 0);
    assert_eq!(backend.tx_count(), 1);
    assert_eq!(
        backend.storage_value("0xP1", "implementation"),
        Some(json!("0xNEW"))
    );

    // now the chain agrees (case differences don't count as drift)
    backend.set_storage("0xP1", "implementation", json!("0xnew"));
    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .deploy_manifest("Token", &DeploySpec::default())
        .unwrap()
        .unwrap();
    assert_eq!(backend.tx_count(), 1);
}

#[test]
fn admin_reconciliation_transfers_control() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Admin": "0xA1", "Token": { "impl": "0xI1", "proxy": "0xP1" } } }"#,
    );
    let backend = MockBackend::with_artifacts(&[("Admin", 0), ("Token", 0), ("UpgradeProxy", 3)]);
    backend.seed_contract("0xP1", "UpgradeProxy");
    backend.set_storage("0xP1", "admin", json!("0xINTRUDER"));
    backend.set_storage("0xP1", "implementation", json!("0xI1"));

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .deploy_manifest("Token", &DeploySpec::default())
        .unwrap()
        .unwrap();

    // exactly one transaction: the changeAdmin transfer
    assert_eq!(backend.tx_count(), 1);
    assert_eq!(backend.storage_value("0xP1", "admin"), Some(json!("0xA1")));
}

#[test]
fn missing_proxy_admin_entry_aborts_the_batch() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"{ "contracts": { "Token": { "impl": "", "proxy": "" }, "Late": "" } }"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0), ("UpgradeProxy", 3), ("Late", 0)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    let err = engine.deploy_all(&[], &HashMap::new()).unwrap_err();
    assert!(matches!(err, CoreError::ProxyAdminUnavailable(_)));

    // the batch stopped: the later entry was never reached
    assert!(!m.contracts["Late"].is_deployed());
}

#[test]
fn missing_artifact_skips_but_batch_continues() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Unbuilt": "", "Built": "" } }"#);
    let backend = MockBackend::with_artifacts(&[("Built", 0)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.deploy_all(&[], &HashMap::new()).unwrap();

    assert!(!m.contracts["Unbuilt"].is_deployed());
    assert!(m.contracts["Built"].is_deployed());
}

#[test]
fn libraries_bind_to_recorded_addresses() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Math": "0xM1", "Calc": "" } }"#);
    let backend = MockBackend::with_artifacts(&[("Math", 0), ("Calc", 0)]);
    backend.seed_contract("0xM1", "Math");

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    let spec = DeploySpec {
        libraries: vec![json!("Math")],
        ..DeploySpec::default()
    };
    let instance = engine.deploy_manifest("Calc", &spec).unwrap().unwrap();
    assert!(m.contracts["Calc"].is_deployed());
    assert_eq!(instance.artifact(), "Calc");
}

#[test]
fn unrecorded_library_address_is_an_error() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Math": "", "Calc": "" } }"#);
    let backend = MockBackend::with_artifacts(&[("Math", 0), ("Calc", 0)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    let spec = DeploySpec {
        libraries: vec![json!("Math")],
        ..DeploySpec::default()
    };
    let err = engine.deploy_manifest("Calc", &spec).unwrap_err();
    assert!(matches!(err, CoreError::LibraryUnresolved(_)));
}

// Grant only where unassigned, revoke only where assigned.
#[test]
fn roles_reconcile_to_desired_membership() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "roles": {
        "Token": {
            "MINTER_ROLE": ["0xAA", "0xBB"],
            "-BURNER_ROLE": ["0xCC"]
        }
    }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let minter = backend.hash_role_label("MINTER_ROLE");
    let burner = backend.hash_role_label("BURNER_ROLE");

    // pre-state: 0xBB already a minter, 0xCC still a burner
    backend
        .send(&token_instance(), "grantRole", &[json!(minter.as_str()), json!("0xBB")])
        .unwrap();
    backend
        .send(&token_instance(), "grantRole", &[json!(burner.as_str()), json!("0xCC")])
        .unwrap();
    let setup_txs = backend.tx_count();

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.grant_roles().unwrap();

    // one grant (0xAA) and one revoke (0xCC)
    assert_eq!(backend.tx_count() - setup_txs, 2);
    assert!(backend.has_role("0xT0", minter.as_str(), "0xAA"));
    assert!(backend.has_role("0xT0", minter.as_str(), "0xBB"));
    assert!(!backend.has_role("0xT0", burner.as_str(), "0xCC"));
}

// A second role pass over converged state issues zero transactions.
#[test]
fn second_role_pass_issues_no_transactions() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "roles": { "Token": { "MINTER_ROLE": ["0xAA"], "-BURNER_ROLE": ["0xCC"] } }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    {
        let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
        engine.grant_roles().unwrap();
    }
    let txs = backend.tx_count();

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.grant_roles().unwrap();
    assert_eq!(backend.tx_count(), txs);
}

#[test]
fn role_addresses_resolve_expressions_and_skip_empties() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Treasury": "0xE5", "Token": "0xT0" },
    "roles": { "Token": { "MINTER_ROLE": ["address:Treasury", "", "config:absent"] } }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.grant_roles().unwrap();

    let minter = backend.hash_role_label("MINTER_ROLE");
    assert!(backend.has_role("0xT0", minter.as_str(), "0xE5"));
    // only the resolved Treasury address produced a transaction
    assert_eq!(backend.tx_count(), 1);
}

#[test]
fn role_transaction_failure_propagates() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xNOPE" },
    "roles": { "Token": { "MINTER_ROLE": ["0xAA"] } }
}
"#,
    );
    // the recorded address has no contract behind it
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    assert!(matches!(
        engine.grant_roles(),
        Err(CoreError::Backend(_))
    ));
}

// Config values are set only when the on-chain value differs.
#[test]
fn config_sets_only_on_drift() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "config": { "token.maxSupply": "ether:1000000" }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let spec = ConfigSpec::Compact(vec!["maxSupply/getMaxSupply/setMaxSupply".to_owned()]);
    {
        let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
        engine.update_contract_config("Token", &spec).unwrap();
    }
    assert_eq!(backend.tx_count(), 1);
    assert_eq!(
        backend.storage_value("0xT0", "MaxSupply"),
        Some(json!("1000000000000000000000000"))
    );

    // chain now agrees, second pass is silent
    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.update_contract_config("Token", &spec).unwrap();
    assert_eq!(backend.tx_count(), 1);
}

#[test]
fn auto_config_discovers_prefixed_keys() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "config": {
        "token.maxSupply": "ether:1",
        "vault.fee": "10"
    }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");
    // the discovered getter is the MAX_SUPPLY constant accessor
    backend.set_storage("0xT0", "MAX_SUPPLY", json!("1000000000000000000"));

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .update_contract_config("Token", &ConfigSpec::default())
        .unwrap();

    // in sync, and the vault.* key was never touched
    assert_eq!(backend.tx_count(), 0);
}

#[test]
fn config_is_a_noop_for_undeployed_contracts() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Token": "" } }"#);
    let backend = MockBackend::new();

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .update_contract_config("Token", &ConfigSpec::default())
        .unwrap();
    engine
        .update_contract_config("Ghost", &ConfigSpec::default())
        .unwrap();
    assert_eq!(backend.tx_count(), 0);
}

#[test]
fn malformed_config_grammar_is_fatal_for_the_contract() {
    let (_dir, store) = test_store();
    let mut m = manifest(r#"{ "contracts": { "Token": "0xT0" } }"#);
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let spec = ConfigSpec::Compact(vec![
        "a/b/c/d".to_owned(),
        "maxSupply/getMaxSupply/setMaxSupply".to_owned(),
    ]);
    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    let err = engine.update_contract_config("Token", &spec).unwrap_err();
    assert!(matches!(err, CoreError::ConfigGrammar { .. }));
    // nothing from the list ran
    assert_eq!(backend.tx_count(), 0);
}

fn derived_items(_instance: &Instance) -> Vec<String> {
    vec!["cap/getCap/setCap".to_owned()]
}

#[test]
fn derived_config_specs_run_through_the_grammar() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "config": { "token.cap": "500" }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine
        .update_contract_config("Token", &ConfigSpec::Derived(derived_items))
        .unwrap();

    assert_eq!(backend.storage_value("0xT0", "Cap"), Some(json!("500")));
}

#[test]
fn explicit_items_bypass_the_grammar() {
    let (_dir, store) = test_store();
    let mut m = manifest(
        r#"
{
    "contracts": { "Token": "0xT0" },
    "config": { "limits.daily": "9000" }
}
"#,
    );
    let backend = MockBackend::with_artifacts(&[("Token", 0)]);
    backend.seed_contract("0xT0", "Token");

    let items = ConfigSpec::Items(vec![ConfigItem {
        key: "limits.daily".to_owned(),
        getter: "getDailyLimit".to_owned(),
        setter: "setDailyLimit".to_owned(),
    }]);
    let mut engine = Engine::new(&mut m, &backend, &store, engine_config());
    engine.update_contract_config("Token", &items).unwrap();

    assert_eq!(
        backend.storage_value("0xT0", "DailyLimit"),
        Some(json!("9000"))
    );
}
