//! Integration tests for ectss-deploy.
//!
//! Both orchestrators run against a recording chain double, so no node is needed.
//! Run with: cargo test --test integration_test

use std::collections::HashSet;

use ectss_deploy::{
    AddressStore, ArtifactRegistry, ArtifactSpec, ChainDeployer, ChainError, DeployFailure,
    DeployedArtifact, DeploymentOrchestrator, FsAddressStore, InMemoryAddressStore,
    InitializationOrchestrator, InitializationRule, LiteralValue, MethodSelector,
    NetworkAddressBook, RegistryError, RuleOutcome, StoreError,
    registry::{
        COMPARE_ECC, DATA_STORAGE, ELLIPTIC_CURVE_MATHS, SOURCE_SMART_CONTRACT,
        TARGET_SMART_CONTRACT, VERIFY_THRESHOLD_BOOK_KEY, VERIFY_THRESHOLD_ECDSA,
    },
};
use tempdir::TempDir;

const NETWORK: &str = "besu";

/// A chain call as seen by the double.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Link {
        target: String,
        library: String,
        address: String,
    },
    Deploy {
        artifact: String,
        inputs: Vec<LiteralValue>,
    },
    Setter {
        address: String,
        signature: String,
        args: Vec<String>,
    },
}

/// Records every call and hands out sequential addresses.
#[derive(Debug, Default)]
struct RecordingChain {
    calls: Vec<Call>,
    next_address: u64,
    fail_deploy_of: HashSet<String>,
    fail_setter_on: HashSet<String>,
}

impl RecordingChain {
    fn new() -> Self {
        Self::default()
    }

    /// Start numbering addresses at `offset + 1`.
    fn starting_at(offset: u64) -> Self {
        Self {
            next_address: offset,
            ..Self::default()
        }
    }

    fn failing_deploy(mut self, artifact: &str) -> Self {
        self.fail_deploy_of.insert(artifact.to_string());
        self
    }

    fn failing_setter(mut self, address: &str) -> Self {
        self.fail_setter_on.insert(address.to_string());
        self
    }

    fn deploys(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Deploy { artifact, .. } => Some(artifact.as_str()),
                _ => None,
            })
            .collect()
    }

    fn setters(&self) -> Vec<(&str, &[String])> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Setter { address, args, .. } => Some((address.as_str(), args.as_slice())),
                _ => None,
            })
            .collect()
    }
}

fn address(n: u64) -> String {
    format!("0x{n:040x}")
}

impl ChainDeployer for RecordingChain {
    async fn deploy_artifact(
        &mut self,
        spec: &ArtifactSpec,
        inputs: &[LiteralValue],
        _network: &str,
    ) -> Result<String, ChainError> {
        self.calls.push(Call::Deploy {
            artifact: spec.name.clone(),
            inputs: inputs.to_vec(),
        });

        if self.fail_deploy_of.contains(&spec.name) {
            return Err(ChainError::rpc("insufficient funds for gas * price + value"));
        }

        self.next_address += 1;
        Ok(address(self.next_address))
    }

    async fn link_library(
        &mut self,
        target: &ArtifactSpec,
        library: &str,
        library_address: &str,
    ) -> Result<(), ChainError> {
        self.calls.push(Call::Link {
            target: target.name.clone(),
            library: library.to_string(),
            address: library_address.to_string(),
        });
        Ok(())
    }

    async fn call_setter(
        &mut self,
        address: &str,
        method: &MethodSelector,
        args: &[String],
    ) -> Result<(), ChainError> {
        self.calls.push(Call::Setter {
            address: address.to_string(),
            signature: method.signature().to_string(),
            args: args.to_vec(),
        });

        if self.fail_setter_on.contains(address) {
            return Err(ChainError::rpc("execution reverted"));
        }
        Ok(())
    }
}

/// A store whose writes always fail.
#[derive(Debug, Default)]
struct ReadOnlyStore;

impl AddressStore for ReadOnlyStore {
    fn write(&self, book: &NetworkAddressBook) -> Result<(), StoreError> {
        Err(StoreError::Io {
            network: book.network().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn read(&self, network: &str) -> Result<NetworkAddressBook, StoreError> {
        Err(StoreError::NotFound {
            network: network.to_string(),
            location: "read-only://".into(),
        })
    }
}

fn book(entries: &[(&str, &str)]) -> NetworkAddressBook {
    let mut book = NetworkAddressBook::new(NETWORK);
    for (name, address) in entries {
        book.record(DeployedArtifact {
            name: name.to_string(),
            address: address.to_string(),
            network: NETWORK.to_string(),
        });
    }
    book
}

/// `A` and `B` with one rule calling `A.setPeer(B)`.
fn peer_registry() -> ArtifactRegistry {
    let mut registry = ArtifactRegistry::new();
    registry.register(ArtifactSpec::new("A")).unwrap();
    registry.register(ArtifactSpec::new("B")).unwrap();
    registry
        .add_rule(InitializationRule::new(
            "a-peer",
            "A",
            "setPeer(address)",
            ["B"],
        ))
        .unwrap();
    registry
}

#[tokio::test]
async fn test_standard_deployment_records_every_artifact() {
    let registry = ArtifactRegistry::standard();
    let store = InMemoryAddressStore::new();

    let mut orchestrator = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store);
    let book = orchestrator.deploy(NETWORK).await.expect("deployment failed");
    let chain = orchestrator.into_chain();

    assert_eq!(
        chain.deploys(),
        vec![
            DATA_STORAGE,
            SOURCE_SMART_CONTRACT,
            TARGET_SMART_CONTRACT,
            ELLIPTIC_CURVE_MATHS,
            VERIFY_THRESHOLD_ECDSA,
        ]
    );

    // Constructor references resolve to the addresses of this run.
    assert_eq!(
        chain.calls[1],
        Call::Deploy {
            artifact: SOURCE_SMART_CONTRACT.to_string(),
            inputs: vec![LiteralValue::Address(address(1))],
        }
    );

    // The library is linked right before its dependent is deployed.
    assert_eq!(
        &chain.calls[4..],
        &[
            Call::Link {
                target: VERIFY_THRESHOLD_ECDSA.to_string(),
                library: ELLIPTIC_CURVE_MATHS.to_string(),
                address: address(4),
            },
            Call::Deploy {
                artifact: VERIFY_THRESHOLD_ECDSA.to_string(),
                inputs: vec![
                    LiteralValue::Address(address(2)),
                    LiteralValue::Address(address(3)),
                ],
            },
        ]
    );

    let stored = store.read(NETWORK).expect("book not persisted");
    assert_eq!(stored, book);
    assert_eq!(stored.len(), 6);
    assert_eq!(stored.deployed().count(), 5);
    assert_eq!(stored.get(COMPARE_ECC), Some(&None));
    assert_eq!(stored.address(VERIFY_THRESHOLD_BOOK_KEY), Some(address(5).as_str()));
    assert!(!stored.contains_key(VERIFY_THRESHOLD_ECDSA));
}

#[tokio::test]
async fn test_failure_mid_sequence_persists_partial_book() {
    let registry = ArtifactRegistry::standard();
    let store = InMemoryAddressStore::new();
    let chain = RecordingChain::new().failing_deploy(TARGET_SMART_CONTRACT);

    let mut orchestrator = DeploymentOrchestrator::new(&registry, chain, &store);
    let err = orchestrator.deploy(NETWORK).await.unwrap_err();

    assert_eq!(err.network, NETWORK);
    assert_eq!(err.failed_artifact.as_deref(), Some(TARGET_SMART_CONTRACT));
    assert!(err.persisted);
    assert!(err.is_partial());
    assert!(matches!(err.cause, DeployFailure::Chain(_)));

    // No call after the failing one.
    assert_eq!(
        orchestrator.chain().deploys(),
        vec![DATA_STORAGE, SOURCE_SMART_CONTRACT, TARGET_SMART_CONTRACT]
    );

    let stored = store.read(NETWORK).unwrap();
    assert_eq!(stored.deployed().count(), 2);
    assert_eq!(stored.address(DATA_STORAGE), Some(address(1).as_str()));
    assert_eq!(stored.address(SOURCE_SMART_CONTRACT), Some(address(2).as_str()));
    assert_eq!(stored.address(TARGET_SMART_CONTRACT), None);
}

#[tokio::test]
async fn test_redeploy_replaces_book() {
    let registry = ArtifactRegistry::standard();
    let store = InMemoryAddressStore::new();

    DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store)
        .deploy(NETWORK)
        .await
        .unwrap();
    let second = DeploymentOrchestrator::new(&registry, RecordingChain::starting_at(100), &store)
        .deploy(NETWORK)
        .await
        .unwrap();

    assert_eq!(store.write_count(NETWORK), 2);
    assert_eq!(store.read(NETWORK).unwrap(), second);
    assert_eq!(second.address(DATA_STORAGE), Some(address(101).as_str()));
}

#[tokio::test]
async fn test_references_ignore_previous_book() {
    let registry = ArtifactRegistry::standard();
    let store = InMemoryAddressStore::new();
    let stale = address(0xdead);
    store.write(&book(&[(DATA_STORAGE, stale.as_str())])).unwrap();

    let mut orchestrator = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store);
    orchestrator.deploy(NETWORK).await.unwrap();

    let chain = orchestrator.into_chain();
    let Call::Deploy { inputs, .. } = &chain.calls[1] else {
        panic!("expected a deploy call, got {:?}", chain.calls[1]);
    };
    assert_eq!(inputs, &vec![LiteralValue::Address(address(1))]);
    assert_ne!(store.read(NETWORK).unwrap().address(DATA_STORAGE), Some(stale.as_str()));
}

#[tokio::test]
async fn test_cycle_fails_before_any_chain_call() {
    let mut registry = ArtifactRegistry::new();
    registry
        .register(ArtifactSpec::new("A").with_reference("B"))
        .unwrap();
    registry
        .register(ArtifactSpec::new("B").with_reference("A"))
        .unwrap();
    let store = InMemoryAddressStore::new();

    let mut orchestrator = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store);
    let err = orchestrator.deploy(NETWORK).await.unwrap_err();

    assert!(matches!(
        &err.cause,
        DeployFailure::Registry(RegistryError::CyclicDependency { cycle }) if cycle.len() == 3
    ));
    assert_eq!(err.failed_artifact, None);
    assert!(!err.persisted);
    assert!(orchestrator.chain().calls.is_empty());
    assert_eq!(store.write_count(NETWORK), 0);
}

#[tokio::test]
async fn test_store_failures_are_reported() {
    let registry = ArtifactRegistry::standard();

    // Successful sequence, failing write.
    let err = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &ReadOnlyStore)
        .deploy(NETWORK)
        .await
        .unwrap_err();
    assert!(err.is_store_failure());
    assert_eq!(err.failed_artifact, None);

    // Chain failure wins over the failing best-effort write.
    let chain = RecordingChain::new().failing_deploy(DATA_STORAGE);
    let err = DeploymentOrchestrator::new(&registry, chain, &ReadOnlyStore)
        .deploy(NETWORK)
        .await
        .unwrap_err();
    assert!(matches!(err.cause, DeployFailure::Chain(_)));
    assert_eq!(err.failed_artifact.as_deref(), Some(DATA_STORAGE));
    assert!(!err.persisted);
}

#[tokio::test]
async fn test_initialize_calls_setter_once() {
    let registry = peer_registry();
    let store = InMemoryAddressStore::new();
    store.write(&book(&[("A", "0xA"), ("B", "0xB")])).unwrap();

    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.rules.len(), 1);
    assert_eq!(report.rules[0].rule_id, "a-peer");
    assert_eq!(
        orchestrator.chain().calls,
        vec![Call::Setter {
            address: "0xA".to_string(),
            signature: "setPeer(address)".to_string(),
            args: vec!["0xB".to_string()],
        }]
    );
}

#[tokio::test]
async fn test_initialize_passes_arguments_in_order() {
    let mut registry = ArtifactRegistry::new();
    for name in ["A", "B", "C"] {
        registry.register(ArtifactSpec::new(name)).unwrap();
    }
    registry
        .add_rule(InitializationRule::new(
            "c-pair",
            "C",
            "setPair(address,address)",
            ["A", "B"],
        ))
        .unwrap();

    let store = InMemoryAddressStore::new();
    store
        .write(&book(&[("A", "0xA"), ("B", "0xB"), ("C", "0xC")]))
        .unwrap();

    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();
    assert!(report.is_success());

    let expected = vec!["0xA".to_string(), "0xB".to_string()];
    assert_eq!(
        orchestrator.chain().setters(),
        vec![("0xC", expected.as_slice())]
    );

    // Without B the rule is skipped and nothing reaches the chain.
    store.write(&book(&[("A", "0xA"), ("C", "0xC")])).unwrap();
    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();

    assert_eq!(
        report.rules[0].outcome,
        RuleOutcome::SkippedMissingReference {
            missing: "B".to_string()
        }
    );
    assert!(orchestrator.chain().calls.is_empty());
}

#[tokio::test]
async fn test_initialize_skips_missing_reference() {
    let registry = peer_registry();
    let store = InMemoryAddressStore::new();
    store.write(&book(&[("A", "0xA")])).unwrap();

    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.rules[0].outcome,
        RuleOutcome::SkippedMissingReference {
            missing: "B".to_string()
        }
    );
    assert!(orchestrator.chain().calls.is_empty());
}

#[tokio::test]
async fn test_initialize_treats_reserved_entry_as_missing() {
    let mut registry = ArtifactRegistry::new();
    registry.register(ArtifactSpec::new("A")).unwrap();
    registry.reserve("Optional").unwrap();
    registry
        .add_rule(InitializationRule::new(
            "a-optional",
            "A",
            "setOptional(address)",
            ["Optional"],
        ))
        .unwrap();

    let mut stored = book(&[("A", "0xA")]);
    stored.reserve("Optional");
    let store = InMemoryAddressStore::new();
    store.write(&stored).unwrap();

    let report = InitializationOrchestrator::new(&registry, RecordingChain::new(), &store)
        .initialize(NETWORK)
        .await
        .unwrap();

    assert_eq!(
        report.rules[0].outcome,
        RuleOutcome::SkippedMissingReference {
            missing: "Optional".to_string()
        }
    );
}

#[tokio::test]
async fn test_initialize_isolates_chain_errors() {
    let mut registry = ArtifactRegistry::new();
    for name in ["A", "B", "C"] {
        registry.register(ArtifactSpec::new(name)).unwrap();
    }
    registry
        .add_rule(InitializationRule::new("a-peer", "A", "setPeer(address)", ["C"]))
        .unwrap();
    registry
        .add_rule(InitializationRule::new("b-peer", "B", "setPeer(address)", ["C"]))
        .unwrap();

    let store = InMemoryAddressStore::new();
    store
        .write(&book(&[("A", "0xA"), ("B", "0xB"), ("C", "0xC")]))
        .unwrap();

    let chain = RecordingChain::new().failing_setter("0xA");
    let mut orchestrator = InitializationOrchestrator::new(&registry, chain, &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();

    assert!(matches!(
        &report.rules[0].outcome,
        RuleOutcome::ChainError { message } if message.contains("execution reverted")
    ));
    assert_eq!(report.rules[1].outcome, RuleOutcome::Success);
    assert_eq!(
        report.failures().map(|rule| rule.rule_id.as_str()).collect::<Vec<_>>(),
        vec!["a-peer"]
    );
    assert_eq!(orchestrator.chain().setters().len(), 2);
}

#[tokio::test]
async fn test_initialize_without_book_fails() {
    let registry = peer_registry();
    let store = InMemoryAddressStore::new();

    let err = InitializationOrchestrator::new(&registry, RecordingChain::new(), &store)
        .initialize(NETWORK)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_initialize_reapplies_every_run() {
    let registry = peer_registry();
    let store = InMemoryAddressStore::new();
    store.write(&book(&[("A", "0xA"), ("B", "0xB")])).unwrap();

    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    orchestrator.initialize(NETWORK).await.unwrap();
    orchestrator.initialize(NETWORK).await.unwrap();

    assert_eq!(orchestrator.chain().setters().len(), 2);
}

#[tokio::test]
async fn test_deploy_then_initialize_on_disk() {
    let temp_dir = TempDir::new("ectss-integration").expect("Failed to create temp dir");
    let store = FsAddressStore::new(temp_dir.path().join("contractAddresses"));
    let registry = ArtifactRegistry::standard();

    let book = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store)
        .deploy(NETWORK)
        .await
        .expect("deployment failed");
    assert!(
        temp_dir
            .path()
            .join("contractAddresses")
            .join(NETWORK)
            .join("addresses.json")
            .exists()
    );

    let mut orchestrator =
        InitializationOrchestrator::new(&registry, RecordingChain::new(), &store);
    let report = orchestrator.initialize(NETWORK).await.unwrap();
    assert!(report.is_success());

    let verifier = vec![book.address(VERIFY_THRESHOLD_BOOK_KEY).unwrap().to_string()];
    assert_eq!(
        orchestrator.chain().setters(),
        vec![
            (
                book.address(SOURCE_SMART_CONTRACT).unwrap(),
                verifier.as_slice()
            ),
            (
                book.address(TARGET_SMART_CONTRACT).unwrap(),
                verifier.as_slice()
            ),
        ]
    );
}

#[tokio::test]
async fn test_persisted_book_uses_reader_keys() {
    let temp_dir = TempDir::new("ectss-integration").expect("Failed to create temp dir");
    let store = FsAddressStore::new(temp_dir.path());
    let registry = ArtifactRegistry::standard();

    DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store)
        .deploy(NETWORK)
        .await
        .expect("deployment failed");

    let raw = std::fs::read_to_string(temp_dir.path().join(NETWORK).join("addresses.json"))
        .expect("book not written");
    let content: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw).expect("book is not a JSON object");

    let keys: Vec<&str> = content.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            COMPARE_ECC,
            DATA_STORAGE,
            ELLIPTIC_CURVE_MATHS,
            SOURCE_SMART_CONTRACT,
            TARGET_SMART_CONTRACT,
            VERIFY_THRESHOLD_BOOK_KEY,
        ]
    );
    assert_eq!(content[VERIFY_THRESHOLD_BOOK_KEY], address(5));
    assert!(content[COMPARE_ECC].is_null());

    // Reading the book back keeps the same keys.
    let book = store.read(NETWORK).unwrap();
    assert_eq!(book.address(VERIFY_THRESHOLD_BOOK_KEY), Some(address(5).as_str()));
}

#[tokio::test]
async fn test_networks_deploy_independently() {
    let temp_dir = TempDir::new("ectss-integration").expect("Failed to create temp dir");
    let store = FsAddressStore::new(temp_dir.path());
    let registry = ArtifactRegistry::standard();

    let mut besu = DeploymentOrchestrator::new(&registry, RecordingChain::new(), &store);
    let mut amoy = DeploymentOrchestrator::new(
        &registry,
        RecordingChain::new().failing_deploy(VERIFY_THRESHOLD_ECDSA),
        &store,
    );
    let (besu_result, amoy_result) = tokio::join!(besu.deploy("besu"), amoy.deploy("amoy"));

    assert!(besu_result.is_ok());
    assert!(amoy_result.is_err());
    assert_eq!(store.read("besu").unwrap().deployed().count(), 5);
    assert_eq!(store.read("amoy").unwrap().deployed().count(), 4);
}
