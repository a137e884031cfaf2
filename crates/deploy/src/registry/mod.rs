//! Static description of the deployable artifacts and how they depend on each other.
//!
//! Two kinds of dependency edges exist:
//! - an artifact reference in a constructor input (the referenced artifact's
//!   address is passed to the constructor),
//! - a link dependency (a library whose address is bound into the bytecode
//!   before the dependent is deployed).
//!
//! Both are folded into one graph and resolved with a stable topological sort,
//! see [`ArtifactRegistry::resolve_deploy_order`].

mod graph;

use std::collections::HashSet;

use crate::{chain::MethodSelector, error::RegistryError, initialize::InitializationRule};

use graph::DependencyGraph;

/// Shared storage for the verified transaction data.
pub const DATA_STORAGE: &str = "DataStorage";
/// Contract on the source side of a cross-chain transfer.
pub const SOURCE_SMART_CONTRACT: &str = "SourceSmartContract";
/// Contract on the target side of a cross-chain transfer.
pub const TARGET_SMART_CONTRACT: &str = "TargetSmartContract";
/// Elliptic curve arithmetic library linked into the verifier.
pub const ELLIPTIC_CURVE_MATHS: &str = "EllipticCurveMaths";
/// Threshold ECDSA signature verifier.
pub const VERIFY_THRESHOLD_ECDSA: &str = "VerifyThresholdECDSA";
/// Address book key of the verifier, read under this name by off-chain tooling.
pub const VERIFY_THRESHOLD_BOOK_KEY: &str = "VerifyThreshold";
/// Curve comparison benchmark contract, reserved in the book but not deployed.
pub const COMPARE_ECC: &str = "CompareECC";

/// A constant constructor argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    /// A `0x`-prefixed 20-byte address.
    Address(String),
    Uint(u128),
    Bool(bool),
}

/// One constructor argument of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorInput {
    Literal(LiteralValue),
    /// Replaced by the address the named artifact received earlier in the same run.
    ArtifactRef(String),
}

/// Description of a deployable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// Unique name, also the artifact file name.
    pub name: String,
    /// Key in the address book when it differs from `name`.
    pub book_key: Option<String>,
    pub constructor_inputs: Vec<ConstructorInput>,
    /// Libraries that must be deployed and linked before this artifact.
    pub link_dependencies: Vec<String>,
    pub requires_linkage: bool,
}

impl ArtifactSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            book_key: None,
            constructor_inputs: Vec::new(),
            link_dependencies: Vec::new(),
            requires_linkage: false,
        }
    }

    /// Record the deployed address under `key` instead of the artifact name.
    pub fn recorded_as(mut self, key: impl Into<String>) -> Self {
        self.book_key = Some(key.into());
        self
    }

    /// Key under which the deployed address is recorded.
    pub fn book_key(&self) -> &str {
        self.book_key.as_deref().unwrap_or(&self.name)
    }

    /// Append a constructor argument taking the address of another artifact.
    pub fn with_reference(mut self, artifact: impl Into<String>) -> Self {
        self.constructor_inputs
            .push(ConstructorInput::ArtifactRef(artifact.into()));
        self
    }

    /// Append a constant constructor argument.
    pub fn with_literal(mut self, value: LiteralValue) -> Self {
        self.constructor_inputs.push(ConstructorInput::Literal(value));
        self
    }

    /// Require `library` to be linked into this artifact before deployment.
    pub fn linked_against(mut self, library: impl Into<String>) -> Self {
        self.link_dependencies.push(library.into());
        self.requires_linkage = true;
        self
    }

    /// Names of every artifact that must precede this one.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let references = self.constructor_inputs.iter().filter_map(|input| match input {
            ConstructorInput::ArtifactRef(name) => Some(name.as_str()),
            ConstructorInput::Literal(_) => None,
        });
        self.link_dependencies
            .iter()
            .map(String::as_str)
            .chain(references)
    }
}

/// Registered artifacts, reserved book entries and post-deploy wiring rules,
/// all kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<ArtifactSpec>,
    reserved: Vec<String>,
    rules: Vec<InitializationRule>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for the threshold ECDSA verification contracts.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        let artifacts = [
            ArtifactSpec::new(DATA_STORAGE),
            ArtifactSpec::new(SOURCE_SMART_CONTRACT).with_reference(DATA_STORAGE),
            ArtifactSpec::new(TARGET_SMART_CONTRACT).with_reference(DATA_STORAGE),
            ArtifactSpec::new(ELLIPTIC_CURVE_MATHS),
            ArtifactSpec::new(VERIFY_THRESHOLD_ECDSA)
                .recorded_as(VERIFY_THRESHOLD_BOOK_KEY)
                .linked_against(ELLIPTIC_CURVE_MATHS)
                .with_reference(SOURCE_SMART_CONTRACT)
                .with_reference(TARGET_SMART_CONTRACT),
        ];
        let rules = [
            InitializationRule::new(
                "source-verifier",
                SOURCE_SMART_CONTRACT,
                "setVerifierSC(address)",
                [VERIFY_THRESHOLD_ECDSA],
            ),
            InitializationRule::new(
                "target-verifier",
                TARGET_SMART_CONTRACT,
                "setVerifierSC(address)",
                [VERIFY_THRESHOLD_ECDSA],
            ),
        ];

        registry.artifacts.extend(artifacts);
        registry.reserved.push(COMPARE_ECC.to_string());
        registry.rules.extend(rules);

        registry
    }

    /// Register an artifact. Names and book keys must be unique across artifacts
    /// and reserved entries.
    pub fn register(&mut self, spec: ArtifactSpec) -> Result<(), RegistryError> {
        self.ensure_unused(&spec.name)?;
        if spec.book_key() != spec.name {
            self.ensure_unused(spec.book_key())?;
        }
        self.artifacts.push(spec);
        Ok(())
    }

    /// Reserve a book entry for an optional artifact that this registry does not deploy.
    ///
    /// Reserved entries are persisted as `null` and never resolve as references.
    pub fn reserve(&mut self, name: impl Into<String>) -> Result<(), RegistryError> {
        let name = name.into();
        self.ensure_unused(&name)?;
        self.reserved.push(name);
        Ok(())
    }

    /// Add a post-deploy wiring rule. Rules run in the order they are added.
    pub fn add_rule(&mut self, rule: InitializationRule) -> Result<(), RegistryError> {
        if self.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(RegistryError::InvalidSetter {
                rule: rule.id,
                reason: "duplicate rule id".to_string(),
            });
        }

        let selector =
            MethodSelector::parse(&rule.setter).map_err(|e| RegistryError::InvalidSetter {
                rule: rule.id.clone(),
                reason: e.message,
            })?;
        if selector.arity() != rule.args.len() {
            return Err(RegistryError::InvalidSetter {
                reason: format!(
                    "`{}` takes {} arguments but {} are wired",
                    rule.setter,
                    selector.arity(),
                    rule.args.len()
                ),
                rule: rule.id,
            });
        }

        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|spec| spec.name == name)
    }

    /// Book key of the named artifact. Reserved and unknown names are their own key.
    pub fn book_key<'s>(&'s self, name: &'s str) -> &'s str {
        self.get(name).map_or(name, ArtifactSpec::book_key)
    }

    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    pub fn reserved_entries(&self) -> &[String] {
        &self.reserved
    }

    pub fn initialization_rules(&self) -> &[InitializationRule] {
        &self.rules
    }

    /// Order the artifacts so that every library and every constructor-referenced
    /// artifact comes before its dependents.
    ///
    /// Artifacts with no ordering constraint between them keep their
    /// registration order.
    pub fn resolve_deploy_order(&self) -> Result<Vec<&ArtifactSpec>, RegistryError> {
        let graph = DependencyGraph::build(&self.artifacts)?;
        let order = graph.topological_order()?;
        Ok(order.into_iter().map(|i| &self.artifacts[i]).collect())
    }

    fn ensure_unused(&self, name: &str) -> Result<(), RegistryError> {
        let taken: HashSet<&str> = self
            .artifacts
            .iter()
            .flat_map(|spec| [spec.name.as_str(), spec.book_key()])
            .chain(self.reserved.iter().map(String::as_str))
            .collect();

        if taken.contains(name) {
            return Err(RegistryError::DuplicateArtifact(name.to_string()));
        }
        Ok(())
    }
}
