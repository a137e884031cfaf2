//! Post-deployment wiring: setter calls that connect deployed artifacts.
//!
//! Runs against the persisted address book only, never against the in-memory
//! state of a deployment run. Each rule is attempted independently and every
//! run reapplies every rule.

use std::time::Instant;

use crate::{
    chain::{ChainDeployer, MethodSelector},
    error::StoreError,
    registry::ArtifactRegistry,
    store::{AddressStore, NetworkAddressBook},
};

/// A setter call on a deployed artifact whose arguments are the addresses of
/// other deployed artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationRule {
    pub id: String,
    /// Artifact the setter is called on.
    pub artifact: String,
    /// Function signature, e.g. `setVerifierSC(address)`.
    pub setter: String,
    /// Artifact names whose addresses are passed as arguments, in order.
    pub args: Vec<String>,
}

impl InitializationRule {
    pub fn new(
        id: impl Into<String>,
        artifact: impl Into<String>,
        setter: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            artifact: artifact.into(),
            setter: setter.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Target and argument names, target first.
    fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.artifact.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

/// What happened to one rule.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RuleOutcome {
    Success,
    /// The named artifact has no address in the book. No call was made.
    SkippedMissingReference { missing: String },
    ChainError { message: String },
}

impl RuleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Human readable detail for reports.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::SkippedMissingReference { missing } => Some(missing),
            Self::ChainError { message } => Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule_id: String,
    pub artifact: String,
    pub outcome: RuleOutcome,
}

/// Per-rule outcomes of one initialization run, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationReport {
    pub network: String,
    pub rules: Vec<RuleReport>,
}

impl InitializationReport {
    /// True when every rule succeeded.
    pub fn is_success(&self) -> bool {
        self.rules.iter().all(|rule| rule.outcome.is_success())
    }

    /// Rules that were skipped or failed on chain.
    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|rule| !rule.outcome.is_success())
    }
}

/// Applies a registry's initialization rules to the deployed artifacts of a network.
pub struct InitializationOrchestrator<'a, C, S> {
    registry: &'a ArtifactRegistry,
    chain: C,
    store: &'a S,
}

impl<'a, C: ChainDeployer, S: AddressStore> InitializationOrchestrator<'a, C, S> {
    pub fn new(registry: &'a ArtifactRegistry, chain: C, store: &'a S) -> Self {
        Self {
            registry,
            chain,
            store,
        }
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn into_chain(self) -> C {
        self.chain
    }

    /// Read the book for `network` and apply every rule in registration order.
    ///
    /// Only an unreadable book fails the whole run. Rule failures are reported
    /// per rule and never stop later rules.
    pub async fn initialize(&mut self, network: &str) -> Result<InitializationReport, StoreError> {
        let start = Instant::now();
        let book = self.store.read(network)?;

        tracing::info!(
            network,
            rules = self.registry.initialization_rules().len(),
            "Initializing deployed artifacts"
        );

        let mut rules = Vec::with_capacity(self.registry.initialization_rules().len());
        for rule in self.registry.initialization_rules() {
            let outcome = self.apply(network, &book, rule).await;
            rules.push(RuleReport {
                rule_id: rule.id.clone(),
                artifact: rule.artifact.clone(),
                outcome,
            });
        }

        let report = InitializationReport {
            network: network.to_string(),
            rules,
        };

        tracing::info!(
            network,
            succeeded = report.rules.len() - report.failures().count(),
            failed = report.failures().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Initialization finished"
        );

        Ok(report)
    }

    async fn apply(
        &mut self,
        network: &str,
        book: &NetworkAddressBook,
        rule: &InitializationRule,
    ) -> RuleOutcome {
        let resolved: Result<Vec<&str>, &str> = rule
            .references()
            .map(|name| book.address(self.registry.book_key(name)).ok_or(name))
            .collect();
        let addresses = match resolved {
            Ok(addresses) => addresses,
            Err(missing) => {
                tracing::warn!(
                    network,
                    rule = %rule.id,
                    missing,
                    "Skipping rule, referenced artifact has no address"
                );
                return RuleOutcome::SkippedMissingReference {
                    missing: missing.to_string(),
                };
            }
        };
        let Some((target, args)) = addresses.split_first() else {
            return RuleOutcome::SkippedMissingReference {
                missing: rule.artifact.clone(),
            };
        };
        let args: Vec<String> = args.iter().map(|address| address.to_string()).collect();

        let method = match MethodSelector::parse(&rule.setter) {
            Ok(method) => method,
            Err(e) => {
                return RuleOutcome::ChainError {
                    message: e.to_string(),
                };
            }
        };

        match self.chain.call_setter(target, &method, &args).await {
            Ok(()) => {
                tracing::info!(
                    network,
                    rule = %rule.id,
                    artifact = %rule.artifact,
                    setter = %method.signature(),
                    "Rule applied"
                );
                RuleOutcome::Success
            }
            Err(e) => {
                tracing::warn!(network, rule = %rule.id, error = %e, "Rule failed");
                RuleOutcome::ChainError {
                    message: e.to_string(),
                }
            }
        }
    }
}
