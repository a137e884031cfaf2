//! ectss-deploy - Deployment library for the threshold ECDSA verification contracts.
//!
//! This crate deploys a registry of contract artifacts to an EVM network in
//! dependency order, records their addresses per network, and wires the
//! deployed contracts together in a second initialization pass.

pub mod chain;
pub mod config;
mod deploy;
pub mod error;
mod initialize;
pub mod registry;
pub mod store;

pub use chain::{ChainDeployer, DeployedArtifact, MethodSelector, RpcChainDeployer};
pub use config::{CONFIG_FILENAME, DeployConfig, NetworkProfile};
pub use deploy::DeploymentOrchestrator;
pub use error::{
    ChainError, ChainErrorKind, DeployFailure, DeploymentError, RegistryError, StoreError,
};
pub use initialize::{
    InitializationOrchestrator, InitializationReport, InitializationRule, RuleOutcome, RuleReport,
};
pub use registry::{ArtifactRegistry, ArtifactSpec, ConstructorInput, LiteralValue};
pub use store::{AddressStore, FsAddressStore, InMemoryAddressStore, NetworkAddressBook};
