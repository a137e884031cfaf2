//! Boundary to the chain: deploying artifacts, linking libraries and calling setters.
//!
//! The orchestrators only see the [`ChainDeployer`] trait. [`RpcChainDeployer`]
//! implements it over Ethereum JSON-RPC with node-side signing.

pub mod abi;
pub mod artifact;
pub mod rpc;

use std::future::Future;

pub use abi::MethodSelector;
pub use rpc::RpcChainDeployer;

use crate::{
    error::ChainError,
    registry::{ArtifactSpec, LiteralValue},
};

/// An artifact deployed by a successful deploy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedArtifact {
    /// Address book key, see [`ArtifactSpec::book_key`](crate::registry::ArtifactSpec::book_key).
    pub name: String,
    pub address: String,
    pub network: String,
}

/// Chain operations the orchestrators depend on.
///
/// Calls are awaited one at a time per network; implementations own their
/// timeout and retry policy.
pub trait ChainDeployer: Send {
    /// Deploy `spec` with fully resolved constructor inputs, returning its address.
    fn deploy_artifact(
        &mut self,
        spec: &ArtifactSpec,
        inputs: &[LiteralValue],
        network: &str,
    ) -> impl Future<Output = Result<String, ChainError>> + Send;

    /// Bind a deployed library's address into `target`'s bytecode.
    fn link_library(
        &mut self,
        target: &ArtifactSpec,
        library: &str,
        library_address: &str,
    ) -> impl Future<Output = Result<(), ChainError>> + Send;

    /// Invoke a setter on a deployed artifact with address arguments.
    fn call_setter(
        &mut self,
        address: &str,
        method: &MethodSelector,
        args: &[String],
    ) -> impl Future<Output = Result<(), ChainError>> + Send;
}
