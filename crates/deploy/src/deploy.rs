//! Dependency-ordered deployment of a registry to one network.

use std::time::Instant;

use crate::{
    chain::{ChainDeployer, DeployedArtifact},
    error::{DeployFailure, DeploymentError},
    registry::{ArtifactRegistry, ArtifactSpec, ConstructorInput, LiteralValue},
    store::{AddressStore, NetworkAddressBook},
};

/// Deploys every artifact of a registry in dependency order, links libraries
/// before their dependents, and persists the resulting address book.
///
/// Constructor references and library links only ever resolve against
/// addresses produced earlier in the same run, never against a previously
/// stored book.
pub struct DeploymentOrchestrator<'a, C, S> {
    registry: &'a ArtifactRegistry,
    chain: C,
    store: &'a S,
}

impl<'a, C: ChainDeployer, S: AddressStore> DeploymentOrchestrator<'a, C, S> {
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

    /// Deploy the whole registry to `network`.
    ///
    /// The first chain failure aborts the remaining sequence. The partial book
    /// is still written on a best-effort basis; `persisted` on the returned
    /// error tells whether that write went through. A registry error is
    /// detected before any chain call and leaves the store untouched.
    pub async fn deploy(&mut self, network: &str) -> Result<NetworkAddressBook, DeploymentError> {
        let start = Instant::now();

        let registry = self.registry;
        let order = registry
            .resolve_deploy_order()
            .map_err(|e| DeploymentError::new(network, None, e.into(), false))?;

        tracing::info!(
            network,
            artifacts = order.len(),
            order = %order.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>().join(", "),
            "Starting deployment"
        );

        let mut book = NetworkAddressBook::new(network);
        for name in registry.reserved_entries() {
            book.reserve(name.clone());
        }

        for spec in order {
            if let Err(cause) = self.deploy_one(network, spec, &mut book).await {
                tracing::error!(
                    network,
                    artifact = %spec.name,
                    error = %cause,
                    "Deployment aborted"
                );

                let persisted = match self.store.write(&book) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            network,
                            error = %e,
                            "Failed to persist partial address book"
                        );
                        false
                    }
                };

                return Err(DeploymentError::new(
                    network,
                    Some(spec.name.clone()),
                    cause,
                    persisted,
                ));
            }
        }

        self.store
            .write(&book)
            .map_err(|e| DeploymentError::new(network, None, e.into(), false))?;

        tracing::info!(
            network,
            deployed = book.deployed().count(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Deployment complete"
        );

        Ok(book)
    }

    async fn deploy_one(
        &mut self,
        network: &str,
        spec: &ArtifactSpec,
        book: &mut NetworkAddressBook,
    ) -> Result<(), DeployFailure> {
        if spec.requires_linkage {
            for library in &spec.link_dependencies {
                let library_address = book
                    .address(self.registry.book_key(library))
                    .ok_or_else(|| DeployFailure::UnlinkedLibrary {
                        library: library.clone(),
                    })?;

                self.chain
                    .link_library(spec, library, library_address)
                    .await?;

                tracing::info!(
                    network,
                    artifact = %spec.name,
                    library = %library,
                    address = %library_address,
                    "Library linked"
                );
            }
        }

        let inputs = resolve_inputs(self.registry, spec, book)?;
        let address = self.chain.deploy_artifact(spec, &inputs, network).await?;

        tracing::info!(network, artifact = %spec.name, address = %address, "Artifact deployed");

        book.record(DeployedArtifact {
            name: spec.book_key().to_string(),
            address,
            network: network.to_string(),
        });
        Ok(())
    }
}

/// Replace artifact references with the addresses recorded in this run.
fn resolve_inputs(
    registry: &ArtifactRegistry,
    spec: &ArtifactSpec,
    book: &NetworkAddressBook,
) -> Result<Vec<LiteralValue>, DeployFailure> {
    spec.constructor_inputs
        .iter()
        .map(|input| match input {
            ConstructorInput::Literal(value) => Ok(value.clone()),
            ConstructorInput::ArtifactRef(name) => book
                .address(registry.book_key(name))
                .map(|address| LiteralValue::Address(address.to_string()))
                .ok_or_else(|| DeployFailure::UnresolvedReference(name.clone())),
        })
        .collect()
}
