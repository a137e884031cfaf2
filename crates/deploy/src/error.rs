//! Error types shared by the registry, the chain boundary, the address store
//! and both orchestrators.

use std::path::PathBuf;

/// Configuration errors in the artifact registry. These are fatal and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("artifact `{0}` is registered twice")]
    DuplicateArtifact(String),

    #[error("artifact `{artifact}` depends on unknown artifact `{dependency}`")]
    UnknownDependency { artifact: String, dependency: String },

    #[error("dependency cycle between artifacts: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("initialization rule `{rule}` has an invalid setter: {reason}")]
    InvalidSetter { rule: String, reason: String },
}

/// Broad classification of a chain failure, used for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ChainErrorKind {
    /// The endpoint could not be reached or answered with garbage.
    Transport,
    /// The endpoint answered with a JSON-RPC error object.
    Rpc,
    /// The transaction was mined but reverted.
    Reverted,
    /// A compiled artifact is missing, malformed or not fully linked.
    Artifact,
    /// Arguments could not be ABI-encoded.
    Encoding,
    /// No receipt within the configured window.
    Timeout,
}

/// A failed deploy, link or setter call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct ChainError {
    pub kind: ChainErrorKind,
    pub message: String,
}

impl ChainError {
    pub fn new(kind: ChainErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Transport, message)
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Rpc, message)
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Artifact, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ChainErrorKind::Encoding, message)
    }
}

/// Failures of the per-network address book.
///
/// A missing or unreadable book is always surfaced, never replaced by an empty one.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no address book for network `{network}` at {}", .location.display())]
    NotFound { network: String, location: PathBuf },

    #[error("address book for network `{network}` is corrupt: {reason}")]
    CorruptData { network: String, reason: String },

    #[error("invalid network identifier `{0}`")]
    InvalidNetwork(String),

    #[error("failed to access address book for network `{network}`")]
    Io {
        network: String,
        #[source]
        source: std::io::Error,
    },
}

/// The underlying reason a deployment run stopped.
#[derive(Debug, thiserror::Error)]
pub enum DeployFailure {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("library `{library}` has no recorded address in this run")]
    UnlinkedLibrary { library: String },

    #[error("constructor input references `{0}`, which has not been deployed in this run")]
    UnresolvedReference(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A deployment run that did not complete.
///
/// `failed_artifact` is `None` when the run failed before or after the deploy
/// sequence (registry misconfiguration, final store write).
#[derive(Debug, thiserror::Error)]
#[error(
    "deployment to `{network}` failed{}",
    .failed_artifact.as_deref().map(|a| format!(" at artifact `{a}`")).unwrap_or_default()
)]
pub struct DeploymentError {
    pub network: String,
    pub failed_artifact: Option<String>,
    #[source]
    pub cause: DeployFailure,
    /// Whether the partial address book reached the store.
    pub persisted: bool,
}

impl DeploymentError {
    pub(crate) fn new(
        network: &str,
        failed_artifact: Option<String>,
        cause: DeployFailure,
        persisted: bool,
    ) -> Self {
        Self {
            network: network.to_string(),
            failed_artifact,
            cause,
            persisted,
        }
    }

    /// True when the run aborted part-way through the artifact sequence.
    pub fn is_partial(&self) -> bool {
        self.failed_artifact.is_some()
    }

    /// True when the failure came from the address store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self.cause, DeployFailure::Store(_))
    }
}
