//! ectss deploys the threshold ECDSA verification contracts to EVM networks and
//! wires them together.

mod cli;
mod lock;
mod report;

use std::{path::Path, process::ExitCode};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use cli::{Cli, Command, OutputFormat};
use ectss_deploy::{
    AddressStore, ArtifactRegistry, CONFIG_FILENAME, DeployConfig, DeployFailure,
    DeploymentOrchestrator, FsAddressStore, InitializationOrchestrator, RpcChainDeployer,
};
use lock::NetworkLock;

/// Outcome of a command, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RunStatus {
    Success,
    InitializationFailed,
    DeploymentAborted,
    StoreFailure,
    Failed,
}

impl RunStatus {
    fn exit_code(self) -> ExitCode {
        ExitCode::from(match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
            RunStatus::DeploymentAborted => 2,
            RunStatus::StoreFailure => 3,
            RunStatus::InitializationFailed => 4,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(status) => status.exit_code(),
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Command failed");
            RunStatus::Failed.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatus> {
    match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ectss", &mut std::io::stdout());
            Ok(RunStatus::Success)
        }
        Command::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite it",
                    output.display()
                );
            }
            DeployConfig::default().save_to_file(&output)?;
            Ok(RunStatus::Success)
        }
        Command::Deploy {
            networks,
            initialize,
        } => {
            let config = load_config(&cli.config)?;
            let registry = ArtifactRegistry::standard();

            let runs = networks
                .iter()
                .map(|network| deploy_network(&config, &registry, network, initialize));
            let statuses = futures::future::join_all(runs).await;

            Ok(statuses
                .into_iter()
                .zip(&networks)
                .map(|(status, network)| {
                    status.unwrap_or_else(|e| {
                        tracing::error!(network = %network, error = format!("{e:#}"), "Deployment failed");
                        RunStatus::Failed
                    })
                })
                .max()
                .unwrap_or(RunStatus::Success))
        }
        Command::Initialize { network } => {
            let config = load_config(&cli.config)?;
            let registry = ArtifactRegistry::standard();
            let store = FsAddressStore::new(&config.addresses_dir);
            let _lock = NetworkLock::acquire(&store, &network)?;

            let chain = connect(&config, &network).await?;
            initialize_network(&registry, chain, &store, &network).await
        }
        Command::Addresses { network, format } => {
            let config = load_config(&cli.config)?;
            let store = FsAddressStore::new(&config.addresses_dir);

            let book = match store.read(&network) {
                Ok(book) => book,
                Err(e) => {
                    tracing::error!(network = %network, error = %e, "Cannot read address book");
                    return Ok(RunStatus::StoreFailure);
                }
            };

            match format {
                OutputFormat::Table => println!("{}", report::address_table(&book)),
                OutputFormat::Json => println!("{}", book.to_json()?),
            }
            Ok(RunStatus::Success)
        }
    }
}

/// Load the configuration, falling back to the built-in profiles when the
/// default file is absent.
fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.exists() && path == Path::new(CONFIG_FILENAME) {
        tracing::info!(
            path = %path.display(),
            "No configuration file found, using built-in network profiles"
        );
        return Ok(DeployConfig::default());
    }
    DeployConfig::load_from_file(path)
}

async fn connect(config: &DeployConfig, network: &str) -> Result<RpcChainDeployer> {
    let profile = config.profile(network)?;
    RpcChainDeployer::connect(network, profile, &config.artifacts_dir)
        .await
        .with_context(|| format!("Failed to connect to network `{network}`"))
}

async fn deploy_network(
    config: &DeployConfig,
    registry: &ArtifactRegistry,
    network: &str,
    initialize: bool,
) -> Result<RunStatus> {
    let store = FsAddressStore::new(&config.addresses_dir);
    let _lock = NetworkLock::acquire(&store, network)?;

    let chain = connect(config, network).await?;
    let mut orchestrator = DeploymentOrchestrator::new(registry, chain, &store);

    match orchestrator.deploy(network).await {
        Ok(book) => {
            println!("{}", report::address_table(&book));
        }
        Err(e) if matches!(e.cause, DeployFailure::Registry(_)) => {
            return Err(anyhow::Error::new(e).context("Invalid artifact registry"));
        }
        Err(e) => {
            let status = if e.is_store_failure() {
                RunStatus::StoreFailure
            } else {
                RunStatus::DeploymentAborted
            };
            tracing::error!(
                network = %e.network,
                artifact = e.failed_artifact.as_deref().unwrap_or("-"),
                persisted = e.persisted,
                error = format!("{:#}", anyhow::Error::new(e.cause)),
                "Deployment did not complete"
            );
            return Ok(status);
        }
    }

    if !initialize {
        return Ok(RunStatus::Success);
    }

    initialize_network(registry, orchestrator.into_chain(), &store, network).await
}

async fn initialize_network<S: AddressStore>(
    registry: &ArtifactRegistry,
    chain: RpcChainDeployer,
    store: &S,
    network: &str,
) -> Result<RunStatus> {
    let mut orchestrator = InitializationOrchestrator::new(registry, chain, store);

    let report = match orchestrator.initialize(network).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(network, error = %e, "Cannot read address book");
            return Ok(RunStatus::StoreFailure);
        }
    };

    println!("{}", report::initialization_table(&report));

    Ok(if report.is_success() {
        RunStatus::Success
    } else {
        RunStatus::InitializationFailed
    })
}
