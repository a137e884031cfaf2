//! [`ChainDeployer`] over Ethereum JSON-RPC.
//!
//! Transactions go through `eth_sendTransaction`, so the node must hold the
//! sending account. Nothing is signed locally.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use alloy_core::primitives::U64;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::{Host, Url};

use super::{ChainDeployer, MethodSelector, abi, artifact::ContractArtifact};
use crate::{
    config::NetworkProfile,
    error::{ChainError, ChainErrorKind},
    registry::{ArtifactSpec, LiteralValue},
};

/// Timeout for a single RPC request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt and block number polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcErrorObject {
    fn into_chain_error(self, method: &str) -> ChainError {
        ChainError::rpc(format!(
            "{method} failed with code {}: {}",
            self.code, self.message
        ))
    }
}

/// HTTP transport to a single node.
#[derive(Debug)]
struct RpcEndpoint {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcEndpoint {
    fn new(url: Url) -> Result<Self, ChainError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        // Local dev nodes are reached directly, whatever the proxy environment says.
        if is_loopback(&url) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ChainError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[Value],
    ) -> Result<T, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ChainError::transport(format!("{method} request to {} failed: {e}", self.url))
            })?
            .json()
            .await
            .map_err(|e| {
                ChainError::transport(format!("{method} response is not JSON-RPC: {e}"))
            })?;

        if let Some(error) = response.error {
            return Err(error.into_chain_error(method));
        }

        serde_json::from_value(response.result)
            .map_err(|e| ChainError::transport(format!("unexpected {method} result: {e}")))
    }

    /// Call a parameterless method returning a hex quantity.
    async fn quantity(&self, method: &str) -> Result<u64, ChainError> {
        let value: U64 = self.call(method, &[]).await?;
        Ok(value.to())
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    block_number: U64,
    /// `0x1` on success, `0x0` on revert. Absent before Byzantium.
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    contract_address: Option<String>,
}

impl TransactionReceipt {
    fn block(&self) -> u64 {
        self.block_number.to()
    }

    fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }
}

/// Deploys Truffle artifacts to one network through a node's JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcChainDeployer {
    endpoint: RpcEndpoint,
    from: String,
    profile: NetworkProfile,
    artifacts_dir: PathBuf,
    /// Artifacts that had libraries linked in, by name.
    linked: HashMap<String, ContractArtifact>,
}

impl RpcChainDeployer {
    /// Connect to the endpoint of `profile`, verify the chain id, and resolve
    /// the sending account.
    pub async fn connect(
        network: &str,
        profile: NetworkProfile,
        artifacts_dir: impl Into<PathBuf>,
    ) -> Result<Self, ChainError> {
        let url = profile
            .url()
            .map_err(|e| ChainError::transport(format!("{e:#}")))?;
        let endpoint = RpcEndpoint::new(url)?;

        let chain_id = endpoint.quantity("eth_chainId").await?;
        if chain_id != profile.network_id {
            return Err(ChainError::rpc(format!(
                "network `{network}` expects chain id {}, endpoint reports {chain_id}",
                profile.network_id
            )));
        }

        let from = match &profile.from {
            Some(from) => {
                abi::parse_address(from)?;
                from.clone()
            }
            None => {
                let accounts: Vec<String> = endpoint.call("eth_accounts", &[]).await?;
                accounts.into_iter().next().ok_or_else(|| {
                    ChainError::rpc(format!(
                        "endpoint for `{network}` manages no accounts and no `from` is configured"
                    ))
                })?
            }
        };

        tracing::info!(network, chain_id, from = %from, "Connected to network");

        Ok(Self {
            endpoint,
            from,
            profile,
            artifacts_dir: artifacts_dir.into(),
            linked: HashMap::new(),
        })
    }

    fn artifact(&self, name: &str) -> Result<ContractArtifact, ChainError> {
        match self.linked.get(name) {
            Some(artifact) => Ok(artifact.clone()),
            None => ContractArtifact::load(&self.artifacts_dir, name),
        }
    }

    fn transaction(&self, to: Option<&str>, data: String) -> Value {
        let mut tx = serde_json::json!({
            "from": self.from,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = Value::from(to);
        }
        if let Some(gas) = self.profile.gas {
            tx["gas"] = Value::from(format!("0x{gas:x}"));
        }
        if let Some(gas_price) = self.profile.gas_price {
            tx["gasPrice"] = Value::from(format!("0x{gas_price:x}"));
        }
        tx
    }

    /// Send a transaction and wait until it is mined and confirmed.
    async fn send_and_confirm(&self, tx: Value) -> Result<TransactionReceipt, ChainError> {
        let tx_hash: String = self.endpoint.call("eth_sendTransaction", &[tx]).await?;
        tracing::debug!(tx_hash = %tx_hash, "Transaction sent");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if !receipt.succeeded() {
            return Err(ChainError::new(
                ChainErrorKind::Reverted,
                format!("transaction {tx_hash} reverted in block {}", receipt.block()),
            ));
        }

        if self.profile.confirmations > 0 {
            self.wait_for_block(receipt.block().saturating_add(self.profile.confirmations))
                .await?;
        }

        Ok(receipt)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, ChainError> {
        let start = Instant::now();
        let max_duration = Duration::from_secs(self.profile.receipt_timeout_secs);

        loop {
            let receipt: Option<TransactionReceipt> = self
                .endpoint
                .call("eth_getTransactionReceipt", &[Value::from(tx_hash)])
                .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            if start.elapsed() > max_duration {
                return Err(ChainError::new(
                    ChainErrorKind::Timeout,
                    format!(
                        "no receipt for {tx_hash} after {}s",
                        self.profile.receipt_timeout_secs
                    ),
                ));
            }

            tracing::trace!(tx_hash, "Receipt not available yet, retrying...");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_block(&self, target: u64) -> Result<(), ChainError> {
        let start = Instant::now();
        let max_duration = Duration::from_secs(self.profile.receipt_timeout_secs);

        loop {
            let current = self.endpoint.quantity("eth_blockNumber").await?;

            if current >= target {
                return Ok(());
            }

            if start.elapsed() > max_duration {
                return Err(ChainError::new(
                    ChainErrorKind::Timeout,
                    format!("chain stuck at block {current}, waiting for {target}"),
                ));
            }

            tracing::trace!(current, target, "Waiting for confirmations...");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl ChainDeployer for RpcChainDeployer {
    async fn deploy_artifact(
        &mut self,
        spec: &ArtifactSpec,
        inputs: &[LiteralValue],
        network: &str,
    ) -> Result<String, ChainError> {
        let artifact = self.artifact(&spec.name)?;
        let data = artifact.creation_code(&abi::encode_arguments(inputs)?)?;

        let receipt = self.send_and_confirm(self.transaction(None, data)).await?;
        let address = receipt.contract_address.clone().ok_or_else(|| {
            ChainError::rpc(format!(
                "receipt for `{}` on `{network}` has no contract address",
                spec.name
            ))
        })?;

        tracing::debug!(
            network,
            artifact = %spec.name,
            address = %address,
            block = receipt.block(),
            "Contract created"
        );
        Ok(address)
    }

    async fn link_library(
        &mut self,
        target: &ArtifactSpec,
        library: &str,
        library_address: &str,
    ) -> Result<(), ChainError> {
        let library_fqn = ContractArtifact::load(&self.artifacts_dir, library)?.fully_qualified_name();
        let mut artifact = self.artifact(&target.name)?;
        artifact.link(library, library_fqn.as_deref(), library_address)?;
        self.linked.insert(target.name.clone(), artifact);
        Ok(())
    }

    async fn call_setter(
        &mut self,
        address: &str,
        method: &MethodSelector,
        args: &[String],
    ) -> Result<(), ChainError> {
        abi::parse_address(address)?;
        let calldata = method.encode_address_call(args)?;

        let receipt = self
            .send_and_confirm(self.transaction(Some(address), format!("0x{}", hex::encode(calldata))))
            .await?;

        tracing::debug!(
            address,
            method = %method.signature(),
            block = receipt.block(),
            "Setter applied"
        );
        Ok(())
    }
}
