//! Compiled contract artifacts in the Truffle build format.

use std::path::Path;

use alloy_core::primitives::keccak256;
use serde::Deserialize;

use crate::error::ChainError;

/// Length in hex characters of a library placeholder, equal to an address.
const PLACEHOLDER_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AstInfo {
    absolute_path: String,
}

/// The parts of a `build/contracts/<Name>.json` file needed for deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    /// Hex creation code, possibly with `0x` prefix and library placeholders.
    pub bytecode: String,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    ast: Option<AstInfo>,
}

impl ContractArtifact {
    /// Load `<dir>/<name>.json`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, ChainError> {
        let path = dir.join(format!("{name}.json"));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ChainError::artifact(format!("failed to read {}: {e}", path.display()))
        })?;
        let artifact: Self = serde_json::from_str(&content).map_err(|e| {
            ChainError::artifact(format!("failed to parse {}: {e}", path.display()))
        })?;

        if artifact.bytecode.trim_start_matches("0x").is_empty() {
            return Err(ChainError::artifact(format!(
                "artifact `{name}` has no bytecode, is it an interface?"
            )));
        }

        Ok(artifact)
    }

    /// `<source unit>:<contract>`, the name solc hashes into library placeholders.
    pub fn fully_qualified_name(&self) -> Option<String> {
        let source = self
            .ast
            .as_ref()
            .map(|ast| ast.absolute_path.as_str())
            .or(self.source_path.as_deref())?;
        Some(format!("{source}:{}", self.contract_name))
    }

    /// Replace every placeholder for `library` with `address`.
    ///
    /// Both the legacy `__Name____` form and the hashed `__$<hash>$__` form are
    /// recognised. Linking a library that the bytecode never references is an error.
    pub fn link(
        &mut self,
        library: &str,
        library_fqn: Option<&str>,
        address: &str,
    ) -> Result<(), ChainError> {
        let address = address.trim_start_matches("0x").to_lowercase();
        if address.len() != PLACEHOLDER_LEN || hex::decode(&address).is_err() {
            return Err(ChainError::encoding(format!(
                "cannot link `{library}` at invalid address `0x{address}`"
            )));
        }

        let mut placeholders = vec![legacy_placeholder(library)];
        if let Some(fqn) = library_fqn {
            placeholders.push(hashed_placeholder(fqn));
        }

        let mut linked = false;
        for placeholder in &placeholders {
            if self.bytecode.contains(placeholder.as_str()) {
                self.bytecode = self.bytecode.replace(placeholder.as_str(), &address);
                linked = true;
            }
        }

        if !linked {
            return Err(ChainError::artifact(format!(
                "`{}` has no placeholder for library `{library}`",
                self.contract_name
            )));
        }

        tracing::debug!(contract = %self.contract_name, library, "Library linked");
        Ok(())
    }

    /// First library placeholder still present in the bytecode, if any.
    pub fn unresolved_placeholder(&self) -> Option<&str> {
        let start = self.bytecode.find("__")?;
        let end = (start + PLACEHOLDER_LEN).min(self.bytecode.len());
        self.bytecode.get(start..end)
    }

    /// Creation code followed by the ABI-encoded constructor arguments.
    pub fn creation_code(&self, encoded_args: &[u8]) -> Result<String, ChainError> {
        if let Some(placeholder) = self.unresolved_placeholder() {
            return Err(ChainError::artifact(format!(
                "`{}` still contains unlinked library placeholder `{placeholder}`",
                self.contract_name
            )));
        }

        Ok(format!(
            "0x{}{}",
            self.bytecode.trim_start_matches("0x"),
            hex::encode(encoded_args)
        ))
    }
}

fn legacy_placeholder(library: &str) -> String {
    let mut placeholder = format!("__{library}");
    placeholder.truncate(PLACEHOLDER_LEN - 2);
    format!("{placeholder:_<width$}", width = PLACEHOLDER_LEN)
}

fn hashed_placeholder(fqn: &str) -> String {
    let hash = hex::encode(keccak256(fqn.as_bytes()));
    format!("__${}$__", &hash[..34])
}
