//! Minimal ABI encoding for static argument types.

use std::str::FromStr;

use alloy_core::primitives::{Address, B256, keccak256};
use strum::{Display, EnumString};

use crate::{error::ChainError, registry::LiteralValue};

/// Supported parameter types. All of them encode to a single 32-byte word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AbiType {
    Address,
    #[strum(to_string = "uint256", serialize = "uint")]
    Uint256,
    Bool,
}

/// A parsed function signature such as `setVerifierSC(address)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSelector {
    signature: String,
    params: Vec<AbiType>,
    selector: [u8; 4],
}

impl MethodSelector {
    pub fn parse(signature: &str) -> Result<Self, ChainError> {
        let signature = signature.trim();
        let (name, rest) = signature
            .split_once('(')
            .ok_or_else(|| ChainError::encoding(format!("missing `(` in `{signature}`")))?;
        let params = rest
            .strip_suffix(')')
            .ok_or_else(|| ChainError::encoding(format!("missing `)` in `{signature}`")))?;

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ChainError::encoding(format!(
                "invalid function name in `{signature}`"
            )));
        }

        let params = if params.trim().is_empty() {
            Vec::new()
        } else {
            params
                .split(',')
                .map(|param| {
                    AbiType::from_str(param.trim()).map_err(|_| {
                        ChainError::encoding(format!(
                            "unsupported parameter type `{}` in `{signature}`",
                            param.trim()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        // Canonical form feeds the selector hash.
        let canonical = format!(
            "{name}({})",
            params
                .iter()
                .map(AbiType::to_string)
                .collect::<Vec<_>>()
                .join(",")
        );
        let selector = function_selector(&canonical);

        Ok(Self {
            signature: canonical,
            params,
            selector,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Calldata for a call with address arguments.
    pub fn encode_address_call(&self, args: &[String]) -> Result<Vec<u8>, ChainError> {
        let values: Vec<LiteralValue> = args
            .iter()
            .map(|address| LiteralValue::Address(address.clone()))
            .collect();
        self.encode_call(&values)
    }

    pub fn encode_call(&self, args: &[LiteralValue]) -> Result<Vec<u8>, ChainError> {
        if args.len() != self.params.len() {
            return Err(ChainError::encoding(format!(
                "`{}` expects {} arguments, got {}",
                self.signature,
                self.params.len(),
                args.len()
            )));
        }

        for (param, arg) in self.params.iter().zip(args) {
            let matches = matches!(
                (param, arg),
                (AbiType::Address, LiteralValue::Address(_))
                    | (AbiType::Uint256, LiteralValue::Uint(_))
                    | (AbiType::Bool, LiteralValue::Bool(_))
            );
            if !matches {
                return Err(ChainError::encoding(format!(
                    "argument {arg:?} does not match parameter type `{param}` of `{}`",
                    self.signature
                )));
            }
        }

        let mut calldata = self.selector.to_vec();
        calldata.extend(encode_arguments(args)?);
        Ok(calldata)
    }
}

/// First four bytes of the keccak256 hash of a canonical signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Parse a `0x`-prefixed hex address.
pub fn parse_address(address: &str) -> Result<Address, ChainError> {
    if !address.starts_with("0x") || address.len() != 42 {
        return Err(ChainError::encoding(format!(
            "invalid address `{address}`: expected 0x-prefixed 40 hex chars"
        )));
    }
    Address::from_str(address)
        .map_err(|e| ChainError::encoding(format!("invalid address `{address}`: {e}")))
}

/// Encode one static value as a 32-byte word.
pub fn encode_word(value: &LiteralValue) -> Result<B256, ChainError> {
    let word = match value {
        LiteralValue::Address(address) => parse_address(address)?.into_word(),
        LiteralValue::Uint(value) => B256::left_padding_from(&value.to_be_bytes()),
        LiteralValue::Bool(value) => B256::left_padding_from(&[u8::from(*value)]),
    };
    Ok(word)
}

/// Head-only encoding of static arguments, as appended to creation code or
/// following a selector.
pub fn encode_arguments(values: &[LiteralValue]) -> Result<Vec<u8>, ChainError> {
    let mut encoded = Vec::with_capacity(values.len() * 32);
    for value in values {
        encoded.extend_from_slice(encode_word(value)?.as_slice());
    }
    Ok(encoded)
}
