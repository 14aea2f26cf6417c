// smart-contracts/src/artifact.rs

//! Contract artifacts: ABI plus init code, as produced by a compiler or
//! registered natively

use crate::{
    abi::parse_human_abi, contracts, state::NativeContract, vm::CallContext, ContractError,
    ContractResult,
};
use chain_core::{Bytes, Token};
use ethers_core::abi::{self, Abi};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Marker opening native init code. `0xEF` is a reserved opcode prefix on
/// EVM chains (EIP-3541), so native init code is never accepted there.
pub const NATIVE_CODE_PREFIX: [u8; 3] = [0xef, 0x4e, 0x43];

/// Compiled (or native) contract artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub abi: Abi,
    /// Init code; constructor arguments are appended at deployment
    pub bytecode: Bytes,
    /// What a block explorer needs to verify the deployed code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<SourceMetadata>,
}

/// Source and compiler settings submitted for explorer verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    /// e.g. `v0.8.7+commit.e28d00a7`
    pub compiler_version: String,
    /// Fully qualified name, e.g. `contracts/FundMe.sol:FundMe`
    pub contract_path: String,
    /// Solidity standard JSON input
    pub standard_json_input: serde_json::Value,
}

impl ContractArtifact {
    /// Load a compiler artifact JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ContractResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ContractError::Artifact(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ContractError::Artifact(format!("{}: {}", path.display(), e)))
    }

    /// Init code followed by ABI-encoded constructor arguments
    pub fn deployment_data(&self, args: &[Token]) -> ContractResult<Bytes> {
        match self.abi.constructor() {
            Some(constructor) => Ok(constructor.encode_input(self.bytecode.to_vec(), args)?.into()),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(ContractError::Abi(format!(
                "{} takes no constructor arguments, got {}",
                self.contract_name,
                args.len()
            ))),
        }
    }

    /// ABI-encoded constructor arguments alone (what explorers ask for)
    pub fn encode_constructor_args(&self, args: &[Token]) -> ContractResult<Bytes> {
        let data = self.deployment_data(args)?;
        Ok(data[self.bytecode.len()..].to_vec().into())
    }

    pub fn is_native(&self) -> bool {
        self.bytecode.starts_with(&NATIVE_CODE_PREFIX)
    }
}

/// Builds a native contract from decoded constructor arguments
pub type Constructor =
    fn(&mut CallContext<'_>, Arc<Abi>, Vec<Token>) -> ContractResult<Box<dyn NativeContract>>;

/// A natively implemented contract and its artifact
#[derive(Debug)]
pub struct NativeEntry {
    artifact: ContractArtifact,
    abi: Arc<Abi>,
    constructor: Constructor,
}

impl NativeEntry {
    pub fn artifact(&self) -> &ContractArtifact {
        &self.artifact
    }

    pub fn deployment_data(&self, args: &[Token]) -> ContractResult<Bytes> {
        self.artifact.deployment_data(args)
    }

    pub(crate) fn decode_constructor_args(&self, init_code: &[u8]) -> ContractResult<Vec<Token>> {
        let encoded = &init_code[self.artifact.bytecode.len()..];
        let Some(constructor) = self.abi.constructor() else {
            return if encoded.is_empty() {
                Ok(Vec::new())
            } else {
                Err(ContractError::DeploymentFailed(format!(
                    "{} takes no constructor arguments",
                    self.artifact.contract_name
                )))
            };
        };
        let types: Vec<_> = constructor.inputs.iter().map(|p| p.kind.clone()).collect();
        abi::decode(&types, encoded).map_err(|e| {
            ContractError::DeploymentFailed(format!(
                "invalid constructor arguments for {}: {}",
                self.artifact.contract_name, e
            ))
        })
    }

    pub(crate) fn construct(
        &self,
        ctx: &mut CallContext<'_>,
        args: Vec<Token>,
    ) -> ContractResult<Box<dyn NativeContract>> {
        (self.constructor)(ctx, self.abi.clone(), args)
    }
}

/// Native contracts runnable on the development chain, plus compiled
/// artifacts for live networks
#[derive(Default)]
pub struct ArtifactRegistry {
    native: HashMap<String, NativeEntry>,
    compiled: BTreeMap<String, ContractArtifact>,
}

impl ArtifactRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every bundled contract
    pub fn builtin() -> ContractResult<Self> {
        let mut registry = Self::empty();
        contracts::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Register a native contract under `name`
    pub fn register_native(
        &mut self,
        name: &str,
        abi_lines: &[&str],
        constructor: Constructor,
    ) -> ContractResult<()> {
        if name.len() > u8::MAX as usize {
            return Err(ContractError::Artifact(format!("contract name too long: {name}")));
        }
        let abi = parse_human_abi(abi_lines)?;
        let mut bytecode = NATIVE_CODE_PREFIX.to_vec();
        bytecode.push(name.len() as u8);
        bytecode.extend_from_slice(name.as_bytes());

        let artifact = ContractArtifact {
            contract_name: name.to_string(),
            source_name: None,
            abi: abi.clone(),
            bytecode: bytecode.into(),
            verification: None,
        };
        self.native.insert(
            name.to_string(),
            NativeEntry {
                artifact,
                abi: Arc::new(abi),
                constructor,
            },
        );
        Ok(())
    }

    pub fn native(&self, name: &str) -> ContractResult<&NativeEntry> {
        self.native
            .get(name)
            .ok_or_else(|| ContractError::Artifact(format!("no native contract named {name}")))
    }

    pub fn native_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.native.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn add_compiled(&mut self, artifact: ContractArtifact) {
        self.compiled.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn compiled(&self, name: &str) -> Option<&ContractArtifact> {
        self.compiled.get(name)
    }

    /// Load every compiler artifact under `dir`, skipping debug files
    pub fn load_compiled_dir(&mut self, dir: impl AsRef<Path>) -> ContractResult<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ContractError::Artifact(format!("{}: {}", dir.display(), e)))?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| ContractError::Artifact(e.to_string()))?
                .path();
            if path.is_dir() {
                loaded += self.load_compiled_dir(&path)?;
                continue;
            }
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            let is_debug = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(".dbg.json"));
            if !is_json || is_debug {
                continue;
            }
            let artifact = ContractArtifact::from_file(&path)?;
            tracing::debug!(name = %artifact.contract_name, path = %path.display(), "Loaded artifact");
            self.add_compiled(artifact);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Find the native contract whose init code opens `init_code`
    pub(crate) fn resolve_init_code(&self, init_code: &[u8]) -> ContractResult<&NativeEntry> {
        let header = NATIVE_CODE_PREFIX.len();
        if init_code.len() <= header || init_code[..header] != NATIVE_CODE_PREFIX {
            return Err(ContractError::InvalidBytecode(
                "only native contract artifacts can be deployed on this chain".into(),
            ));
        }
        let name_len = init_code[header] as usize;
        let name = init_code
            .get(header + 1..header + 1 + name_len)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .ok_or_else(|| ContractError::InvalidBytecode("truncated native init code".into()))?;
        self.native(name)
            .map_err(|_| ContractError::InvalidBytecode(format!("unknown native contract {name}")))
    }
}

impl fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("native", &self.native_names())
            .field("compiled", &self.compiled.keys().collect::<Vec<_>>())
            .finish()
    }
}
