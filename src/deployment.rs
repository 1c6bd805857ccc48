use crate::{
    config::Variant,
    validation::parse_address,
};
use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::info;

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Sepolia,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Sepolia => "sepolia",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeploymentEnv::Sepolia => "Sepolia",
            DeploymentEnv::Local => "local node",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub variant: Variant,
    pub contract_address: String,
    pub chain_id: u64,
    #[serde(default)]
    pub label: Option<String>,
    /// First block worth scanning for events.
    #[serde(default)]
    pub deployment_block: Option<u64>,
}

impl DeploymentRecord {
    pub fn address(&self) -> Result<Address> {
        parse_address(&self.contract_address).wrap_err_with(|| {
            format!(
                "Deployment record holds an invalid address: {}",
                self.contract_address
            )
        })
    }
}

/// JSON array of [`DeploymentRecord`]s for one network, oldest first.
#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::with_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn with_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = registry_file(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        let raw = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Cannot read registry {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Registry {} is not valid JSON", self.path.display()))
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        let encoded =
            serde_json::to_string_pretty(&records).wrap_err("Cannot encode deployment registry")?;
        fs::write(&self.path, encoded)
            .wrap_err_with(|| format!("Cannot write registry {}", self.path.display()))
    }

    /// Most recently appended record for `variant`.
    pub fn latest_for(&self, variant: Variant) -> Result<Option<DeploymentRecord>> {
        let records = self.load()?;
        Ok(records.into_iter().rev().find(|r| r.variant == variant))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn record_deployment(
    store: &DeploymentStore,
    variant: Variant,
    address: Address,
    chain_id: u64,
    label: Option<String>,
    deployment_block: Option<u64>,
) -> Result<DeploymentRecord> {
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        variant,
        contract_address: address.to_checksum(None),
        chain_id,
        label,
        deployment_block,
    };
    info!(%variant, address = %record.contract_address, chain_id, "recording deployment");
    store.append(record.clone())?;
    Ok(record)
}

/// Creates an empty registry for every known network.
pub fn ensure_structure() -> Result<()> {
    [DeploymentEnv::Sepolia, DeploymentEnv::Local]
        .into_iter()
        .try_for_each(|env| registry_file(Path::new(DEPLOYMENTS_ROOT), env).map(|_| ()))
}

fn registry_file(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let dir = root.join(env.dir_name());
    fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("Cannot create {env} registry directory {}", dir.display()))?;
    let path = dir.join(DEPLOYMENTS_FILE);
    if !path.exists() {
        fs::write(&path, "[]")
            .wrap_err_with(|| format!("Cannot seed {env} registry at {}", path.display()))?;
    }
    Ok(path)
}
