use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::row::ResponseMeta;

/// Response shape identifiers.
///
/// - `v1`: discrete `year`/`quarter`/`month` buckets, snake_case names
/// - `v2`: unified `period` + `periodGrain`, snake_case names
/// - `v3`: unified `period` + `periodGrain`, camelCase names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractVersion {
    V1,
    V2,
    V3,
}

impl ContractVersion {
    pub const ALL: [ContractVersion; 3] =
        [ContractVersion::V1, ContractVersion::V2, ContractVersion::V3];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractVersion::V1 => "v1",
            ContractVersion::V2 => "v2",
            ContractVersion::V3 => "v3",
        }
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractVersion {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(ContractVersion::V1),
            "v2" => Ok(ContractVersion::V2),
            "v3" => Ok(ContractVersion::V3),
            _ => Err(ContractError::Unsupported(s.to_owned())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("response does not declare a contract version")]
    Missing,
    #[error("unsupported contract version '{0}'")]
    Unsupported(String),
}

/// How loudly contract drift is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// CI and test runs: drift is an error.
    Test,
    /// Interactive development: drift is logged and tolerated.
    Development,
    /// End-user sessions: drift is tolerated silently.
    #[default]
    Production,
}

/// Checks the declared contract version of every response against the
/// configured supported set. The set is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGate {
    supported: BTreeSet<ContractVersion>,
    mode: ExecutionMode,
}

impl VersionGate {
    pub fn new(supported: impl IntoIterator<Item = ContractVersion>, mode: ExecutionMode) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            mode,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn supports(&self, version: ContractVersion) -> bool {
        self.supported.contains(&version)
    }

    fn validate(&self, meta: &ResponseMeta) -> Result<ContractVersion, ContractError> {
        let declared = meta
            .contract_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ContractError::Missing)?;
        let version: ContractVersion = declared.parse()?;
        if self.supports(version) {
            Ok(version)
        } else {
            Err(ContractError::Unsupported(declared.to_owned()))
        }
    }

    /// `Ok(Some(version))` for a recognized version.
    ///
    /// On a violation: `Err` in [`ExecutionMode::Test`], a warning and
    /// `Ok(None)` in development, `Ok(None)` in production.
    pub fn check(&self, meta: &ResponseMeta) -> Result<Option<ContractVersion>, ContractError> {
        match self.validate(meta) {
            Ok(version) => Ok(Some(version)),
            Err(err) => match self.mode {
                ExecutionMode::Test => Err(err),
                ExecutionMode::Development => {
                    tracing::warn!(
                        declared = ?meta.contract_version,
                        supported = ?self.supported,
                        "contract drift: {}",
                        err
                    );
                    Ok(None)
                }
                ExecutionMode::Production => Ok(None),
            },
        }
    }
}

impl Default for VersionGate {
    fn default() -> Self {
        Self::new(ContractVersion::ALL, ExecutionMode::default())
    }
}
