use std::{fmt, fs, path::Path};

use log::debug;
use pricefeed_tx::{CURRENT_TX_VERSION, MAX_PRICE_POINTS};
use serde::{Deserialize, Serialize};

use crate::error::ParamsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(ParamsError::InvalidNetwork(s.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consensus parameters of a network. Scheduling priority is a property of
/// the transaction type and is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub tx_version: u32,
    pub max_price_points: usize,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            tx_version: CURRENT_TX_VERSION,
            max_price_points: MAX_PRICE_POINTS,
        }
    }
}

impl ConsensusParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(1..=MAX_PRICE_POINTS).contains(&self.max_price_points) {
            return Err(ParamsError::InvalidMaxPricePoints(self.max_price_points));
        }
        Ok(())
    }
}

/// Partial parameter set read from a regtest override file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsOverride {
    tx_version: Option<u32>,
    max_price_points: Option<usize>,
}

impl Network {
    pub fn params(&self) -> ConsensusParams {
        match self {
            Network::Mainnet | Network::Testnet | Network::Regtest => ConsensusParams::default(),
        }
    }

    /// Network parameters with the JSON overrides in `path` applied. Only
    /// regtest accepts overrides.
    pub fn params_with_overrides(&self, path: &Path) -> Result<ConsensusParams, ParamsError> {
        if *self != Network::Regtest {
            return Err(ParamsError::OverrideNotAllowed(*self));
        }

        debug!("Loading {} parameter overrides from {}", self, path.display());
        let raw = fs::read_to_string(path)?;
        let overrides: ParamsOverride = serde_json::from_str(&raw)?;

        let defaults = self.params();
        let params = ConsensusParams {
            tx_version: overrides.tx_version.unwrap_or(defaults.tx_version),
            max_price_points: overrides
                .max_price_points
                .unwrap_or(defaults.max_price_points),
        };
        params.validate()?;
        Ok(params)
    }
}
