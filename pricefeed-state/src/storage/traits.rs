use std::{fs::File, io::Write, path::Path};

use log::debug;
use pricefeed_tx::{AccountId, PriceKey};

use crate::error::{AccountError, PersistentStateError};

pub trait AccountStorage {
    fn get_balance(&self, uid: &AccountId) -> u64;
    /// Serialized public key of the account owner, when known.
    fn get_pubkey(&self, uid: &AccountId) -> Option<Vec<u8>>;
    fn debit(&mut self, uid: &AccountId, amount: u64) -> Result<(), AccountError>;
    fn credit(&mut self, uid: &AccountId, amount: u64) -> Result<(), AccountError>;
}

/// Committed block medians keyed by height.
pub trait PriceOracleStorage {
    fn get_price(&self, height: u32, key: &PriceKey) -> Option<u64>;
    fn put_price(&mut self, height: u32, key: PriceKey, price: u64);
    fn remove_price(&mut self, height: u32, key: &PriceKey);
}

pub trait PersistentState {
    fn save_to_disk(&self, path: &Path) -> Result<(), PersistentStateError>
    where
        Self: serde::ser::Serialize,
    {
        let serialized_state = bincode::serialize(self)?;
        let mut file = File::create(path)?;
        file.write_all(&serialized_state)?;
        Ok(())
    }

    fn load_from_disk(path: &Path) -> Result<Self, PersistentStateError>
    where
        Self: Sized + serde::de::DeserializeOwned + Default,
    {
        debug!("Restoring {} from disk", path.display());

        if path.exists() {
            let file = File::open(path)?;
            let new_state: Self = bincode::deserialize_from(file)?;
            Ok(new_state)
        } else {
            Ok(Self::default())
        }
    }
}
