use std::collections::{BTreeMap, HashMap};

use log::debug;
use pricefeed_tx::{AccountId, CoinType, PriceKey, PricePoint, PriceType};
use serde::{Deserialize, Serialize};

use super::traits::{AccountStorage, PersistentState, PriceOracleStorage};
use crate::error::AccountError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct AccountEntry {
    balance: u64,
    pubkey: Option<Vec<u8>>,
}

/// In-memory account balances and owner keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCache {
    accounts: HashMap<AccountId, AccountEntry>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the owner of `pubkey` with an opening balance and returns its id.
    pub fn insert_account(&mut self, pubkey: Vec<u8>, balance: u64) -> AccountId {
        let uid = AccountId::from_pubkey(&pubkey);
        self.accounts.insert(
            uid,
            AccountEntry {
                balance,
                pubkey: Some(pubkey),
            },
        );
        uid
    }

    pub fn set_balance(&mut self, uid: AccountId, balance: u64) {
        self.accounts.entry(uid).or_default().balance = balance;
    }
}

impl AccountStorage for AccountCache {
    fn get_balance(&self, uid: &AccountId) -> u64 {
        self.accounts.get(uid).map_or(0, |entry| entry.balance)
    }

    fn get_pubkey(&self, uid: &AccountId) -> Option<Vec<u8>> {
        self.accounts.get(uid).and_then(|entry| entry.pubkey.clone())
    }

    fn debit(&mut self, uid: &AccountId, amount: u64) -> Result<(), AccountError> {
        let entry = self
            .accounts
            .get_mut(uid)
            .ok_or(AccountError::UnknownAccount(*uid))?;
        entry.balance = entry
            .balance
            .checked_sub(amount)
            .ok_or(AccountError::InsufficientBalance {
                uid: *uid,
                balance: entry.balance,
                amount,
            })?;
        Ok(())
    }

    fn credit(&mut self, uid: &AccountId, amount: u64) -> Result<(), AccountError> {
        let entry = self
            .accounts
            .get_mut(uid)
            .ok_or(AccountError::UnknownAccount(*uid))?;
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow(*uid))?;
        Ok(())
    }
}

impl PersistentState for AccountCache {}

/// Committed medians, one entry per key and height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOracleCache {
    prices: BTreeMap<(PriceKey, u32), u64>,
}

impl PriceOracleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent median committed at or below `height`.
    pub fn latest_price(&self, coin_type: CoinType, price_type: PriceType, height: u32) -> Option<u64> {
        let key = PriceKey::new(coin_type, price_type);
        self.prices
            .range((key, 0)..=(key, height))
            .next_back()
            .map(|(_, price)| *price)
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceOracleStorage for PriceOracleCache {
    fn get_price(&self, height: u32, key: &PriceKey) -> Option<u64> {
        self.prices.get(&(*key, height)).copied()
    }

    fn put_price(&mut self, height: u32, key: PriceKey, price: u64) {
        self.prices.insert((key, height), price);
    }

    fn remove_price(&mut self, height: u32, key: &PriceKey) {
        self.prices.remove(&(*key, height));
    }
}

impl PersistentState for PriceOracleCache {}

/// Price points recorded by admitted feeds, keyed by `(height, feeder)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationCache {
    observations: BTreeMap<(u32, AccountId), Vec<PricePoint>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, height: u32, feeder: &AccountId) -> bool {
        self.observations.contains_key(&(height, *feeder))
    }

    pub fn get(&self, height: u32, feeder: &AccountId) -> Option<&[PricePoint]> {
        self.observations
            .get(&(height, *feeder))
            .map(Vec::as_slice)
    }

    /// Returns false and leaves the store untouched if `feeder` already has an
    /// entry at `height`.
    pub fn insert(&mut self, height: u32, feeder: AccountId, points: Vec<PricePoint>) -> bool {
        if self.contains(height, &feeder) {
            return false;
        }
        self.observations.insert((height, feeder), points);
        true
    }

    pub fn remove(&mut self, height: u32, feeder: &AccountId) -> Option<Vec<PricePoint>> {
        self.observations.remove(&(height, *feeder))
    }

    /// Every point recorded at `height`, in ascending feeder order.
    pub fn points_at(&self, height: u32) -> impl Iterator<Item = &PricePoint> + '_ {
        self.observations
            .range((height, AccountId([0x00; 20]))..=(height, AccountId([0xff; 20])))
            .flat_map(|(_, points)| points.iter())
    }

    /// Drops every observation recorded below `height` and returns how many
    /// feeder entries went.
    ///
    /// Feed undo needs the observation of its own height, so `height` must not
    /// be above the lowest block that can still be disconnected.
    pub fn prune_below(&mut self, height: u32) -> usize {
        let retained = self.observations.split_off(&(height, AccountId([0x00; 20])));
        let pruned = std::mem::replace(&mut self.observations, retained).len();
        debug!(target: "pricefeed", "[prune_below] dropped {} observations below {}", pruned, height);
        pruned
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl PersistentState for ObservationCache {}
