use std::collections::HashMap;

use log::debug;
use pricefeed_tx::AccountId;

use crate::traits::FeederEligibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeederTerm {
    from_height: u32,
    until_height: Option<u32>,
}

/// Fixed feeder set with per-account activation ranges, for nodes whose
/// eligibility is configured rather than derived from stake.
#[derive(Debug, Clone, Default)]
pub struct StaticFeederRegistry {
    feeders: HashMap<AccountId, FeederTerm>,
}

impl StaticFeederRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorizes `uid` from `from_height` on, replacing any earlier term.
    pub fn authorize(&mut self, uid: AccountId, from_height: u32) {
        debug!(target: "pricefeed", "[authorize] {} from height {}", uid, from_height);
        self.feeders.insert(
            uid,
            FeederTerm {
                from_height,
                until_height: None,
            },
        );
    }

    /// Ends the term of `uid`; it is no longer authorized at `height` and above.
    pub fn revoke(&mut self, uid: &AccountId, height: u32) -> bool {
        match self.feeders.get_mut(uid) {
            Some(term) => {
                debug!(target: "pricefeed", "[revoke] {} at height {}", uid, height);
                term.until_height = Some(height);
                true
            }
            None => false,
        }
    }
}

impl FeederEligibility for StaticFeederRegistry {
    fn is_authorized_feeder(&self, uid: &AccountId, height: u32) -> bool {
        self.feeders.get(uid).is_some_and(|term| {
            height >= term.from_height && term.until_height.map_or(true, |until| height < until)
        })
    }
}
