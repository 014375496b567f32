use std::collections::BTreeMap;

use log::trace;
use pricefeed_tx::{PriceKey, PricePoint};

/// Floor of `(a + b) / 2` without overflowing.
pub fn floor_average(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

/// Median of `prices`: the middle element for an odd count, the floor average
/// of the two central elements for an even count. `None` when empty.
pub fn median(prices: &mut [u64]) -> Option<u64> {
    if prices.is_empty() {
        return None;
    }
    prices.sort_unstable();

    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        Some(prices[mid])
    } else {
        Some(floor_average(prices[mid - 1], prices[mid]))
    }
}

/// Per-key median over every observed point. Keys without observations are
/// absent.
pub fn aggregate<'a, I>(points: I) -> BTreeMap<PriceKey, u64>
where
    I: IntoIterator<Item = &'a PricePoint>,
{
    let mut groups: BTreeMap<PriceKey, Vec<u64>> = BTreeMap::new();
    for point in points {
        groups.entry(point.key()).or_default().push(point.price);
    }

    groups
        .into_iter()
        .filter_map(|(key, mut prices)| {
            let price = median(&mut prices)?;
            trace!(target: "median", "[aggregate] {} over {} points: {}", key, prices.len(), price);
            Some((key, price))
        })
        .collect()
}
