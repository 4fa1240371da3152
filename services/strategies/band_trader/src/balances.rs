//! In-memory account balance ledger

use market::BalanceDelta;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Latest known balance per asset, folded from stream updates.
///
/// The stream only reports assets touched by a trade, so the ledger fills
/// in as activity happens and has nothing to show before the first update
/// arrives.
#[derive(Default)]
pub struct BalanceLedger {
    assets: RwLock<BTreeMap<String, (f64, f64)>>,
}

impl BalanceLedger {
    pub fn apply(&self, deltas: &[BalanceDelta]) {
        let mut assets = self.assets.write();
        for delta in deltas {
            assets.insert(delta.asset.clone(), (delta.free, delta.locked));
        }
    }

    /// Chat-friendly listing, alphabetical by asset.
    pub fn summary(&self) -> String {
        let assets = self.assets.read();
        if assets.is_empty() {
            return "no balance updates received yet".to_string();
        }
        assets
            .iter()
            .map(|(asset, (free, locked))| format!("{asset}: free {free}, locked {locked}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(asset: &str, free: f64, locked: f64) -> BalanceDelta {
        BalanceDelta {
            asset: asset.to_string(),
            free,
            locked,
        }
    }

    #[test]
    fn empty_ledger_says_so() {
        let ledger = BalanceLedger::default();
        assert_eq!(ledger.summary(), "no balance updates received yet");
    }

    #[test]
    fn updates_overwrite_per_asset_and_list_alphabetically() {
        let ledger = BalanceLedger::default();
        ledger.apply(&[delta("USDT", 41.25, 0.0), delta("SOL", 2.0, 0.5)]);
        ledger.apply(&[delta("USDT", 12.0, 29.25)]);
        assert_eq!(
            ledger.summary(),
            "SOL: free 2, locked 0.5\nUSDT: free 12, locked 29.25"
        );
    }
}
