use std::collections::HashMap;

use super::alert::Direction;

/// Last-observed price per asset id, held by one monitor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSnapshot {
    prices: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub asset_id: String,
    pub previous: f64,
    pub current: f64,
    pub direction: Direction,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a price. Non-finite and negative prices are not admitted.
    pub fn insert(&mut self, asset_id: impl Into<String>, price: f64) -> bool {
        if !price.is_finite() || price < 0.0 {
            return false;
        }
        self.prices.insert(asset_id.into(), price);
        true
    }

    pub fn get(&self, asset_id: &str) -> Option<f64> {
        self.prices.get(asset_id).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.prices.contains_key(asset_id)
    }

    /// Movements between `previous` and `self`, for ids present in both.
    pub fn changes_from(&self, previous: &PriceSnapshot) -> Vec<PriceChange> {
        self.prices
            .iter()
            .filter_map(|(id, &current)| {
                let old = previous.get(id)?;
                let direction = Direction::between(old, current)?;
                Some(PriceChange {
                    asset_id: id.clone(),
                    previous: old,
                    current,
                    direction,
                })
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut snap = PriceSnapshot::new();
        for (id, price) in iter {
            snap.insert(id, price);
        }
        snap
    }
}
