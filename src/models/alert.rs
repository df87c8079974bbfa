use serde::{Deserialize, Serialize};

use super::asset::AssetCategory;

/// Which price movements a user wants to hear about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    #[default]
    None,
    Increase,
    Decrease,
    Any,
}

impl AlertCondition {
    pub fn matches(&self, direction: Direction) -> bool {
        match self {
            AlertCondition::None => false,
            AlertCondition::Any => true,
            AlertCondition::Increase => direction == Direction::Increase,
            AlertCondition::Decrease => direction == Direction::Decrease,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// `None` when the price did not move.
    pub fn between(previous: f64, current: f64) -> Option<Self> {
        if current > previous {
            Some(Direction::Increase)
        } else if current < previous {
            Some(Direction::Decrease)
        } else {
            None
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Direction::Increase => "rose",
            Direction::Decrease => "fell",
        }
    }
}

/// Payload handed to the notifier for one qualifying asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub user_id: String,
    pub asset_id: String,
    pub name: String,
    pub category: AssetCategory,
    pub previous_price: f64,
    pub current_price: f64,
    pub direction: Direction,
    pub created_at: i64,
}

impl PriceAlert {
    pub fn message(&self) -> String {
        format!(
            "{} {} from {:.2} to {:.2}",
            self.name,
            self.direction.verb(),
            self.previous_price,
            self.current_price
        )
    }
}
