pub mod alert;
pub mod asset;
pub mod preferences;
pub mod snapshot;
pub mod user;

pub use alert::{AlertCondition, Direction, PriceAlert};
pub use asset::{AssetCategory, WatchedAsset};
pub use preferences::UserPreferences;
pub use snapshot::{PriceChange, PriceSnapshot};
pub use user::CurrentUser;
