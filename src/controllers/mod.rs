pub mod home_controller;
pub mod realtime_controller;
pub mod session_controller;
pub mod watchlist_controller;
