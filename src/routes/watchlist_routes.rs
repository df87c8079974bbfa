use axum::{
    routing::{delete, get},
    Router,
};

use crate::{controllers::watchlist_controller, AppState};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/watchlist",
            get(watchlist_controller::get_watchlist).post(watchlist_controller::post_watchlist),
        )
        .route("/watchlist/:asset_id", delete(watchlist_controller::delete_watchlist_asset))
        .route(
            "/alert-condition",
            get(watchlist_controller::get_alert_condition).put(watchlist_controller::put_alert_condition),
        )
}
