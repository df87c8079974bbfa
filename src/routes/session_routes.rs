use axum::{routing::get, Router};

use crate::{controllers::session_controller, AppState};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router.route(
        "/session",
        get(session_controller::get_session)
            .post(session_controller::post_session)
            .delete(session_controller::delete_session),
    )
}
