//! Application router configuration.

use axum::{
    Json, Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

use crate::{
    AppState, Error,
    auth::{change_password, get_me, post_log_in, post_refresh, register_user, resolve_identity},
    category::{
        create_category_endpoint, delete_all_categories_endpoint, delete_category_endpoint,
        get_categories_endpoint, get_category_endpoint, get_category_transactions_endpoint,
        update_category_endpoint,
    },
    endpoints,
    transaction::{
        create_transaction_endpoint, delete_all_transactions_endpoint,
        delete_transaction_endpoint, edit_transaction_endpoint, get_transaction_endpoint,
        get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
///
/// Every route runs behind [resolve_identity], so a request with a bad bearer
/// token is rejected even on routes that do not need a user. Protected
/// handlers take a [crate::auth::CurrentUser] which rejects anonymous requests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_root))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::REFRESH, post(post_refresh))
        .route(endpoints::ME, get(get_me))
        .route(endpoints::CHANGE_PASSWORD, put(change_password))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint)
                .post(create_transaction_endpoint)
                .delete(delete_all_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .patch(edit_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint)
                .post(create_category_endpoint)
                .delete(delete_all_categories_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .patch(update_category_endpoint)
                .delete(delete_category_endpoint),
        )
        .route(
            endpoints::CATEGORY_TRANSACTIONS,
            get(get_category_transactions_endpoint),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity))
        .with_state(state)
}

/// Report that the server is up.
async fn get_root() -> Response {
    Json(json!({ "message": "Working" })).into_response()
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
