use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// The account collection. The whole router sits behind the authentication layer
/// (401 without a valid token); each handler then requires the admin capability
/// (403 otherwise). Clients treat both answers as session expiry.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /users
        // Full account list in server order. The console reloads it after every mutation.
        .route("/users", get(handlers::list_users))
        // POST /users/register
        // Creates an account; the only place a password is accepted.
        .route("/users/register", post(handlers::register_user))
        // PUT/DELETE /users/{id}
        .route(
            "/users/{id}",
            put(handlers::update_user).delete(handlers::delete_user),
        )
}
