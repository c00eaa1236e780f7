use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    database::Store,
    middleware::{auth_middleware, log_errors},
    routes,
};

/// Builds the full application: public and bearer-protected routes under the
/// configured base path, error logging, and permissive CORS in debug builds.
pub fn create_router<S: Store>(state: AppState<S>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/auth/register", post(routes::auth::register::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        .route("/auth/verify-email", post(routes::auth::verify_email::<S>));

    let protected_routes = Router::new()
        // account
        .route("/auth/me", get(routes::auth::current_user))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/deactivate", post(routes::auth::deactivate::<S>))
        // rooms
        .route("/rooms", post(routes::room::create_room::<S>))
        .route("/rooms/public", get(routes::room::list_public_rooms::<S>))
        .route("/rooms/mine", get(routes::room::list_my_rooms::<S>))
        .route("/rooms/{id}", get(routes::room::get_room::<S>))
        .route("/rooms/{id}/members", get(routes::room::list_members::<S>))
        .route("/rooms/{id}/join", post(routes::room::join_room::<S>))
        .route("/rooms/{id}/leave", post(routes::room::leave_room::<S>))
        .route(
            "/rooms/{id}/members/{user_id}",
            put(routes::room::update_member::<S>),
        )
        // messages
        .route(
            "/rooms/{id}/messages",
            post(routes::message::post_message::<S>).get(routes::message::list_room_messages::<S>),
        )
        .route(
            "/messages/{id}",
            put(routes::message::edit_message::<S>).delete(routes::message::delete_message::<S>),
        )
        .route("/messages/{id}/replies", get(routes::message::list_replies::<S>))
        .route(
            "/messages/{id}/reactions",
            get(routes::message::list_reactions::<S>).post(routes::message::add_reaction::<S>),
        )
        .route(
            "/messages/{id}/reactions/{emoji}",
            delete(routes::message::remove_reaction::<S>),
        )
        // quizzes
        .route(
            "/quizzes",
            post(routes::quiz::create_quiz::<S>).get(routes::quiz::list_quizzes::<S>),
        )
        .route("/quizzes/attempts/mine", get(routes::quiz::list_my_attempts::<S>))
        .route("/quizzes/{id}", get(routes::quiz::get_quiz::<S>))
        .route("/quizzes/{id}/attempts", post(routes::quiz::submit_attempt::<S>))
        // notifications
        .route(
            "/notifications",
            get(routes::notification::list_notifications::<S>),
        )
        .route(
            "/notifications/read-all",
            post(routes::notification::mark_all_read::<S>),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notification::mark_read::<S>),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware::<S>));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    let router = router.layer(from_fn(log_errors));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding permissive CORS layer for development");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
