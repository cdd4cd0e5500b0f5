pub mod admin;
pub mod auth;
pub mod compose;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use relay_core::{BroadcastEngine, Composer, EngineConfig, Permissions};
use relay_db::Database;
use relay_gateway::Dispatcher;
use relay_types::UserId;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub permissions: Permissions,
    pub composer: Composer,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Wire the core together with the gateway dispatcher as its transport.
    pub fn new(db: Arc<Database>, owner_id: UserId, jwt_secret: String, engine: EngineConfig) -> AppState {
        let dispatcher = Dispatcher::new();
        let permissions = Permissions::new(db.clone(), owner_id);
        let engine = Arc::new(BroadcastEngine::new(
            db.clone(),
            Arc::new(dispatcher.clone()),
            engine,
        ));
        let composer = Composer::new(db.clone(), permissions.clone(), engine);

        Arc::new(Self {
            db,
            permissions,
            composer,
            dispatcher,
            jwt_secret,
        })
    }
}

/// All HTTP and WebSocket routes.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/start", post(users::start))
        .route("/users", get(users::list_users))
        .route("/stats", get(users::stats))
        .route("/compose", get(compose::view).post(compose::start))
        .route("/compose/recipients/{user_id}", post(compose::toggle))
        .route("/compose/finish", post(compose::finish))
        .route("/compose/text", post(compose::submit_text))
        .route("/compose/confirm", post(compose::confirm))
        .route("/compose/cancel", post(compose::cancel))
        .route("/reply/{sender_id}", post(compose::reply))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/messages", get(admin::recent_messages))
        .route("/admin/admins", get(admin::list_admins))
        .route(
            "/admin/admins/{user_id}",
            post(admin::grant_admin).delete(admin::revoke_admin),
        )
        .route("/admin/users/{user_id}/deactivate", post(admin::deactivate_user))
        .route("/admin/users/{user_id}", axum::routing::delete(admin::delete_user))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/gateway", get(gateway::upgrade))
        .merge(protected)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
