/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use housepoints_api::{app::{build_router, AppState}, config::Config};
/// use housepoints_shared::db::pool::create_pool;
/// use housepoints_shared::store::postgres::PgStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::security_headers};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use housepoints_shared::{
    auth::{
        guard::{ADMINS, ANY_ROLE, STAFF, STUDENTS},
        middleware::{role_guard, RouteGuard},
        token::TokenService,
    },
    ledger::ResultLedger,
    models::user::Role,
    standings::StandingAggregator,
    store::SchoolStore,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; every field is
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SchoolStore>,
    pub tokens: Arc<TokenService>,
    pub ledger: ResultLedger,
    pub standings: StandingAggregator,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn SchoolStore>, config: Config) -> Self {
        let tokens = TokenService::with_ttl(
            &config.auth.jwt_secret,
            chrono::Duration::hours(config.auth.session_ttl_hours),
        );

        Self {
            ledger: ResultLedger::new(Arc::clone(&store)),
            standings: StandingAggregator::new(Arc::clone(&store)),
            store,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }

    fn guard(&self, allowed: &'static [Role]) -> RouteGuard {
        RouteGuard::new(Arc::clone(&self.tokens), allowed)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET    /health                      public
/// ├── POST   /auth/login                  public
/// ├── GET    /student/dashboard           student
/// ├── GET    /teacher/dashboard           teacher, admin
/// ├── POST   /teacher/results             teacher, admin
/// ├── PUT    /teacher/results/:id         teacher, admin
/// ├── DELETE /teacher/results/:id         teacher, admin
/// ├── GET    /house-spirits               any signed-in role
/// ├── GET    /admin/standings/drift       admin
/// └── POST   /admin/standings/reconcile   admin
/// ```
///
/// Each role-restricted group sits behind its own [`role_guard`] layer, so
/// no handler in a group runs without verified claims of an allowed role.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/login", post(routes::auth::login));

    let student_routes = Router::new()
        .route("/student/dashboard", get(routes::student::dashboard))
        .route_layer(from_fn_with_state(state.guard(STUDENTS), role_guard));

    let teacher_routes = Router::new()
        .route("/teacher/dashboard", get(routes::teacher::dashboard))
        .route("/teacher/results", post(routes::teacher::create_result))
        .route(
            "/teacher/results/:id",
            put(routes::teacher::update_result).delete(routes::teacher::delete_result),
        )
        .route_layer(from_fn_with_state(state.guard(STAFF), role_guard));

    let standings_routes = Router::new()
        .route("/house-spirits", get(routes::house_spirits::list))
        .route_layer(from_fn_with_state(state.guard(ANY_ROLE), role_guard));

    let admin_routes = Router::new()
        .route("/admin/standings/drift", get(routes::admin::drift))
        .route("/admin/standings/reconcile", post(routes::admin::reconcile))
        .route_layer(from_fn_with_state(state.guard(ADMINS), role_guard));

    let cors = if state.config.allows_any_origin() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(public_routes)
        .merge(student_routes)
        .merge(teacher_routes)
        .merge(standings_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(from_fn_with_state(production, security_headers))
        .with_state(state)
}
