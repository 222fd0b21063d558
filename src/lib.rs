pub mod application;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::checkout::CheckoutService;
use application::fulfillment::FulfillmentService;
use application::reconciliation::ReconciliationEngine;
use domain::ports::{OrderStore, PaymentGateway};

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

/// Shared handler state: the store and gateway ports plus the application
/// services wired over them.
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub engine: Arc<ReconciliationEngine>,
    pub checkout: Arc<CheckoutService>,
    pub fulfillment: Arc<FulfillmentService>,
    /// When set, webhooks must carry this value in `x-callback-token`.
    pub webhook_token: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        public_base_url: &str,
        webhook_token: Option<String>,
    ) -> Self {
        Self {
            engine: Arc::new(ReconciliationEngine::new(store.clone())),
            checkout: Arc::new(CheckoutService::new(
                store.clone(),
                public_base_url.to_string(),
            )),
            fulfillment: Arc::new(FulfillmentService::new(store.clone())),
            store,
            gateway,
            webhook_token,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::orders::advance_status,
        handlers::payments::webhook,
        handlers::payments::sync_status,
        handlers::payments::sync_status_by_code,
        handlers::payments::success_redirect,
    ),
    components(schemas(
        handlers::orders::CreateOrderItemRequest,
        handlers::orders::CreateOrderRequest,
        handlers::orders::CreateOrderResponse,
        handlers::orders::OrderItemResponse,
        handlers::orders::PaymentResponse,
        handlers::orders::OrderResponse,
        handlers::orders::ListOrdersResponse,
        handlers::orders::UpdateOrderStatusRequest,
        handlers::orders::UpdateOrderStatusResponse,
        handlers::payments::WebhookNotification,
        handlers::payments::ReconcileSummary,
        handlers::payments::SyncStatusResponse,
        handlers::payments::SuccessRedirectResponse,
        domain::status::OrderStatus,
        domain::status::PaymentStatus,
    )),
    tags(
        (name = "orders", description = "Checkout and order lookup"),
        (name = "payments", description = "Payment reconciliation entry points"),
        (name = "admin", description = "Back-office fulfillment"),
    )
)]
pub struct ApiDoc;

/// Register every route. Shared between `build_server` and the in-process
/// HTTP tests, which supply their own `AppState`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::post().to(handlers::orders::create_order))
            .route("", web::get().to(handlers::orders::list_orders))
            .route(
                "/code/{code}/sync-status",
                web::post().to(handlers::payments::sync_status_by_code),
            )
            .route("/{id}", web::get().to(handlers::orders::get_order))
            .route(
                "/{id}/sync-status",
                web::post().to(handlers::payments::sync_status),
            ),
    )
    .service(
        web::scope("/payments")
            .route("/webhook", web::post().to(handlers::payments::webhook))
            .route(
                "/success/{code}",
                web::get().to(handlers::payments::success_redirect),
            ),
    )
    .service(web::scope("/admin").route(
        "/orders/{id}/status",
        web::patch().to(handlers::orders::advance_status),
    ));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let state = web::Data::new(state);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
