use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use order_payment_service::infrastructure::gateway::HttpPaymentGateway;
use order_payment_service::infrastructure::store::DieselOrderStore;
use order_payment_service::{build_server, create_pool, run_migrations, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .expect("PORT must be a valid number");
    let gateway_base_url = env::var("GATEWAY_BASE_URL").expect("GATEWAY_BASE_URL must be set");
    let gateway_api_key = env::var("GATEWAY_API_KEY").expect("GATEWAY_API_KEY must be set");
    let public_base_url =
        env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));
    let webhook_token = env::var("WEBHOOK_CALLBACK_TOKEN").ok();

    let pool = create_pool(&database_url);
    run_migrations(&pool);

    let store = Arc::new(DieselOrderStore::new(pool));
    let gateway = Arc::new(HttpPaymentGateway::new(&gateway_base_url, &gateway_api_key));
    let state = AppState::new(store, gateway, &public_base_url, webhook_token);

    log::info!("Starting server at http://{}:{}", host, port);

    build_server(state, &host, port)?.await
}
