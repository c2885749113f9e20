use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use tripmate::mailer::LogMailer;
use tripmate::{build_app, db};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:data/tripmate.db".to_string());

    let pool = db::init_pool(&database_url).await;

    let secure_cookies = std::env::var("SECURE_COOKIES")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let app = build_app(pool, secure_cookies, Arc::new(LogMailer)).await;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.unwrap();

    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await.unwrap();
}
