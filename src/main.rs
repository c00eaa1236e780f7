use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unichat::{
    AppState,
    config::Config,
    database::{MemoryStore, PgStore, Store},
    mailer::mailer_from_config,
    router::create_router,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    if config.uses_memory_store() {
        tracing::warn!("DATABASE_URL selects the in-memory store, data is lost on exit");
        serve(MemoryStore::new(), config).await;
    } else {
        let store = PgStore::connect(&config)
            .await
            .expect("Failed to connect to Postgres");
        serve(store, config).await;
    }
}

async fn serve<S: Store>(store: S, config: Config) {
    let mailer = mailer_from_config(&config);
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );

    let app = create_router(AppState::new(store, config, mailer));

    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
