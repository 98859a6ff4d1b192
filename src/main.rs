use docstore_rest::{app, load_privileges, AppState, ServiceConfig};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docstore_rest=info,tower_http=info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let privileges = load_privileges(config.privileges_path.as_deref()).await?;
    let state = AppState::from_config(&config).await?;
    let router = app(state, &privileges)?.layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        backend = ?config.store.backend,
        "docstore-rest listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, router).await?;
    Ok(())
}
