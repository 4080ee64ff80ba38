#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use practice_scheduler::{
        InMemoryTaskStore, PlannerConfig, StaticSkillSource, http_api, load_store_from_json,
    };
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "practice_scheduler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PlannerConfig::from_env()?;
    let addr: SocketAddr = config.http_addr.parse()?;

    let store = match std::env::var("PRACTICE_STORE_JSON") {
        Ok(path) => {
            tracing::info!(%path, "loading task store snapshot");
            load_store_from_json(path)?
        }
        Err(_) => InMemoryTaskStore::new(),
    };

    let state = http_api::AppState::new(store, StaticSkillSource::default(), config);
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
