//! weblinq gateway server entrypoint.
//!
//! Binds `listen_addr`, wires shared state, and serves until terminated.
//! Exit code 0 on a normal shutdown, 1 on a configuration error (spec.md §6).

use std::sync::Arc;

use object_store::local::LocalFileSystem;
use object_store::ObjectStore as ObjectStoreTrait;
use tracing_subscriber::EnvFilter;
use weblinq_gateway::artifact_store::ArtifactStore;
use weblinq_gateway::browser::{BrowserBinding, ChromiumoxideBinding, SessionPool};
use weblinq_gateway::clock::{Clock, SystemClock};
use weblinq_gateway::credit::CreditLedger;
use weblinq_gateway::gateway::auth::StaticKeyResolver;
use weblinq_gateway::gateway::{router, AppState};
use weblinq_gateway::search::{SearchAggregator, SearchRateLimiter};
use weblinq_gateway::user_actor::Registry;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "weblinq gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Arc::new(weblinq_gateway::from_env()?);

    std::fs::create_dir_all(&config.user_db_dir)?;

    let binding: Arc<dyn BrowserBinding> = Arc::new(ChromiumoxideBinding::new(
        /* max_concurrent */ 8,
        /* acquisitions_allowed */ 8,
        /* headless */ true,
    ));
    let pool = Arc::new(SessionPool::new(binding, config.session_keep_alive));

    let artifacts_backend: Arc<dyn ObjectStoreTrait> = Arc::new(LocalFileSystem::new_with_prefix(
        config.storage_bucket_url.trim_start_matches("file://"),
    )?);
    let artifacts = ArtifactStore::new(artifacts_backend, config.cdn_host().to_string());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let user_actors = Registry::new(config.user_db_dir.clone(), artifacts, clock);

    let limiter = SearchRateLimiter::new(config.rate_max_requests, config.rate_window);
    let search = Arc::new(SearchAggregator::new(limiter));

    let credit = CreditLedger::new();
    let auth = Arc::new(StaticKeyResolver::new(Default::default()));

    let state = AppState {
        pool,
        credit,
        user_actors,
        search,
        auth,
        config: config.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "weblinq gateway listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
