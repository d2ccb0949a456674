use crate::cli::ServeArgs;
use crate::infra::{load_seed, AppState};
use crate::routes::with_publication_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hiring_desk::config::AppConfig;
use hiring_desk::error::AppError;
use hiring_desk::telemetry;
use hiring_desk::workflows::publication::metrics::register_metrics;
use hiring_desk::workflows::publication::{
    ChannelRegistry, FanOutExecutor, InMemoryPostingRepository, InMemoryRunStore, JobPosting,
    PostingRepository, PublicationService, RunStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    register_metrics();

    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = Arc::new(ChannelRegistry::from_config(&config.publishing)?);
    if registry.is_empty() {
        warn!("no publishing channels configured; postings will only be published internally");
    }
    let executor = FanOutExecutor::from_config(&config.publishing);
    let seed = match args.seed.take() {
        Some(path) => load_seed(&path)?,
        None => Vec::new(),
    };

    let app = match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            use hiring_desk::workflows::publication::PgPublicationStore;

            let store = PgPublicationStore::connect(url).await?;
            for posting in &seed {
                store.upsert(posting).await?;
            }
            let store = Arc::new(store);
            info!(seeded = seed.len(), "using postgres publication store");
            build_app(store.clone(), store, registry, executor)
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("DATABASE_URL is set but postgres support is not compiled in; using memory");
            in_memory_app(seed, registry, executor)
        }
        None => in_memory_app(seed, registry, executor),
    };

    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    let channels = channel_names(&config);
    info!(
        ?config.environment,
        %addr,
        ?channels,
        timeout_ms = config.publishing.channel_timeout.as_millis() as u64,
        max_in_flight = config.publishing.max_in_flight,
        "job posting publication service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn channel_names(config: &AppConfig) -> Vec<&str> {
    config
        .publishing
        .channels
        .iter()
        .map(|spec| spec.name.as_str())
        .collect()
}

fn in_memory_app(
    seed: Vec<JobPosting>,
    registry: Arc<ChannelRegistry>,
    executor: FanOutExecutor,
) -> axum::Router {
    info!(seeded = seed.len(), "using in-memory publication store");
    build_app(
        Arc::new(InMemoryPostingRepository::with_postings(seed)),
        Arc::new(InMemoryRunStore::default()),
        registry,
        executor,
    )
}

fn build_app<P, S>(
    postings: Arc<P>,
    runs: Arc<S>,
    registry: Arc<ChannelRegistry>,
    executor: FanOutExecutor,
) -> axum::Router
where
    P: PostingRepository + 'static,
    S: RunStore + 'static,
{
    let service = Arc::new(PublicationService::new(postings, runs, registry, executor));
    with_publication_routes(service)
}
