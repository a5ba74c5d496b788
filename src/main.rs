use std::{process, sync::Arc};

use bookshelf::{
    application::{
        access::AccessGuard,
        books::BookService,
        error::AppError,
        events::{EventNotifier, NoopNotifier},
        repos::{BooksRepo, BooksWriteRepo},
    },
    cache::{CacheBackend, CacheConfig, MemorySpeedCache, NoopSpeedCache, SpeedCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        events::{ChannelNotifier, EventSink, LogSink, RestProxySink},
        http::{self, ApiState, HealthState, RequestDeadline, RouterState},
        redis::RedisSpeedCache,
        telemetry,
    },
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        config::Command::CheckConfig(_) => {
            print_settings(&settings);
            Ok(())
        }
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
    }
}

fn print_settings(settings: &config::Settings) {
    println!("configuration is valid");
    for (key, value) in settings.summary() {
        println!("  {key} = {value}");
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    info!(
        environment = settings.environment.as_str(),
        addr = %settings.server.addr,
        "starting bookshelf"
    );

    let repositories = init_repositories(&settings).await?;
    let cache = init_cache(&settings).await?;
    let notifier = init_notifier(&settings)?;

    let reader: Arc<dyn BooksRepo> = repositories.clone();
    let writer: Arc<dyn BooksWriteRepo> = repositories.clone();
    let books = Arc::new(BookService::new(reader, writer, cache, settings.cache.ttl));

    let events: Arc<dyn EventNotifier> = match notifier.as_ref() {
        Some(channel) => channel.clone(),
        None => Arc::new(NoopNotifier),
    };

    let state = RouterState {
        api: ApiState {
            books,
            guard: Arc::new(AccessGuard::default()),
            events,
        },
        health: HealthState {
            store: repositories,
        },
        deadline: RequestDeadline(settings.server.request_timeout),
    };

    let result = serve_http(&settings, state).await;

    if let Some(channel) = notifier {
        channel.close(settings.server.graceful_shutdown).await;
    }

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database.url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    if settings.database.apply_schema {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(InfraError::from)?;
        info!("database schema applied");
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_cache(settings: &config::Settings) -> Result<Arc<dyn SpeedCache>, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);

    let cache: Arc<dyn SpeedCache> = match cache_config.backend {
        CacheBackend::Redis => {
            let url = cache_config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            Arc::new(RedisSpeedCache::connect(url).await?)
        }
        CacheBackend::Memory => Arc::new(MemorySpeedCache::new(&cache_config)),
        CacheBackend::Disabled => Arc::new(NoopSpeedCache),
    };

    info!(
        backend = cache_config.backend.as_str(),
        ttl_secs = cache_config.ttl.as_secs(),
        "speed cache ready"
    );
    Ok(cache)
}

fn init_notifier(settings: &config::Settings) -> Result<Option<Arc<ChannelNotifier>>, AppError> {
    let events = &settings.events;
    if !events.enabled {
        info!("event publishing disabled");
        return Ok(None);
    }

    let sink: Arc<dyn EventSink> = match events.rest_proxy_url.as_deref() {
        Some(url) => Arc::new(RestProxySink::new(
            url,
            events.topic.clone(),
            events.write_timeout,
        )?),
        None => {
            warn!("events.rest_proxy_url is not set; book events will only be logged");
            Arc::new(LogSink)
        }
    };

    info!(
        sink = sink.name(),
        topic = %events.topic,
        queue_capacity = events.queue_capacity.get(),
        "event notifier opened"
    );
    Ok(Some(Arc::new(ChannelNotifier::open(
        sink,
        events.queue_capacity.get(),
    ))))
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    http::serve_until(
        listener,
        router,
        shutdown_signal(),
        settings.server.graceful_shutdown,
    )
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
