use std::{process, sync::Arc, time::Duration};

use rfidsystem::{
    application::{
        caches::StudentCaches, error::AppError, lookup::LookupService, repos::StudentsRepo,
        scan::ScanService, scan_log::ScanLogService,
    },
    cache::CacheConfig,
    config,
    hub::{EventHub, HubConfig},
    infra::{
        directory::SeededDirectory,
        error::InfraError,
        http::{self, HttpState},
        scan_log::MemoryScanLog,
        simulator::Simulator,
        telemetry,
    },
};
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Simulate(args) => run_simulate(args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let students: Arc<dyn StudentsRepo> =
        Arc::new(SeededDirectory::load(&settings.directory.seed_file)?);

    let cache_config = CacheConfig::from(&settings.cache);
    let caches = Arc::new(StudentCaches::new(&cache_config)?);
    let (hub, hub_task) = EventHub::spawn(HubConfig::from(&settings.hub));
    let scan_log = MemoryScanLog::new(settings.scan_log.capacity);
    debug!(
        target = "rfidsystem::serve",
        capacity = scan_log.capacity(),
        "scan log ready"
    );
    let scan_logs = ScanLogService::new(Arc::new(scan_log));

    let purge_handle = cache_config
        .purge_interval()
        .map(|period| spawn_purge_task(Arc::clone(&caches), period));

    let state = HttpState {
        scans: Arc::new(ScanService::new(
            Arc::clone(&students),
            Arc::clone(&caches),
            hub.clone(),
            scan_logs.clone(),
        )),
        lookups: Arc::new(LookupService::new(students, caches, scan_logs.clone())),
        scan_logs,
        hub: hub.clone(),
    };

    let result = serve_http(&settings, state, hub.clone()).await;

    hub.shutdown();

    if let Some(handle) = purge_handle {
        handle.abort();
        let _ = handle.await;
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, hub_task).await {
        Ok(Ok(())) => info!(target = "rfidsystem::serve", "event hub stopped"),
        Ok(Err(err)) => warn!(
            target = "rfidsystem::serve",
            error = %err,
            "event hub task failed"
        ),
        Err(_) => warn!(
            target = "rfidsystem::serve",
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "event hub did not stop before the shutdown timeout"
        ),
    }

    result
}

async fn run_simulate(args: config::SimulateArgs) -> Result<(), AppError> {
    let simulator = Simulator::from_args(&args)?;

    info!(
        target = "rfidsystem::simulate",
        target_url = args.target.as_str(),
        cards = args.rfids.len(),
        interval_secs = args.interval_seconds,
        "Starting simulator"
    );

    let sent = simulator.run(shutdown_signal()).await;
    info!(target = "rfidsystem::simulate", sent, "Simulator finished");
    Ok(())
}

fn spawn_purge_task(caches: Arc<StudentCaches>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let purged = caches.purge_expired();
            if purged > 0 {
                debug!(
                    target = "rfidsystem::cache::purge",
                    purged, "expired cache entries purged"
                );
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    state: HttpState,
    hub: EventHub,
) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "rfidsystem::serve",
        addr = %settings.server.addr,
        "listening"
    );

    // Live streams only end once the hub closes them.
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            hub.shutdown();
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "rfidsystem::serve",
            error = %err,
            "failed to listen for ctrl-c, shutting down"
        );
    }
}
