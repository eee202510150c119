#![forbid(unused_must_use)]

use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use directories::ProjectDirs;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use instant_share::blobstore::DiskBlobStore;
use instant_share::config::AppConfig;
use instant_share::handlers::{FileRoutes, HealthRoutes, MintRoutes};
use instant_share::registry::Registry;
use instant_share::state::AppState;
use instant_share::{commands, logging, request_logging};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let matches = commands::build_command().get_matches();
    logging::initialize_from_matches(&matches);

    info!("Hi. 👋");

    let dirs = match ProjectDirs::from("io.github", "instant-share", "instant-share") {
        Some(dirs) => dirs,
        None => {
            error!("could not determine the project directories");
            return ExitCode::from(exitcode::OSERR as u8);
        }
    };

    let cfg = match AppConfig::load(dirs.config_local_dir(), &matches) {
        Ok(cfg) => cfg,
        Err(_) => return ExitCode::from(exitcode::CONFIG as u8),
    };

    let blob_store = match DiskBlobStore::new(&cfg.storage_dir) {
        Ok(store) => store,
        Err(e) => {
            error!(
                storage_dir = %cfg.storage_dir.display(),
                error = %e,
                "storage directory does not exist; refusing to start"
            );
            return ExitCode::from(exitcode::CONFIG as u8);
        }
    };

    let registry = Registry::new(blob_store, cfg.idle_timeout());

    let app_state = AppState {
        registry,
        max_upload_bytes: cfg.max_upload_bytes,
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    register_shutdown_handler(shutdown_tx.clone());

    let app = Router::new()
        .map_mint_endpoint()
        .map_file_endpoint()
        .map_health_endpoints()
        .with_state(app_state)
        .layer(axum::middleware::from_fn(request_logging::log_requests));

    let mut listeners = Vec::new();
    for addr in &cfg.bind_http {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                info!("listening on http://{addr}");
                listeners.push(listener);
            }
            Err(e) => {
                error!(%addr, error = %e, "unable to bind");
                return ExitCode::from(exitcode::OSERR as u8);
            }
        }
    }

    if cfg.bind_https.is_some() {
        warn!("TLS is configured but not implemented; ignoring bind_https (see specification §6)");
    }

    let mut servers = Vec::new();
    for listener in listeners {
        let app = app.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        servers.push(tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await
        }));
    }

    let mut exit_code = ExitCode::SUCCESS;
    for server in servers {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "server error");
                exit_code = ExitCode::from(exitcode::OSERR as u8);
            }
            Err(e) => {
                error!(error = %e, "server task panicked");
                exit_code = ExitCode::from(exitcode::SOFTWARE as u8);
            }
        }
    }

    info!("Bye. 👋");
    exit_code
}

fn register_shutdown_handler(shutdown_tx: broadcast::Sender<()>) {
    ctrlc::set_handler(move || {
        warn!("initiating shutdown from OS");
        shutdown_tx.send(()).ok();
    })
    .expect("error setting process termination handler");
}
