use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use timethezone::config::{self, parse_args, parse_config};
use timethezone::error::TimeTheZoneError;
use timethezone::server::{
    ServerState, create_zone, get_all_zones, get_city_time, get_current_time, get_index, get_time,
};
use timethezone::store::ZoneStore;

type AppRouter = Router<Arc<ServerState>>;

fn get_router() -> AppRouter {
    Router::new()
        .route("/", get(get_index))
        .route("/time", get(get_time))
        .route("/time/current", get(get_current_time))
        .route("/time/{city}", get(get_city_time))
        .route("/time/zones/all", get(get_all_zones))
        .route("/time/zones", post(create_zone))
}

// Runs the axum server, taking the shared ServerState and a oneshot
// Receiver that'll fire when it's time to shutdown (i.e. user hit ctrl+c)
async fn run_server(
    task_tracker: &TaskTracker,
    state: Arc<ServerState>,
    server_shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    info!("spinning up server");
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = TcpListener::bind(&addr).await.unwrap();
    let app = get_router().with_state(state);

    task_tracker.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_shutdown_signal(server_shutdown_rx))
            .await
            .unwrap();
    })
}

async fn server_shutdown_signal(server_shutdown_rx: oneshot::Receiver<()>) {
    server_shutdown_rx.await.unwrap();
    info!("Server received shutdown signal, exiting...");
}

// Loads the zone table if one exists, and if not, creates an empty one.
async fn init_zone_store(config: &config::Config) -> Result<ZoneStore, TimeTheZoneError> {
    if ZoneStore::exists(&config.zone_store_path).await? {
        Ok(ZoneStore::load(&config.zone_store_path).await?)
    } else {
        Ok(ZoneStore::create(&config.zone_store_path).await?)
    }
}

// One-time seed: only runs when the table is empty at boot. Uses the
// configured CSV when there is one, the builtin records otherwise.
async fn seed_zone_store(
    config: &config::Config,
    store: &mut ZoneStore,
) -> Result<(), TimeTheZoneError> {
    if !store.is_empty() {
        return Ok(());
    }
    match &config.seed_csv_path {
        Some(csv_path) => {
            info!("seeding empty zone table from {csv_path}");
            let contents = tokio::fs::read_to_string(csv_path)
                .await
                .map_err(TimeTheZoneError::ReadSeedCsvError)?;
            let inserted = store.seed_from_csv(&contents).await?;
            info!("seeded {inserted} timezone records");
        }
        None => {
            info!("seeding empty zone table with builtin records");
            store.seed_builtin().await?;
        }
    }
    Ok(())
}

// Start a thread that'll track when user hits ctrl+c and signal the server
// to shut down
fn run_shutdown_thread(
    task_tracker: &TaskTracker,
    server_shutdown_tx: oneshot::Sender<()>,
) -> JoinHandle<()> {
    info!("create shutdown thread");
    task_tracker.spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {err}");
        }
        server_shutdown_tx
            .send(())
            .expect("couldn't send server shutdown signal");
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), TimeTheZoneError> {
    env_logger::init();

    let args = parse_args();
    let config = parse_config(&args.config_path).await?;

    let task_tracker = TaskTracker::new();

    let mut store = init_zone_store(&config).await?;
    seed_zone_store(&config, &mut store).await?;
    let zone_store_lock = Arc::new(RwLock::new(store));

    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel::<()>();
    run_shutdown_thread(&task_tracker, server_shutdown_tx);

    let state = Arc::new(ServerState {
        config,
        zone_store_lock,
    });
    run_server(&task_tracker, state, server_shutdown_rx).await;

    task_tracker.close();
    task_tracker.wait().await;

    info!("shutdown complete");
    Ok(())
}
