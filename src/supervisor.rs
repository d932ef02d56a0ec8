//! Owns configuration load, the shared Authenticator and Store Gateway, and
//! the lifecycle of every worker task (spec §4.6).

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::db::Databases;
use crate::embedding::backend::BackendAdapter;
use crate::embedding::pump::EmbeddingPump;
use crate::store::model::Instrument;
use crate::store::StoreGateway;
use crate::streams;

const IDLE_EXIT_SLEEP: Duration = Duration::from_secs(60 * 60);

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let dbs = Databases::connect(
        &config.market_database_url(),
        &config.private_database_url(),
        config.db_max_connections,
    )
    .await?;
    dbs.migrate().await?;
    let store = StoreGateway::new(&dbs);

    let mut instruments = instruments_from_env(&config);
    if config.use_db_instruments {
        match store.fetch_selected_assets().await {
            Ok(db_instruments) if !db_instruments.is_empty() => {
                instruments = db_instruments;
            }
            Ok(_) => {
                info!("selected_assets empty, falling back to configured instrument list");
            }
            Err(e) => {
                warn!(error = %e, "failed to load selected_assets, falling back to configured instrument list");
            }
        }
    }

    let streams_enabled = !config.refresh_token.is_empty();
    if !streams_enabled {
        warn!("refresh credential is empty, stream workers disabled; embedding pump still runs");
    }

    let root_cancel = CancellationToken::new();
    let mut worker_handles = Vec::new();

    if streams_enabled {
        let auth = Arc::new(Authenticator::new(
            config.token_url.clone(),
            config.client_id.clone(),
            config.refresh_token.clone(),
        ));

        if config.streams.market {
            worker_handles.push(spawn_market(
                config.clone(),
                instruments.clone(),
                auth.clone(),
                store.clone(),
                root_cancel.child_token(),
            ));
        }
        if config.streams.portfolio {
            worker_handles.push(tokio::spawn(streams::portfolio::run(
                config.clone(),
                auth.clone(),
                store.clone(),
                root_cancel.child_token(),
            )));
        }
        if config.streams.orders {
            worker_handles.push(tokio::spawn(streams::orders::run(
                config.clone(),
                auth.clone(),
                store.clone(),
                root_cancel.child_token(),
            )));
        }
        if config.streams.limits {
            worker_handles.push(tokio::spawn(streams::limits::run(
                config.clone(),
                auth.clone(),
                store.clone(),
                root_cancel.child_token(),
            )));
        }
        if config.streams.marginal {
            worker_handles.push(tokio::spawn(streams::marginal::run(
                config.clone(),
                auth,
                store.clone(),
                root_cancel.child_token(),
            )));
        }
    }

    let backend = BackendAdapter::new(config.embedding.clone());
    let pump = EmbeddingPump::new(store, backend);
    let pump_cancel = root_cancel.child_token();
    let pump_handle = tokio::spawn(async move { pump.run(pump_cancel).await });

    // The embedding pump is unconditionally spawned above, so this branch is
    // never reached in practice; kept so the "no tasks at all" case falls
    // back to a bounded sleep instead of hanging forever with nothing to
    // cancel. With zero stream workers and the pump running (e.g. an empty
    // refresh credential), the process instead waits indefinitely for a
    // shutdown signal, matching the always-on pump.
    if worker_handles.is_empty() && pump_handle.is_finished() {
        info!("no workers spawned, idling");
        tokio::time::sleep(IDLE_EXIT_SLEEP).await;
        return Ok(());
    }

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, cancelling workers");
    root_cancel.cancel();

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = pump_handle.await;

    Ok(())
}

fn spawn_market(
    config: Arc<AppConfig>,
    instruments: Vec<Instrument>,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(streams::market::run(config, instruments, auth, store, cancel))
}

fn instruments_from_env(config: &AppConfig) -> Vec<Instrument> {
    config
        .subscribe_instruments
        .iter()
        .map(|(ticker, class_code)| Instrument::new(ticker.clone(), class_code.clone()))
        .collect()
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, SIGINT only");
            let _ = ctrl_c.await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}
