//! Limits stream: no subscription frame. Inbound object frames become
//! limits snapshots; non-objects are dropped (spec §4.5).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::store::StoreGateway;

use super::{pump_messages, run_reconnect_loop};

const ACCOUNT_UNKNOWN: &str = "unknown";

pub async fn run(
    config: Arc<AppConfig>,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) {
    let url = config.stream_urls.limits.clone();

    run_reconnect_loop("limits", url, auth, cancel.clone(), move |ws| {
        let store = store.clone();
        let cancel = cancel.clone();
        async move {
            let (mut write, mut read) = futures::StreamExt::split(ws);
            pump_messages(&mut write, &mut read, &cancel, |text| {
                let store = store.clone();
                async move { dispatch_and_store(&store, &text).await }
            })
            .await
        }
    })
    .await;
}

async fn dispatch_and_store(store: &StoreGateway, text: &str) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "dropping non-JSON limits frame");
            return;
        }
    };

    if !value.is_object() {
        debug!("dropping non-object limits frame");
        return;
    }

    let account = value
        .get("account")
        .and_then(|a| a.as_str())
        .unwrap_or(ACCOUNT_UNKNOWN);

    if let Err(e) = store.insert_limits_snapshot(account, &value).await {
        debug!(error = %e, "failed to store limits snapshot");
    }
}
