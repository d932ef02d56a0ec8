//! Portfolio stream: no subscription frame. Inbound JSON arrays are treated
//! as holdings snapshots; non-arrays are dropped (spec §4.5).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::store::model::HoldingsItem;
use crate::store::StoreGateway;

use super::{pump_messages, run_reconnect_loop};

const ACCOUNT_UNKNOWN: &str = "unknown";

pub async fn run(
    config: Arc<AppConfig>,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) {
    let url = config.stream_urls.portfolio.clone();

    run_reconnect_loop("portfolio", url, auth, cancel.clone(), move |ws| {
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
            debug!(error = %e, "dropping non-JSON portfolio frame");
            return;
        }
    };

    let Some(items) = value.as_array() else {
        debug!("dropping non-array portfolio frame");
        return;
    };

    let account = items
        .iter()
        .find_map(|i| i.get("account").and_then(|a| a.as_str()))
        .unwrap_or(ACCOUNT_UNKNOWN)
        .to_string();

    if let Err(e) = store.insert_holdings_snapshot(&account, &value).await {
        debug!(error = %e, "failed to store holdings snapshot");
    }

    for item in items {
        let holding = HoldingsItem::from_value(item);
        if let Err(e) = store.upsert_holdings_current(&holding).await {
            debug!(error = %e, "failed to upsert holdings_current row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_array_frames_are_identified_as_droppable() {
        let v = json!({"ok": true});
        assert!(v.as_array().is_none());
    }

    #[test]
    fn array_frame_yields_holdings_items() {
        let v = json!([
            {"account": "A1", "ticker": "SBER", "classCode": "TQBR", "quantity": 10.0, "balancePrice": 250.0, "currency": "RUB"},
            {"account": "A1", "ticker": "GAZP", "classCode": "TQBR", "quantity": 5.0, "balancePrice": 150.0, "currency": "RUB"},
        ]);
        let items: Vec<HoldingsItem> = v
            .as_array()
            .unwrap()
            .iter()
            .map(HoldingsItem::from_value)
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].ticker, "SBER");
        assert_eq!(items[1].avg_price, 150.0);
    }
}
