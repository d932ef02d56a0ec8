//! Orders stream: two independent sub-workers (`execution` and
//! `transaction`), each on its own URL with identical message handling.
//! Inbound object frames (only) become order events (spec §4.5).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::store::model::OrderEventRecord;
use crate::store::StoreGateway;

use super::{pump_messages, run_reconnect_loop};

pub async fn run(
    config: Arc<AppConfig>,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) {
    let execution = run_sub_worker(
        "orders-execution",
        config.stream_urls.orders_execution.clone(),
        auth.clone(),
        store.clone(),
        cancel.clone(),
    );
    let transaction = run_sub_worker(
        "orders-transaction",
        config.stream_urls.orders_transaction.clone(),
        auth,
        store,
        cancel,
    );
    tokio::join!(execution, transaction);
}

async fn run_sub_worker(
    label: &'static str,
    url: String,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) {
    run_reconnect_loop(label, url, auth, cancel.clone(), move |ws| {
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
            debug!(error = %e, "dropping non-JSON orders frame");
            return;
        }
    };

    if !value.is_object() {
        debug!("dropping non-object orders frame");
        return;
    }

    let event = OrderEventRecord::from_value(&value);
    let transaction_time: DateTime<Utc> = crate::time::parse_event_time(event.transaction_time.as_deref());

    if let Err(e) = store
        .insert_order_event(&event, Some(transaction_time))
        .await
    {
        debug!(error = %e, "failed to store order event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_frames_are_identified_as_droppable() {
        let v = json!([1, 2, 3]);
        assert!(!v.is_object());
    }

    #[test]
    fn object_frame_extracts_order_event_fields() {
        let v = json!({
            "originalClientOrderId": "abc",
            "clientOrderId": "abc-1",
            "orderStatus": "Filled",
            "executionType": "Trade",
            "ticker": "SBER",
            "classCode": "TQBR",
            "transactionTime": "2024-05-01T10:00:00Z",
        });
        let event = OrderEventRecord::from_value(&v);
        assert_eq!(event.client_order_id, "abc-1");
        assert_eq!(event.order_status, "Filled");
    }
}
