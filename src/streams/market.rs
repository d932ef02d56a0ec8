//! Market stream: subscribes to order book, quotes, last-trades, and candle
//! data for the configured instruments and dispatches inbound frames by
//! `responseType` (spec §4.5).

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::Authenticator;
use crate::config::{AppConfig, StoreFlags};
use crate::error::IngestError;
use crate::store::model::{Instrument, MarketFrame};
use crate::store::StoreGateway;
use crate::time::parse_event_time;

use super::{pump_messages, run_reconnect_loop, send_json, WsWrite};

const DATA_TYPE_ORDERBOOK: u8 = 0;
const DATA_TYPE_CANDLES: u8 = 1;
const DATA_TYPE_LAST_TRADES: u8 = 2;
const DATA_TYPE_QUOTES: u8 = 3;
const ORDERBOOK_DEPTH: u32 = 20;

pub async fn run(
    config: Arc<AppConfig>,
    instruments: Vec<Instrument>,
    auth: Arc<Authenticator>,
    store: StoreGateway,
    cancel: CancellationToken,
) {
    if instruments.is_empty() {
        info!(stream = "market", "no instruments configured, not starting");
        return;
    }

    let flags = config.store_flags.clone();
    let timeframe = config.candle_timeframe.clone();
    let url = config.stream_urls.market.clone();

    run_reconnect_loop("market", url, auth, cancel.clone(), move |ws| {
        let store = store.clone();
        let flags = flags.clone();
        let timeframe = timeframe.clone();
        let instruments = instruments.clone();
        let cancel = cancel.clone();
        async move {
            let (mut write, mut read) = futures::StreamExt::split(ws);
            send_subscriptions(&mut write, &instruments, &flags, &timeframe).await?;

            pump_messages(&mut write, &mut read, &cancel, |text| {
                let store = store.clone();
                async move { dispatch_and_store(&store, &text).await }
            })
            .await
        }
    })
    .await;
}

async fn send_subscriptions(
    write: &mut WsWrite,
    instruments: &[Instrument],
    flags: &StoreFlags,
    timeframe: &str,
) -> Result<(), IngestError> {
    let instrument_values: Vec<_> = instruments
        .iter()
        .map(|i| json!({"ticker": i.ticker, "classCode": i.class_code}))
        .collect();

    if flags.orderbook {
        send_json(
            write,
            &json!({
                "subscribeType": 0,
                "dataType": DATA_TYPE_ORDERBOOK,
                "depth": ORDERBOOK_DEPTH,
                "instruments": instrument_values,
            }),
        )
        .await?;
    }
    if flags.candles {
        send_json(
            write,
            &json!({
                "subscribeType": 0,
                "dataType": DATA_TYPE_CANDLES,
                "timeFrame": timeframe,
                "instruments": instrument_values,
            }),
        )
        .await?;
    }
    if flags.last_trades {
        send_json(
            write,
            &json!({
                "subscribeType": 0,
                "dataType": DATA_TYPE_LAST_TRADES,
                "instruments": instrument_values,
            }),
        )
        .await?;
    }
    if flags.quotes {
        send_json(
            write,
            &json!({
                "subscribeType": 0,
                "dataType": DATA_TYPE_QUOTES,
                "instruments": instrument_values,
            }),
        )
        .await?;
    }
    Ok(())
}

/// Parses and stores a single inbound market frame. Unknown `responseType`
/// values and non-JSON frames are dropped silently. The full original JSON
/// value is always what gets persisted, regardless of which typed fields
/// were extracted for dispatch.
async fn dispatch_and_store(store: &StoreGateway, text: &str) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "dropping non-JSON market frame");
            return;
        }
    };

    let result = match MarketFrame::classify(&value) {
        MarketFrame::OrderBook(f) => {
            let event_time = parse_event_time(f.date_time.as_deref());
            store
                .insert_order_book(&f.ticker, &f.class_code, event_time, &value)
                .await
        }
        MarketFrame::Quotes(f) => {
            let event_time = parse_event_time(f.date_time.as_deref());
            store
                .insert_quotes(&f.ticker, &f.class_code, event_time, &value)
                .await
        }
        MarketFrame::LastTrades(f) => {
            let event_time = parse_event_time(f.date_time.as_deref());
            store
                .insert_last_trades(&f.ticker, &f.class_code, event_time, &value)
                .await
        }
        MarketFrame::CandleStick(f) => {
            let event_time = parse_event_time(f.date_time.as_deref());
            store
                .insert_candle(
                    &f.ticker,
                    &f.class_code,
                    &f.time_frame,
                    event_time,
                    f.open,
                    f.high,
                    f.low,
                    f.close,
                    f.volume,
                    &value,
                )
                .await
        }
        MarketFrame::Other => return,
    };

    if let Err(e) = result {
        debug!(error = %e, "failed to store market frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_frame_shape_matches_wire_contract() {
        let instruments = vec![Instrument::new("SBER", "TQBR")];
        let values: Vec<_> = instruments
            .iter()
            .map(|i| json!({"ticker": i.ticker, "classCode": i.class_code}))
            .collect();
        let frame = json!({
            "subscribeType": 0,
            "dataType": DATA_TYPE_ORDERBOOK,
            "depth": ORDERBOOK_DEPTH,
            "instruments": values,
        });
        assert_eq!(frame["dataType"], json!(0));
        assert_eq!(frame["depth"], json!(20));
        assert_eq!(frame["instruments"][0]["ticker"], json!("SBER"));
    }
}
