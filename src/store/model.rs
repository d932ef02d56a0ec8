use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of an instrument: the pair `(ticker, class_code)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub class_code: String,
}

impl Instrument {
    pub fn new(ticker: impl Into<String>, class_code: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            class_code: class_code.into(),
        }
    }
}

/// A market-stream inbound frame, classified by `responseType`. Unknown or
/// missing tags classify as `Other`; the raw JSON value is always preserved
/// verbatim for storage regardless of which variant it parses into (spec
/// §4.2/§9).
#[derive(Debug)]
pub enum MarketFrame {
    OrderBook(TickerFields),
    Quotes(TickerFields),
    LastTrades(TickerFields),
    CandleStick(CandleFields),
    Other,
}

/// Fields shared by order book, quotes, and last-trades frames.
#[derive(Debug)]
pub struct TickerFields {
    pub ticker: String,
    pub class_code: String,
    pub date_time: Option<String>,
}

#[derive(Debug)]
pub struct CandleFields {
    pub ticker: String,
    pub class_code: String,
    pub time_frame: String,
    pub date_time: Option<String>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

fn string_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn f64_field(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

impl MarketFrame {
    /// Classifies a raw inbound JSON value by its `responseType` tag.
    pub fn classify(v: &Value) -> Self {
        let ticker_fields = || TickerFields {
            ticker: string_field(v, "ticker"),
            class_code: string_field(v, "classCode"),
            date_time: v.get("dateTime").and_then(Value::as_str).map(String::from),
        };

        match v.get("responseType").and_then(Value::as_str) {
            Some("OrderBook") => MarketFrame::OrderBook(ticker_fields()),
            Some("Quotes") => MarketFrame::Quotes(ticker_fields()),
            Some("LastTrades") => MarketFrame::LastTrades(ticker_fields()),
            Some("CandleStick") => MarketFrame::CandleStick(CandleFields {
                ticker: string_field(v, "ticker"),
                class_code: string_field(v, "classCode"),
                time_frame: string_field(v, "timeFrame"),
                date_time: v.get("dateTime").and_then(Value::as_str).map(String::from),
                open: f64_field(v, "open"),
                high: f64_field(v, "high"),
                low: f64_field(v, "low"),
                close: f64_field(v, "close"),
                volume: f64_field(v, "volume"),
            }),
            _ => MarketFrame::Other,
        }
    }
}

/// A single holdings item extracted from a portfolio snapshot array.
#[derive(Debug, Clone, Default)]
pub struct HoldingsItem {
    pub account: String,
    pub ticker: String,
    pub class_code: String,
    pub quantity: f64,
    pub avg_price: f64,
    pub currency: String,
    pub raw: Value,
}

impl HoldingsItem {
    /// Parses a single holdings element, applying the field-aliasing rules
    /// from spec §4.2: `class_code` from `board`/`classCode`/`class_code`
    /// (first non-empty), `avg_price` from `balancePrice` else `averagePrice`.
    pub fn from_value(v: &Value) -> Self {
        let get_str = |key: &str| -> String {
            v.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let get_f64 = |key: &str| -> f64 { v.get(key).and_then(Value::as_f64).unwrap_or(0.0) };

        let class_code = ["board", "classCode", "class_code"]
            .iter()
            .map(|k| get_str(k))
            .find(|s| !s.is_empty())
            .unwrap_or_default();

        let avg_price = {
            let balance = v.get("balancePrice").and_then(Value::as_f64);
            balance.unwrap_or_else(|| get_f64("averagePrice"))
        };

        Self {
            account: get_str("account"),
            ticker: get_str("ticker"),
            class_code,
            quantity: get_f64("quantity"),
            avg_price,
            currency: get_str("currency"),
            raw: v.clone(),
        }
    }
}

/// A single order event extracted from an orders-stream inbound frame.
#[derive(Debug, Clone, Default)]
pub struct OrderEventRecord {
    pub original_client_order_id: String,
    pub client_order_id: String,
    pub order_status: String,
    pub execution_type: String,
    pub ticker: String,
    pub class_code: String,
    pub transaction_time: Option<String>,
    pub raw: Value,
}

impl OrderEventRecord {
    pub fn from_value(v: &Value) -> Self {
        let get_str = |key: &str| -> String {
            v.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            original_client_order_id: get_str("originalClientOrderId"),
            client_order_id: get_str("clientOrderId"),
            order_status: get_str("orderStatus"),
            execution_type: get_str("executionType"),
            ticker: get_str("ticker"),
            class_code: get_str("classCode"),
            transaction_time: v
                .get("transactionTime")
                .and_then(Value::as_str)
                .map(String::from),
            raw: v.clone(),
        }
    }
}

/// Queue row lifecycle status (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl QueueStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Done => "done",
            QueueStatus::Error => "error",
        }
    }
}

/// A row leased from `embedding_queue`.
#[derive(Debug, Clone)]
pub struct EmbeddingJob {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub text: String,
    pub metadata: Value,
}

/// Renders a float vector for storage/wire compatibility: `[v1,...,vN]` with
/// fixed 8-fraction-digit formatting (spec §3, §9).
pub fn format_vector(vector: &[f64]) -> String {
    let joined = vector
        .iter()
        .map(|v| format!("{:.8}", v))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{joined}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_vector_uses_eight_fraction_digits() {
        assert_eq!(format_vector(&[0.1, 0.2, 0.3]), "[0.10000000,0.20000000,0.30000000]");
        assert_eq!(format_vector(&[1.0]), "[1.00000000]");
        assert_eq!(format_vector(&[]), "[]");
    }

    #[test]
    fn holdings_item_prefers_board_then_class_code_aliases() {
        let v = json!({"board": "TQBR", "classCode": "XX", "account": "A1", "ticker": "SBER", "balancePrice": 250.5, "quantity": 10.0, "currency": "RUB"});
        let item = HoldingsItem::from_value(&v);
        assert_eq!(item.class_code, "TQBR");
        assert_eq!(item.avg_price, 250.5);
    }

    #[test]
    fn holdings_item_falls_back_to_average_price() {
        let v = json!({"classCode": "TQBR", "averagePrice": 99.0});
        let item = HoldingsItem::from_value(&v);
        assert_eq!(item.class_code, "TQBR");
        assert_eq!(item.avg_price, 99.0);
    }

    #[test]
    fn market_frame_unknown_tag_classifies_as_other() {
        let v = json!({"responseType": "SomethingElse", "foo": "bar"});
        assert!(matches!(MarketFrame::classify(&v), MarketFrame::Other));

        let v = json!({"foo": "bar"});
        assert!(matches!(MarketFrame::classify(&v), MarketFrame::Other));
    }

    #[test]
    fn market_frame_candlestick_extracts_known_fields() {
        let v = json!({
            "responseType": "CandleStick",
            "ticker": "SBER",
            "classCode": "TQBR",
            "timeFrame": "M1",
            "dateTime": "2024-05-01T10:00:00Z",
            "open": 1.0,
            "high": 2.0,
            "low": 0.5,
            "close": 1.5,
            "volume": 100.0,
        });
        match MarketFrame::classify(&v) {
            MarketFrame::CandleStick(c) => {
                assert_eq!(c.ticker, "SBER");
                assert_eq!(c.class_code, "TQBR");
                assert_eq!(c.close, 1.5);
            }
            _ => panic!("expected CandleStick variant"),
        }
    }
}
