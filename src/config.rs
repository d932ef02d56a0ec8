use std::env;

/// Which of the two embedding backend protocols is primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    LlmMcp,
    Ollama,
}

impl BackendKind {
    fn from_env_value(v: &str) -> Self {
        match v.to_ascii_lowercase().as_str() {
            "ollama" => BackendKind::Ollama,
            _ => BackendKind::LlmMcp,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamFlags {
    pub market: bool,
    pub portfolio: bool,
    pub orders: bool,
    pub limits: bool,
    pub marginal: bool,
}

/// Websocket endpoints for each stream. The spec leaves the concrete URLs
/// unspecified (an operational detail of the broker's API); these are
/// env-overridable with the vendor's documented default hosts.
#[derive(Clone, Debug)]
pub struct StreamUrls {
    pub market: String,
    pub portfolio: String,
    pub orders_execution: String,
    pub orders_transaction: String,
    pub limits: String,
    pub marginal: String,
}

#[derive(Clone, Debug)]
pub struct StoreFlags {
    pub orderbook: bool,
    pub quotes: bool,
    pub last_trades: bool,
    pub candles: bool,
}

#[derive(Clone, Debug)]
pub struct EmbeddingBackendConfig {
    pub primary: BackendKind,
    pub llm_mcp_base_url: String,
    pub llm_mcp_provider: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub fallback_to_ollama: bool,
    pub timeout_sec: u64,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // Auth
    pub refresh_token: String,
    pub client_id: String,
    pub token_url: String,

    // DB
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_market: String,
    pub db_private: String,
    pub db_max_connections: u32,

    // Streams
    pub streams: StreamFlags,
    pub stream_urls: StreamUrls,
    pub store_flags: StoreFlags,
    pub subscribe_instruments: Vec<(String, String)>,
    pub use_db_instruments: bool,
    pub candle_timeframe: String,

    // Embedding backend
    pub embedding: EmbeddingBackendConfig,

    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            refresh_token: env_str("BCS_REFRESH_TOKEN", ""),
            client_id: env_str("BCS_CLIENT_ID", "trade-api-read"),
            token_url: env_str(
                "BCS_TOKEN_URL",
                "https://id.bcs.ru/auth/realms/bcs/protocol/openid-connect/token",
            ),

            db_host: env_str("BCS_DB_HOST", "localhost"),
            db_port: env_str("BCS_DB_PORT", "5432").parse().unwrap_or(5432),
            db_user: env_str("BCS_DB_USER", "postgres"),
            db_password: env_str("BCS_DB_PASSWORD", ""),
            db_market: env_str("BCS_DB_MARKET", "market"),
            db_private: env_str("BCS_DB_PRIVATE", "private"),
            db_max_connections: 16,

            streams: StreamFlags {
                market: env_bool("BCS_STREAM_MARKET", true),
                portfolio: env_bool("BCS_STREAM_PORTFOLIO", true),
                orders: env_bool("BCS_STREAM_ORDERS", true),
                limits: env_bool("BCS_STREAM_LIMITS", true),
                marginal: env_bool("BCS_STREAM_MARGINAL", true),
            },
            stream_urls: StreamUrls {
                market: env_str("BCS_WS_MARKET_URL", "wss://trade-api.bcs.ru/ws/market"),
                portfolio: env_str("BCS_WS_PORTFOLIO_URL", "wss://trade-api.bcs.ru/ws/portfolio"),
                orders_execution: env_str(
                    "BCS_WS_ORDERS_EXECUTION_URL",
                    "wss://trade-api.bcs.ru/ws/orders/execution",
                ),
                orders_transaction: env_str(
                    "BCS_WS_ORDERS_TRANSACTION_URL",
                    "wss://trade-api.bcs.ru/ws/orders/transaction",
                ),
                limits: env_str("BCS_WS_LIMITS_URL", "wss://trade-api.bcs.ru/ws/limits"),
                marginal: env_str("BCS_WS_MARGINAL_URL", "wss://trade-api.bcs.ru/ws/marginal"),
            },
            store_flags: StoreFlags {
                orderbook: env_bool("BCS_STORE_ORDERBOOK", true),
                quotes: env_bool("BCS_STORE_QUOTES", true),
                last_trades: env_bool("BCS_STORE_LAST_TRADES", true),
                candles: env_bool("BCS_STORE_CANDLES", true),
            },
            subscribe_instruments: parse_instruments(&env_str("BCS_SUBSCRIBE_INSTRUMENTS", "")),
            use_db_instruments: env_bool("BCS_USE_DB_INSTRUMENTS", false),
            candle_timeframe: env_str("BCS_CANDLE_TIMEFRAME", "M1"),

            embedding: EmbeddingBackendConfig {
                primary: BackendKind::from_env_value(&env_str("LLM_BACKEND", "llm_mcp")),
                llm_mcp_base_url: env_str("LLM_MCP_BASE_URL", "http://localhost:8090"),
                llm_mcp_provider: env_str("LLM_MCP_PROVIDER", "auto"),
                ollama_base_url: env_str("OLLAMA_BASE_URL", "http://localhost:11434"),
                ollama_model: env_str("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
                fallback_to_ollama: env_bool("LLM_BACKEND_FALLBACK_OLLAMA", true),
                timeout_sec: env_str("LLM_BACKEND_TIMEOUT_SEC", "30").parse().unwrap_or(30),
            },

            log_level: env_str("LOG_LEVEL", "info"),
        }
    }

    pub fn market_database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_market
        )
    }

    pub fn private_database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_private
        )
    }
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses booleans accepting `1/true/yes/y`, case-insensitive, per spec §6.
fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y"),
        Err(_) => default,
    }
}

/// Parses `class_code:ticker,class_code:ticker,...` into `(ticker, class_code)` pairs.
fn parse_instruments(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, ':');
            let class_code = parts.next()?.trim();
            let ticker = parts.next()?.trim();
            if class_code.is_empty() || ticker.is_empty() {
                None
            } else {
                Some((ticker.to_string(), class_code.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instrument_pairs() {
        let parsed = parse_instruments("TQBR:SBER, TQBR:GAZP");
        assert_eq!(
            parsed,
            vec![
                ("SBER".to_string(), "TQBR".to_string()),
                ("GAZP".to_string(), "TQBR".to_string()),
            ]
        );
    }

    #[test]
    fn empty_instrument_string_yields_empty_vec() {
        assert!(parse_instruments("").is_empty());
        assert!(parse_instruments("   ").is_empty());
    }

    #[test]
    fn malformed_pairs_are_skipped() {
        let parsed = parse_instruments("TQBR:SBER,garbage,:");
        assert_eq!(parsed, vec![("SBER".to_string(), "TQBR".to_string())]);
    }

    #[test]
    fn backend_kind_normalizes_unknown_to_llm_mcp() {
        assert_eq!(BackendKind::from_env_value("ollama"), BackendKind::Ollama);
        assert_eq!(BackendKind::from_env_value("llm_mcp"), BackendKind::LlmMcp);
        assert_eq!(
            BackendKind::from_env_value("something-else"),
            BackendKind::LlmMcp
        );
        assert_eq!(BackendKind::from_env_value("OLLAMA"), BackendKind::Ollama);
    }
}
