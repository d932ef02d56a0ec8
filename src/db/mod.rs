pub mod schema;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// The two logical databases the worker talks to: market data (append-mostly,
/// high-volume) and private account state (holdings, orders, embeddings).
/// Kept as separate pools rather than one `AnyPool` because the embedding
/// pump relies on Postgres's `FOR UPDATE SKIP LOCKED`, which the portable
/// `sqlx::Any` driver does not expose (see DESIGN.md).
#[derive(Clone)]
pub struct Databases {
    pub market: PgPool,
    pub private: PgPool,
}

impl Databases {
    pub async fn connect(
        market_url: &str,
        private_url: &str,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        let market = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(market_url)
            .await?;
        let private = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(private_url)
            .await?;

        Ok(Self { market, private })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        schema::migrate_market(&self.market).await?;
        schema::migrate_private(&self.private).await?;
        Ok(())
    }
}
