//! Drains the embedding queue in small batches and writes results back
//! through the store gateway (spec §4.4).

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::store::model::format_vector;
use crate::store::StoreGateway;

use super::backend::BackendAdapter;

const BATCH_SIZE: i64 = 10;
const IDLE_SLEEP: Duration = Duration::from_secs(2);

pub struct EmbeddingPump {
    store: StoreGateway,
    backend: BackendAdapter,
}

impl EmbeddingPump {
    pub fn new(store: StoreGateway, backend: BackendAdapter) -> Self {
        Self { store, backend }
    }

    /// Runs until `cancel` fires. Each iteration leases up to `BATCH_SIZE`
    /// pending rows; a row failure is logged and marked `error` without
    /// aborting the rest of the batch (spec §4.4, §8.5).
    pub async fn run(&self, cancel: CancellationToken) {
        info!("embedding pump started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.store.fetch_embedding_batch(BATCH_SIZE) => res,
            };

            let batch = match batch {
                Ok(rows) => rows,
                Err(e) => {
                    error!(error = %e, "failed to fetch embedding batch");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(IDLE_SLEEP) => {}
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                }
                continue;
            }

            for job in batch {
                if cancel.is_cancelled() {
                    break;
                }

                let embed_result = self.backend.embed(&job.text).await;
                match classify_embed_result(embed_result) {
                    PumpAction::MarkFailed(reason) => {
                        warn!(queue_id = %job.id, reason = %reason, "embedding job failed");
                        let _ = self.store.mark_embedding_failed(&job.id, &reason).await;
                    }
                    PumpAction::Store(vector) => {
                        let text = format_vector(&vector);
                        if let Err(e) = self
                            .store
                            .store_embedding(&job.id, &job.entity_type, &job.entity_id, &text, &job.metadata)
                            .await
                        {
                            warn!(queue_id = %job.id, error = %e, "failed to persist embedding");
                            let _ = self
                                .store
                                .mark_embedding_failed(&job.id, &e.to_string())
                                .await;
                        }
                    }
                }
            }
        }
        info!("embedding pump stopped");
    }
}

/// What to do with a single queue row's embedding attempt. Pulled out of
/// `run`'s loop body so the empty-vector and error-mapping rules (spec
/// §4.4, §9) are testable without a real backend or store.
enum PumpAction {
    Store(Vec<f64>),
    MarkFailed(String),
}

fn classify_embed_result(result: Result<Vec<f64>, crate::error::IngestError>) -> PumpAction {
    match result {
        Ok(vector) if vector.is_empty() => {
            PumpAction::MarkFailed("empty embedding".to_string())
        }
        Ok(vector) => PumpAction::Store(vector),
        Err(e) => PumpAction::MarkFailed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;

    #[test]
    fn empty_vector_is_marked_failed_not_stored() {
        match classify_embed_result(Ok(vec![])) {
            PumpAction::MarkFailed(reason) => assert_eq!(reason, "empty embedding"),
            PumpAction::Store(_) => panic!("expected MarkFailed"),
        }
    }

    #[test]
    fn non_empty_vector_is_stored() {
        match classify_embed_result(Ok(vec![0.1, 0.2])) {
            PumpAction::Store(v) => assert_eq!(v, vec![0.1, 0.2]),
            PumpAction::MarkFailed(_) => panic!("expected Store"),
        }
    }

    #[test]
    fn backend_error_is_marked_failed_with_error_text() {
        match classify_embed_result(Err(IngestError::Backend("boom".to_string()))) {
            PumpAction::MarkFailed(reason) => assert!(reason.contains("boom")),
            PumpAction::Store(_) => panic!("expected MarkFailed"),
        }
    }
}
