use walkway_client::WalkwayClient;
use walkway_lib::walkway::WalkwayHistoryResponse;

use crate::{DataManager, DataManagerError};

#[derive(Debug, Default)]
pub struct SyncReport {
    pub submitted: Vec<(i64, WalkwayHistoryResponse)>,
    /// Sessions left pending, with the reason.
    pub failed: Vec<(i64, String)>,
}

impl DataManager {
    /// Submits one finished walk as a walkway history and remembers the result.
    pub async fn submit_history(&self, session_id: i64, client: &WalkwayClient) -> Result<WalkwayHistoryResponse, DataManagerError> {
        let session = self.current_walk(session_id).await?;
        if session.active {
            return Err(DataManagerError::SessionActive(session_id));
        }
        if let Some(history) = session.history {
            return Ok(history);
        }

        let history = client.create_walkway_history(session.walkway_id, &session.to_history()).await?;
        self.database.set_session_history(session_id, &history).await?;
        tracing::info!("Walk {} submitted as history {} (review: {})", session_id, history.walkway_history_id, history.can_review);
        Ok(history)
    }

    /// Submits every pending walk. Failures are logged and stay pending.
    pub async fn sync_histories(&self, client: &WalkwayClient) -> Result<SyncReport, DataManagerError> {
        let mut report = SyncReport::default();

        for session in self.pending_histories().await? {
            match self.submit_history(session.session_id, client).await {
                Ok(history) => report.submitted.push((session.session_id, history)),
                Err(err) => {
                    tracing::error!("Failed to submit walk {}: {}", session.session_id, err);
                    report.failed.push((session.session_id, err.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::{Path, State}, http::StatusCode, routing::post, Json, Router};
    use chrono::DateTime;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use walkway_client::ClientConfig;
    use walkway_lib::{geo_point::GeoPoint, track_point::TrackPoint};

    use super::*;
    use crate::DataConfig;

    type Received = Arc<Mutex<Vec<(i64, Value)>>>;

    async fn history(State(received): State<Received>, Path(walkway_id): Path<i64>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if walkway_id == 666 {
            return (StatusCode::BAD_REQUEST, Json(json!({ "message": "walkway closed" })));
        }
        let mut received = received.lock().await;
        received.push((walkway_id, body));
        (StatusCode::OK, Json(json!({ "walkwayHistoryId": 100 + received.len() as i64, "canReview": walkway_id == 7 })))
    }

    async fn spawn_backend(received: Received) -> WalkwayClient {
        let app = Router::new()
            .route("/walkways/{walkway_id}/history", post(history))
            .with_state(received);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        WalkwayClient::new(ClientConfig::new(format!("http://{addr}"))).unwrap()
    }

    fn fix(lat: f64, seconds: i64) -> TrackPoint {
        TrackPoint::new(GeoPoint::new(lat, 127.0), DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap())
    }

    async fn finished_walk(data_manager: &DataManager, walkway_id: i64) -> i64 {
        let session = data_manager
            .start_walk_at(walkway_id, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
            .await
            .unwrap();
        data_manager.record_fix(session.session_id, fix(37.0, 0)).await.unwrap();
        data_manager.record_fix(session.session_id, fix(37.008993, 900)).await.unwrap();
        data_manager.end_walk(session.session_id).await.unwrap();
        session.session_id
    }

    #[tokio::test]
    async fn sync_submits_pending_walks_once() {
        let dir = tempfile::tempdir().unwrap();
        let data_manager = DataManager::start(DataConfig::new(dir.path())).await.unwrap();
        let received = Received::default();
        let client = spawn_backend(received.clone()).await;

        let first = finished_walk(&data_manager, 7).await;
        let second = finished_walk(&data_manager, 8).await;
        let active = data_manager.start_walk(9).await.unwrap();

        let report = data_manager.sync_histories(&client).await.unwrap();
        assert_eq!(report.submitted.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(report.submitted[0].0, first);
        assert!(report.submitted[0].1.can_review);
        assert_eq!(report.submitted[1].0, second);

        {
            let received = received.lock().await;
            assert_eq!(received[0], (7, json!({ "time": 900, "distance": 1000 })));
        }

        assert!(data_manager.pending_histories().await.unwrap().is_empty());
        let stored = data_manager.current_walk(first).await.unwrap();
        assert_eq!(stored.history.map(|history| history.walkway_history_id), Some(101));

        let again = data_manager.sync_histories(&client).await.unwrap();
        assert!(again.submitted.is_empty());
        assert_eq!(received.lock().await.len(), 2);

        assert!(matches!(
            data_manager.submit_history(active.session_id, &client).await,
            Err(DataManagerError::SessionActive(id)) if id == active.session_id
        ));
    }

    #[tokio::test]
    async fn rejected_walk_stays_pending() {
        let dir = tempfile::tempdir().unwrap();
        let data_manager = DataManager::start(DataConfig::new(dir.path())).await.unwrap();
        let client = spawn_backend(Received::default()).await;

        let rejected = finished_walk(&data_manager, 666).await;

        let report = data_manager.sync_histories(&client).await.unwrap();
        assert!(report.submitted.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, rejected);
        assert!(report.failed[0].1.contains("walkway closed"));

        let pending = data_manager.pending_histories().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].session_id, rejected);
    }
}
