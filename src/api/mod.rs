//! REST API layer: host ingress, balance lookup, and health.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` sits at the
//! root.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{SyncMethod, SyncSettings};
    use crate::domain::{EventBus, KnownParticipants, ParticipantId};
    use crate::host::{BalanceAuthority, HostMirror, SessionHost};
    use crate::persistence::{BalanceLookup, BalanceStore, InMemoryBalanceStore};
    use crate::service::SyncService;

    fn make_state(method: SyncMethod) -> (AppState, Arc<InMemoryBalanceStore>) {
        let store = Arc::new(InMemoryBalanceStore::new());
        let mirror = Arc::new(HostMirror::new());
        let sync_service = Arc::new(SyncService::new(
            BalanceStore::from(Arc::clone(&store)),
            Arc::clone(&mirror) as Arc<dyn BalanceAuthority>,
            Arc::clone(&mirror) as Arc<dyn SessionHost>,
            Arc::new(KnownParticipants::new()),
            SyncSettings {
                method,
                ..SyncSettings::default()
            },
        ));
        let state = AppState {
            sync_service,
            mirror,
            event_bus: EventBus::new(64),
        };
        (state, store)
    }

    async fn send(state: &AppState, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let app = build_router().with_state(state.clone());
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())));
        let Ok(request) = request else {
            panic!("request build failed");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), 64 * 1024).await else {
            panic!("body read failed");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let (state, store) = make_state(SyncMethod::Periodic);

        let (status, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/status"), Some(&serde_json::json!("healthy")));
        assert_eq!(body.pointer("/store"), Some(&serde_json::json!("memory")));
        assert_eq!(body.pointer("/registry_seeded"), Some(&serde_json::json!(false)));
        assert_eq!(body.pointer("/sync_method"), Some(&serde_json::json!("periodic")));

        store.set_online(false);
        let (status, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.pointer("/status"), Some(&serde_json::json!("degraded")));
    }

    #[tokio::test]
    async fn put_participants_fills_mirror() {
        let (state, _) = make_state(SyncMethod::Periodic);
        let id = ParticipantId::new_random();
        let body = format!(
            r#"[{{"participant_id":"{id}","display_name":"Alex","balance":12.5,"online":true}},
                {{"participant_id":"{}","balance":3.0}}]"#,
            ParticipantId::new_random()
        );

        let (status, _) = send(&state, Method::PUT, "/api/v1/participants", Some(&body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.mirror.all_participants().len(), 2);
        assert_eq!(state.mirror.active_participants().len(), 1);
        assert_eq!(state.mirror.balance(&id), Some(12.5));
    }

    #[tokio::test]
    async fn post_event_publishes_to_bus() {
        let (state, _) = make_state(SyncMethod::Events);
        let mut rx = state.event_bus.subscribe();
        let id = ParticipantId::new_random();
        let body = format!(
            r#"{{"event_type":"participant_joined","participant_id":"{id}","display_name":"Sam","balance":8.0}}"#
        );

        let (status, json) = send(&state, Method::POST, "/api/v1/events", Some(&body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json.pointer("/delivered_to"), Some(&serde_json::json!(1)));

        let Ok(event) = rx.recv().await else {
            panic!("no event published");
        };
        assert_eq!(event.participant_id(), id);
        assert_eq!(state.mirror.active_participants().len(), 1);
        assert_eq!(state.mirror.balance(&id), Some(8.0));
    }

    #[tokio::test]
    async fn leave_without_balance_leaves_stored_value_alone() {
        let (state, store) = make_state(SyncMethod::Events);
        let id = ParticipantId::new_random();
        store.upsert_balance(id, "Rich", 5000.0).await;
        assert!(state.sync_service.seed_known_participants().await);
        state.sync_service.start(&state.event_bus);

        let body = format!(
            r#"{{"event_type":"participant_left","participant_id":"{id}","display_name":"Rich"}}"#
        );
        let (status, _) = send(&state, Method::POST, "/api/v1/events", Some(&body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        // shutdown drains the queued leave before returning
        state.sync_service.shutdown().await;
        assert_eq!(store.read_balance(id).await, BalanceLookup::Found(5000.0));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn post_event_rejects_malformed_identifier() {
        let (state, _) = make_state(SyncMethod::Events);
        let body = r#"{"event_type":"participant_left","participant_id":"nope","display_name":"X"}"#;
        let (status, _) = send(&state, Method::POST, "/api/v1/events", Some(body)).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn stored_balance_lookup() {
        let (state, store) = make_state(SyncMethod::Periodic);
        let id = ParticipantId::new_random();
        store.upsert_balance(id, "Debtor", -40.0).await;
        assert_eq!(store.read_balance(id).await, BalanceLookup::Found(-40.0));

        let (status, body) = send(&state, Method::GET, &format!("/api/v1/participants/{id}/balance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/balance"), Some(&serde_json::json!(-40.0)));

        let missing = ParticipantId::new_random();
        let (status, body) = send(&state, Method::GET, &format!("/api/v1/participants/{missing}/balance"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.pointer("/error/code"), Some(&serde_json::json!(2001)));

        let (status, _) = send(&state, Method::GET, "/api/v1/participants/bogus/balance", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        store.set_online(false);
        let (status, _) = send(&state, Method::GET, &format!("/api/v1/participants/{id}/balance"), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
