use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use super::domain::{AdmissionDecision, AdmissionRequest};
use super::engine::AdmissionEngine;
use super::gateway::{OrganisationGateway, ReviewNotifier};
use crate::error::AppError;

/// Router exposing the admission engine as a JSON endpoint.
pub fn admission_router<G, N>(engine: Arc<AdmissionEngine<G, N>>) -> Router
where
    G: OrganisationGateway + 'static,
    N: ReviewNotifier + 'static,
{
    Router::new()
        .route("/api/v1/admissions", post(admit_handler::<G, N>))
        .with_state(engine)
}

/// The engine blocks on remote calls, so it runs on the blocking pool.
pub(crate) async fn admit_handler<G, N>(
    State(engine): State<Arc<AdmissionEngine<G, N>>>,
    Json(request): Json<AdmissionRequest>,
) -> Result<Json<AdmissionDecision>, AppError>
where
    G: OrganisationGateway + 'static,
    N: ReviewNotifier + 'static,
{
    let decision = tokio::task::spawn_blocking(move || engine.admit(request))
        .await
        .map_err(|err| AppError::Server(axum::Error::new(err)))??;
    Ok(Json(decision))
}
