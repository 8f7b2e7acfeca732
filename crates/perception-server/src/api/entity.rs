use axum::{extract::State, http::StatusCode, Extension, Json};
use perception_core::{Entity, EntityId};
use perception_engine::{EngineView, ReadinessState};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct SetActiveEntityBody {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SwitchAccepted {
    pub entity: Entity,
    /// The switch applies once this quiet period passes without another request.
    pub debounce_ms: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct ReadyData {
    pub ready: bool,
    /// Rankings will not change until the next switch or refresh.
    pub rankings_ready: bool,
    pub readiness: ReadinessState,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshAccepted {
    pub entity: Option<Entity>,
}

pub(super) async fn set_active_entity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SetActiveEntityBody>,
) -> Result<(StatusCode, Json<ApiResponse<SwitchAccepted>>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "entity name must not be empty",
        ));
    }

    let entity = Entity::new(body.id, name);
    state.manager.set_active_entity(entity.clone()).await;

    #[allow(clippy::cast_possible_truncation)]
    let debounce_ms = state.manager.config().debounce.as_millis() as u64;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(
            req_id.0,
            SwitchAccepted {
                entity,
                debounce_ms,
            },
        )),
    ))
}

pub(super) async fn get_snapshot(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<EngineView>> {
    Json(ApiResponse::new(req_id.0, state.manager.view()))
}

pub(super) async fn refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<(StatusCode, Json<ApiResponse<RefreshAccepted>>), ApiError> {
    state
        .manager
        .refresh()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let entity = state.manager.active_entity().await;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(req_id.0, RefreshAccepted { entity })),
    ))
}

pub(super) async fn ready(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ReadyData>> {
    let view = state.manager.view();
    Json(ApiResponse::new(
        req_id.0,
        ReadyData {
            ready: view.is_ready(),
            rankings_ready: view.rankings_ready(),
            readiness: view.readiness,
            generation: view.generation,
        },
    ))
}
