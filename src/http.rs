/**
 * API REST ZPSIM - Frontière HTTP du simulateur de flotte
 *
 * RÔLE : Expose le gestionnaire de flotte en JSON : CRUD devices
 * (unitaire et batch), opérations bulk, CRUD catalogue avec
 * export/import, listing paginé.
 *
 * FONCTIONNEMENT : Serveur axum ; chaque échec de mutation rend un
 * {"success": false, "error": ...} avec 400 (validation) ou 404
 * (inexistant). Les réponses batch listent les résultats par item.
 */

use crate::catalog::ModelsMap;
use crate::error::FleetError;
use crate::fleet::{FleetManager, MAX_DEVICES};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<FleetManager>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/models", get(get_models).post(add_model))
        .route("/api/models/export", get(export_models))
        .route("/api/models/import", post(import_models))
        .route("/api/models/{model}", delete(remove_model))
        .route("/api/devices", get(get_devices).post(add_device))
        .route("/api/devices/batch", post(add_devices_batch))
        .route("/api/devices/start-all", post(start_all))
        .route("/api/devices/stop-all", post(stop_all))
        .route("/api/devices/remove-all", post(remove_all))
        .route("/api/devices/{id}", get(get_device).delete(remove_device))
        .route("/api/devices/{id}/start", post(start_device))
        .route("/api/devices/{id}/stop", post(stop_device))
        .with_state(state)
}

fn error_reply(err: FleetError) -> (StatusCode, Json<Value>) {
    let code = match err {
        FleetError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (code, Json(json!({"success": false, "error": err.to_string()})))
}

// ---- catalogue de modèles ----

async fn get_models(State(app): State<AppState>) -> Json<Value> {
    Json(json!({"success": true, "models": app.manager.supported_models()}))
}

#[derive(Debug, Deserialize)]
struct AddModelBody {
    model: String,
    fw_version: String,
}

async fn add_model(
    State(app): State<AppState>,
    Json(body): Json<AddModelBody>,
) -> (StatusCode, Json<Value>) {
    match app.manager.add_model(&body.model, &body.fw_version) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "models": app.manager.supported_models()})),
        ),
        Err(e) => error_reply(e),
    }
}

async fn remove_model(
    State(app): State<AppState>,
    Path(model): Path<String>,
) -> (StatusCode, Json<Value>) {
    match app.manager.remove_model(&model) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "models": app.manager.supported_models()})),
        ),
        Err(e) => error_reply(e),
    }
}

// GET /api/models/export : la map brute, réimportable telle quelle
async fn export_models(State(app): State<AppState>) -> Json<ModelsMap> {
    Json(app.manager.supported_models())
}

#[derive(Debug, Deserialize)]
struct ImportBody {
    models: ModelsMap,
}

async fn import_models(
    State(app): State<AppState>,
    Json(body): Json<ImportBody>,
) -> (StatusCode, Json<Value>) {
    match app.manager.import_models(body.models) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "models": app.manager.supported_models()})),
        ),
        Err(e) => error_reply(e),
    }
}

// ---- devices ----

#[derive(Debug, Deserialize)]
struct DeviceListParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
    #[serde(default)]
    use_pagination: bool,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    50
}

async fn get_devices(
    State(app): State<AppState>,
    Query(params): Query<DeviceListParams>,
) -> Json<Value> {
    if params.use_pagination {
        let page = app.manager.paginated_status(params.page, params.page_size);
        Json(json!({
            "success": true,
            "devices": page.devices,
            "total": page.total,
            "page": page.page,
            "page_size": page.page_size,
            "total_pages": page.total_pages,
            "max_devices": page.max_devices,
        }))
    } else {
        Json(json!({"success": true, "devices": app.manager.all_status()}))
    }
}

async fn get_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match app.manager.device_status(&id) {
        Ok(status) => (StatusCode::OK, Json(json!({"success": true, "device": status}))),
        Err(e) => error_reply(e),
    }
}

#[derive(Debug, Deserialize)]
struct AddDeviceBody {
    model: String,
    fw_version: Option<String>,
    mac: Option<String>,
    #[serde(default)]
    use_sequential: bool,
}

async fn add_device(
    State(app): State<AppState>,
    Json(body): Json<AddDeviceBody>,
) -> (StatusCode, Json<Value>) {
    match app
        .manager
        .add_device(&body.model, body.fw_version, body.mac, body.use_sequential)
    {
        Ok(id) => {
            let device = app.manager.device_status(&id).ok();
            (
                StatusCode::OK,
                Json(json!({"success": true, "device_id": id, "device": device})),
            )
        }
        Err(e) => error_reply(e),
    }
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(default = "default_count")]
    count: usize,
    model: String,
    fw_version: Option<String>,
    #[serde(default = "default_true")]
    use_sequential: bool,
}

fn default_count() -> usize {
    1
}

fn default_true() -> bool {
    true
}

async fn add_devices_batch(
    State(app): State<AppState>,
    Json(body): Json<BatchBody>,
) -> (StatusCode, Json<Value>) {
    if body.count < 1 || body.count > MAX_DEVICES {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "count must be between 1 and 100"})),
        );
    }
    // admission tout-ou-rien : refusé avant tout effet de bord si le
    // batch entier ne tient pas dans la capacité restante
    if body.count > app.manager.remaining_capacity() {
        return error_reply(FleetError::CapacityExceeded);
    }

    let mut devices = Vec::new();
    let mut errors = Vec::new();
    for i in 0..body.count {
        match app
            .manager
            .add_device(&body.model, body.fw_version.clone(), None, body.use_sequential)
        {
            Ok(id) => {
                if let Ok(status) = app.manager.device_status(&id) {
                    devices.push(status);
                }
            }
            Err(e) => errors.push(format!("device {}: {e}", i + 1)),
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": errors.is_empty(),
            "devices": devices,
            "errors": errors,
        })),
    )
}

async fn remove_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match app.manager.remove_device(&id).await {
        Ok(()) => (StatusCode::OK, Json(json!({"success": true}))),
        Err(e) => error_reply(e),
    }
}

async fn start_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match app.manager.start_device(&id).await {
        Ok(()) => {
            let device = app.manager.device_status(&id).ok();
            (StatusCode::OK, Json(json!({"success": true, "device": device})))
        }
        Err(e) => error_reply(e),
    }
}

async fn stop_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match app.manager.stop_device(&id).await {
        Ok(()) => {
            let device = app.manager.device_status(&id).ok();
            (StatusCode::OK, Json(json!({"success": true, "device": device})))
        }
        Err(e) => error_reply(e),
    }
}

async fn start_all(State(app): State<AppState>) -> Json<Value> {
    let count = app.manager.start_all().await;
    Json(json!({"success": true, "started_count": count}))
}

async fn stop_all(State(app): State<AppState>) -> Json<Value> {
    let count = app.manager.stop_all().await;
    Json(json!({"success": true, "stopped_count": count}))
}

async fn remove_all(State(app): State<AppState>) -> Json<Value> {
    let count = app.manager.remove_all().await;
    Json(json!({"success": true, "removed_count": count}))
}
