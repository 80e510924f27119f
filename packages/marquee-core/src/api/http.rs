//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.
//! Group mutations trigger a fleet refresh so the partition served to the
//! dashboard is never stale across a store change.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::WeeklySchedule;
use crate::api::AppState;
use crate::error::{MarqueeError, MarqueeResult};
use crate::protocol_constants::APP_NAME;
use crate::registry::Device;
use crate::services::fleet_monitor::FleetView;
use crate::services::group_coordinator::{AggregateGroupStatus, CommandResult, GroupCommand};
use crate::services::group_store::{Group, GroupUpdate};
use crate::services::hdmi_switcher::{DeviceHdmiState, SwitchResult};

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct PlayRequest {
    video_name: String,
}

#[derive(Deserialize)]
struct SwitchLabelRequest {
    label: String,
}

/// Response for a group command: the per-device breakdown on success.
/// (Failures come back through `MarqueeError::CommandFailed` instead.)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandResponse {
    command: String,
    results: Vec<CommandResult>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/fleet", get(get_fleet))
        .route("/api/refresh", post(trigger_refresh))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/{id}", put(update_group).delete(delete_group))
        .route("/api/groups/{id}/status", get(group_status))
        .route("/api/groups/{id}/play", post(group_play))
        .route("/api/groups/{id}/pause", post(group_pause))
        .route("/api/groups/{id}/resume", post(group_resume))
        .route("/api/groups/{id}/stop", post(group_stop))
        .route(
            "/api/groups/{id}/video/{name}",
            axum::routing::delete(group_delete_video),
        )
        .route("/api/groups/{id}/upload", post(group_upload))
        .route("/api/groups/{id}/hdmi", get(group_hdmi))
        .route("/api/groups/{id}/hdmi/switch", post(group_hdmi_switch))
        .route(
            "/api/devices/{host}/hdmi/switch/{port}",
            post(device_hdmi_switch),
        )
        .route(
            "/api/devices/{host}/schedule",
            get(get_device_schedule)
                .post(set_device_schedule)
                .delete(clear_device_schedule),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Fleet Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe plus a quick fleet summary.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let devices = state.fleet.devices().len();
    let groups = state.store.list().len();
    Json(json!({
        "status": "ok",
        "service": APP_NAME,
        "registry": state.fleet.registry_health(),
        "devices": devices,
        "groups": groups,
    }))
}

/// The complete partitioned fleet view.
async fn get_fleet(State(state): State<AppState>) -> Json<FleetView> {
    Json(state.monitor.fleet_view())
}

/// Requests an out-of-band refresh cycle.
async fn trigger_refresh(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.monitor.trigger_refresh();
    Json(json!({"message": "Refresh triggered"}))
}

// ─────────────────────────────────────────────────────────────────────────────
// Group CRUD Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn list_groups(State(state): State<AppState>) -> Json<BTreeMap<String, Group>> {
    Json(state.store.list())
}

async fn create_group(
    State(state): State<AppState>,
    Json(body): Json<CreateGroupRequest>,
) -> MarqueeResult<(axum::http::StatusCode, Json<Group>)> {
    let group = state.store.create(&body.name, body.devices)?;
    state.monitor.trigger_refresh();
    Ok((axum::http::StatusCode::CREATED, Json(group)))
}

async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<GroupUpdate>,
) -> MarqueeResult<Json<Group>> {
    let group = state.store.update(&id, update)?;
    state.monitor.trigger_refresh();
    Ok(Json(group))
}

async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<serde_json::Value>> {
    state.store.delete(&id)?;
    state.monitor.trigger_refresh();
    Ok(Json(json!({"message": "Group deleted successfully"})))
}

// ─────────────────────────────────────────────────────────────────────────────
// Group Command Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Looks up a group or fails with 404.
fn find_group(state: &AppState, id: &str) -> MarqueeResult<Group> {
    state
        .store
        .get(id)
        .ok_or_else(|| MarqueeError::GroupNotFound(id.to_string()))
}

/// Runs a command against a group and wraps the per-device results.
async fn run_group_command(
    state: &AppState,
    id: &str,
    command: GroupCommand,
) -> MarqueeResult<Json<CommandResponse>> {
    let group = find_group(state, id)?;
    let label = command.label().to_string();
    let results = state.coordinator.run(&group, command).await?;
    Ok(Json(CommandResponse {
        command: label,
        results,
    }))
}

async fn group_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<AggregateGroupStatus>> {
    let group = find_group(&state, &id)?;
    Ok(Json(state.coordinator.aggregate_status(&group)))
}

async fn group_play(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PlayRequest>,
) -> MarqueeResult<Json<CommandResponse>> {
    run_group_command(
        &state,
        &id,
        GroupCommand::Play {
            video_name: body.video_name,
        },
    )
    .await
}

async fn group_pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<CommandResponse>> {
    run_group_command(&state, &id, GroupCommand::Pause).await
}

async fn group_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<CommandResponse>> {
    run_group_command(&state, &id, GroupCommand::Resume).await
}

async fn group_stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<CommandResponse>> {
    run_group_command(&state, &id, GroupCommand::Stop).await
}

async fn group_delete_video(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> MarqueeResult<Json<CommandResponse>> {
    run_group_command(&state, &id, GroupCommand::Delete { video_name: name }).await
}

/// Relays a multipart upload to every member of a group.
///
/// Expects a single `file` part; the file lands on each device under its
/// original name.
async fn group_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> MarqueeResult<Json<CommandResponse>> {
    let (file_name, data) = extract_upload(multipart).await?;
    run_group_command(
        &state,
        &id,
        GroupCommand::Upload { file_name, data },
    )
    .await
}

/// Pulls the uploaded file out of the multipart body.
async fn extract_upload(mut multipart: Multipart) -> MarqueeResult<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MarqueeError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| MarqueeError::InvalidRequest("upload is missing a file name".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| MarqueeError::InvalidRequest(e.to_string()))?;
        return Ok((file_name, data));
    }

    Err(MarqueeError::InvalidRequest(
        "multipart body contains no file".into(),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// HDMI Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn group_hdmi(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> MarqueeResult<Json<Vec<DeviceHdmiState>>> {
    let group = find_group(&state, &id)?;
    Ok(Json(state.hdmi.group_states(&group.devices).await))
}

async fn group_hdmi_switch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SwitchLabelRequest>,
) -> MarqueeResult<Json<Vec<SwitchResult>>> {
    let group = find_group(&state, &id)?;
    let results = state
        .hdmi
        .switch_all_to_label(&group.devices, &body.label)
        .await;
    Ok(Json(results))
}

/// Looks up a registry device by host or fails with 404.
fn find_device(state: &AppState, host: &str) -> MarqueeResult<Device> {
    state
        .fleet
        .device_by_host(host)
        .ok_or_else(|| MarqueeError::DeviceNotFound(host.to_string()))
}

async fn device_hdmi_switch(
    State(state): State<AppState>,
    Path((host, port)): Path<(String, u32)>,
) -> MarqueeResult<Json<serde_json::Value>> {
    let device = find_device(&state, &host)?;
    state.hdmi.switch_device(&device, port).await?;
    Ok(Json(json!({"message": format!("Switched to port {}", port)})))
}

// ─────────────────────────────────────────────────────────────────────────────
// Schedule Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn get_device_schedule(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> MarqueeResult<Json<WeeklySchedule>> {
    let device = find_device(&state, &host)?;
    let schedule = state.agent.get_schedule(&device.host).await?;
    Ok(Json(schedule))
}

async fn set_device_schedule(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Json(schedule): Json<WeeklySchedule>,
) -> MarqueeResult<Json<serde_json::Value>> {
    let device = find_device(&state, &host)?;
    state.agent.set_schedule(&device.host, &schedule).await?;
    Ok(Json(json!({"message": "Schedule saved"})))
}

async fn clear_device_schedule(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> MarqueeResult<Json<serde_json::Value>> {
    let device = find_device(&state, &host)?;
    state.agent.clear_schedule(&device.host).await?;
    Ok(Json(json!({"message": "Schedule cleared"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_group_request_parses_device_list() {
        let body: CreateGroupRequest = serde_json::from_str(
            r#"{"name": "Lobby", "devices": [{"name": "X", "host": "10.0.0.1"}]}"#,
        )
        .unwrap();
        assert_eq!(body.name, "Lobby");
        assert_eq!(body.devices[0].host, "10.0.0.1");
    }

    #[test]
    fn play_request_requires_video_name() {
        let body: PlayRequest = serde_json::from_str(r#"{"video_name": "a.mp4"}"#).unwrap();
        assert_eq!(body.video_name, "a.mp4");

        assert!(serde_json::from_str::<PlayRequest>("{}").is_err());
    }

    #[test]
    fn group_update_accepts_partial_bodies() {
        let update: GroupUpdate = serde_json::from_str(r#"{"name": "New Name"}"#).unwrap();
        assert_eq!(update.name.as_deref(), Some("New Name"));
        assert!(update.devices.is_none());
    }
}
