//! High-level device-agent client commands.
//!
//! This module provides the typed API for one device agent's endpoint set:
//! playback control, upload/delete, TV power, HDMI switching, and the
//! on/off schedule. Each operation is a free function taking the shared
//! HTTP client; [`AgentClientImpl`] wraps them behind the agent traits.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::agent::transport::{
    agent_url, delete, execute, get_json, post_empty, post_json, AgentResult,
};
use crate::agent::types::{
    CurrentInput, DeviceStatus, HdmiMap, PlayRequest, TvStatus, WeeklySchedule,
};
use crate::agent::{AgentPlayback, AgentSchedule, AgentTv};

// ─────────────────────────────────────────────────────────────────────────────
// Playback Control
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches the playback status from a device agent.
pub async fn status(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
) -> AgentResult<DeviceStatus> {
    get_json(client, &agent_url(host, port, "/status"), token).await
}

/// Instructs a device agent to play the named video.
///
/// The agent rejects unknown file names with a non-2xx; this function does
/// not check pre-existence, it only relays.
pub async fn play(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
    video_name: &str,
) -> AgentResult<()> {
    let body = PlayRequest {
        video_name: video_name.to_string(),
    };
    post_json(client, &agent_url(host, port, "/play"), token, &body).await
}

/// Pauses playback on a device agent.
pub async fn pause(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<()> {
    post_empty(client, &agent_url(host, port, "/pause"), token).await
}

/// Resumes paused playback on a device agent.
pub async fn resume(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<()> {
    post_empty(client, &agent_url(host, port, "/resume"), token).await
}

/// Stops playback on a device agent.
///
/// # Note
/// The agent treats stop as idempotent - stopping an already-stopped
/// player succeeds.
pub async fn stop(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<()> {
    post_empty(client, &agent_url(host, port, "/stop"), token).await
}

/// Uploads a video file to a device agent (multipart form, field `file`).
pub async fn upload(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
    file_name: &str,
    data: Bytes,
) -> AgentResult<()> {
    let part = Part::bytes(data.to_vec()).file_name(file_name.to_string());
    let form = Form::new().part("file", part);

    log::info!(
        "[Agent] Uploading {} ({} bytes) to {}",
        file_name,
        data.len(),
        host
    );

    execute(
        client.post(agent_url(host, port, "/upload")).multipart(form),
        token,
    )
    .await?;
    Ok(())
}

/// Deletes the named video from a device agent.
pub async fn delete_video(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
    video_name: &str,
) -> AgentResult<()> {
    delete(
        client,
        &agent_url(host, port, &format!("/video/{}", video_name)),
        token,
    )
    .await
}

// ─────────────────────────────────────────────────────────────────────────────
// TV Power & HDMI
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches the TV power status from a device agent.
pub async fn tv_status(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<TvStatus> {
    get_json(client, &agent_url(host, port, "/tv/status"), token).await
}

/// Fetches the currently active HDMI input port.
pub async fn current_input(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
) -> AgentResult<CurrentInput> {
    get_json(client, &agent_url(host, port, "/tv/current"), token).await
}

/// Fetches the device's HDMI port to source-label mapping.
pub async fn hdmi_map(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<HdmiMap> {
    get_json(client, &agent_url(host, port, "/tv/fetch_hdmi_map"), token).await
}

/// Switches the TV to the given HDMI input port.
pub async fn switch_input(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
    input: u32,
) -> AgentResult<()> {
    log::info!("[Agent] Switching {} to HDMI port {}", host, input);
    post_empty(
        client,
        &agent_url(host, port, &format!("/tv/switch/{}", input)),
        token,
    )
    .await
}

// ─────────────────────────────────────────────────────────────────────────────
// TV Schedule
// ─────────────────────────────────────────────────────────────────────────────

/// Fetches the device's weekly on/off schedule.
pub async fn get_schedule(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
) -> AgentResult<WeeklySchedule> {
    get_json(client, &agent_url(host, port, "/tv/get_schedule"), token).await
}

/// Replaces the device's weekly on/off schedule.
pub async fn set_schedule(
    client: &Client,
    host: &str,
    port: u16,
    token: &str,
    schedule: &WeeklySchedule,
) -> AgentResult<()> {
    post_json(
        client,
        &agent_url(host, port, "/tv/set_schedule"),
        token,
        schedule,
    )
    .await
}

/// Clears the device's schedule entirely.
pub async fn clear_schedule(client: &Client, host: &str, port: u16, token: &str) -> AgentResult<()> {
    delete(client, &agent_url(host, port, "/tv/clear_schedule"), token).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Concrete implementation of the device-agent traits.
///
/// Wraps the free functions in this module with the connection parameters
/// shared by the whole fleet: one pooled HTTP client (with the per-request
/// timeout applied at construction), the agent port, and the opaque bearer
/// credential attached to every request.
#[derive(Clone)]
pub struct AgentClientImpl {
    client: Client,
    agent_port: u16,
    token: String,
}

impl std::fmt::Debug for AgentClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClientImpl")
            .field("agent_port", &self.agent_port)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl AgentClientImpl {
    /// Creates a new agent client.
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (should carry a request timeout)
    /// * `agent_port` - Port every device agent listens on
    /// * `token` - Bearer credential attached to every request
    #[must_use]
    pub fn new(client: Client, agent_port: u16, token: String) -> Self {
        Self {
            client,
            agent_port,
            token,
        }
    }
}

#[async_trait]
impl AgentPlayback for AgentClientImpl {
    async fn status(&self, host: &str) -> AgentResult<DeviceStatus> {
        status(&self.client, host, self.agent_port, &self.token).await
    }

    async fn play(&self, host: &str, video_name: &str) -> AgentResult<()> {
        play(&self.client, host, self.agent_port, &self.token, video_name).await
    }

    async fn pause(&self, host: &str) -> AgentResult<()> {
        pause(&self.client, host, self.agent_port, &self.token).await
    }

    async fn resume(&self, host: &str) -> AgentResult<()> {
        resume(&self.client, host, self.agent_port, &self.token).await
    }

    async fn stop(&self, host: &str) -> AgentResult<()> {
        stop(&self.client, host, self.agent_port, &self.token).await
    }

    async fn upload(&self, host: &str, file_name: &str, data: Bytes) -> AgentResult<()> {
        upload(
            &self.client,
            host,
            self.agent_port,
            &self.token,
            file_name,
            data,
        )
        .await
    }

    async fn delete_video(&self, host: &str, video_name: &str) -> AgentResult<()> {
        delete_video(&self.client, host, self.agent_port, &self.token, video_name).await
    }
}

#[async_trait]
impl AgentTv for AgentClientImpl {
    async fn tv_status(&self, host: &str) -> AgentResult<TvStatus> {
        tv_status(&self.client, host, self.agent_port, &self.token).await
    }

    async fn current_input(&self, host: &str) -> AgentResult<CurrentInput> {
        current_input(&self.client, host, self.agent_port, &self.token).await
    }

    async fn hdmi_map(&self, host: &str) -> AgentResult<HdmiMap> {
        hdmi_map(&self.client, host, self.agent_port, &self.token).await
    }

    async fn switch_input(&self, host: &str, port: u32) -> AgentResult<()> {
        switch_input(&self.client, host, self.agent_port, &self.token, port).await
    }
}

#[async_trait]
impl AgentSchedule for AgentClientImpl {
    async fn get_schedule(&self, host: &str) -> AgentResult<WeeklySchedule> {
        get_schedule(&self.client, host, self.agent_port, &self.token).await
    }

    async fn set_schedule(&self, host: &str, schedule: &WeeklySchedule) -> AgentResult<()> {
        set_schedule(&self.client, host, self.agent_port, &self.token, schedule).await
    }

    async fn clear_schedule(&self, host: &str) -> AgentResult<()> {
        clear_schedule(&self.client, host, self.agent_port, &self.token).await
    }
}
