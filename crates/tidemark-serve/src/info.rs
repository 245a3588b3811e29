//! Info-endpoint response assembly.
//!
//! Resolver output augmented with computed fields: group records gain their
//! device records and a self-referential `url`; device records gain
//! per-channel `group`/`device` annotations plus `url` and `data_url` links.
//! Links are absolute, built from the configured base URL.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Device channel annotated with its owning group and device.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    /// URL-safe identifier, unique within the device.
    pub slug: String,
    /// Group the device belongs to.
    pub group: String,
    /// Device declaring this channel.
    pub device: String,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Device record with annotated channels and computed links.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Declared channels in positional order.
    pub channels: Vec<ChannelInfo>,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// This device's info endpoint.
    pub url: String,
    /// This device's query endpoint.
    pub data_url: String,
}

/// Group record with its device records and a self-referential link.
#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    /// URL-safe identifier for the group.
    pub slug: String,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Device records for every device in the group.
    pub devices: Vec<DeviceInfo>,
    /// This group's device-listing endpoint.
    pub url: String,
}

/// Every group's record, one per group directory.
pub fn groups_info(state: &AppState) -> Result<Vec<GroupInfo>, ApiError> {
    state
        .meta
        .groups()?
        .iter()
        .map(|group| group_info(state, group))
        .collect()
}

/// One group's record with its devices.
pub fn group_info(state: &AppState, group: &str) -> Result<GroupInfo, ApiError> {
    let config = state.meta.group_config(group)?;
    let devices = devices_info(state, group)?;

    // The self link uses the group's slug, not its directory name.
    let url = format!("{}/v1/info/groups/{}/", state.config.base_url, config.slug);

    Ok(GroupInfo {
        slug: config.slug,
        extra: config.extra,
        devices,
        url,
    })
}

/// Device records for every device in a group.
pub fn devices_info(state: &AppState, group: &str) -> Result<Vec<DeviceInfo>, ApiError> {
    state
        .meta
        .devices(group)?
        .iter()
        .map(|device| device_info(state, group, device))
        .collect()
}

/// One device's record with annotated channels and links.
pub fn device_info(state: &AppState, group: &str, device: &str) -> Result<DeviceInfo, ApiError> {
    let config = state.meta.device_config(group, device)?;

    let channels = config
        .channels
        .into_iter()
        .map(|channel| ChannelInfo {
            slug: channel.slug,
            group: group.to_string(),
            device: device.to_string(),
            extra: channel.extra,
        })
        .collect();

    let base = &state.config.base_url;

    Ok(DeviceInfo {
        channels,
        extra: config.extra,
        url: format!("{base}/v1/info/devices/{group}/{device}"),
        data_url: format!("{base}/v1/data/{group}/{device}"),
    })
}
