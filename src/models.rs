//! Wire types for the admin backend API

use serde::{Deserialize, Serialize};

/// Channel sync state against the upstream Flussonic source.
///
/// `Orphaned` means the stream no longer exists upstream; the record can be
/// deleted without being resurrected by the next sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Orphaned,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Orphaned => "orphaned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "synced" => Some(SyncStatus::Synced),
            "orphaned" => Some(SyncStatus::Orphaned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Enabled,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Enabled => "enabled",
            UserStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enabled" => Some(UserStatus::Enabled),
            "disabled" => Some(UserStatus::Disabled),
            _ => None,
        }
    }
}

/// Paginated collection as returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

// Lookup shapes used in dropdowns and nested responses

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: i64,
    pub stream_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tvg_name: Option<String>,
}

impl ChannelRef {
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.stream_name)
    }
}

/// Full channel row as served by the channel list/detail endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub stream_name: String,
    #[serde(default)]
    pub tvg_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub catchup_days: Option<u32>,
    #[serde(default)]
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub tvg_logo: Option<String>,
    #[serde(default)]
    pub channel_number: Option<u16>,
    #[serde(default)]
    pub sort_order: i64,
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Channel {
    /// Preferred name for display: operator-set display name, else the raw
    /// stream name from Flussonic.
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.stream_name)
    }
}

/// How many packages/users reference a channel, shown before deletion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CascadeInfo {
    pub packages: u32,
    pub users: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub total: u32,
    pub new: u32,
    pub updated: u32,
    pub orphaned: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoUpload {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWithCount {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub channel_count: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageWithCount {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel_count: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Package detail including its member channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetail {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffWithCount {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    #[serde(default)]
    pub package_count: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Subscriber row in the user list (tariffs only; full grants are on detail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListItem {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub agreement_number: String,
    pub status: UserStatus,
    #[serde(default)]
    pub max_sessions: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tariffs: Vec<TariffRef>,
}

/// Full subscriber record with all three grant axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub agreement_number: String,
    #[serde(default)]
    pub max_sessions: u32,
    pub status: UserStatus,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub auth_token_id: Option<i64>,
    #[serde(default)]
    pub tariffs: Vec<TariffRef>,
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserCreate {
    pub first_name: String,
    pub last_name: String,
    pub agreement_number: String,
    pub max_sessions: u32,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    pub tariff_ids: Vec<i64>,
    pub package_ids: Vec<i64>,
    pub channel_ids: Vec<i64>,
}

/// Sparse subscriber update. The `clear_*` flags are how the backend
/// distinguishes "leave the date alone" from "remove the date".
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clear_valid_from: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub clear_valid_until: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_ids: Option<Vec<i64>>,
}

/// Flattened entitlement set for a user: union of tariff packages, direct
/// packages and direct channel grants, deduplicated server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub id: i64,
    pub stream_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tvg_name: Option<String>,
    #[serde(default)]
    pub group_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistPreview {
    pub filename: String,
    pub content: String,
    pub channel_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub accessed_at: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub channels_total: u32,
    pub channels_synced: u32,
    pub channels_orphaned: u32,
    pub groups: u32,
    pub packages: u32,
    pub tariffs: u32,
    pub users: u32,
    pub users_enabled: u32,
    pub users_disabled: u32,
    #[serde(default)]
    pub last_sync: Option<String>,
}

/// Flussonic runtime health panel. When the probe fails the backend still
/// answers 200 with `health: "down"` and the error text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlussonicHealth {
    pub health: String,
    #[serde(default)]
    pub checked_at: String,
    #[serde(default)]
    pub incoming_kbit: Option<u64>,
    #[serde(default)]
    pub outgoing_kbit: Option<u64>,
    #[serde(default)]
    pub total_clients: Option<u32>,
    #[serde(default)]
    pub total_sources: Option<u32>,
    #[serde(default)]
    pub good_sources: Option<u32>,
    #[serde(default)]
    pub broken_sources: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthHealth {
    pub health: String,
    #[serde(default)]
    pub checked_at: String,
    #[serde(default)]
    pub active_sessions: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgHealth {
    pub health: String,
    #[serde(default)]
    pub checked_at: String,
    #[serde(default)]
    pub next_fetch_at: Option<String>,
    #[serde(default)]
    pub last_epg_update_at: Option<String>,
    #[serde(default)]
    pub sources_total: Option<u32>,
    #[serde(default)]
    pub last_updated_channels_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}
