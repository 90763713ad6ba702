//! Admin backend API client
//!
//! Thin typed wrapper over the backend's JSON envelope protocol. Every
//! response is classified into exactly one of: unauthorized (HTTP 401,
//! checked before any parsing), application error (non-2xx or an explicit
//! `success: false` envelope), or success (payload unwrapped from the
//! envelope's `data` field when present). No automatic retries; callers
//! re-invoke on failure.
//!
//! The session is a cookie. The agent keeps the jar, and agent clones share
//! it, so worker threads stay authenticated after one login.

#![allow(dead_code)]

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::ledger::ChannelPatch;
use crate::models::*;
use crate::view_state::{ChannelListQuery, LogQuery, UserListQuery};

/// Outcome classification for every backend call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Session absent or expired. The UI drops to the login screen.
    #[error("unauthorized")]
    Unauthorized,
    /// The backend rejected the request (validation, conflict, not found).
    #[error("{message}")]
    Api {
        code: String,
        message: String,
        status: u16,
    },
    /// Network failure or a malformed success payload.
    #[error("{0}")]
    Transport(String),
}

const FALLBACK_CODE: &str = "UNKNOWN";
const FALLBACK_MESSAGE: &str = "Request failed";

/// Boundary for multipart logo uploads. Fixed string; the backend only
/// cares that it matches the Content-Type header.
const MULTIPART_BOUNDARY: &str = "----streampanel-upload-7f3a91c4";

#[derive(Clone)]
pub struct AdminClient {
    base_url: String,
    agent: ureq::Agent,
}

impl AdminClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .timeout_connect(Some(Duration::from_secs(10)))
            // Error bodies carry the envelope; read them instead of bailing.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // --- transport -------------------------------------------------------

    fn get_raw(&self, path: &str, query: &[(String, String)]) -> Result<(u16, String), ApiError> {
        let mut request = self.agent.get(self.url(path));
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(transport)?;
        read_response(response)
    }

    fn post_raw<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<(u16, String), ApiError> {
        let request = self.agent.post(self.url(path));
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.send_empty(),
        }
        .map_err(transport)?;
        read_response(response)
    }

    fn patch_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, String), ApiError> {
        let response = self
            .agent
            .patch(self.url(path))
            .send_json(body)
            .map_err(transport)?;
        read_response(response)
    }

    fn delete_raw(&self, path: &str, query: &[(String, String)]) -> Result<(u16, String), ApiError> {
        let mut request = self.agent.delete(self.url(path));
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(transport)?;
        read_response(response)
    }

    /// Multipart file upload. No JSON content type here; the body is a
    /// hand-framed multipart document.
    fn post_multipart(
        &self,
        path: &str,
        field: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(u16, String), ApiError> {
        let body = multipart_body(MULTIPART_BOUNDARY, field, filename, data);
        let response = self
            .agent
            .post(self.url(path))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .send(&body[..])
            .map_err(transport)?;
        read_response(response)
    }

    // --- typed wrappers --------------------------------------------------

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let (status, body) = self.get_raw(path, query)?;
        decode(path, classify(status, &body)?)
    }

    fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let (status, text) = self.post_raw(path, Some(body))?;
        decode(path, classify(status, &text)?)
    }

    fn post_json_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let (status, text) = self.post_raw::<Value>(path, None)?;
        decode(path, classify(status, &text)?)
    }

    fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let (status, text) = self.patch_raw(path, body)?;
        decode(path, classify(status, &text)?)
    }

    // --- auth ------------------------------------------------------------

    pub fn login(&self, username: &str, password: &str) -> Result<AdminIdentity, ApiError> {
        self.post_json(
            "/api/v1/auth/login",
            &json!({ "username": username, "password": password }),
        )
    }

    /// Best-effort: local logout must succeed even when the server call
    /// fails, so the caller ignores this result beyond logging.
    pub fn logout(&self) -> Result<(), ApiError> {
        let (status, body) = self.post_raw::<Value>("/api/v1/auth/logout", None)?;
        classify(status, &body).map(|_| ())
    }

    /// Session bootstrap and the uniform 401 probe.
    pub fn me(&self) -> Result<AdminIdentity, ApiError> {
        self.get_json("/api/v1/auth/me", &[])
    }

    // --- dashboard -------------------------------------------------------

    pub fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json("/api/v1/dashboard/stats", &[])
    }

    pub fn flussonic_health(&self) -> Result<FlussonicHealth, ApiError> {
        self.get_json("/api/v1/dashboard/flussonic", &[])
    }

    pub fn auth_health(&self) -> Result<AuthHealth, ApiError> {
        self.get_json("/api/v1/dashboard/auth", &[])
    }

    pub fn epg_health(&self) -> Result<EpgHealth, ApiError> {
        self.get_json("/api/v1/dashboard/epg", &[])
    }

    pub fn trigger_epg_update(&self) -> Result<String, ApiError> {
        let (status, body) = self.post_raw::<Value>("/api/v1/dashboard/epg/update", None)?;
        classify_message(status, &body)
    }

    // --- lookups ---------------------------------------------------------

    pub fn lookup_groups(&self) -> Result<Vec<GroupRef>, ApiError> {
        self.get_json("/api/v1/lookup/groups", &[])
    }

    pub fn lookup_packages(&self) -> Result<Vec<PackageRef>, ApiError> {
        self.get_json("/api/v1/lookup/packages", &[])
    }

    pub fn lookup_tariffs(&self) -> Result<Vec<TariffRef>, ApiError> {
        self.get_json("/api/v1/lookup/tariffs", &[])
    }

    pub fn lookup_channels(&self, limit: u32) -> Result<Vec<ChannelRef>, ApiError> {
        self.get_json(
            "/api/v1/lookup/channels",
            &[("limit".to_string(), limit.to_string())],
        )
    }

    // --- channels --------------------------------------------------------

    pub fn list_channels(&self, query: &ChannelListQuery) -> Result<Paginated<Channel>, ApiError> {
        self.get_json("/api/v1/channels", &query.query_pairs())
    }

    /// Bulk field patch; used by both the single-row Apply and Apply All.
    pub fn bulk_update_channels(&self, patches: &[ChannelPatch]) -> Result<String, ApiError> {
        let (status, body) =
            self.patch_raw("/api/v1/channels", &json!({ "channels": patches }))?;
        classify_message(status, &body)
    }

    /// Deleting a channel that still exists upstream requires `force`,
    /// otherwise the next sync would resurrect it.
    pub fn delete_channel(&self, channel: &Channel) -> Result<String, ApiError> {
        let (status, body) = self.delete_raw(
            &format!("/api/v1/channels/{}", channel.id),
            &delete_force_query(channel),
        )?;
        classify_message(status, &body)
    }

    pub fn update_channel_groups(&self, id: i64, group_ids: &[i64]) -> Result<Channel, ApiError> {
        self.patch_json(
            &format!("/api/v1/channels/{id}/groups"),
            &json!({ "group_ids": group_ids }),
        )
    }

    pub fn update_channel_packages(
        &self,
        id: i64,
        package_ids: &[i64],
    ) -> Result<Channel, ApiError> {
        self.patch_json(
            &format!("/api/v1/channels/{id}/packages"),
            &json!({ "package_ids": package_ids }),
        )
    }

    pub fn sync_channels(&self) -> Result<SyncResult, ApiError> {
        self.post_json_empty("/api/v1/channels/sync")
    }

    pub fn cascade_info(&self, id: i64) -> Result<CascadeInfo, ApiError> {
        self.get_json(&format!("/api/v1/channels/{id}/cascade-info"), &[])
    }

    pub fn upload_logo(&self, id: i64, filename: &str, data: &[u8]) -> Result<LogoUpload, ApiError> {
        let (status, body) =
            self.post_multipart(&format!("/api/v1/channels/{id}/logo"), "file", filename, data)?;
        decode("logo upload", classify(status, &body)?)
    }

    pub fn upload_logo_url(&self, id: i64, url: &str) -> Result<LogoUpload, ApiError> {
        self.post_json(&format!("/api/v1/channels/{id}/logo-url"), &json!({ "url": url }))
    }

    pub fn remove_logo(&self, id: i64, delete_file: bool) -> Result<String, ApiError> {
        let (status, body) = self.delete_raw(
            &format!("/api/v1/channels/{id}/logo"),
            &[("delete_file".to_string(), delete_file.to_string())],
        )?;
        classify_message(status, &body)
    }

    // --- groups ----------------------------------------------------------

    pub fn list_groups(&self) -> Result<Vec<GroupWithCount>, ApiError> {
        self.get_json("/api/v1/groups", &[])
    }

    pub fn create_group(&self, name: &str) -> Result<GroupWithCount, ApiError> {
        self.post_json("/api/v1/groups", &json!({ "name": name }))
    }

    pub fn update_group(&self, id: i64, name: &str) -> Result<GroupWithCount, ApiError> {
        self.patch_json(&format!("/api/v1/groups/{id}"), &json!({ "name": name }))
    }

    pub fn delete_group(&self, id: i64) -> Result<String, ApiError> {
        let (status, body) = self.delete_raw(&format!("/api/v1/groups/{id}"), &[])?;
        classify_message(status, &body)
    }

    // --- packages --------------------------------------------------------

    pub fn list_packages(&self) -> Result<Vec<PackageWithCount>, ApiError> {
        self.get_json("/api/v1/packages", &[])
    }

    pub fn get_package(&self, id: i64) -> Result<PackageDetail, ApiError> {
        self.get_json(&format!("/api/v1/packages/{id}"), &[])
    }

    pub fn create_package(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<PackageWithCount, ApiError> {
        self.post_json(
            "/api/v1/packages",
            &json!({ "name": name, "description": description }),
        )
    }

    pub fn update_package(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<PackageWithCount, ApiError> {
        self.patch_json(
            &format!("/api/v1/packages/{id}"),
            &json!({ "name": name, "description": description }),
        )
    }

    pub fn delete_package(&self, id: i64) -> Result<(), ApiError> {
        let (status, body) = self.delete_raw(&format!("/api/v1/packages/{id}"), &[])?;
        classify(status, &body).map(|_| ())
    }

    /// Single-item detach, deliberately not the replace-the-whole-set
    /// protocol the other membership endpoints use.
    pub fn remove_channel_from_package(
        &self,
        package_id: i64,
        channel_id: i64,
    ) -> Result<String, ApiError> {
        let (status, body) = self.delete_raw(
            &format!("/api/v1/packages/{package_id}/channels/{channel_id}"),
            &[],
        )?;
        classify_message(status, &body)
    }

    // --- tariffs ---------------------------------------------------------

    pub fn list_tariffs(&self) -> Result<Vec<TariffWithCount>, ApiError> {
        self.get_json("/api/v1/tariffs", &[])
    }

    pub fn create_tariff(
        &self,
        name: &str,
        description: Option<&str>,
        package_ids: &[i64],
    ) -> Result<TariffWithCount, ApiError> {
        self.post_json(
            "/api/v1/tariffs",
            &json!({ "name": name, "description": description, "package_ids": package_ids }),
        )
    }

    pub fn update_tariff(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
        package_ids: &[i64],
    ) -> Result<TariffWithCount, ApiError> {
        self.patch_json(
            &format!("/api/v1/tariffs/{id}"),
            &json!({ "name": name, "description": description, "package_ids": package_ids }),
        )
    }

    pub fn delete_tariff(&self, id: i64) -> Result<(), ApiError> {
        let (status, body) = self.delete_raw(&format!("/api/v1/tariffs/{id}"), &[])?;
        classify(status, &body).map(|_| ())
    }

    // --- users -----------------------------------------------------------

    pub fn list_users(&self, query: &UserListQuery) -> Result<Paginated<UserListItem>, ApiError> {
        self.get_json("/api/v1/users", &query.query_pairs())
    }

    pub fn get_user(&self, id: i64) -> Result<User, ApiError> {
        self.get_json(&format!("/api/v1/users/{id}"), &[])
    }

    pub fn create_user(&self, data: &UserCreate) -> Result<User, ApiError> {
        self.post_json("/api/v1/users", data)
    }

    pub fn update_user(&self, id: i64, data: &UserUpdate) -> Result<User, ApiError> {
        self.patch_json(&format!("/api/v1/users/{id}"), data)
    }

    pub fn delete_user(&self, id: i64) -> Result<String, ApiError> {
        let (status, body) = self.delete_raw(&format!("/api/v1/users/{id}"), &[])?;
        classify_message(status, &body)
    }

    pub fn regenerate_token(&self, id: i64) -> Result<User, ApiError> {
        self.post_json_empty(&format!("/api/v1/users/{id}/regenerate-token"))
    }

    pub fn resolved_channels(&self, id: i64) -> Result<Vec<ResolvedChannel>, ApiError> {
        self.get_json(&format!("/api/v1/users/{id}/resolved-channels"), &[])
    }

    pub fn playlist_preview(&self, id: i64) -> Result<PlaylistPreview, ApiError> {
        self.get_json(&format!("/api/v1/users/{id}/playlist/preview"), &[])
    }

    pub fn user_sessions(
        &self,
        id: i64,
        query: &LogQuery,
    ) -> Result<Paginated<SessionEntry>, ApiError> {
        self.get_json(&format!("/api/v1/users/{id}/sessions"), &query.query_pairs())
    }

    pub fn user_access_logs(
        &self,
        id: i64,
        query: &LogQuery,
    ) -> Result<Paginated<AccessLogEntry>, ApiError> {
        self.get_json(
            &format!("/api/v1/users/{id}/access-logs"),
            &query.query_pairs(),
        )
    }
}

fn transport(err: ureq::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

fn read_response(response: ureq::http::Response<ureq::Body>) -> Result<(u16, String), ApiError> {
    let status = response.status().as_u16();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    Ok((status, body))
}

fn decode<T: DeserializeOwned>(context: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Transport(format!("decoding {context}: {e}")))
}

/// The uniform classification stage every call goes through.
///
/// 401 wins before any parsing. Then: non-2xx or `success: false` is an
/// application error carrying the envelope's code/message (with fallbacks);
/// otherwise the payload is the envelope's `data` when present, else the
/// whole decoded body.
fn classify(status: u16, body: &str) -> Result<Value, ApiError> {
    if status == 401 {
        return Err(ApiError::Unauthorized);
    }
    let ok = (200..300).contains(&status);
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if ok => return Err(ApiError::Transport(format!("malformed response: {e}"))),
        // Error responses with unreadable bodies still classify as
        // application errors, with the fallback code and message.
        Err(_) => {
            return Err(ApiError::Api {
                code: FALLBACK_CODE.to_string(),
                message: FALLBACK_MESSAGE.to_string(),
                status,
            })
        }
    };

    let success_false = value.get("success").and_then(Value::as_bool) == Some(false);
    if !ok || success_false {
        let code = value
            .pointer("/error/code")
            .and_then(Value::as_str)
            .unwrap_or(FALLBACK_CODE)
            .to_string();
        let message = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or(FALLBACK_MESSAGE)
            .to_string();
        return Err(ApiError::Api { code, message, status });
    }

    Ok(match value.get("data") {
        Some(data) => data.clone(),
        None => value,
    })
}

/// Variant for endpoints where the caller only needs the envelope's human
/// confirmation line.
fn classify_message(status: u16, body: &str) -> Result<String, ApiError> {
    if status == 401 {
        return Err(ApiError::Unauthorized);
    }
    // Reuse the full classification for the error paths, then pull the
    // top-level message out of the raw envelope.
    classify(status, body)?;
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    Ok(value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Query parameters for a channel delete: non-orphaned channels need
/// `force=true` or the backend refuses (and the next sync would undo the
/// delete anyway).
fn delete_force_query(channel: &Channel) -> Vec<(String, String)> {
    if channel.sync_status == SyncStatus::Orphaned {
        Vec::new()
    } else {
        vec![("force".to_string(), "true".to_string())]
    }
}

/// Hand-framed multipart/form-data document with a single file field.
fn multipart_body(boundary: &str, field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PendingLedger;

    #[test]
    fn test_classify_unauthorized_before_parse() {
        // 401 with garbage body must still classify as Unauthorized.
        let err = classify(401, "<html>nope</html>").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_classify_error_envelope() {
        let body = r#"{"success":false,"error":{"code":"CONFLICT","message":"Name taken"}}"#;
        match classify(409, body).unwrap_err() {
            ApiError::Api { code, message, status } => {
                assert_eq!(code, "CONFLICT");
                assert_eq!(message, "Name taken");
                assert_eq!(status, 409);
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_success_false_on_2xx() {
        // A 200 with an explicit success:false is still an error.
        let body = r#"{"success":false,"error":{"code":"VALIDATION","message":"bad"}}"#;
        assert!(matches!(
            classify(200, body).unwrap_err(),
            ApiError::Api { status: 200, .. }
        ));
    }

    #[test]
    fn test_classify_error_defaults() {
        match classify(500, r#"{"success":false}"#).unwrap_err() {
            ApiError::Api { code, message, .. } => {
                assert_eq!(code, "UNKNOWN");
                assert_eq!(message, "Request failed");
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        // Unreadable error body: same defaults, status preserved.
        match classify(502, "Bad Gateway").unwrap_err() {
            ApiError::Api { code, message, status } => {
                assert_eq!(code, "UNKNOWN");
                assert_eq!(message, "Request failed");
                assert_eq!(status, 502);
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unwraps_data() {
        let body = r#"{"success":true,"data":{"id":7,"username":"admin"}}"#;
        let value = classify(200, body).unwrap();
        assert_eq!(value["id"], 7);

        // No data field: the raw decoded body comes back.
        let bare = r#"{"id":3,"name":"x"}"#;
        let value = classify(200, bare).unwrap();
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_classify_malformed_success_is_transport() {
        assert!(matches!(
            classify(200, "not json").unwrap_err(),
            ApiError::Transport(_)
        ));
    }

    #[test]
    fn test_classify_message() {
        let body = r#"{"success":true,"message":"Channel deleted successfully"}"#;
        assert_eq!(
            classify_message(200, body).unwrap(),
            "Channel deleted successfully"
        );
        // Missing message degrades to empty, not an error.
        assert_eq!(classify_message(200, r#"{"success":true}"#).unwrap(), "");
        assert!(matches!(
            classify_message(401, "").unwrap_err(),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn test_delete_force_policy() {
        let mut channel = Channel {
            id: 1,
            stream_name: "cnn".into(),
            tvg_name: None,
            display_name: None,
            catchup_days: None,
            tvg_id: None,
            tvg_logo: None,
            channel_number: None,
            sort_order: 0,
            sync_status: SyncStatus::Synced,
            groups: Vec::new(),
            packages: Vec::new(),
            last_seen_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        // Still synced upstream: force is mandatory.
        assert_eq!(
            delete_force_query(&channel),
            vec![("force".to_string(), "true".to_string())]
        );

        // Orphaned: plain delete, no force.
        channel.sync_status = SyncStatus::Orphaned;
        assert!(delete_force_query(&channel).is_empty());
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("XYZ", "file", "logo.png", b"\x89PNG");
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--XYZ\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"logo.png\""));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
        // The payload bytes are in there verbatim.
        assert!(body.windows(4).any(|w| w == b"\x89PNG"));
    }

    #[test]
    fn test_bulk_patch_wire_body() {
        let mut ledger = PendingLedger::new();
        ledger.track_tvg_id(5, "cnn.us");
        ledger.track_channel_number(5, "");
        let batch = ledger.begin_flush_all().unwrap();

        let body = json!({ "channels": batch });
        let items = body["channels"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], 5);
        assert_eq!(items[0]["tvg_id"], "cnn.us");
        assert!(items[0]["channel_number"].is_null());
        assert!(!items[0].as_object().unwrap().contains_key("tvg_logo"));
    }
}
