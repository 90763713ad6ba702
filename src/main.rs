//! StreamPanel - operator console for a Flussonic-backed IPTV service
//! Channels, groups, packages, tariffs and subscriber management over the
//! admin JSON API, with upstream sync and EPG service control.

// Hide console window on Windows release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use eframe::egui;

mod api;
mod cache;
mod config;
mod ledger;
mod models;
mod view_state;

use api::{AdminClient, ApiError};
use cache::{Mutation, QueryCache, QueryKey};
use config::AppConfig;
use ledger::{ChannelField, PendingLedger};
use models::*;
use view_state::{
    ChannelListQuery, LogQuery, SearchDebounce, SortState, UserListQuery, PER_PAGE_CHOICES,
};

/// Size passed to the channel lookup endpoint for grant pickers.
const LOOKUP_CHANNEL_LIMIT: u32 = 500;

const TOAST_TTL: Duration = Duration::from_secs(4);

// Failure actions double as the operator-facing toast text.
const ACT_LOGIN: &str = "Login failed";
const ACT_SESSION: &str = "Session check failed";
const ACT_LOGOUT: &str = "Logout failed";
const ACT_LOAD_STATS: &str = "Failed to load dashboard";
const ACT_LOAD_SERVICE: &str = "Failed to load service status";
const ACT_EPG_UPDATE: &str = "Failed to trigger EPG update";
const ACT_LOAD_CHANNELS: &str = "Failed to load channels";
const ACT_LOAD_LOOKUP: &str = "Failed to load lookup data";
const ACT_LOAD_CASCADE: &str = "Failed to load delete info";
const ACT_SAVE_CHANNELS: &str = "Failed to save changes";
const ACT_DELETE_CHANNEL: &str = "Failed to delete channel";
const ACT_UPDATE_GROUPS: &str = "Failed to update groups";
const ACT_UPDATE_PACKAGES: &str = "Failed to update packages";
const ACT_SYNC: &str = "Failed to sync channels";
const ACT_LOGO: &str = "Failed to update logo";
const ACT_LOAD_GROUPS: &str = "Failed to load groups";
const ACT_SAVE_GROUP: &str = "Failed to save group";
const ACT_DELETE_GROUP: &str = "Failed to delete group";
const ACT_LOAD_PACKAGES: &str = "Failed to load packages";
const ACT_SAVE_PACKAGE: &str = "Failed to save package";
const ACT_DELETE_PACKAGE: &str = "Failed to delete package";
const ACT_DETACH_CHANNEL: &str = "Failed to remove channel from package";
const ACT_LOAD_TARIFFS: &str = "Failed to load tariffs";
const ACT_SAVE_TARIFF: &str = "Failed to save tariff";
const ACT_DELETE_TARIFF: &str = "Failed to delete tariff";
const ACT_LOAD_USERS: &str = "Failed to load users";
const ACT_LOAD_USER: &str = "Failed to load user";
const ACT_SAVE_USER: &str = "Failed to save user";
const ACT_DELETE_USER: &str = "Failed to delete user";
const ACT_REGEN_TOKEN: &str = "Failed to regenerate token";
const ACT_LOAD_RESOLVED: &str = "Failed to load resolved channels";
const ACT_LOAD_PLAYLIST: &str = "Failed to load playlist preview";
const ACT_LOAD_SESSIONS: &str = "Failed to load sessions";
const ACT_LOAD_ACCESS_LOGS: &str = "Failed to load access logs";

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("streampanel=info")),
        )
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([1000.0, 560.0]),
        vsync: true,
        ..Default::default()
    };

    eframe::run_native(
        "StreamPanel Admin Console",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(PanelApp::new()))
        }),
    )
}

/// Result of one background gateway call, posted back to the UI thread.
enum Fetch {
    Me(AdminIdentity),
    LoggedIn(AdminIdentity),
    LoggedOut,
    Stats(DashboardStats),
    Flussonic(FlussonicHealth),
    AuthService(AuthHealth),
    EpgService(EpgHealth),
    EpgUpdateTriggered(String),
    Channels {
        token: String,
        page: Paginated<Channel>,
    },
    LookupGroups(Vec<GroupRef>),
    LookupPackages(Vec<PackageRef>),
    LookupTariffs(Vec<TariffRef>),
    LookupChannels(Vec<ChannelRef>),
    Cascade {
        channel_id: i64,
        info: CascadeInfo,
    },
    Flushed {
        ids: Vec<i64>,
    },
    ChannelDeleted(String),
    MembershipUpdated(Mutation),
    SyncDone(SyncResult),
    LogoSaved {
        channel_id: i64,
    },
    Groups(Vec<GroupWithCount>),
    GroupSaved(Mutation),
    GroupDeleted(String),
    Packages(Vec<PackageWithCount>),
    PackageDetail(PackageDetail),
    PackageSaved(Mutation),
    PackageDeleted,
    ChannelDetached(String),
    Tariffs(Vec<TariffWithCount>),
    TariffSaved(Mutation),
    TariffDeleted,
    Users {
        token: String,
        page: Paginated<UserListItem>,
    },
    UserDetail(User),
    UserSaved(Mutation),
    UserDeleted(String),
    TokenRegenerated,
    ResolvedChannels {
        user_id: i64,
        channels: Vec<ResolvedChannel>,
    },
    Playlist {
        user_id: i64,
        preview: PlaylistPreview,
    },
    Sessions {
        user_id: i64,
        token: String,
        page: Paginated<SessionEntry>,
    },
    AccessLogs {
        user_id: i64,
        token: String,
        page: Paginated<AccessLogEntry>,
    },
}

struct TaskResult {
    action: &'static str,
    /// Set for cache-backed queries so in-flight tracking can be released.
    key: Option<QueryKey>,
    outcome: Result<Fetch, ApiError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Dashboard,
    Channels,
    Groups,
    Packages,
    Tariffs,
    Users,
}

#[derive(Clone, Copy, PartialEq)]
enum ToastKind {
    Success,
    Error,
}

struct Toast {
    message: String,
    kind: ToastKind,
    created: Instant,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LogoRemoval {
    /// Clear the stored URL only.
    DbOnly,
    /// Clear the URL and delete the uploaded file.
    DeleteFile,
}

struct LogoDialog {
    channel_id: i64,
    channel_name: String,
    server_logo: Option<String>,
    url_input: String,
    picked_file: Option<(String, Vec<u8>)>,
    removal: Option<LogoRemoval>,
}

struct GroupEditor {
    id: Option<i64>,
    name: String,
}

struct PackageEditor {
    id: Option<i64>,
    name: String,
    description: String,
}

struct TariffEditor {
    id: Option<i64>,
    name: String,
    description: String,
    package_ids: Vec<i64>,
}

struct UserEditor {
    id: Option<i64>,
    first_name: String,
    last_name: String,
    agreement_number: String,
    max_sessions: u32,
    status: UserStatus,
    valid_from: String,
    valid_until: String,
    /// Server-side dates at open time, to derive the clear flags on save.
    had_valid_from: bool,
    had_valid_until: bool,
    tariff_ids: Vec<i64>,
    package_ids: Vec<i64>,
    channel_ids: Vec<i64>,
    date_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserDetailTab {
    Overview,
    Entitlements,
    Playlist,
    Sessions,
    AccessLogs,
}

struct UserDetailView {
    user_id: i64,
    tab: UserDetailTab,
    sessions_query: LogQuery,
    logs_query: LogQuery,
    from_input: String,
    to_input: String,
    range_error: Option<String>,
}

impl UserDetailView {
    fn new(user_id: i64) -> Self {
        Self {
            user_id,
            tab: UserDetailTab::Overview,
            sessions_query: LogQuery::default(),
            logs_query: LogQuery::default(),
            from_input: String::new(),
            to_input: String::new(),
            range_error: None,
        }
    }
}

struct PanelApp {
    client: AdminClient,
    config: AppConfig,

    // Session
    logged_in: bool,
    admin: Option<AdminIdentity>,
    session_checked: bool,
    server_input: String,
    login_username: String,
    login_password: String,
    login_error: Option<String>,

    // Background task channel
    task_sender: Sender<TaskResult>,
    task_receiver: Receiver<TaskResult>,

    cache: QueryCache,
    ledger: PendingLedger,
    inflight: HashSet<QueryKey>,
    busy: HashSet<&'static str>,
    toasts: Vec<Toast>,

    current_tab: Tab,
    status_message: String,

    // Channels
    channel_query: ChannelListQuery,
    channel_search: SearchDebounce,
    flushing: bool,
    delete_target: Option<Channel>,
    logo_dialog: Option<LogoDialog>,

    // Groups
    group_editor: Option<GroupEditor>,
    group_delete: Option<GroupWithCount>,

    // Packages
    package_editor: Option<PackageEditor>,
    package_detail_open: Option<i64>,
    package_delete: Option<PackageWithCount>,

    // Tariffs
    tariff_editor: Option<TariffEditor>,
    tariff_delete: Option<TariffWithCount>,

    // Users
    user_query: UserListQuery,
    user_search: SearchDebounce,
    user_editor: Option<UserEditor>,
    user_delete: Option<UserListItem>,
    user_detail: Option<UserDetailView>,
}

impl PanelApp {
    fn new() -> Self {
        let config = AppConfig::load();
        let (task_sender, task_receiver) = channel();

        let client = AdminClient::new(&config.server_url);
        let channel_query = if config.last_channel_view.is_empty() {
            ChannelListQuery {
                per_page: config.per_page,
                ..Default::default()
            }
        } else {
            ChannelListQuery::parse(&config.last_channel_view)
        };
        let channel_search = SearchDebounce::new(&channel_query.search);
        let login_username = config.saved_username.clone();
        let server_input = config.server_url.clone();
        let user_query = UserListQuery {
            per_page: config.per_page,
            ..Default::default()
        };

        Self {
            client,
            logged_in: false,
            admin: None,
            session_checked: false,
            server_input,
            login_username,
            login_password: String::new(),
            login_error: None,
            task_sender,
            task_receiver,
            cache: QueryCache::new(),
            ledger: PendingLedger::new(),
            inflight: HashSet::new(),
            busy: HashSet::new(),
            toasts: Vec::new(),
            current_tab: Tab::Dashboard,
            status_message: "Ready".to_string(),
            channel_query,
            channel_search,
            flushing: false,
            delete_target: None,
            logo_dialog: None,
            group_editor: None,
            group_delete: None,
            package_editor: None,
            package_detail_open: None,
            package_delete: None,
            tariff_editor: None,
            tariff_delete: None,
            user_query,
            user_search: SearchDebounce::new(""),
            user_editor: None,
            user_delete: None,
            user_detail: None,
            config,
        }
    }

    // --- background task plumbing ---------------------------------------

    fn spawn(
        &self,
        action: &'static str,
        key: Option<QueryKey>,
        job: impl FnOnce(&AdminClient) -> Result<Fetch, ApiError> + Send + 'static,
    ) {
        let client = self.client.clone();
        let sender = self.task_sender.clone();
        thread::spawn(move || {
            let outcome = job(&client);
            if let Err(ref error) = outcome {
                tracing::warn!(action, %error, "request failed");
            }
            let _ = sender.send(TaskResult { action, key, outcome });
        });
    }

    fn spawn_mutation(
        &mut self,
        action: &'static str,
        job: impl FnOnce(&AdminClient) -> Result<Fetch, ApiError> + Send + 'static,
    ) {
        self.busy.insert(action);
        self.spawn(action, None, job);
    }

    fn is_busy(&self, action: &'static str) -> bool {
        self.busy.contains(action)
    }

    /// Fetch a cache-backed query unless it is fresh or already in flight.
    fn ensure(
        &mut self,
        key: QueryKey,
        action: &'static str,
        job: impl FnOnce(&AdminClient) -> Result<Fetch, ApiError> + Send + 'static,
    ) {
        if self.cache.is_fresh(&key, Instant::now()) || self.inflight.contains(&key) {
            return;
        }
        self.inflight.insert(key.clone());
        self.spawn(action, Some(key), job);
    }

    fn toast(&mut self, kind: ToastKind, message: impl Into<String>) {
        self.toasts.push(Toast {
            message: message.into(),
            kind,
            created: Instant::now(),
        });
    }

    fn toast_success(&mut self, message: impl Into<String>) {
        self.toast(ToastKind::Success, message);
    }

    fn toast_error(&mut self, message: impl Into<String>) {
        self.toast(ToastKind::Error, message);
    }

    /// Any 401 anywhere drops the session and returns to the login screen.
    fn handle_unauthorized(&mut self) {
        if self.logged_in {
            self.toast_error("Session expired, please sign in again");
        }
        self.logged_in = false;
        self.admin = None;
        self.cache.clear();
        self.inflight.clear();
        self.busy.clear();
        self.flushing = false;
        self.user_detail = None;
        self.user_editor = None;
    }

    fn handle_result(&mut self, result: TaskResult) {
        let TaskResult { action, key, outcome } = result;
        self.busy.remove(action);
        if let Some(key) = key {
            self.inflight.remove(&key);
        }

        let fetch = match outcome {
            Ok(fetch) => fetch,
            Err(error) => {
                if action == ACT_SAVE_CHANNELS {
                    self.flushing = false;
                }
                match error {
                    ApiError::Unauthorized if action == ACT_LOGIN => {
                        self.login_error = Some("Invalid username or password".to_string());
                    }
                    ApiError::Unauthorized => self.handle_unauthorized(),
                    _ if action == ACT_LOGIN => {
                        self.login_error = Some(error.to_string());
                    }
                    // Session bootstrap failing just means "not signed in".
                    _ if action == ACT_SESSION || action == ACT_LOGOUT => {}
                    _ => self.toast_error(action),
                }
                return;
            }
        };

        let now = Instant::now();
        let service_refresh = if self.config.service_refresh_secs > 0 {
            Some(Duration::from_secs(self.config.service_refresh_secs))
        } else {
            None
        };

        match fetch {
            Fetch::Me(admin) | Fetch::LoggedIn(admin) => {
                self.logged_in = true;
                self.session_checked = true;
                self.login_error = None;
                self.login_password.clear();
                self.status_message = format!("Signed in as {}", admin.username);
                self.admin = Some(admin);
            }
            Fetch::LoggedOut => {}
            Fetch::Stats(stats) => self.cache.put(QueryKey::dashboard_stats(), stats, now),
            Fetch::Flussonic(health) => match service_refresh {
                Some(every) => {
                    self.cache
                        .put_with_refresh(QueryKey::flussonic_health(), health, now, every)
                }
                None => self.cache.put(QueryKey::flussonic_health(), health, now),
            },
            Fetch::AuthService(health) => match service_refresh {
                Some(every) => self
                    .cache
                    .put_with_refresh(QueryKey::auth_health(), health, now, every),
                None => self.cache.put(QueryKey::auth_health(), health, now),
            },
            Fetch::EpgService(health) => match service_refresh {
                Some(every) => self
                    .cache
                    .put_with_refresh(QueryKey::epg_health(), health, now, every),
                None => self.cache.put(QueryKey::epg_health(), health, now),
            },
            Fetch::EpgUpdateTriggered(message) => {
                self.cache.apply(Mutation::TriggerEpgUpdate);
                let text = if message.is_empty() {
                    "EPG update requested".to_string()
                } else {
                    message
                };
                self.toast_success(text);
            }
            Fetch::Channels { token, page } => {
                self.cache.put(QueryKey::channels_list(&token), page, now);
            }
            Fetch::LookupGroups(groups) => {
                self.cache.put(QueryKey::lookup_groups(), groups, now)
            }
            Fetch::LookupPackages(packages) => {
                self.cache.put(QueryKey::lookup_packages(), packages, now)
            }
            Fetch::LookupTariffs(tariffs) => {
                self.cache.put(QueryKey::lookup_tariffs(), tariffs, now)
            }
            Fetch::LookupChannels(channels) => {
                self.cache.put(QueryKey::lookup_channels(), channels, now)
            }
            Fetch::Cascade { channel_id, info } => {
                self.cache.put(QueryKey::channel_cascade(channel_id), info, now)
            }
            Fetch::Flushed { ids } => {
                self.flushing = false;
                self.ledger.commit_flush(&ids);
                self.cache.apply(Mutation::BulkUpdateChannels);
                if ids.len() == 1 {
                    self.toast_success("Channel updated");
                } else {
                    self.toast_success(format!("{} channels updated", ids.len()));
                }
            }
            Fetch::ChannelDeleted(message) => {
                self.cache.apply(Mutation::DeleteChannel);
                self.delete_target = None;
                let text = if message.is_empty() {
                    "Channel deleted".to_string()
                } else {
                    message
                };
                self.toast_success(text);
            }
            Fetch::MembershipUpdated(mutation) => {
                self.cache.apply(mutation);
                match mutation {
                    Mutation::UpdateChannelGroups => self.toast_success("Groups updated"),
                    _ => self.toast_success("Packages updated"),
                }
            }
            Fetch::SyncDone(result) => {
                self.cache.apply(Mutation::SyncChannels);
                self.channel_query.page = 1;
                self.toast_success(format!(
                    "Sync complete: {} new, {} updated, {} orphaned",
                    result.new, result.updated, result.orphaned
                ));
            }
            Fetch::LogoSaved { channel_id } => {
                // The dialog commits through its own endpoints; drop any
                // pending inline logo edit so the overlay cannot bring a
                // stale value back over the committed one.
                self.ledger.clear_field(channel_id, ChannelField::TvgLogo);
                self.cache.apply(Mutation::ChannelLogoChanged);
                self.logo_dialog = None;
                self.toast_success("Logo updated");
            }
            Fetch::Groups(groups) => self.cache.put(QueryKey::groups(), groups, now),
            Fetch::GroupSaved(mutation) => {
                self.cache.apply(mutation);
                self.group_editor = None;
                self.toast_success("Group saved");
            }
            Fetch::GroupDeleted(message) => {
                self.cache.apply(Mutation::DeleteGroup);
                self.group_delete = None;
                let text = if message.is_empty() {
                    "Group deleted".to_string()
                } else {
                    message
                };
                self.toast_success(text);
            }
            Fetch::Packages(packages) => self.cache.put(QueryKey::packages(), packages, now),
            Fetch::PackageDetail(detail) => {
                self.cache.put(QueryKey::package_detail(detail.id), detail, now)
            }
            Fetch::PackageSaved(mutation) => {
                self.cache.apply(mutation);
                self.package_editor = None;
                self.toast_success("Package saved");
            }
            Fetch::PackageDeleted => {
                self.cache.apply(Mutation::DeletePackage);
                self.package_delete = None;
                self.toast_success("Package deleted");
            }
            Fetch::ChannelDetached(message) => {
                self.cache.apply(Mutation::DetachPackageChannel);
                let text = if message.is_empty() {
                    "Channel removed from package".to_string()
                } else {
                    message
                };
                self.toast_success(text);
            }
            Fetch::Tariffs(tariffs) => self.cache.put(QueryKey::tariffs(), tariffs, now),
            Fetch::TariffSaved(mutation) => {
                self.cache.apply(mutation);
                self.tariff_editor = None;
                self.toast_success("Tariff saved");
            }
            Fetch::TariffDeleted => {
                self.cache.apply(Mutation::DeleteTariff);
                self.tariff_delete = None;
                self.toast_success("Tariff deleted");
            }
            Fetch::Users { token, page } => {
                self.cache.put(QueryKey::users_list(&token), page, now);
            }
            Fetch::UserDetail(user) => {
                self.cache.put(QueryKey::user_detail(user.id), user, now)
            }
            Fetch::UserSaved(mutation) => {
                self.cache.apply(mutation);
                self.user_editor = None;
                self.toast_success("User saved");
            }
            Fetch::UserDeleted(message) => {
                self.cache.apply(Mutation::DeleteUser);
                self.user_delete = None;
                self.user_detail = None;
                let text = if message.is_empty() {
                    "User deleted".to_string()
                } else {
                    message
                };
                self.toast_success(text);
            }
            Fetch::TokenRegenerated => {
                self.cache.apply(Mutation::RegenerateToken);
                self.toast_success("Token regenerated");
            }
            Fetch::ResolvedChannels { user_id, channels } => {
                self.cache
                    .put(QueryKey::user_resolved_channels(user_id), channels, now)
            }
            Fetch::Playlist { user_id, preview } => {
                self.cache.put(QueryKey::user_playlist(user_id), preview, now)
            }
            Fetch::Sessions { user_id, token, page } => {
                self.cache
                    .put(QueryKey::user_sessions(user_id, &token), page, now)
            }
            Fetch::AccessLogs { user_id, token, page } => {
                self.cache
                    .put(QueryKey::user_access_logs(user_id, &token), page, now)
            }
        }
    }

    // --- session ---------------------------------------------------------

    fn login(&mut self) {
        let mut server = self.server_input.trim().trim_end_matches('/').to_string();
        if server.is_empty() {
            self.login_error = Some("Server URL is required".to_string());
            return;
        }
        if !server.starts_with("http://") && !server.starts_with("https://") {
            server = format!("http://{server}");
        }
        self.server_input = server.clone();
        if server != self.client.base_url() {
            self.client = AdminClient::new(&server);
        }

        self.login_error = None;
        self.config.server_url = server;
        if self.config.remember_username {
            self.config.saved_username = self.login_username.clone();
        } else {
            self.config.saved_username.clear();
        }
        self.config.save();

        let username = self.login_username.clone();
        let password = self.login_password.clone();
        self.spawn_mutation(ACT_LOGIN, move |client| {
            client.login(&username, &password).map(Fetch::LoggedIn)
        });
    }

    fn logout(&mut self) {
        // Local logout always wins; the server call is best-effort.
        self.config.last_channel_view = self.channel_query.to_query_string();
        self.config.save();
        self.spawn_mutation(ACT_LOGOUT, |client| {
            client.logout().map(|_| Fetch::LoggedOut)
        });
        self.logged_in = false;
        self.admin = None;
        self.cache.clear();
        self.ledger = PendingLedger::new();
        self.inflight.clear();
        self.status_message = "Signed out".to_string();
    }

    fn bootstrap_session(&mut self) {
        self.session_checked = true;
        if self.config.server_url.is_empty() {
            return;
        }
        self.spawn_mutation(ACT_SESSION, |client| client.me().map(Fetch::Me));
    }

    // --- per-tab data dependencies ---------------------------------------

    fn ensure_dashboard(&mut self) {
        self.ensure(QueryKey::dashboard_stats(), ACT_LOAD_STATS, |client| {
            client.dashboard_stats().map(Fetch::Stats)
        });
        self.ensure(QueryKey::flussonic_health(), ACT_LOAD_SERVICE, |client| {
            client.flussonic_health().map(Fetch::Flussonic)
        });
        self.ensure(QueryKey::auth_health(), ACT_LOAD_SERVICE, |client| {
            client.auth_health().map(Fetch::AuthService)
        });
        self.ensure(QueryKey::epg_health(), ACT_LOAD_SERVICE, |client| {
            client.epg_health().map(Fetch::EpgService)
        });
    }

    fn ensure_channels(&mut self) {
        let token = self.channel_query.to_query_string();
        let query = self.channel_query.clone();
        self.ensure(
            QueryKey::channels_list(&token),
            ACT_LOAD_CHANNELS,
            move |client| {
                client
                    .list_channels(&query)
                    .map(|page| Fetch::Channels { token, page })
            },
        );
        self.ensure(QueryKey::lookup_groups(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_groups().map(Fetch::LookupGroups)
        });
        self.ensure(QueryKey::lookup_packages(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_packages().map(Fetch::LookupPackages)
        });
    }

    fn ensure_users(&mut self) {
        let token = self.user_query.to_query_string();
        let query = self.user_query.clone();
        self.ensure(QueryKey::users_list(&token), ACT_LOAD_USERS, move |client| {
            client
                .list_users(&query)
                .map(|page| Fetch::Users { token, page })
        });
        self.ensure(QueryKey::lookup_tariffs(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_tariffs().map(Fetch::LookupTariffs)
        });
    }

    // --- channel actions --------------------------------------------------

    fn apply_one(&mut self, id: i64) {
        if self.flushing {
            return;
        }
        let Some(batch) = self.ledger.begin_flush_one(id) else {
            return;
        };
        self.flushing = true;
        self.spawn_mutation(ACT_SAVE_CHANNELS, move |client| {
            client.bulk_update_channels(&batch)?;
            Ok(Fetch::Flushed { ids: vec![id] })
        });
    }

    fn apply_all(&mut self) {
        if self.flushing {
            return;
        }
        let Some(batch) = self.ledger.begin_flush_all() else {
            return;
        };
        let ids: Vec<i64> = batch.iter().map(|patch| patch.id).collect();
        self.flushing = true;
        self.spawn_mutation(ACT_SAVE_CHANNELS, move |client| {
            client.bulk_update_channels(&batch)?;
            Ok(Fetch::Flushed { ids })
        });
    }

    fn sync_channels(&mut self) {
        self.spawn_mutation(ACT_SYNC, |client| {
            client.sync_channels().map(Fetch::SyncDone)
        });
    }

    fn set_channel_groups(&mut self, channel_id: i64, group_ids: Vec<i64>) {
        self.spawn_mutation(ACT_UPDATE_GROUPS, move |client| {
            client.update_channel_groups(channel_id, &group_ids)?;
            Ok(Fetch::MembershipUpdated(Mutation::UpdateChannelGroups))
        });
    }

    fn set_channel_packages(&mut self, channel_id: i64, package_ids: Vec<i64>) {
        self.spawn_mutation(ACT_UPDATE_PACKAGES, move |client| {
            client.update_channel_packages(channel_id, &package_ids)?;
            Ok(Fetch::MembershipUpdated(Mutation::UpdateChannelPackages))
        });
    }

    fn delete_channel(&mut self, channel: Channel) {
        self.spawn_mutation(ACT_DELETE_CHANNEL, move |client| {
            client.delete_channel(&channel).map(Fetch::ChannelDeleted)
        });
    }

    fn apply_logo_dialog(&mut self) {
        let Some(dialog) = &self.logo_dialog else {
            return;
        };
        let channel_id = dialog.channel_id;
        if let Some(removal) = dialog.removal {
            let delete_file = removal == LogoRemoval::DeleteFile;
            self.spawn_mutation(ACT_LOGO, move |client| {
                client.remove_logo(channel_id, delete_file)?;
                Ok(Fetch::LogoSaved { channel_id })
            });
        } else if let Some((filename, data)) = dialog.picked_file.clone() {
            self.spawn_mutation(ACT_LOGO, move |client| {
                client.upload_logo(channel_id, &filename, &data)?;
                Ok(Fetch::LogoSaved { channel_id })
            });
        } else {
            let url = dialog.url_input.trim().to_string();
            let unchanged = dialog.server_logo.as_deref().unwrap_or("") == url;
            if url.is_empty() || unchanged {
                self.logo_dialog = None;
                return;
            }
            self.spawn_mutation(ACT_LOGO, move |client| {
                client.upload_logo_url(channel_id, &url)?;
                Ok(Fetch::LogoSaved { channel_id })
            });
        }
    }

    // --- views ------------------------------------------------------------

    fn login_view(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(120.0);
                ui.heading("StreamPanel");
                ui.label("Operator sign-in");
                ui.add_space(16.0);

                egui::Grid::new("login_form")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Server:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.server_input)
                                .hint_text("http://panel.example.com:8000")
                                .desired_width(260.0),
                        );
                        ui.end_row();

                        ui.label("Username:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.login_username)
                                .desired_width(260.0),
                        );
                        ui.end_row();

                        ui.label("Password:");
                        let password = ui.add(
                            egui::TextEdit::singleline(&mut self.login_password)
                                .password(true)
                                .desired_width(260.0),
                        );
                        if password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter))
                        {
                            self.login();
                        }
                        ui.end_row();
                    });

                ui.add_space(4.0);
                ui.checkbox(&mut self.config.remember_username, "Remember username");
                ui.add_space(8.0);

                ui.horizontal(|ui| {
                    ui.add_space(ui.available_width() / 2.0 - 60.0);
                    if ui
                        .add_enabled(!self.is_busy(ACT_LOGIN), egui::Button::new("Sign in"))
                        .clicked()
                    {
                        self.login();
                    }
                    if self.is_busy(ACT_LOGIN) {
                        ui.add(egui::Spinner::new());
                    }
                });

                if let Some(error) = &self.login_error {
                    ui.add_space(8.0);
                    ui.colored_label(egui::Color32::LIGHT_RED, error);
                }
            });
        });
    }

    fn dashboard_view(&mut self, ui: &mut egui::Ui) {
        self.ensure_dashboard();

        ui.horizontal(|ui| {
            ui.heading("Dashboard");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .add_enabled(
                        !self.is_busy(ACT_EPG_UPDATE),
                        egui::Button::new("Update EPG now"),
                    )
                    .clicked()
                {
                    self.spawn_mutation(ACT_EPG_UPDATE, |client| {
                        client.trigger_epg_update().map(Fetch::EpgUpdateTriggered)
                    });
                }
            });
        });
        ui.add_space(8.0);

        let stats = self.cache.get::<DashboardStats>(&QueryKey::dashboard_stats());
        match stats {
            Some(stats) => {
                let stats = stats.clone();
                egui::Grid::new("stats_grid")
                    .num_columns(6)
                    .spacing([24.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong("Channels");
                        ui.strong("Synced");
                        ui.strong("Orphaned");
                        ui.strong("Groups");
                        ui.strong("Packages");
                        ui.strong("Tariffs");
                        ui.end_row();
                        ui.label(stats.channels_total.to_string());
                        ui.label(stats.channels_synced.to_string());
                        ui.label(stats.channels_orphaned.to_string());
                        ui.label(stats.groups.to_string());
                        ui.label(stats.packages.to_string());
                        ui.label(stats.tariffs.to_string());
                        ui.end_row();
                    });
                ui.add_space(6.0);
                ui.label(format!(
                    "Subscribers: {} total, {} enabled, {} disabled",
                    stats.users, stats.users_enabled, stats.users_disabled
                ));
                ui.label(format!(
                    "Last sync: {}",
                    stats.last_sync.as_deref().unwrap_or("never")
                ));
            }
            None => {
                ui.add(egui::Spinner::new());
            }
        }

        ui.add_space(16.0);
        ui.separator();
        ui.add_space(8.0);
        ui.heading("Services");
        ui.add_space(6.0);

        let flussonic = self
            .cache
            .get::<FlussonicHealth>(&QueryKey::flussonic_health())
            .cloned();
        let auth = self.cache.get::<AuthHealth>(&QueryKey::auth_health()).cloned();
        let epg = self.cache.get::<EpgHealth>(&QueryKey::epg_health()).cloned();

        ui.columns(3, |columns| {
            columns[0].group(|ui| {
                ui.strong("Flussonic");
                match &flussonic {
                    Some(h) => {
                        health_line(ui, &h.health);
                        if let (Some(incoming), Some(outgoing)) = (h.incoming_kbit, h.outgoing_kbit)
                        {
                            ui.label(format!("In {incoming} kbit/s, out {outgoing} kbit/s"));
                        }
                        if let Some(clients) = h.total_clients {
                            ui.label(format!("{clients} clients"));
                        }
                        if let (Some(good), Some(broken), Some(total)) =
                            (h.good_sources, h.broken_sources, h.total_sources)
                        {
                            ui.label(format!("Sources: {good}/{total} good, {broken} broken"));
                        }
                        if let Some(error) = &h.error {
                            ui.colored_label(egui::Color32::LIGHT_RED, error);
                        }
                    }
                    None => {
                        ui.add(egui::Spinner::new());
                    }
                }
            });
            columns[1].group(|ui| {
                ui.strong("Auth service");
                match &auth {
                    Some(h) => {
                        health_line(ui, &h.health);
                        if let Some(sessions) = h.active_sessions {
                            ui.label(format!("{sessions} active sessions"));
                        }
                        if let Some(error) = &h.error {
                            ui.colored_label(egui::Color32::LIGHT_RED, error);
                        }
                    }
                    None => {
                        ui.add(egui::Spinner::new());
                    }
                }
            });
            columns[2].group(|ui| {
                ui.strong("EPG service");
                match &epg {
                    Some(h) => {
                        health_line(ui, &h.health);
                        if let Some(at) = &h.last_epg_update_at {
                            ui.label(format!("Last update: {at}"));
                        }
                        if let Some(at) = &h.next_fetch_at {
                            ui.label(format!("Next fetch: {at}"));
                        }
                        if let Some(count) = h.last_updated_channels_count {
                            ui.label(format!("{count} channels updated"));
                        }
                        if let Some(error) = &h.error {
                            ui.colored_label(egui::Color32::LIGHT_RED, error);
                        }
                    }
                    None => {
                        ui.add(egui::Spinner::new());
                    }
                }
            });
        });
    }

    fn channels_view(&mut self, ui: &mut egui::Ui) {
        self.ensure_channels();

        let groups = self
            .cache
            .get::<Vec<GroupRef>>(&QueryKey::lookup_groups())
            .cloned()
            .unwrap_or_default();
        let packages = self
            .cache
            .get::<Vec<PackageRef>>(&QueryKey::lookup_packages())
            .cloned()
            .unwrap_or_default();
        let token = self.channel_query.to_query_string();
        let page = self
            .cache
            .get::<Paginated<Channel>>(&QueryKey::channels_list(&token))
            .cloned();

        // Header
        ui.horizontal(|ui| {
            ui.heading("Channels");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .add_enabled(!self.is_busy(ACT_SYNC), egui::Button::new("Sync from Flussonic"))
                    .clicked()
                {
                    self.sync_channels();
                }
                let pending = self.ledger.len();
                if pending > 0 {
                    if ui
                        .add_enabled(
                            !self.flushing,
                            egui::Button::new(format!("Apply All ({pending})")),
                        )
                        .clicked()
                    {
                        self.apply_all();
                    }
                }
                if self.flushing || self.is_busy(ACT_SYNC) {
                    ui.add(egui::Spinner::new());
                }
            });
        });
        ui.add_space(6.0);

        // Filters
        ui.horizontal(|ui| {
            ui.label("Group:");
            let mut group_filter = self.channel_query.group_id;
            egui::ComboBox::from_id_salt("channel_group_filter")
                .selected_text(match group_filter {
                    None => "All Groups".to_string(),
                    Some(id) => groups
                        .iter()
                        .find(|g| g.id == id)
                        .map(|g| g.name.clone())
                        .unwrap_or_else(|| format!("#{id}")),
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut group_filter, None, "All Groups");
                    for group in &groups {
                        ui.selectable_value(&mut group_filter, Some(group.id), &group.name);
                    }
                });
            if group_filter != self.channel_query.group_id {
                self.channel_query.set_group_filter(group_filter);
            }

            ui.label("Status:");
            let mut status_filter = self.channel_query.sync_status;
            egui::ComboBox::from_id_salt("channel_status_filter")
                .selected_text(match status_filter {
                    None => "All",
                    Some(SyncStatus::Synced) => "Synced",
                    Some(SyncStatus::Orphaned) => "Orphaned",
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut status_filter, None, "All");
                    ui.selectable_value(&mut status_filter, Some(SyncStatus::Synced), "Synced");
                    ui.selectable_value(&mut status_filter, Some(SyncStatus::Orphaned), "Orphaned");
                });
            if status_filter != self.channel_query.sync_status {
                self.channel_query.set_status_filter(status_filter);
            }

            ui.label("Search:");
            let response = ui.add(
                egui::TextEdit::singleline(self.channel_search.input_mut())
                    .hint_text("Search channels...")
                    .desired_width(220.0),
            );
            if response.changed() {
                self.channel_search.mark_edited(Instant::now());
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                if self.channel_search.flush() {
                    let committed = self.channel_search.committed().to_string();
                    self.channel_query.set_search(&committed);
                }
            }
        });
        ui.add_space(6.0);

        let Some(page) = page else {
            ui.add(egui::Spinner::new());
            return;
        };

        // Table
        egui::ScrollArea::both().auto_shrink([false, true]).show(ui, |ui| {
            egui::Grid::new("channels_table")
                .num_columns(9)
                .striped(true)
                .spacing([10.0, 4.0])
                .show(ui, |ui| {
                    // Header row
                    sort_header(ui, &mut self.channel_query.sort, "#", "channel_number");
                    ui.strong("Logo");
                    sort_header(ui, &mut self.channel_query.sort, "Name", "display_name");
                    sort_header(ui, &mut self.channel_query.sort, "TVG ID", "tvg_id");
                    ui.strong("Groups");
                    sort_header(ui, &mut self.channel_query.sort, "Archive", "catchup_days");
                    ui.strong("Packages");
                    sort_header(ui, &mut self.channel_query.sort, "Status", "sync_status");
                    ui.strong("Actions");
                    ui.end_row();

                    if page.items.is_empty() {
                        ui.label("No channels found");
                        ui.end_row();
                    }

                    for ch in &page.items {
                        self.channel_row(ui, ch, &groups, &packages);
                        ui.end_row();
                    }
                });
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if let Some(goto) = pagination_bar(ui, page.page, page.pages, page.total, "channels") {
                self.channel_query.page = goto;
            }
            ui.separator();
            ui.label("Per page:");
            let mut per_page = self.channel_query.per_page;
            egui::ComboBox::from_id_salt("channels_per_page")
                .selected_text(per_page.to_string())
                .show_ui(ui, |ui| {
                    for &choice in PER_PAGE_CHOICES {
                        ui.selectable_value(&mut per_page, choice, choice.to_string());
                    }
                });
            if per_page != self.channel_query.per_page {
                self.channel_query.set_per_page(per_page);
                self.config.per_page = per_page;
                self.config.save();
            }
        });
    }

    /// One row of the channel table. Inline edits go straight into the
    /// ledger; the rendered value is the ledger overlay over the server row.
    fn channel_row(
        &mut self,
        ui: &mut egui::Ui,
        ch: &Channel,
        groups: &[GroupRef],
        packages: &[PackageRef],
    ) {
        let dirty = self.ledger.has(ch.id);
        let orphaned = ch.sync_status == SyncStatus::Orphaned;

        // Channel number
        let mut number_text = self
            .ledger
            .effective_channel_number(ch)
            .map(|n| n.to_string())
            .unwrap_or_default();
        let response = ui.add(
            egui::TextEdit::singleline(&mut number_text)
                .desired_width(44.0)
                .hint_text("-"),
        );
        if response.changed() {
            self.ledger.track_channel_number(ch.id, &number_text);
        }

        // Logo
        let logo = self
            .ledger
            .effective_tvg_logo(ch)
            .map(str::to_string);
        let logo_label = if logo.is_some() { "🖼" } else { "+" };
        if ui
            .button(logo_label)
            .on_hover_text(logo.as_deref().unwrap_or("Add logo"))
            .clicked()
        {
            self.logo_dialog = Some(LogoDialog {
                channel_id: ch.id,
                channel_name: ch.title().to_string(),
                server_logo: ch.tvg_logo.clone(),
                url_input: ch.tvg_logo.clone().unwrap_or_default(),
                picked_file: None,
                removal: None,
            });
        }

        // Name
        ui.vertical(|ui| {
            let mut title = egui::RichText::new(ch.title());
            if orphaned {
                title = title.weak();
            }
            if dirty {
                title = title.color(egui::Color32::GOLD);
            }
            ui.label(title.strong());
            ui.label(egui::RichText::new(&ch.stream_name).weak().small());
        });

        // TVG ID
        let mut tvg_id = self
            .ledger
            .effective_tvg_id(ch)
            .unwrap_or_default()
            .to_string();
        let response = ui.add(
            egui::TextEdit::singleline(&mut tvg_id)
                .desired_width(110.0)
                .hint_text("-"),
        );
        if response.changed() {
            self.ledger.track_tvg_id(ch.id, &tvg_id);
        }

        // Groups membership (replace-whole-set on every change)
        let current_groups: Vec<i64> = ch.groups.iter().map(|g| g.id).collect();
        let options: Vec<(i64, String)> =
            groups.iter().map(|g| (g.id, g.name.clone())).collect();
        if let Some(ids) = membership_menu(ui, (ch.id, "groups"), &current_groups, &options) {
            self.set_channel_groups(ch.id, ids);
        }

        // Archive days (read-only, imported from Flussonic)
        match ch.catchup_days {
            Some(days) => ui.label(days.to_string()),
            None => ui.label(egui::RichText::new("-").weak()),
        };

        // Packages membership
        let current_packages: Vec<i64> = ch.packages.iter().map(|p| p.id).collect();
        let options: Vec<(i64, String)> =
            packages.iter().map(|p| (p.id, p.name.clone())).collect();
        if let Some(ids) = membership_menu(ui, (ch.id, "packages"), &current_packages, &options) {
            self.set_channel_packages(ch.id, ids);
        }

        // Status badge
        match ch.sync_status {
            SyncStatus::Synced => {
                ui.colored_label(egui::Color32::from_rgb(80, 180, 90), "sync")
            }
            SyncStatus::Orphaned => {
                ui.colored_label(egui::Color32::from_rgb(210, 170, 60), "orph")
            }
        };

        // Actions
        ui.horizontal(|ui| {
            if ui
                .add_enabled(dirty && !self.flushing, egui::Button::new("Apply"))
                .clicked()
            {
                self.apply_one(ch.id);
            }
            if ui.button("Del").clicked() {
                self.delete_target = Some(ch.clone());
            }
        });
    }

    fn groups_view(&mut self, ui: &mut egui::Ui) {
        self.ensure(QueryKey::groups(), ACT_LOAD_GROUPS, |client| {
            client.list_groups().map(Fetch::Groups)
        });

        ui.horizontal(|ui| {
            ui.heading("Groups");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New group").clicked() {
                    self.group_editor = Some(GroupEditor {
                        id: None,
                        name: String::new(),
                    });
                }
            });
        });
        ui.add_space(6.0);

        let Some(groups) = self.cache.get::<Vec<GroupWithCount>>(&QueryKey::groups()).cloned()
        else {
            ui.add(egui::Spinner::new());
            return;
        };

        egui::ScrollArea::vertical().auto_shrink([false, true]).show(ui, |ui| {
            egui::Grid::new("groups_table")
                .num_columns(4)
                .striped(true)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    ui.strong("Name");
                    ui.strong("Channels");
                    ui.strong("Sort order");
                    ui.strong("Actions");
                    ui.end_row();

                    if groups.is_empty() {
                        ui.label("No groups yet");
                        ui.end_row();
                    }
                    for group in &groups {
                        ui.label(&group.name);
                        ui.label(group.channel_count.to_string());
                        ui.label(group.sort_order.to_string());
                        ui.horizontal(|ui| {
                            if ui.button("Edit").clicked() {
                                self.group_editor = Some(GroupEditor {
                                    id: Some(group.id),
                                    name: group.name.clone(),
                                });
                            }
                            if ui.button("Del").clicked() {
                                self.group_delete = Some(group.clone());
                            }
                        });
                        ui.end_row();
                    }
                });
        });
    }

    fn packages_view(&mut self, ui: &mut egui::Ui) {
        self.ensure(QueryKey::packages(), ACT_LOAD_PACKAGES, |client| {
            client.list_packages().map(Fetch::Packages)
        });

        ui.horizontal(|ui| {
            ui.heading("Packages");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New package").clicked() {
                    self.package_editor = Some(PackageEditor {
                        id: None,
                        name: String::new(),
                        description: String::new(),
                    });
                }
            });
        });
        ui.add_space(6.0);

        let Some(packages) = self
            .cache
            .get::<Vec<PackageWithCount>>(&QueryKey::packages())
            .cloned()
        else {
            ui.add(egui::Spinner::new());
            return;
        };

        egui::ScrollArea::vertical().auto_shrink([false, true]).show(ui, |ui| {
            egui::Grid::new("packages_table")
                .num_columns(4)
                .striped(true)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    ui.strong("Name");
                    ui.strong("Description");
                    ui.strong("Channels");
                    ui.strong("Actions");
                    ui.end_row();

                    if packages.is_empty() {
                        ui.label("No packages yet");
                        ui.end_row();
                    }
                    for package in &packages {
                        ui.label(&package.name);
                        ui.label(package.description.as_deref().unwrap_or("-"));
                        ui.label(package.channel_count.to_string());
                        ui.horizontal(|ui| {
                            if ui.button("Channels").clicked() {
                                self.package_detail_open = Some(package.id);
                            }
                            if ui.button("Edit").clicked() {
                                self.package_editor = Some(PackageEditor {
                                    id: Some(package.id),
                                    name: package.name.clone(),
                                    description: package
                                        .description
                                        .clone()
                                        .unwrap_or_default(),
                                });
                            }
                            if ui.button("Del").clicked() {
                                self.package_delete = Some(package.clone());
                            }
                        });
                        ui.end_row();
                    }
                });
        });
    }

    fn tariffs_view(&mut self, ui: &mut egui::Ui) {
        self.ensure(QueryKey::tariffs(), ACT_LOAD_TARIFFS, |client| {
            client.list_tariffs().map(Fetch::Tariffs)
        });
        self.ensure(QueryKey::lookup_packages(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_packages().map(Fetch::LookupPackages)
        });

        ui.horizontal(|ui| {
            ui.heading("Tariffs");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New tariff").clicked() {
                    self.tariff_editor = Some(TariffEditor {
                        id: None,
                        name: String::new(),
                        description: String::new(),
                        package_ids: Vec::new(),
                    });
                }
            });
        });
        ui.add_space(6.0);

        let Some(tariffs) = self
            .cache
            .get::<Vec<TariffWithCount>>(&QueryKey::tariffs())
            .cloned()
        else {
            ui.add(egui::Spinner::new());
            return;
        };

        egui::ScrollArea::vertical().auto_shrink([false, true]).show(ui, |ui| {
            egui::Grid::new("tariffs_table")
                .num_columns(4)
                .striped(true)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    ui.strong("Name");
                    ui.strong("Description");
                    ui.strong("Packages");
                    ui.strong("Actions");
                    ui.end_row();

                    if tariffs.is_empty() {
                        ui.label("No tariffs yet");
                        ui.end_row();
                    }
                    for tariff in &tariffs {
                        ui.label(&tariff.name);
                        ui.label(tariff.description.as_deref().unwrap_or("-"));
                        let names: Vec<&str> =
                            tariff.packages.iter().map(|p| p.name.as_str()).collect();
                        ui.label(if names.is_empty() {
                            "-".to_string()
                        } else {
                            names.join(", ")
                        });
                        ui.horizontal(|ui| {
                            if ui.button("Edit").clicked() {
                                self.tariff_editor = Some(TariffEditor {
                                    id: Some(tariff.id),
                                    name: tariff.name.clone(),
                                    description: tariff
                                        .description
                                        .clone()
                                        .unwrap_or_default(),
                                    package_ids: tariff
                                        .packages
                                        .iter()
                                        .map(|p| p.id)
                                        .collect(),
                                });
                            }
                            if ui.button("Del").clicked() {
                                self.tariff_delete = Some(tariff.clone());
                            }
                        });
                        ui.end_row();
                    }
                });
        });
    }

    fn users_view(&mut self, ui: &mut egui::Ui) {
        self.ensure_users();

        let tariffs = self
            .cache
            .get::<Vec<TariffRef>>(&QueryKey::lookup_tariffs())
            .cloned()
            .unwrap_or_default();

        ui.horizontal(|ui| {
            ui.heading("Users");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("New user").clicked() {
                    self.user_editor = Some(UserEditor {
                        id: None,
                        first_name: String::new(),
                        last_name: String::new(),
                        agreement_number: String::new(),
                        max_sessions: 1,
                        status: UserStatus::Enabled,
                        valid_from: String::new(),
                        valid_until: String::new(),
                        had_valid_from: false,
                        had_valid_until: false,
                        tariff_ids: Vec::new(),
                        package_ids: Vec::new(),
                        channel_ids: Vec::new(),
                        date_error: None,
                    });
                    self.ensure_grant_lookups();
                }
            });
        });
        ui.add_space(6.0);

        // Filters
        ui.horizontal(|ui| {
            ui.label("Status:");
            let mut status_filter = self.user_query.status;
            egui::ComboBox::from_id_salt("user_status_filter")
                .selected_text(match status_filter {
                    None => "All",
                    Some(UserStatus::Enabled) => "Enabled",
                    Some(UserStatus::Disabled) => "Disabled",
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut status_filter, None, "All");
                    ui.selectable_value(&mut status_filter, Some(UserStatus::Enabled), "Enabled");
                    ui.selectable_value(&mut status_filter, Some(UserStatus::Disabled), "Disabled");
                });
            if status_filter != self.user_query.status {
                self.user_query.set_status_filter(status_filter);
            }

            ui.label("Tariff:");
            let mut tariff_filter = self.user_query.tariff_id;
            egui::ComboBox::from_id_salt("user_tariff_filter")
                .selected_text(match tariff_filter {
                    None => "All Tariffs".to_string(),
                    Some(id) => tariffs
                        .iter()
                        .find(|t| t.id == id)
                        .map(|t| t.name.clone())
                        .unwrap_or_else(|| format!("#{id}")),
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut tariff_filter, None, "All Tariffs");
                    for tariff in &tariffs {
                        ui.selectable_value(&mut tariff_filter, Some(tariff.id), &tariff.name);
                    }
                });
            if tariff_filter != self.user_query.tariff_id {
                self.user_query.set_tariff_filter(tariff_filter);
            }

            ui.label("Search:");
            let response = ui.add(
                egui::TextEdit::singleline(self.user_search.input_mut())
                    .hint_text("Name or agreement #...")
                    .desired_width(200.0),
            );
            if response.changed() {
                self.user_search.mark_edited(Instant::now());
            }
        });
        ui.add_space(6.0);

        let token = self.user_query.to_query_string();
        let Some(page) = self
            .cache
            .get::<Paginated<UserListItem>>(&QueryKey::users_list(&token))
            .cloned()
        else {
            ui.add(egui::Spinner::new());
            return;
        };

        egui::ScrollArea::both().auto_shrink([false, true]).show(ui, |ui| {
            egui::Grid::new("users_table")
                .num_columns(7)
                .striped(true)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    sort_header(ui, &mut self.user_query.sort, "Name", "last_name");
                    sort_header(ui, &mut self.user_query.sort, "Agreement", "agreement_number");
                    ui.strong("Status");
                    ui.strong("Tariffs");
                    ui.strong("Sessions");
                    sort_header(ui, &mut self.user_query.sort, "Created", "created_at");
                    ui.strong("Actions");
                    ui.end_row();

                    if page.items.is_empty() {
                        ui.label("No users found");
                        ui.end_row();
                    }
                    for user in &page.items {
                        ui.label(format!("{} {}", user.first_name, user.last_name));
                        ui.label(&user.agreement_number);
                        match user.status {
                            UserStatus::Enabled => {
                                ui.colored_label(egui::Color32::from_rgb(80, 180, 90), "enabled")
                            }
                            UserStatus::Disabled => {
                                ui.colored_label(egui::Color32::from_rgb(200, 90, 80), "disabled")
                            }
                        };
                        let names: Vec<&str> =
                            user.tariffs.iter().map(|t| t.name.as_str()).collect();
                        ui.label(if names.is_empty() {
                            "-".to_string()
                        } else {
                            names.join(", ")
                        });
                        ui.label(user.max_sessions.to_string());
                        ui.label(&user.created_at);
                        ui.horizontal(|ui| {
                            if ui.button("Open").clicked() {
                                self.user_detail = Some(UserDetailView::new(user.id));
                            }
                            if ui.button("Del").clicked() {
                                self.user_delete = Some(user.clone());
                            }
                        });
                        ui.end_row();
                    }
                });
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if let Some(goto) = pagination_bar(ui, page.page, page.pages, page.total, "users") {
                self.user_query.page = goto;
            }
            ui.separator();
            ui.label("Per page:");
            let mut per_page = self.user_query.per_page;
            egui::ComboBox::from_id_salt("users_per_page")
                .selected_text(per_page.to_string())
                .show_ui(ui, |ui| {
                    for &choice in PER_PAGE_CHOICES {
                        ui.selectable_value(&mut per_page, choice, choice.to_string());
                    }
                });
            if per_page != self.user_query.per_page {
                self.user_query.set_per_page(per_page);
            }
        });
    }

    fn ensure_grant_lookups(&mut self) {
        self.ensure(QueryKey::lookup_tariffs(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_tariffs().map(Fetch::LookupTariffs)
        });
        self.ensure(QueryKey::lookup_packages(), ACT_LOAD_LOOKUP, |client| {
            client.lookup_packages().map(Fetch::LookupPackages)
        });
        self.ensure(QueryKey::lookup_channels(), ACT_LOAD_LOOKUP, |client| {
            client
                .lookup_channels(LOOKUP_CHANNEL_LIMIT)
                .map(Fetch::LookupChannels)
        });
    }

    // --- modal windows ----------------------------------------------------

    fn delete_channel_modal(&mut self, ctx: &egui::Context) {
        let Some(target) = self.delete_target.clone() else {
            return;
        };
        self.ensure(
            QueryKey::channel_cascade(target.id),
            ACT_LOAD_CASCADE,
            move |client| {
                client.cascade_info(target.id).map(|info| Fetch::Cascade {
                    channel_id: target.id,
                    info,
                })
            },
        );
        let target = self.delete_target.clone().unwrap();
        let cascade = self
            .cache
            .get::<CascadeInfo>(&QueryKey::channel_cascade(target.id))
            .copied();

        let mut open = true;
        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new("Delete Channel")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(format!("Delete \"{}\"?", target.title()));
                ui.add_space(4.0);
                match cascade {
                    Some(info) => {
                        let mut parts = Vec::new();
                        if info.packages > 0 {
                            parts.push(format!("{} packages", info.packages));
                        }
                        if info.users > 0 {
                            parts.push(format!("{} users", info.users));
                        }
                        if parts.is_empty() {
                            ui.label("This channel is not assigned to any packages or users.");
                        } else {
                            ui.label(format!("This will remove it from: {}.", parts.join(", ")));
                        }
                    }
                    None => {
                        ui.add(egui::Spinner::new());
                    }
                }
                if target.sync_status == SyncStatus::Synced {
                    ui.colored_label(
                        egui::Color32::from_rgb(210, 170, 60),
                        "Warning: this channel is still synced with Flussonic and will \
                         reappear on next sync.",
                    );
                }
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(
                            !self.is_busy(ACT_DELETE_CHANNEL),
                            egui::Button::new("Delete"),
                        )
                        .clicked()
                    {
                        confirmed = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if self.is_busy(ACT_DELETE_CHANNEL) {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if confirmed {
            self.delete_channel(target);
        } else if cancelled || !open {
            self.delete_target = None;
        }
    }

    fn logo_modal(&mut self, ctx: &egui::Context) {
        let Some(dialog) = &mut self.logo_dialog else {
            return;
        };
        let mut open = true;
        let mut apply = false;
        let mut cancelled = false;
        let saving = self.busy.contains(ACT_LOGO);

        egui::Window::new(format!("Logo: {}", dialog.channel_name))
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                match (&dialog.removal, &dialog.picked_file) {
                    (Some(_), _) => {
                        ui.label("Logo will be removed.");
                    }
                    (None, Some((name, data))) => {
                        ui.label(format!("Selected file: {} ({} bytes)", name, data.len()));
                    }
                    (None, None) => {
                        if dialog.url_input.is_empty() {
                            ui.label("No logo set.");
                        } else {
                            ui.label(format!("URL: {}", dialog.url_input));
                        }
                    }
                }
                ui.add_space(6.0);

                ui.horizontal(|ui| {
                    if ui.button("Choose file...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "svg"])
                            .pick_file()
                        {
                            let name = path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_else(|| "logo.png".to_string());
                            match std::fs::read(&path) {
                                Ok(data) => {
                                    dialog.picked_file = Some((name, data));
                                    dialog.removal = None;
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "failed to read logo file");
                                }
                            }
                        }
                    }
                    if ui.button("Remove URL").clicked() {
                        dialog.removal = Some(LogoRemoval::DbOnly);
                        dialog.picked_file = None;
                        dialog.url_input.clear();
                    }
                    if ui.button("Remove + delete file").clicked() {
                        dialog.removal = Some(LogoRemoval::DeleteFile);
                        dialog.picked_file = None;
                        dialog.url_input.clear();
                    }
                });

                ui.add_space(6.0);
                ui.label("Or paste logo URL:");
                let response = ui.add(
                    egui::TextEdit::singleline(&mut dialog.url_input)
                        .hint_text("https://example.com/logo.png")
                        .desired_width(320.0),
                );
                if response.changed() {
                    dialog.picked_file = None;
                    dialog.removal = None;
                }

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.add_enabled(!saving, egui::Button::new("Apply")).clicked() {
                        apply = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if saving {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if apply {
            self.apply_logo_dialog();
        } else if cancelled || !open {
            self.logo_dialog = None;
        }
    }

    fn group_editor_modal(&mut self, ctx: &egui::Context) {
        let Some(editor) = &mut self.group_editor else {
            return;
        };
        let mut open = true;
        let mut save = false;
        let mut cancelled = false;
        let saving = self.busy.contains(ACT_SAVE_GROUP);
        let title = if editor.id.is_some() { "Edit Group" } else { "New Group" };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Name:");
                    ui.add(egui::TextEdit::singleline(&mut editor.name).desired_width(220.0));
                });
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let valid = !editor.name.trim().is_empty();
                    if ui
                        .add_enabled(valid && !saving, egui::Button::new("Save"))
                        .clicked()
                    {
                        save = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if saving {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if save {
            let editor = self.group_editor.as_ref().unwrap();
            let name = editor.name.trim().to_string();
            match editor.id {
                Some(id) => self.spawn_mutation(ACT_SAVE_GROUP, move |client| {
                    client.update_group(id, &name)?;
                    Ok(Fetch::GroupSaved(Mutation::UpdateGroup))
                }),
                None => self.spawn_mutation(ACT_SAVE_GROUP, move |client| {
                    client.create_group(&name)?;
                    Ok(Fetch::GroupSaved(Mutation::CreateGroup))
                }),
            }
        } else if cancelled || !open {
            self.group_editor = None;
        }
    }

    fn package_editor_modal(&mut self, ctx: &egui::Context) {
        let Some(editor) = &mut self.package_editor else {
            return;
        };
        let mut open = true;
        let mut save = false;
        let mut cancelled = false;
        let saving = self.busy.contains(ACT_SAVE_PACKAGE);
        let title = if editor.id.is_some() {
            "Edit Package"
        } else {
            "New Package"
        };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("package_form")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Name:");
                        ui.add(egui::TextEdit::singleline(&mut editor.name).desired_width(240.0));
                        ui.end_row();
                        ui.label("Description:");
                        ui.add(
                            egui::TextEdit::multiline(&mut editor.description)
                                .desired_rows(2)
                                .desired_width(240.0),
                        );
                        ui.end_row();
                    });
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let valid = !editor.name.trim().is_empty();
                    if ui
                        .add_enabled(valid && !saving, egui::Button::new("Save"))
                        .clicked()
                    {
                        save = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if saving {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if save {
            let editor = self.package_editor.as_ref().unwrap();
            let name = editor.name.trim().to_string();
            let description = {
                let text = editor.description.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            };
            match editor.id {
                Some(id) => self.spawn_mutation(ACT_SAVE_PACKAGE, move |client| {
                    client.update_package(id, &name, description.as_deref())?;
                    Ok(Fetch::PackageSaved(Mutation::UpdatePackage))
                }),
                None => self.spawn_mutation(ACT_SAVE_PACKAGE, move |client| {
                    client.create_package(&name, description.as_deref())?;
                    Ok(Fetch::PackageSaved(Mutation::CreatePackage))
                }),
            }
        } else if cancelled || !open {
            self.package_editor = None;
        }
    }

    fn package_detail_modal(&mut self, ctx: &egui::Context) {
        let Some(package_id) = self.package_detail_open else {
            return;
        };
        self.ensure(
            QueryKey::package_detail(package_id),
            ACT_LOAD_PACKAGES,
            move |client| client.get_package(package_id).map(Fetch::PackageDetail),
        );
        let detail = self
            .cache
            .get::<PackageDetail>(&QueryKey::package_detail(package_id))
            .cloned();

        let mut open = true;
        let mut detach: Option<i64> = None;
        egui::Window::new("Package Channels")
            .collapsible(false)
            .min_width(420.0)
            .open(&mut open)
            .show(ctx, |ui| match &detail {
                Some(detail) => {
                    ui.strong(&detail.name);
                    if let Some(desc) = &detail.description {
                        ui.label(desc);
                    }
                    ui.add_space(6.0);
                    ui.label(format!("{} channels", detail.channels.len()));
                    ui.add_space(4.0);
                    egui::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
                        for channel in &detail.channels {
                            ui.horizontal(|ui| {
                                ui.label(channel.title());
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        if ui.small_button("Remove").clicked() {
                                            detach = Some(channel.id);
                                        }
                                    },
                                );
                            });
                        }
                    });
                }
                None => {
                    ui.add(egui::Spinner::new());
                }
            });

        if let Some(channel_id) = detach {
            // Single-item detach, not a set replace.
            self.spawn_mutation(ACT_DETACH_CHANNEL, move |client| {
                client
                    .remove_channel_from_package(package_id, channel_id)
                    .map(Fetch::ChannelDetached)
            });
        }
        if !open {
            self.package_detail_open = None;
        }
    }

    fn tariff_editor_modal(&mut self, ctx: &egui::Context) {
        let Some(editor) = &mut self.tariff_editor else {
            return;
        };
        let packages = self
            .cache
            .get::<Vec<PackageRef>>(&QueryKey::lookup_packages())
            .cloned()
            .unwrap_or_default();

        let mut open = true;
        let mut save = false;
        let mut cancelled = false;
        let saving = self.busy.contains(ACT_SAVE_TARIFF);
        let title = if editor.id.is_some() { "Edit Tariff" } else { "New Tariff" };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("tariff_form")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("Name:");
                        ui.add(egui::TextEdit::singleline(&mut editor.name).desired_width(240.0));
                        ui.end_row();
                        ui.label("Description:");
                        ui.add(
                            egui::TextEdit::multiline(&mut editor.description)
                                .desired_rows(2)
                                .desired_width(240.0),
                        );
                        ui.end_row();
                    });
                ui.add_space(6.0);
                ui.label("Packages:");
                egui::ScrollArea::vertical().max_height(200.0).show(ui, |ui| {
                    for package in &packages {
                        let mut checked = editor.package_ids.contains(&package.id);
                        if ui.checkbox(&mut checked, &package.name).changed() {
                            if checked {
                                editor.package_ids.push(package.id);
                            } else {
                                editor.package_ids.retain(|&id| id != package.id);
                            }
                        }
                    }
                });
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let valid = !editor.name.trim().is_empty();
                    if ui
                        .add_enabled(valid && !saving, egui::Button::new("Save"))
                        .clicked()
                    {
                        save = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if saving {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if save {
            let editor = self.tariff_editor.as_ref().unwrap();
            let name = editor.name.trim().to_string();
            let description = {
                let text = editor.description.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            };
            // Tariff saves replace the package set wholesale.
            let package_ids = editor.package_ids.clone();
            match editor.id {
                Some(id) => self.spawn_mutation(ACT_SAVE_TARIFF, move |client| {
                    client.update_tariff(id, &name, description.as_deref(), &package_ids)?;
                    Ok(Fetch::TariffSaved(Mutation::UpdateTariff))
                }),
                None => self.spawn_mutation(ACT_SAVE_TARIFF, move |client| {
                    client.create_tariff(&name, description.as_deref(), &package_ids)?;
                    Ok(Fetch::TariffSaved(Mutation::CreateTariff))
                }),
            }
        } else if cancelled || !open {
            self.tariff_editor = None;
        }
    }

    fn user_editor_modal(&mut self, ctx: &egui::Context) {
        if self.user_editor.is_none() {
            return;
        }
        self.ensure_grant_lookups();
        let tariffs = self
            .cache
            .get::<Vec<TariffRef>>(&QueryKey::lookup_tariffs())
            .cloned()
            .unwrap_or_default();
        let packages = self
            .cache
            .get::<Vec<PackageRef>>(&QueryKey::lookup_packages())
            .cloned()
            .unwrap_or_default();
        let channels = self
            .cache
            .get::<Vec<ChannelRef>>(&QueryKey::lookup_channels())
            .cloned()
            .unwrap_or_default();

        let editor = self.user_editor.as_mut().unwrap();
        let mut open = true;
        let mut save = false;
        let mut cancelled = false;
        let saving = self.busy.contains(ACT_SAVE_USER);
        let title = if editor.id.is_some() { "Edit User" } else { "New User" };

        egui::Window::new(title)
            .collapsible(false)
            .min_width(480.0)
            .open(&mut open)
            .show(ctx, |ui| {
                egui::Grid::new("user_form")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        ui.label("First name:");
                        ui.add(
                            egui::TextEdit::singleline(&mut editor.first_name)
                                .desired_width(240.0),
                        );
                        ui.end_row();
                        ui.label("Last name:");
                        ui.add(
                            egui::TextEdit::singleline(&mut editor.last_name)
                                .desired_width(240.0),
                        );
                        ui.end_row();
                        ui.label("Agreement #:");
                        ui.add(
                            egui::TextEdit::singleline(&mut editor.agreement_number)
                                .desired_width(240.0),
                        );
                        ui.end_row();
                        ui.label("Max sessions:");
                        ui.add(egui::DragValue::new(&mut editor.max_sessions).range(1..=50));
                        ui.end_row();
                        ui.label("Status:");
                        egui::ComboBox::from_id_salt("user_status")
                            .selected_text(editor.status.as_str())
                            .show_ui(ui, |ui| {
                                ui.selectable_value(
                                    &mut editor.status,
                                    UserStatus::Enabled,
                                    "enabled",
                                );
                                ui.selectable_value(
                                    &mut editor.status,
                                    UserStatus::Disabled,
                                    "disabled",
                                );
                            });
                        ui.end_row();
                        ui.label("Valid from:");
                        ui.add(
                            egui::TextEdit::singleline(&mut editor.valid_from)
                                .hint_text("YYYY-MM-DD")
                                .desired_width(140.0),
                        );
                        ui.end_row();
                        ui.label("Valid until:");
                        ui.add(
                            egui::TextEdit::singleline(&mut editor.valid_until)
                                .hint_text("YYYY-MM-DD")
                                .desired_width(140.0),
                        );
                        ui.end_row();
                    });

                if let Some(error) = &editor.date_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, error);
                }

                ui.add_space(6.0);
                ui.collapsing("Tariffs", |ui| {
                    for tariff in &tariffs {
                        let mut checked = editor.tariff_ids.contains(&tariff.id);
                        if ui.checkbox(&mut checked, &tariff.name).changed() {
                            if checked {
                                editor.tariff_ids.push(tariff.id);
                            } else {
                                editor.tariff_ids.retain(|&id| id != tariff.id);
                            }
                        }
                    }
                });
                ui.collapsing("Packages", |ui| {
                    for package in &packages {
                        let mut checked = editor.package_ids.contains(&package.id);
                        if ui.checkbox(&mut checked, &package.name).changed() {
                            if checked {
                                editor.package_ids.push(package.id);
                            } else {
                                editor.package_ids.retain(|&id| id != package.id);
                            }
                        }
                    }
                });
                ui.collapsing("Channels", |ui| {
                    egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
                        for channel in &channels {
                            let mut checked = editor.channel_ids.contains(&channel.id);
                            if ui.checkbox(&mut checked, channel.title()).changed() {
                                if checked {
                                    editor.channel_ids.push(channel.id);
                                } else {
                                    editor.channel_ids.retain(|&id| id != channel.id);
                                }
                            }
                        }
                    });
                });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let valid = !editor.first_name.trim().is_empty()
                        && !editor.last_name.trim().is_empty()
                        && !editor.agreement_number.trim().is_empty();
                    if ui
                        .add_enabled(valid && !saving, egui::Button::new("Save"))
                        .clicked()
                    {
                        save = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                    if saving {
                        ui.add(egui::Spinner::new());
                    }
                });
            });

        if save {
            self.save_user_editor();
        } else if cancelled || !open {
            self.user_editor = None;
        }
    }

    fn save_user_editor(&mut self) {
        let Some(editor) = &mut self.user_editor else {
            return;
        };

        // Validate dates before anything leaves the machine.
        for (label, value) in [
            ("valid from", editor.valid_from.trim()),
            ("valid until", editor.valid_until.trim()),
        ] {
            if !value.is_empty() && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                editor.date_error = Some(format!("Invalid {label} date, expected YYYY-MM-DD"));
                return;
            }
        }
        editor.date_error = None;

        let valid_from = editor.valid_from.trim().to_string();
        let valid_until = editor.valid_until.trim().to_string();

        match editor.id {
            None => {
                let data = UserCreate {
                    first_name: editor.first_name.trim().to_string(),
                    last_name: editor.last_name.trim().to_string(),
                    agreement_number: editor.agreement_number.trim().to_string(),
                    max_sessions: editor.max_sessions,
                    status: editor.status,
                    valid_from: (!valid_from.is_empty()).then_some(valid_from),
                    valid_until: (!valid_until.is_empty()).then_some(valid_until),
                    tariff_ids: editor.tariff_ids.clone(),
                    package_ids: editor.package_ids.clone(),
                    channel_ids: editor.channel_ids.clone(),
                };
                self.spawn_mutation(ACT_SAVE_USER, move |client| {
                    client.create_user(&data)?;
                    Ok(Fetch::UserSaved(Mutation::CreateUser))
                });
            }
            Some(id) => {
                let data = UserUpdate {
                    first_name: Some(editor.first_name.trim().to_string()),
                    last_name: Some(editor.last_name.trim().to_string()),
                    agreement_number: Some(editor.agreement_number.trim().to_string()),
                    max_sessions: Some(editor.max_sessions),
                    status: Some(editor.status),
                    valid_from: (!valid_from.is_empty()).then_some(valid_from.clone()),
                    valid_until: (!valid_until.is_empty()).then_some(valid_until.clone()),
                    // Emptying a previously-set date means "clear it", which
                    // the backend only does when asked explicitly.
                    clear_valid_from: editor.had_valid_from && valid_from.is_empty(),
                    clear_valid_until: editor.had_valid_until && valid_until.is_empty(),
                    tariff_ids: Some(editor.tariff_ids.clone()),
                    package_ids: Some(editor.package_ids.clone()),
                    channel_ids: Some(editor.channel_ids.clone()),
                };
                self.spawn_mutation(ACT_SAVE_USER, move |client| {
                    client.update_user(id, &data)?;
                    Ok(Fetch::UserSaved(Mutation::UpdateUser))
                });
            }
        }
    }

    fn user_detail_modal(&mut self, ctx: &egui::Context) {
        let Some(view) = &self.user_detail else {
            return;
        };
        let user_id = view.user_id;
        self.ensure(QueryKey::user_detail(user_id), ACT_LOAD_USER, move |client| {
            client.get_user(user_id).map(Fetch::UserDetail)
        });

        let user = self
            .cache
            .get::<User>(&QueryKey::user_detail(user_id))
            .cloned();
        let mut open = true;
        let mut edit_user: Option<User> = None;
        let mut regen = false;
        let mut save_playlist: Option<PlaylistPreview> = None;

        let title = user
            .as_ref()
            .map(|u| format!("User: {}", u.full_name()))
            .unwrap_or_else(|| "User".to_string());

        egui::Window::new(title)
            .collapsible(false)
            .min_width(560.0)
            .open(&mut open)
            .show(ctx, |ui| {
                let Some(user) = &user else {
                    ui.add(egui::Spinner::new());
                    return;
                };

                let view = self.user_detail.as_mut().unwrap();
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut view.tab, UserDetailTab::Overview, "Overview");
                    ui.selectable_value(
                        &mut view.tab,
                        UserDetailTab::Entitlements,
                        "Channels",
                    );
                    ui.selectable_value(&mut view.tab, UserDetailTab::Playlist, "Playlist");
                    ui.selectable_value(&mut view.tab, UserDetailTab::Sessions, "Sessions");
                    ui.selectable_value(&mut view.tab, UserDetailTab::AccessLogs, "Access log");
                });
                ui.separator();

                match view.tab {
                    UserDetailTab::Overview => {
                        egui::Grid::new("user_overview")
                            .num_columns(2)
                            .spacing([12.0, 4.0])
                            .show(ui, |ui| {
                                ui.label("Agreement:");
                                ui.label(&user.agreement_number);
                                ui.end_row();
                                ui.label("Status:");
                                ui.label(user.status.as_str());
                                ui.end_row();
                                ui.label("Max sessions:");
                                ui.label(user.max_sessions.to_string());
                                ui.end_row();
                                ui.label("Valid from:");
                                ui.label(user.valid_from.as_deref().unwrap_or("-"));
                                ui.end_row();
                                ui.label("Valid until:");
                                ui.label(user.valid_until.as_deref().unwrap_or("-"));
                                ui.end_row();
                                ui.label("Token:");
                                ui.horizontal(|ui| {
                                    ui.monospace(&user.token);
                                    if ui.small_button("Copy").clicked() {
                                        ui.ctx().copy_text(user.token.clone());
                                    }
                                });
                                ui.end_row();
                                ui.label("Tariffs:");
                                let names: Vec<&str> =
                                    user.tariffs.iter().map(|t| t.name.as_str()).collect();
                                ui.label(if names.is_empty() {
                                    "-".to_string()
                                } else {
                                    names.join(", ")
                                });
                                ui.end_row();
                                ui.label("Direct packages:");
                                let names: Vec<&str> =
                                    user.packages.iter().map(|p| p.name.as_str()).collect();
                                ui.label(if names.is_empty() {
                                    "-".to_string()
                                } else {
                                    names.join(", ")
                                });
                                ui.end_row();
                                ui.label("Direct channels:");
                                ui.label(user.channels.len().to_string());
                                ui.end_row();
                            });
                        ui.add_space(8.0);
                        ui.horizontal(|ui| {
                            if ui.button("Edit").clicked() {
                                edit_user = Some(user.clone());
                            }
                            if ui
                                .add_enabled(
                                    !self.busy.contains(ACT_REGEN_TOKEN),
                                    egui::Button::new("Regenerate token"),
                                )
                                .clicked()
                            {
                                regen = true;
                            }
                        });
                    }
                    UserDetailTab::Entitlements => {
                        let resolved = self
                            .cache
                            .get::<Vec<ResolvedChannel>>(&QueryKey::user_resolved_channels(
                                user_id,
                            ))
                            .cloned();
                        match resolved {
                            Some(channels) => {
                                ui.label(format!("{} resolved channels", channels.len()));
                                egui::ScrollArea::vertical().max_height(320.0).show(
                                    ui,
                                    |ui| {
                                        for channel in &channels {
                                            let name = channel
                                                .display_name
                                                .as_deref()
                                                .unwrap_or(&channel.stream_name);
                                            if channel.group_names.is_empty() {
                                                ui.label(name);
                                            } else {
                                                ui.label(format!(
                                                    "{} ({})",
                                                    name,
                                                    channel.group_names.join(", ")
                                                ));
                                            }
                                        }
                                    },
                                );
                            }
                            None => {
                                ui.add(egui::Spinner::new());
                            }
                        }
                    }
                    UserDetailTab::Playlist => {
                        let preview = self
                            .cache
                            .get::<PlaylistPreview>(&QueryKey::user_playlist(user_id))
                            .cloned();
                        match preview {
                            Some(preview) => {
                                ui.label(format!(
                                    "{} ({} channels)",
                                    preview.filename, preview.channel_count
                                ));
                                ui.add_space(4.0);
                                egui::ScrollArea::vertical().max_height(300.0).show(
                                    ui,
                                    |ui| {
                                        ui.monospace(&preview.content);
                                    },
                                );
                                ui.add_space(6.0);
                                ui.horizontal(|ui| {
                                    if ui.button("Copy").clicked() {
                                        ui.ctx().copy_text(preview.content.clone());
                                    }
                                    if ui.button("Save to file...").clicked() {
                                        save_playlist = Some(preview.clone());
                                    }
                                });
                            }
                            None => {
                                ui.add(egui::Spinner::new());
                            }
                        }
                    }
                    UserDetailTab::Sessions | UserDetailTab::AccessLogs => {
                        // Shared date-range controls
                        ui.horizontal(|ui| {
                            ui.label("From:");
                            ui.add(
                                egui::TextEdit::singleline(&mut view.from_input)
                                    .hint_text("YYYY-MM-DD")
                                    .desired_width(100.0),
                            );
                            ui.label("To:");
                            ui.add(
                                egui::TextEdit::singleline(&mut view.to_input)
                                    .hint_text("YYYY-MM-DD")
                                    .desired_width(100.0),
                            );
                            if ui.button("Apply").clicked() {
                                let from = parse_date_input(&view.from_input);
                                let to = parse_date_input(&view.to_input);
                                match (from, to) {
                                    (Err(_), _) | (_, Err(_)) => {
                                        view.range_error =
                                            Some("Dates must be YYYY-MM-DD".to_string());
                                    }
                                    (Ok(from), Ok(to)) => {
                                        view.range_error = None;
                                        view.sessions_query.set_range(from, to);
                                        view.logs_query.set_range(from, to);
                                    }
                                }
                            }
                        });
                        if let Some(error) = &view.range_error {
                            ui.colored_label(egui::Color32::LIGHT_RED, error);
                        }
                        ui.add_space(4.0);

                        if view.tab == UserDetailTab::Sessions {
                            let token = view.sessions_query.cache_token();
                            let page = self
                                .cache
                                .get::<Paginated<SessionEntry>>(&QueryKey::user_sessions(
                                    user_id, &token,
                                ))
                                .cloned();
                            match page {
                                Some(page) => {
                                    egui::ScrollArea::vertical().max_height(280.0).show(
                                        ui,
                                        |ui| {
                                            egui::Grid::new("sessions_grid")
                                                .num_columns(5)
                                                .striped(true)
                                                .show(ui, |ui| {
                                                    ui.strong("Started");
                                                    ui.strong("Duration");
                                                    ui.strong("IP");
                                                    ui.strong("Channel");
                                                    ui.strong("Client");
                                                    ui.end_row();
                                                    for entry in &page.items {
                                                        ui.label(&entry.started_at);
                                                        ui.label(format_duration(
                                                            entry.duration,
                                                        ));
                                                        ui.label(
                                                            entry.ip.as_deref().unwrap_or("-"),
                                                        );
                                                        ui.label(
                                                            entry
                                                                .channel
                                                                .as_deref()
                                                                .unwrap_or("-"),
                                                        );
                                                        ui.label(
                                                            entry
                                                                .user_agent
                                                                .as_deref()
                                                                .unwrap_or("-"),
                                                        );
                                                        ui.end_row();
                                                    }
                                                });
                                        },
                                    );
                                    if let Some(goto) = pagination_bar(
                                        ui,
                                        page.page,
                                        page.pages,
                                        page.total,
                                        "sessions",
                                    ) {
                                        view.sessions_query.page = goto;
                                    }
                                }
                                None => {
                                    ui.add(egui::Spinner::new());
                                }
                            }
                        } else {
                            let token = view.logs_query.cache_token();
                            let page = self
                                .cache
                                .get::<Paginated<AccessLogEntry>>(&QueryKey::user_access_logs(
                                    user_id, &token,
                                ))
                                .cloned();
                            match page {
                                Some(page) => {
                                    egui::ScrollArea::vertical().max_height(280.0).show(
                                        ui,
                                        |ui| {
                                            egui::Grid::new("access_grid")
                                                .num_columns(5)
                                                .striped(true)
                                                .show(ui, |ui| {
                                                    ui.strong("Time");
                                                    ui.strong("IP");
                                                    ui.strong("Channel");
                                                    ui.strong("Action");
                                                    ui.strong("Client");
                                                    ui.end_row();
                                                    for entry in &page.items {
                                                        ui.label(&entry.accessed_at);
                                                        ui.label(
                                                            entry.ip.as_deref().unwrap_or("-"),
                                                        );
                                                        ui.label(
                                                            entry
                                                                .channel
                                                                .as_deref()
                                                                .unwrap_or("-"),
                                                        );
                                                        ui.label(
                                                            entry
                                                                .action
                                                                .as_deref()
                                                                .unwrap_or("-"),
                                                        );
                                                        ui.label(
                                                            entry
                                                                .user_agent
                                                                .as_deref()
                                                                .unwrap_or("-"),
                                                        );
                                                        ui.end_row();
                                                    }
                                                });
                                        },
                                    );
                                    if let Some(goto) = pagination_bar(
                                        ui,
                                        page.page,
                                        page.pages,
                                        page.total,
                                        "entries",
                                    ) {
                                        view.logs_query.page = goto;
                                    }
                                }
                                None => {
                                    ui.add(egui::Spinner::new());
                                }
                            }
                        }
                    }
                }
            });

        // Follow-up fetches for the active sub-tab.
        let active_tab = self.user_detail.as_ref().map(|view| view.tab);
        if let Some(tab) = active_tab {
            match tab {
                UserDetailTab::Entitlements => {
                    self.ensure(
                        QueryKey::user_resolved_channels(user_id),
                        ACT_LOAD_RESOLVED,
                        move |client| {
                            client.resolved_channels(user_id).map(|channels| {
                                Fetch::ResolvedChannels { user_id, channels }
                            })
                        },
                    );
                }
                UserDetailTab::Playlist => {
                    self.ensure(
                        QueryKey::user_playlist(user_id),
                        ACT_LOAD_PLAYLIST,
                        move |client| {
                            client
                                .playlist_preview(user_id)
                                .map(|preview| Fetch::Playlist { user_id, preview })
                        },
                    );
                }
                UserDetailTab::Sessions => {
                    let query = self.user_detail.as_ref().unwrap().sessions_query.clone();
                    let token = query.cache_token();
                    self.ensure(
                        QueryKey::user_sessions(user_id, &token),
                        ACT_LOAD_SESSIONS,
                        move |client| {
                            client.user_sessions(user_id, &query).map(|page| {
                                Fetch::Sessions { user_id, token, page }
                            })
                        },
                    );
                }
                UserDetailTab::AccessLogs => {
                    let query = self.user_detail.as_ref().unwrap().logs_query.clone();
                    let token = query.cache_token();
                    self.ensure(
                        QueryKey::user_access_logs(user_id, &token),
                        ACT_LOAD_ACCESS_LOGS,
                        move |client| {
                            client.user_access_logs(user_id, &query).map(|page| {
                                Fetch::AccessLogs { user_id, token, page }
                            })
                        },
                    );
                }
                UserDetailTab::Overview => {}
            }
        }

        if let Some(user) = edit_user {
            self.user_editor = Some(UserEditor {
                id: Some(user.id),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                agreement_number: user.agreement_number.clone(),
                max_sessions: user.max_sessions,
                status: user.status,
                valid_from: user.valid_from.clone().unwrap_or_default(),
                valid_until: user.valid_until.clone().unwrap_or_default(),
                had_valid_from: user.valid_from.is_some(),
                had_valid_until: user.valid_until.is_some(),
                tariff_ids: user.tariffs.iter().map(|t| t.id).collect(),
                package_ids: user.packages.iter().map(|p| p.id).collect(),
                channel_ids: user.channels.iter().map(|c| c.id).collect(),
                date_error: None,
            });
            self.ensure_grant_lookups();
        }
        if regen {
            self.spawn_mutation(ACT_REGEN_TOKEN, move |client| {
                client.regenerate_token(user_id)?;
                Ok(Fetch::TokenRegenerated)
            });
        }
        if let Some(preview) = save_playlist {
            if let Some(path) = rfd::FileDialog::new()
                .set_file_name(&preview.filename)
                .save_file()
            {
                if let Err(e) = std::fs::write(&path, preview.content.as_bytes()) {
                    tracing::warn!(error = %e, "failed to write playlist file");
                    self.toast_error("Failed to save playlist");
                } else {
                    self.toast_success("Playlist saved");
                }
            }
        }
        if !open {
            self.user_detail = None;
        }
    }

    /// Generic "are you sure" dialogs for groups/packages/tariffs/users.
    fn confirm_delete_modals(&mut self, ctx: &egui::Context) {
        if let Some(group) = self.group_delete.clone() {
            let mut decided = confirm_dialog(
                ctx,
                "Delete Group",
                &format!("Delete group \"{}\"? Channels keep their other groups.", group.name),
                self.busy.contains(ACT_DELETE_GROUP),
            );
            if decided == Some(true) {
                let id = group.id;
                self.spawn_mutation(ACT_DELETE_GROUP, move |client| {
                    client.delete_group(id).map(Fetch::GroupDeleted)
                });
                decided = None;
            }
            if decided == Some(false) {
                self.group_delete = None;
            }
        }

        if let Some(package) = self.package_delete.clone() {
            let mut decided = confirm_dialog(
                ctx,
                "Delete Package",
                &format!(
                    "Delete package \"{}\"? Users granted it lose its channels.",
                    package.name
                ),
                self.busy.contains(ACT_DELETE_PACKAGE),
            );
            if decided == Some(true) {
                let id = package.id;
                self.spawn_mutation(ACT_DELETE_PACKAGE, move |client| {
                    client.delete_package(id)?;
                    Ok(Fetch::PackageDeleted)
                });
                decided = None;
            }
            if decided == Some(false) {
                self.package_delete = None;
            }
        }

        if let Some(tariff) = self.tariff_delete.clone() {
            let mut decided = confirm_dialog(
                ctx,
                "Delete Tariff",
                &format!(
                    "Delete tariff \"{}\"? Subscribers on it lose its packages.",
                    tariff.name
                ),
                self.busy.contains(ACT_DELETE_TARIFF),
            );
            if decided == Some(true) {
                let id = tariff.id;
                self.spawn_mutation(ACT_DELETE_TARIFF, move |client| {
                    client.delete_tariff(id)?;
                    Ok(Fetch::TariffDeleted)
                });
                decided = None;
            }
            if decided == Some(false) {
                self.tariff_delete = None;
            }
        }

        if let Some(user) = self.user_delete.clone() {
            let mut decided = confirm_dialog(
                ctx,
                "Delete User",
                &format!(
                    "Delete user \"{} {}\" ({})? Their playlist link stops working.",
                    user.first_name, user.last_name, user.agreement_number
                ),
                self.busy.contains(ACT_DELETE_USER),
            );
            if decided == Some(true) {
                let id = user.id;
                self.spawn_mutation(ACT_DELETE_USER, move |client| {
                    client.delete_user(id).map(Fetch::UserDeleted)
                });
                decided = None;
            }
            if decided == Some(false) {
                self.user_delete = None;
            }
        }
    }

    fn toasts_overlay(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        self.toasts
            .retain(|toast| now.duration_since(toast.created) < TOAST_TTL);
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -40.0])
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let color = match toast.kind {
                        ToastKind::Success => egui::Color32::from_rgb(46, 105, 60),
                        ToastKind::Error => egui::Color32::from_rgb(130, 50, 50),
                    };
                    egui::Frame::popup(&ctx.style()).fill(color).show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(&toast.message).color(egui::Color32::WHITE),
                        );
                    });
                    ui.add_space(4.0);
                }
            });
    }
}

impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Process background task results (non-blocking)
        while let Ok(result) = self.task_receiver.try_recv() {
            self.handle_result(result);
        }

        // Session bootstrap: reuse a surviving cookie before showing login.
        if !self.session_checked {
            self.bootstrap_session();
        }

        // Promote debounced search text into the canonical queries.
        let now = Instant::now();
        if self.channel_search.poll(now) {
            let committed = self.channel_search.committed().to_string();
            self.channel_query.set_search(&committed);
        }
        if self.user_search.poll(now) {
            let committed = self.user_search.committed().to_string();
            self.user_query.set_search(&committed);
        }

        if !self.logged_in {
            self.login_view(ctx);
            self.toasts_overlay(ctx);
            // Poll for login/bootstrap results while idle.
            ctx.request_repaint_after(Duration::from_millis(250));
            return;
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.strong("StreamPanel");
                ui.separator();
                ui.selectable_value(&mut self.current_tab, Tab::Dashboard, "Dashboard");
                ui.selectable_value(&mut self.current_tab, Tab::Channels, "Channels");
                ui.selectable_value(&mut self.current_tab, Tab::Groups, "Groups");
                ui.selectable_value(&mut self.current_tab, Tab::Packages, "Packages");
                ui.selectable_value(&mut self.current_tab, Tab::Tariffs, "Tariffs");
                ui.selectable_value(&mut self.current_tab, Tab::Users, "Users");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Sign out").clicked() {
                        self.logout();
                    }
                    if let Some(admin) = &self.admin {
                        ui.label(&admin.username);
                    }
                    let mut dark = self.config.dark_mode;
                    if ui.checkbox(&mut dark, "Dark").changed() {
                        self.config.dark_mode = dark;
                        self.config.save();
                    }
                });
            });
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if !self.inflight.is_empty() || !self.busy.is_empty() {
                    ui.add(egui::Spinner::new());
                    ui.label("Working...");
                } else {
                    ui.label(&self.status_message);
                }
            });
        });

        if self.config.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.current_tab {
            Tab::Dashboard => self.dashboard_view(ui),
            Tab::Channels => self.channels_view(ui),
            Tab::Groups => self.groups_view(ui),
            Tab::Packages => self.packages_view(ui),
            Tab::Tariffs => self.tariffs_view(ui),
            Tab::Users => self.users_view(ui),
        });

        // Modal windows
        self.delete_channel_modal(ctx);
        self.logo_modal(ctx);
        self.group_editor_modal(ctx);
        self.package_editor_modal(ctx);
        self.package_detail_modal(ctx);
        self.tariff_editor_modal(ctx);
        self.user_editor_modal(ctx);
        self.user_detail_modal(ctx);
        self.confirm_delete_modals(ctx);
        self.toasts_overlay(ctx);

        // Periodic wake-up: drains task results, advances the search
        // debounce and re-polls auto-refreshing dashboard entries.
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

// --- small UI helpers -----------------------------------------------------

/// Column header that drives the sort state machine.
fn sort_header(ui: &mut egui::Ui, sort: &mut SortState, label: &str, field: &str) {
    let text = if sort.is_active(field) {
        format!("{} {}", label, sort.sort_dir.arrow())
    } else {
        label.to_string()
    };
    if ui.button(egui::RichText::new(text).strong()).clicked() {
        sort.toggle(field);
    }
}

fn pagination_bar(
    ui: &mut egui::Ui,
    page: u32,
    pages: u32,
    total: u64,
    label: &str,
) -> Option<u32> {
    let mut goto = None;
    ui.horizontal(|ui| {
        if ui.add_enabled(page > 1, egui::Button::new("< Prev")).clicked() {
            goto = Some(page - 1);
        }
        ui.label(format!("Page {} of {} - {} {}", page, pages.max(1), total, label));
        if ui.add_enabled(page < pages, egui::Button::new("Next >")).clicked() {
            goto = Some(page + 1);
        }
    });
    goto
}

/// Multi-select dropdown over (id, name) options. Returns the full new id
/// set when a box is toggled; membership endpoints replace the whole set.
fn membership_menu(
    ui: &mut egui::Ui,
    id_salt: impl std::hash::Hash,
    current: &[i64],
    options: &[(i64, String)],
) -> Option<Vec<i64>> {
    let mut result = None;
    let summary = if current.is_empty() {
        "-".to_string()
    } else {
        let names: Vec<&str> = options
            .iter()
            .filter(|(id, _)| current.contains(id))
            .map(|(_, name)| name.as_str())
            .collect();
        if names.is_empty() {
            format!("{} selected", current.len())
        } else {
            names.join(", ")
        }
    };
    ui.push_id(id_salt, |ui| {
        ui.menu_button(summary, |ui| {
            for (id, name) in options {
                let mut checked = current.contains(id);
                if ui.checkbox(&mut checked, name).changed() {
                    let mut ids: Vec<i64> = current.to_vec();
                    if checked {
                        ids.push(*id);
                    } else {
                        ids.retain(|existing| existing != id);
                    }
                    result = Some(ids);
                }
            }
        });
    });
    result
}

fn health_line(ui: &mut egui::Ui, health: &str) {
    let color = match health {
        "ok" | "up" | "healthy" => egui::Color32::from_rgb(80, 180, 90),
        "down" => egui::Color32::from_rgb(200, 90, 80),
        _ => egui::Color32::from_rgb(210, 170, 60),
    };
    ui.colored_label(color, health);
}

/// Yes/no modal. Returns Some(true) on confirm, Some(false) on cancel/close,
/// None while still open.
fn confirm_dialog(
    ctx: &egui::Context,
    title: &str,
    message: &str,
    busy: bool,
) -> Option<bool> {
    let mut open = true;
    let mut result = None;
    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .open(&mut open)
        .show(ctx, |ui| {
            ui.label(message);
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui.add_enabled(!busy, egui::Button::new("Delete")).clicked() {
                    result = Some(true);
                }
                if ui.button("Cancel").clicked() {
                    result = Some(false);
                }
                if busy {
                    ui.add(egui::Spinner::new());
                }
            });
        });
    if !open {
        result = Some(false);
    }
    result
}

fn parse_date_input(input: &str) -> Result<Option<NaiveDate>, ()> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ())
}

fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        None => "-".to_string(),
        Some(secs) => {
            if secs >= 3600 {
                format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
            } else {
                format!("{}m {:02}s", secs / 60, secs % 60)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(59)), "0m 59s");
        assert_eq!(format_duration(Some(125)), "2m 05s");
        assert_eq!(format_duration(Some(3700)), "1h 01m");
    }

    #[test]
    fn test_parse_date_input() {
        assert_eq!(parse_date_input(""), Ok(None));
        assert_eq!(parse_date_input("  "), Ok(None));
        assert_eq!(
            parse_date_input("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29))
        );
        assert!(parse_date_input("29/02/2024").is_err());
    }
}
