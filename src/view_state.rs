//! List view state: search/filter/sort/page parameters
//!
//! These structs are the single source of truth for what a list screen
//! requests from the backend. Each one serializes to a query string, and
//! parses back from it, so a view can be saved and restored.

use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::models::{SyncStatus, UserStatus};

/// How long typed search text sits before it is promoted into the query.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const PER_PAGE_CHOICES: &[u32] = &[10, 20, 50, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    /// Arrow glyph for column headers.
    pub fn arrow(&self) -> &'static str {
        match self {
            SortDir::Asc => "↑",
            SortDir::Desc => "↓",
        }
    }
}

/// Active sort column and direction.
///
/// Clicking a fresh column selects it ascending; clicking the active column
/// flips direction. A column never returns to "inactive"; it stays the sort
/// key until another column is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub sort_by: String,
    pub sort_dir: SortDir,
}

impl SortState {
    pub fn new(default_field: &str) -> Self {
        Self {
            sort_by: default_field.to_string(),
            sort_dir: SortDir::Asc,
        }
    }

    pub fn toggle(&mut self, field: &str) {
        if self.sort_by == field {
            self.sort_dir = self.sort_dir.flipped();
        } else {
            self.sort_by = field.to_string();
            self.sort_dir = SortDir::Asc;
        }
    }

    pub fn is_active(&self, field: &str) -> bool {
        self.sort_by == field
    }
}

/// Debounced search input. The raw text is edited freely; it is promoted
/// into the committed value only after [`SEARCH_DEBOUNCE`] of quiet, so a
/// request is not fired per keystroke.
#[derive(Debug, Clone)]
pub struct SearchDebounce {
    input: String,
    committed: String,
    last_edit: Option<Instant>,
}

impl Default for SearchDebounce {
    fn default() -> Self {
        Self::new("")
    }
}

impl SearchDebounce {
    pub fn new(initial: &str) -> Self {
        Self {
            input: initial.to_string(),
            committed: initial.to_string(),
            last_edit: None,
        }
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// Mark the input as edited at `now`; starts (or restarts) the quiet
    /// period.
    pub fn mark_edited(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    /// Returns true when the quiet period has elapsed and the input was
    /// promoted into the committed value.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.last_edit {
            Some(at) if now.duration_since(at) >= SEARCH_DEBOUNCE => {
                self.last_edit = None;
                if self.committed != self.input {
                    self.committed = self.input.clone();
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Promote immediately (enter key).
    pub fn flush(&mut self) -> bool {
        self.last_edit = None;
        if self.committed != self.input {
            self.committed = self.input.clone();
            true
        } else {
            false
        }
    }
}

/// Channel list request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelListQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: String,
    pub group_id: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub sort: SortState,
}

impl Default for ChannelListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
            group_id: None,
            sync_status: None,
            sort: SortState::new("channel_number"),
        }
    }
}

impl ChannelListQuery {
    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.page = 1;
        }
    }

    pub fn set_group_filter(&mut self, group_id: Option<i64>) {
        if self.group_id != group_id {
            self.group_id = group_id;
            self.page = 1;
        }
    }

    pub fn set_status_filter(&mut self, status: Option<SyncStatus>) {
        if self.sync_status != status {
            self.sync_status = status;
            self.page = 1;
        }
    }

    pub fn set_per_page(&mut self, per_page: u32) {
        if self.per_page != per_page {
            self.per_page = per_page;
            self.page = 1;
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".into(), self.page.to_string()),
            ("per_page".into(), self.per_page.to_string()),
        ];
        if !self.search.is_empty() {
            pairs.push(("search".into(), self.search.clone()));
        }
        if let Some(id) = self.group_id {
            pairs.push(("group_id".into(), id.to_string()));
        }
        if let Some(status) = self.sync_status {
            pairs.push(("sync_status".into(), status.as_str().into()));
        }
        pairs.push(("sort_by".into(), self.sort.sort_by.clone()));
        pairs.push(("sort_dir".into(), self.sort.sort_dir.as_str().into()));
        pairs
    }

    pub fn to_query_string(&self) -> String {
        encode_pairs(&self.query_pairs())
    }

    /// Tolerant parse: unknown keys are ignored, bad values fall back to
    /// the defaults.
    pub fn parse(qs: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in decode_pairs(qs) {
            match key.as_str() {
                "page" => query.page = value.parse().unwrap_or(1),
                "per_page" => query.per_page = value.parse().unwrap_or(DEFAULT_PER_PAGE),
                "search" => query.search = value,
                "group_id" => query.group_id = value.parse().ok(),
                "sync_status" => query.sync_status = SyncStatus::parse(&value),
                "sort_by" => query.sort.sort_by = value,
                "sort_dir" => {
                    if let Some(dir) = SortDir::parse(&value) {
                        query.sort.sort_dir = dir;
                    }
                }
                _ => {}
            }
        }
        query
    }
}

/// User list request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UserListQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: String,
    pub status: Option<UserStatus>,
    pub tariff_id: Option<i64>,
    pub sort: SortState,
}

impl Default for UserListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
            status: None,
            tariff_id: None,
            sort: SortState::new("created_at"),
        }
    }
}

impl UserListQuery {
    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.page = 1;
        }
    }

    pub fn set_status_filter(&mut self, status: Option<UserStatus>) {
        if self.status != status {
            self.status = status;
            self.page = 1;
        }
    }

    pub fn set_tariff_filter(&mut self, tariff_id: Option<i64>) {
        if self.tariff_id != tariff_id {
            self.tariff_id = tariff_id;
            self.page = 1;
        }
    }

    pub fn set_per_page(&mut self, per_page: u32) {
        if self.per_page != per_page {
            self.per_page = per_page;
            self.page = 1;
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".into(), self.page.to_string()),
            ("per_page".into(), self.per_page.to_string()),
        ];
        if !self.search.is_empty() {
            pairs.push(("search".into(), self.search.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status".into(), status.as_str().into()));
        }
        if let Some(id) = self.tariff_id {
            pairs.push(("tariff_id".into(), id.to_string()));
        }
        pairs.push(("sort_by".into(), self.sort.sort_by.clone()));
        pairs.push(("sort_dir".into(), self.sort.sort_dir.as_str().into()));
        pairs
    }

    pub fn to_query_string(&self) -> String {
        encode_pairs(&self.query_pairs())
    }

    pub fn parse(qs: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in decode_pairs(qs) {
            match key.as_str() {
                "page" => query.page = value.parse().unwrap_or(1),
                "per_page" => query.per_page = value.parse().unwrap_or(DEFAULT_PER_PAGE),
                "search" => query.search = value,
                "status" => query.status = UserStatus::parse(&value),
                "tariff_id" => query.tariff_id = value.parse().ok(),
                "sort_by" => query.sort.sort_by = value,
                "sort_dir" => {
                    if let Some(dir) = SortDir::parse(&value) {
                        query.sort.sort_dir = dir;
                    }
                }
                _ => {}
            }
        }
        query
    }
}

/// Paginated date-range query for per-user session and access-log views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub page: u32,
    pub per_page: u32,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            from_date: None,
            to_date: None,
        }
    }
}

impl LogQuery {
    pub fn set_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        if self.from_date != from || self.to_date != to {
            self.from_date = from;
            self.to_date = to;
            self.page = 1;
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".into(), self.page.to_string()),
            ("per_page".into(), self.per_page.to_string()),
        ];
        if let Some(from) = self.from_date {
            pairs.push(("from_date".into(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to_date {
            pairs.push(("to_date".into(), to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }

    pub fn cache_token(&self) -> String {
        encode_pairs(&self.query_pairs())
    }
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&encode_component(key));
        out.push('=');
        out.push_str(&encode_component(value));
    }
    out
}

fn decode_pairs(qs: &str) -> Vec<(String, String)> {
    qs.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(part), String::new()),
        })
        .collect()
}

/// Minimal percent-encoding: enough to round-trip search text containing
/// the query-string metacharacters.
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn decode_component(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_cycle() {
        let mut sort = SortState::new("channel_number");
        assert_eq!(sort.sort_by, "channel_number");
        assert_eq!(sort.sort_dir, SortDir::Asc);

        // Fresh column: once -> asc, twice -> desc, thrice -> asc again.
        sort.toggle("tvg_id");
        assert_eq!((sort.sort_by.as_str(), sort.sort_dir), ("tvg_id", SortDir::Asc));
        sort.toggle("tvg_id");
        assert_eq!((sort.sort_by.as_str(), sort.sort_dir), ("tvg_id", SortDir::Desc));
        sort.toggle("tvg_id");
        assert_eq!((sort.sort_by.as_str(), sort.sort_dir), ("tvg_id", SortDir::Asc));

        // Selecting another column resets to ascending.
        sort.toggle("display_name");
        assert_eq!(
            (sort.sort_by.as_str(), sort.sort_dir),
            ("display_name", SortDir::Asc)
        );
    }

    #[test]
    fn test_debounce_promotes_after_quiet_period() {
        let start = Instant::now();
        let mut search = SearchDebounce::new("");
        search.input_mut().push_str("cn");
        search.mark_edited(start);

        // Too early: still the old committed value.
        assert!(!search.poll(start + Duration::from_millis(100)));
        assert_eq!(search.committed(), "");

        assert!(search.poll(start + SEARCH_DEBOUNCE));
        assert_eq!(search.committed(), "cn");

        // No pending edit: poll is a no-op.
        assert!(!search.poll(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_debounce_flush_is_immediate() {
        let mut search = SearchDebounce::new("");
        search.input_mut().push_str("sport");
        search.mark_edited(Instant::now());
        assert!(search.flush());
        assert_eq!(search.committed(), "sport");
        assert!(!search.flush());
    }

    #[test]
    fn test_filter_changes_reset_page() {
        let mut query = ChannelListQuery::default();
        query.page = 7;
        query.set_group_filter(Some(3));
        assert_eq!(query.page, 1);

        query.page = 4;
        query.set_status_filter(Some(SyncStatus::Orphaned));
        assert_eq!(query.page, 1);

        query.page = 4;
        query.set_search("news");
        assert_eq!(query.page, 1);

        // Re-applying the same filter does not touch the page.
        query.page = 9;
        query.set_group_filter(Some(3));
        assert_eq!(query.page, 9);

        query.set_per_page(50);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_channel_query_round_trip() {
        let mut query = ChannelListQuery::default();
        query.page = 3;
        query.per_page = 50;
        query.search = "sports & news".to_string();
        query.group_id = Some(12);
        query.sync_status = Some(SyncStatus::Orphaned);
        query.sort.toggle("tvg_id");
        query.sort.toggle("tvg_id"); // desc

        let qs = query.to_query_string();
        let parsed = ChannelListQuery::parse(&qs);
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_user_query_round_trip() {
        let mut query = UserListQuery::default();
        query.page = 2;
        query.search = "Ivanov".to_string();
        query.status = Some(UserStatus::Disabled);
        query.tariff_id = Some(5);

        let parsed = UserListQuery::parse(&query.to_query_string());
        assert_eq!(parsed, query);
    }

    #[test]
    fn test_parse_ignores_junk() {
        let query = ChannelListQuery::parse("page=abc&bogus=1&sync_status=nope&sort_dir=sideways");
        assert_eq!(query.page, 1);
        assert_eq!(query.sync_status, None);
        assert_eq!(query.sort.sort_dir, SortDir::Asc);
    }

    #[test]
    fn test_component_encoding() {
        assert_eq!(encode_component("a b&c=d"), "a+b%26c%3Dd");
        assert_eq!(decode_component("a+b%26c%3Dd"), "a b&c=d");
        // Truncated escape survives as literal text.
        assert_eq!(decode_component("100%"), "100%");
    }

    #[test]
    fn test_log_query_pairs() {
        let mut query = LogQuery::default();
        query.set_range(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        );
        let pairs = query.query_pairs();
        assert!(pairs.contains(&("from_date".into(), "2024-01-01".into())));
        assert!(pairs.contains(&("to_date".into(), "2024-01-31".into())));
        assert_eq!(query.page, 1);
    }
}
