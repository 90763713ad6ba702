//! Query cache with declarative invalidation
//!
//! Server-derived collections are cached under hierarchical segment keys
//! (`["channels", <params>]`, `["lookup", "groups"]`, ...). Every mutation
//! declares, statically, the key prefixes it makes stale; applying the
//! mutation marks every entry under those prefixes. Counts and
//! cross-references are denormalized into many response shapes server-side,
//! so the table deliberately errs toward marking too much: a stale badge is
//! a bug, an extra refetch is only a cost.
//!
//! Stale entries stay readable so a screen keeps showing the previous page
//! while its replacement loads; freshness is a separate question answered by
//! [`QueryCache::is_fresh`]. Entries can also carry a fixed refresh interval
//! (dashboard health panels), which expires them by age alone.

use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Hierarchical cache key. Prefix-matching drives invalidation: marking
/// `["users"]` hits `["users", <params>]`, `["users", "7", "sessions"]`
/// and every other descendant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && self.0.iter().zip(prefix).all(|(seg, want)| seg == want)
    }

    pub fn dashboard_stats() -> Self {
        Self::new(["dashboard-stats"])
    }

    pub fn flussonic_health() -> Self {
        Self::new(["dashboard-flussonic"])
    }

    pub fn auth_health() -> Self {
        Self::new(["dashboard-auth"])
    }

    pub fn epg_health() -> Self {
        Self::new(["dashboard-epg"])
    }

    pub fn channels_list(params: &str) -> Self {
        Self::new(["channels", params])
    }

    pub fn channel_cascade(id: i64) -> Self {
        Self::new(["channel-cascade".to_string(), id.to_string()])
    }

    pub fn groups() -> Self {
        Self::new(["groups"])
    }

    pub fn packages() -> Self {
        Self::new(["packages"])
    }

    pub fn package_detail(id: i64) -> Self {
        Self::new(["packages".to_string(), id.to_string()])
    }

    pub fn tariffs() -> Self {
        Self::new(["tariffs"])
    }

    pub fn lookup_groups() -> Self {
        Self::new(["lookup", "groups"])
    }

    pub fn lookup_packages() -> Self {
        Self::new(["lookup", "packages"])
    }

    pub fn lookup_tariffs() -> Self {
        Self::new(["lookup", "tariffs"])
    }

    pub fn lookup_channels() -> Self {
        Self::new(["lookup", "channels"])
    }

    pub fn users_list(params: &str) -> Self {
        Self::new(["users", params])
    }

    pub fn user_detail(id: i64) -> Self {
        Self::new(["users".to_string(), id.to_string()])
    }

    pub fn user_resolved_channels(id: i64) -> Self {
        Self::new(["users".to_string(), id.to_string(), "channels".to_string()])
    }

    pub fn user_playlist(id: i64) -> Self {
        Self::new(["users".to_string(), id.to_string(), "playlist".to_string()])
    }

    pub fn user_sessions(id: i64, params: &str) -> Self {
        Self::new([
            "users".to_string(),
            id.to_string(),
            "sessions".to_string(),
            params.to_string(),
        ])
    }

    pub fn user_access_logs(id: i64, params: &str) -> Self {
        Self::new([
            "users".to_string(),
            id.to_string(),
            "access-logs".to_string(),
            params.to_string(),
        ])
    }
}

/// Every mutation the console can perform, as far as the cache cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    BulkUpdateChannels,
    DeleteChannel,
    UpdateChannelGroups,
    UpdateChannelPackages,
    SyncChannels,
    ChannelLogoChanged,
    CreateGroup,
    UpdateGroup,
    DeleteGroup,
    CreatePackage,
    UpdatePackage,
    DeletePackage,
    DetachPackageChannel,
    CreateTariff,
    UpdateTariff,
    DeleteTariff,
    CreateUser,
    UpdateUser,
    DeleteUser,
    RegenerateToken,
    TriggerEpgUpdate,
}

impl Mutation {
    /// Key prefixes stale after this mutation succeeds.
    ///
    /// The sets are unions over everything whose displayed counts, badges or
    /// membership lists could have changed as a side effect.
    pub fn invalidates(&self) -> &'static [&'static [&'static str]] {
        match self {
            Mutation::BulkUpdateChannels | Mutation::ChannelLogoChanged => {
                &[&["channels"], &["lookup", "channels"]]
            }
            Mutation::DeleteChannel => &[
                &["channels"],
                &["channel-cascade"],
                &["lookup", "channels"],
                &["packages"],
                &["users"],
                &["dashboard-stats"],
            ],
            Mutation::UpdateChannelGroups => {
                &[&["channels"], &["groups"], &["lookup", "groups"]]
            }
            Mutation::UpdateChannelPackages => {
                &[&["channels"], &["packages"], &["users"]]
            }
            Mutation::SyncChannels => &[
                &["channels"],
                &["lookup", "channels"],
                &["dashboard-stats"],
            ],
            Mutation::CreateGroup => {
                &[&["groups"], &["lookup", "groups"], &["dashboard-stats"]]
            }
            Mutation::UpdateGroup => {
                &[&["groups"], &["lookup", "groups"], &["channels"]]
            }
            Mutation::DeleteGroup => &[
                &["groups"],
                &["lookup", "groups"],
                &["channels"],
                &["dashboard-stats"],
            ],
            Mutation::CreatePackage => {
                &[&["packages"], &["lookup", "packages"], &["dashboard-stats"]]
            }
            Mutation::UpdatePackage => &[
                &["packages"],
                &["lookup", "packages"],
                &["tariffs"],
                &["users"],
                &["channels"],
            ],
            Mutation::DeletePackage => &[
                &["packages"],
                &["lookup", "packages"],
                &["tariffs"],
                &["users"],
                &["channels"],
                &["dashboard-stats"],
            ],
            Mutation::DetachPackageChannel => {
                &[&["packages"], &["users"], &["channels"]]
            }
            Mutation::CreateTariff => &[
                &["tariffs"],
                &["lookup", "tariffs"],
                &["users"],
                &["dashboard-stats"],
            ],
            Mutation::UpdateTariff => {
                &[&["tariffs"], &["lookup", "tariffs"], &["users"]]
            }
            Mutation::DeleteTariff => &[
                &["tariffs"],
                &["lookup", "tariffs"],
                &["users"],
                &["dashboard-stats"],
            ],
            Mutation::CreateUser | Mutation::DeleteUser => {
                &[&["users"], &["dashboard-stats"]]
            }
            Mutation::UpdateUser => &[&["users"], &["dashboard-stats"]],
            Mutation::RegenerateToken => &[&["users"]],
            Mutation::TriggerEpgUpdate => &[&["dashboard-epg"]],
        }
    }
}

struct Entry {
    value: Box<dyn Any + Send>,
    fetched_at: Instant,
    stale: bool,
    refresh_every: Option<Duration>,
}

/// Key-addressed store of server-derived collections.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Any + Send>(&mut self, key: QueryKey, value: T, now: Instant) {
        // A put refreshes an existing entry but keeps its interval config.
        let refresh_every = self
            .entries
            .get(&key)
            .and_then(|entry| entry.refresh_every);
        self.entries.insert(
            key,
            Entry {
                value: Box::new(value),
                fetched_at: now,
                stale: false,
                refresh_every,
            },
        );
    }

    /// Store a value that expires by age, independent of mutations: the
    /// live dashboard panels.
    pub fn put_with_refresh<T: Any + Send>(
        &mut self,
        key: QueryKey,
        value: T,
        now: Instant,
        every: Duration,
    ) {
        self.entries.insert(
            key,
            Entry {
                value: Box::new(value),
                fetched_at: now,
                stale: false,
                refresh_every: Some(every),
            },
        );
    }

    /// Read a cached value. Stale entries are still returned; the previous
    /// page keeps rendering while its replacement is in flight.
    pub fn get<T: Any>(&self, key: &QueryKey) -> Option<&T> {
        self.entries
            .get(key)
            .and_then(|entry| entry.value.downcast_ref())
    }

    /// False when the entry is missing, invalidated, or past its refresh
    /// interval, i.e. the caller should refetch.
    pub fn is_fresh(&self, key: &QueryKey, now: Instant) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(entry) => {
                if entry.stale {
                    return false;
                }
                match entry.refresh_every {
                    Some(every) => now.duration_since(entry.fetched_at) < every,
                    None => true,
                }
            }
        }
    }

    /// Mark every entry under `prefix` stale.
    pub fn invalidate(&mut self, prefix: &[&str]) {
        for (key, entry) in &mut self.entries {
            if key.starts_with(prefix) {
                entry.stale = true;
            }
        }
    }

    /// Apply a mutation's declared invalidation set.
    pub fn apply(&mut self, mutation: Mutation) {
        for prefix in mutation.invalidates() {
            self.invalidate(prefix);
        }
    }

    /// Drop everything. Used on logout so the next operator starts clean.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let mut cache = QueryCache::new();
        cache.put(QueryKey::groups(), vec![1i64, 2, 3], now());
        assert_eq!(cache.get::<Vec<i64>>(&QueryKey::groups()), Some(&vec![1, 2, 3]));
        // Wrong type reads as absent, not as a panic.
        assert!(cache.get::<String>(&QueryKey::groups()).is_none());
    }

    #[test]
    fn test_prefix_invalidation_keeps_value_readable() {
        let mut cache = QueryCache::new();
        let t = now();
        cache.put(QueryKey::channels_list("page=1"), 41u32, t);
        cache.put(QueryKey::channels_list("page=2"), 42u32, t);
        cache.put(QueryKey::groups(), 7u32, t);

        cache.invalidate(&["channels"]);

        assert!(!cache.is_fresh(&QueryKey::channels_list("page=1"), t));
        assert!(!cache.is_fresh(&QueryKey::channels_list("page=2"), t));
        assert!(cache.is_fresh(&QueryKey::groups(), t));
        // keep-previous-data: the stale value still renders.
        assert_eq!(cache.get::<u32>(&QueryKey::channels_list("page=1")), Some(&41));
    }

    #[test]
    fn test_put_clears_staleness() {
        let mut cache = QueryCache::new();
        let t = now();
        cache.put(QueryKey::tariffs(), 1u32, t);
        cache.invalidate(&["tariffs"]);
        assert!(!cache.is_fresh(&QueryKey::tariffs(), t));
        cache.put(QueryKey::tariffs(), 2u32, t);
        assert!(cache.is_fresh(&QueryKey::tariffs(), t));
    }

    #[test]
    fn test_refresh_interval_expires_by_age() {
        let mut cache = QueryCache::new();
        let t = now();
        cache.put_with_refresh(QueryKey::flussonic_health(), "ok", t, Duration::from_secs(30));
        assert!(cache.is_fresh(&QueryKey::flussonic_health(), t + Duration::from_secs(29)));
        assert!(!cache.is_fresh(&QueryKey::flussonic_health(), t + Duration::from_secs(30)));

        // A plain put keeps the configured interval.
        cache.put(QueryKey::flussonic_health(), "ok2", t + Duration::from_secs(40));
        assert!(cache.is_fresh(&QueryKey::flussonic_health(), t + Duration::from_secs(60)));
        assert!(!cache.is_fresh(&QueryKey::flussonic_health(), t + Duration::from_secs(75)));
    }

    /// Seed an entry under each named key, apply the mutation, and assert
    /// every named key went stale: the actual invalidation set is a
    /// superset of the required one.
    fn assert_invalidates(mutation: Mutation, required: &[QueryKey]) {
        let mut cache = QueryCache::new();
        let t = now();
        for key in required {
            cache.put(key.clone(), 0u8, t);
        }
        cache.apply(mutation);
        for key in required {
            assert!(
                !cache.is_fresh(key, t),
                "{mutation:?} must invalidate {key:?}"
            );
        }
    }

    #[test]
    fn test_delete_channel_invalidation_set() {
        assert_invalidates(
            Mutation::DeleteChannel,
            &[
                QueryKey::channels_list("page=1"),
                QueryKey::lookup_channels(),
                QueryKey::packages(),
                QueryKey::package_detail(3),
                QueryKey::users_list("page=1"),
                QueryKey::user_resolved_channels(9),
                QueryKey::dashboard_stats(),
            ],
        );
    }

    #[test]
    fn test_update_package_invalidation_set() {
        assert_invalidates(
            Mutation::UpdatePackage,
            &[
                QueryKey::packages(),
                QueryKey::package_detail(5),
                QueryKey::lookup_packages(),
                QueryKey::tariffs(),
                QueryKey::users_list("page=1"),
                QueryKey::channels_list("page=1"),
            ],
        );
    }

    #[test]
    fn test_tariff_invalidation_sets() {
        let base = [
            QueryKey::tariffs(),
            QueryKey::lookup_tariffs(),
            QueryKey::users_list("page=1"),
        ];
        assert_invalidates(Mutation::UpdateTariff, &base);
        assert_invalidates(Mutation::DeleteTariff, &base);

        // Creation additionally changes the dashboard counters.
        let mut with_stats = base.to_vec();
        with_stats.push(QueryKey::dashboard_stats());
        assert_invalidates(Mutation::CreateTariff, &with_stats);
    }

    #[test]
    fn test_sync_invalidation_set() {
        assert_invalidates(
            Mutation::SyncChannels,
            &[
                QueryKey::channels_list("page=1"),
                QueryKey::lookup_channels(),
                QueryKey::dashboard_stats(),
            ],
        );
    }

    #[test]
    fn test_bulk_update_invalidation_set() {
        assert_invalidates(
            Mutation::BulkUpdateChannels,
            &[QueryKey::channels_list("a"), QueryKey::lookup_channels()],
        );
    }

    #[test]
    fn test_membership_updates_hit_both_sides() {
        assert_invalidates(
            Mutation::UpdateChannelGroups,
            &[
                QueryKey::channels_list("a"),
                QueryKey::groups(),
                QueryKey::lookup_groups(),
            ],
        );
        assert_invalidates(
            Mutation::UpdateChannelPackages,
            &[
                QueryKey::channels_list("a"),
                QueryKey::packages(),
                QueryKey::users_list("a"),
            ],
        );
    }

    #[test]
    fn test_mutations_do_not_touch_unrelated_keys() {
        let mut cache = QueryCache::new();
        let t = now();
        cache.put(QueryKey::groups(), 0u8, t);
        cache.put(QueryKey::epg_health(), 0u8, t);
        cache.apply(Mutation::BulkUpdateChannels);
        assert!(cache.is_fresh(&QueryKey::groups(), t));
        assert!(cache.is_fresh(&QueryKey::epg_health(), t));
    }

    #[test]
    fn test_user_prefix_covers_subresources() {
        let mut cache = QueryCache::new();
        let t = now();
        cache.put(QueryKey::user_detail(7), 0u8, t);
        cache.put(QueryKey::user_playlist(7), 0u8, t);
        cache.put(QueryKey::user_sessions(7, "page=1"), 0u8, t);
        cache.apply(Mutation::RegenerateToken);
        assert!(!cache.is_fresh(&QueryKey::user_detail(7), t));
        assert!(!cache.is_fresh(&QueryKey::user_playlist(7), t));
        assert!(!cache.is_fresh(&QueryKey::user_sessions(7, "page=1"), t));
    }
}
