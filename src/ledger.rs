//! Pending-change ledger for the channel table
//!
//! Inline edits do not touch the server snapshot. They accumulate here as
//! sparse per-row patches until the operator applies them (one row or all
//! rows), at which point the batch goes out through the bulk update endpoint
//! and the flushed entries are dropped. A failed flush drops nothing, so the
//! operator's edits survive.
//!
//! Each field tracks one of three states: untouched, explicitly cleared, or
//! set to a value. "Cleared" serializes as JSON `null` on the wire;
//! "untouched" is omitted entirely. Collapsing those two is the classic bug
//! this type exists to prevent.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::models::Channel;

/// Edit state of a single patch field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldEdit<T> {
    /// No pending edit; the server value stands.
    #[default]
    Unset,
    /// Pending edit that erases the field (wire `null`).
    Clear,
    /// Pending edit to a concrete value.
    Set(T),
}

impl<T> FieldEdit<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldEdit::Unset)
    }

    /// Overlay this edit over the server value: `Unset` defers to the
    /// server, `Clear` erases, `Set` wins.
    pub fn overlay<'a>(&'a self, server: Option<&'a T>) -> Option<&'a T> {
        match self {
            FieldEdit::Unset => server,
            FieldEdit::Clear => None,
            FieldEdit::Set(value) => Some(value),
        }
    }
}

impl<T: Serialize> Serialize for FieldEdit<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Unset fields are skipped at the struct level; if one gets
            // here anyway it degrades to null rather than inventing data.
            FieldEdit::Unset | FieldEdit::Clear => serializer.serialize_none(),
            FieldEdit::Set(value) => value.serialize(serializer),
        }
    }
}

/// The editable columns of the channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelField {
    TvgId,
    TvgLogo,
    ChannelNumber,
}

/// Uncommitted edits for one channel row. Only fields the operator touched
/// appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPatch {
    pub id: i64,
    pub tvg_id: FieldEdit<String>,
    pub tvg_logo: FieldEdit<String>,
    pub channel_number: FieldEdit<u16>,
}

impl ChannelPatch {
    fn new(id: i64) -> Self {
        Self {
            id,
            tvg_id: FieldEdit::Unset,
            tvg_logo: FieldEdit::Unset,
            channel_number: FieldEdit::Unset,
        }
    }

    /// True when no user-editable field is pending (id alone does not count).
    pub fn is_empty(&self) -> bool {
        self.tvg_id.is_unset() && self.tvg_logo.is_unset() && self.channel_number.is_unset()
    }
}

impl Serialize for ChannelPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let count = 1
            + usize::from(!self.tvg_id.is_unset())
            + usize::from(!self.tvg_logo.is_unset())
            + usize::from(!self.channel_number.is_unset());
        let mut state = serializer.serialize_struct("ChannelPatch", count)?;
        state.serialize_field("id", &self.id)?;
        if !self.tvg_id.is_unset() {
            state.serialize_field("tvg_id", &self.tvg_id)?;
        }
        if !self.tvg_logo.is_unset() {
            state.serialize_field("tvg_logo", &self.tvg_logo)?;
        }
        if !self.channel_number.is_unset() {
            state.serialize_field("channel_number", &self.channel_number)?;
        }
        state.end()
    }
}

/// Row-keyed map of uncommitted channel edits.
///
/// BTreeMap so batches go out in stable row order.
#[derive(Debug, Clone, Default)]
pub struct PendingLedger {
    entries: BTreeMap<i64, ChannelPatch>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the row has pending edits, i.e. should render dirty with an
    /// enabled Apply action.
    pub fn has(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&ChannelPatch> {
        self.entries.get(&id)
    }

    pub fn track_tvg_id(&mut self, id: i64, value: &str) {
        self.entry(id).tvg_id = FieldEdit::Set(value.to_string());
    }

    pub fn track_tvg_logo(&mut self, id: i64, value: &str) {
        self.entry(id).tvg_logo = FieldEdit::Set(value.to_string());
    }

    /// Track a channel-number edit from raw input text. Empty (or
    /// unparsable) input is an explicit clear, not an absent field.
    pub fn track_channel_number(&mut self, id: i64, raw: &str) {
        let edit = match raw.trim() {
            "" => FieldEdit::Clear,
            text => match text.parse::<u16>() {
                Ok(n) => FieldEdit::Set(n),
                Err(_) => FieldEdit::Clear,
            },
        };
        self.entry(id).channel_number = edit;
    }

    fn entry(&mut self, id: i64) -> &mut ChannelPatch {
        self.entries.entry(id).or_insert_with(|| ChannelPatch::new(id))
    }

    /// Drop one field's pending edit; the whole row entry is dropped when
    /// nothing editable remains. Used by the logo dialog, which commits
    /// through its own endpoints and must not leave a stale pending logo
    /// behind to shadow the committed one.
    pub fn clear_field(&mut self, id: i64, field: ChannelField) {
        if let Some(patch) = self.entries.get_mut(&id) {
            match field {
                ChannelField::TvgId => patch.tvg_id = FieldEdit::Unset,
                ChannelField::TvgLogo => patch.tvg_logo = FieldEdit::Unset,
                ChannelField::ChannelNumber => patch.channel_number = FieldEdit::Unset,
            }
            if patch.is_empty() {
                self.entries.remove(&id);
            }
        }
    }

    // --- reconciliation overlay -------------------------------------------

    /// Effective tvg_id for display: pending edit if present, else server.
    pub fn effective_tvg_id<'a>(&'a self, channel: &'a Channel) -> Option<&'a str> {
        match self.entries.get(&channel.id) {
            Some(patch) => patch
                .tvg_id
                .overlay(channel.tvg_id.as_ref())
                .map(String::as_str),
            None => channel.tvg_id.as_deref(),
        }
    }

    pub fn effective_tvg_logo<'a>(&'a self, channel: &'a Channel) -> Option<&'a str> {
        match self.entries.get(&channel.id) {
            Some(patch) => patch
                .tvg_logo
                .overlay(channel.tvg_logo.as_ref())
                .map(String::as_str),
            None => channel.tvg_logo.as_deref(),
        }
    }

    pub fn effective_channel_number(&self, channel: &Channel) -> Option<u16> {
        match self.entries.get(&channel.id) {
            Some(patch) => patch
                .channel_number
                .overlay(channel.channel_number.as_ref())
                .copied(),
            None => channel.channel_number,
        }
    }

    // --- flush ------------------------------------------------------------

    /// Patch batch for a single-row flush, or None when the row has nothing
    /// pending (in which case no request must be made).
    pub fn begin_flush_one(&self, id: i64) -> Option<Vec<ChannelPatch>> {
        self.entries.get(&id).map(|patch| vec![patch.clone()])
    }

    /// Patch batch for a full flush, or None when the ledger is empty.
    pub fn begin_flush_all(&self) -> Option<Vec<ChannelPatch>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.values().cloned().collect())
        }
    }

    /// Clear entries whose patches were accepted by the backend. Only ever
    /// called after a successful gateway response.
    pub fn commit_flush(&mut self, ids: &[i64]) {
        for id in ids {
            self.entries.remove(id);
        }
    }

    /// Flush one row through `send`. No entry means no call at all. The
    /// entry is removed only when `send` succeeds.
    pub fn flush_one<E>(
        &mut self,
        id: i64,
        send: impl FnOnce(&[ChannelPatch]) -> Result<(), E>,
    ) -> Result<bool, E> {
        let Some(batch) = self.begin_flush_one(id) else {
            return Ok(false);
        };
        send(&batch)?;
        self.commit_flush(&[id]);
        Ok(true)
    }

    /// Flush every pending row as one batch. All-or-nothing: a failed send
    /// leaves the ledger exactly as it was.
    pub fn flush_all<E>(
        &mut self,
        send: impl FnOnce(&[ChannelPatch]) -> Result<(), E>,
    ) -> Result<usize, E> {
        let Some(batch) = self.begin_flush_all() else {
            return Ok(0);
        };
        send(&batch)?;
        let ids: Vec<i64> = batch.iter().map(|patch| patch.id).collect();
        self.commit_flush(&ids);
        Ok(ids.len())
    }

    /// Row ids with pending edits, in batch order.
    pub fn dirty_ids(&self) -> Vec<i64> {
        self.entries.keys().copied().collect()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
