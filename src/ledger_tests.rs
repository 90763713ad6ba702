//! Tests for the pending-change ledger and its overlay/flush behavior

use super::*;
use crate::models::SyncStatus;

fn channel(id: i64, tvg_id: Option<&str>, number: Option<u16>) -> Channel {
    Channel {
        id,
        stream_name: format!("stream_{id}"),
        tvg_name: None,
        display_name: None,
        catchup_days: None,
        tvg_id: tvg_id.map(str::to_string),
        tvg_logo: None,
        channel_number: number,
        sort_order: 0,
        sync_status: SyncStatus::Synced,
        groups: Vec::new(),
        packages: Vec::new(),
        last_seen_at: None,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

#[test]
fn test_overlay_is_per_field() {
    let mut ledger = PendingLedger::new();
    let ch = channel(5, Some("old"), Some(12));

    ledger.track_tvg_id(5, "new");

    // Edited field reads the pending value, untouched field still reads the
    // server value.
    assert_eq!(ledger.effective_tvg_id(&ch), Some("new"));
    assert_eq!(ledger.effective_channel_number(&ch), Some(12));
    assert!(ledger.has(5));
}

#[test]
fn test_numeric_clear_is_explicit() {
    let mut ledger = PendingLedger::new();
    let ch = channel(5, Some("old"), Some(12));

    ledger.track_channel_number(5, "");
    let patch = ledger.get(5).unwrap();
    assert_eq!(patch.channel_number, FieldEdit::Clear);

    // The overlay must yield "no number", not the stale server 12.
    assert_eq!(ledger.effective_channel_number(&ch), None);
}

#[test]
fn test_numeric_parse() {
    let mut ledger = PendingLedger::new();
    ledger.track_channel_number(7, " 42 ");
    assert_eq!(ledger.get(7).unwrap().channel_number, FieldEdit::Set(42));

    // Unparsable input degrades to clear, mirroring the wire contract where
    // a present-but-null number means "remove it".
    ledger.track_channel_number(7, "4x");
    assert_eq!(ledger.get(7).unwrap().channel_number, FieldEdit::Clear);
}

#[test]
fn test_fields_accumulate_per_row() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_id(3, "id1");
    ledger.track_channel_number(3, "9");
    ledger.track_tvg_id(4, "id2");

    assert_eq!(ledger.len(), 2);
    let patch = ledger.get(3).unwrap();
    assert_eq!(patch.tvg_id, FieldEdit::Set("id1".into()));
    assert_eq!(patch.channel_number, FieldEdit::Set(9));
    assert!(patch.tvg_logo.is_unset());
}

#[test]
fn test_clear_field_garbage_collects_row() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_logo(5, "http://x/logo.png");
    assert!(ledger.has(5));

    ledger.clear_field(5, ChannelField::TvgLogo);
    assert!(!ledger.has(5));
}

#[test]
fn test_clear_field_keeps_other_edits() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_logo(5, "http://x/logo.png");
    ledger.track_tvg_id(5, "cnn");

    // Logo committed through the side-channel dialog: only that field goes.
    ledger.clear_field(5, ChannelField::TvgLogo);
    assert!(ledger.has(5));
    let patch = ledger.get(5).unwrap();
    assert!(patch.tvg_logo.is_unset());
    assert_eq!(patch.tvg_id, FieldEdit::Set("cnn".into()));
}

#[test]
fn test_clear_field_unknown_row_is_noop() {
    let mut ledger = PendingLedger::new();
    ledger.clear_field(99, ChannelField::TvgId);
    assert!(ledger.is_empty());
}

#[test]
fn test_flush_one_noop_without_entry() {
    let mut ledger = PendingLedger::new();
    let mut calls = 0;
    let flushed = ledger
        .flush_one(5, |_batch| {
            calls += 1;
            Ok::<(), ()>(())
        })
        .unwrap();
    assert!(!flushed);
    assert_eq!(calls, 0);
}

#[test]
fn test_flush_one_clears_on_success_only() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_id(5, "new");

    let err = ledger
        .flush_one(5, |_batch| Err::<(), _>("boom"))
        .unwrap_err();
    assert_eq!(err, "boom");
    assert!(ledger.has(5), "failed flush must keep the operator's edits");

    let flushed = ledger
        .flush_one(5, |batch| {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].id, 5);
            Ok::<(), ()>(())
        })
        .unwrap();
    assert!(flushed);
    assert!(!ledger.has(5));
}

#[test]
fn test_flush_all_is_atomic() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_id(1, "a");
    ledger.track_channel_number(2, "20");
    ledger.track_tvg_logo(3, "http://x/3.png");
    let before = ledger.clone();

    let err = ledger
        .flush_all(|_batch| Err::<(), _>("offline"))
        .unwrap_err();
    assert_eq!(err, "offline");
    assert_eq!(ledger.dirty_ids(), before.dirty_ids());
    assert_eq!(ledger.get(1), before.get(1));
    assert_eq!(ledger.get(2), before.get(2));
    assert_eq!(ledger.get(3), before.get(3));

    let count = ledger
        .flush_all(|batch| {
            assert_eq!(batch.len(), 3);
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(count, 3);
    assert!(ledger.is_empty());
}

#[test]
fn test_flush_all_empty_makes_no_call() {
    let mut ledger = PendingLedger::new();
    let mut calls = 0;
    let count = ledger
        .flush_all(|_batch| {
            calls += 1;
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(count, 0);
    assert_eq!(calls, 0, "empty ledger must not hit the gateway");
}

#[test]
fn test_edit_then_flush_scenario() {
    // Server row {id:5, tvg_id:"old", channel_number:12}.
    let mut ledger = PendingLedger::new();
    let ch = channel(5, Some("old"), Some(12));

    ledger.track_tvg_id(5, "new");
    assert_eq!(ledger.effective_tvg_id(&ch), Some("new"));
    assert_eq!(ledger.effective_channel_number(&ch), Some(12));

    ledger
        .flush_one(5, |_batch| Ok::<(), ()>(()))
        .unwrap();
    assert!(!ledger.has(5));

    // Post-flush the refetched server row carries the committed value and
    // the overlay is transparent again.
    let refetched = channel(5, Some("new"), Some(12));
    assert_eq!(ledger.effective_tvg_id(&refetched), Some("new"));
}

#[test]
fn test_begin_commit_two_phase() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_id(1, "a");
    ledger.track_tvg_id(2, "b");

    let batch = ledger.begin_flush_all().unwrap();
    assert_eq!(batch.len(), 2);
    // begin does not mutate; the commit decision belongs to the caller once
    // the gateway answers.
    assert_eq!(ledger.len(), 2);

    ledger.commit_flush(&[1]);
    assert!(!ledger.has(1));
    assert!(ledger.has(2));

    assert!(ledger.begin_flush_one(99).is_none());
}

#[test]
fn test_patch_wire_shape() {
    let mut ledger = PendingLedger::new();
    ledger.track_tvg_id(5, "cnn");
    ledger.track_channel_number(5, "");

    let json = serde_json::to_value(ledger.get(5).unwrap()).unwrap();
    assert_eq!(json["id"], 5);
    assert_eq!(json["tvg_id"], "cnn");
    // Cleared field is present as null...
    assert!(json["channel_number"].is_null());
    assert!(json.as_object().unwrap().contains_key("channel_number"));
    // ...while an untouched field is absent entirely.
    assert!(!json.as_object().unwrap().contains_key("tvg_logo"));
}

#[test]
fn test_overlay_clear_beats_server_value() {
    let mut ledger = PendingLedger::new();
    let ch = channel(8, Some("keep"), Some(3));
    ledger.track_tvg_id(8, "");
    ledger.track_channel_number(8, "");

    // An empty text edit is Set(""), shown as empty.
    assert_eq!(ledger.effective_tvg_id(&ch), Some(""));
    assert_eq!(ledger.effective_channel_number(&ch), None);
}
