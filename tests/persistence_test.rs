//! Round-trip and commit-point tests for the persistence boundary.

use safe_to_spend::{
    BillCadence, BillRule, BucketSpec, BucketStatus, Cents, JsonFilePersistence, LedgerEngine,
    LedgerSnapshot, Persistence, PurchaseRequest,
};
use tempfile::TempDir;

fn ledger_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("ledger.json")
}

#[test]
fn test_file_round_trip_restores_balances_events_and_order() {
    let dir = TempDir::new().unwrap();

    let account_id;
    let bucket_ids: Vec<String>;
    {
        let mut engine =
            LedgerEngine::new(Box::new(JsonFilePersistence::new(ledger_path(&dir))));
        let account = engine.create_account().unwrap();
        account_id = account.id.clone();
        // equal priorities: creation order is the tie-break and must survive
        let a = engine
            .create_bucket(&account_id, BucketSpec::named("A", 1).fixed(4_000))
            .unwrap();
        let b = engine
            .create_bucket(&account_id, BucketSpec::named("B", 1).percent(5_000))
            .unwrap();
        bucket_ids = vec![a.id, b.id];
        engine.deposit(&account_id, 10_000, Some("seed")).unwrap();
        engine.lock(&bucket_ids[0], 1_000).unwrap();
    }

    let engine =
        LedgerEngine::load(Box::new(JsonFilePersistence::new(ledger_path(&dir)))).unwrap();

    let summary = engine.summarize(&account_id).unwrap();
    assert_eq!(summary.account.balance_cents, Cents::new(10_000));
    assert_eq!(summary.total_locked_cents, Cents::new(1_000));
    let ids: Vec<&str> = summary.buckets.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec![bucket_ids[0].as_str(), bucket_ids[1].as_str()]);
    assert_eq!(summary.buckets[0].status, BucketStatus::Cooldown);
    assert!(summary.buckets[0].cooldown_ends_at.is_some());
    // deposit + 2 allocations + lock
    assert_eq!(engine.events().len(), 4);
    assert_eq!(
        engine.replay_residue(&account_id),
        summary.account.balance_cents
            - summary
                .buckets
                .iter()
                .map(|b| b.balance_cents)
                .sum::<Cents>()
    );
}

#[test]
fn test_loaded_engine_keeps_accepting_operations() {
    let dir = TempDir::new().unwrap();

    let account_id;
    {
        let mut engine =
            LedgerEngine::new(Box::new(JsonFilePersistence::new(ledger_path(&dir))));
        account_id = engine.create_account().unwrap().id;
        engine.deposit(&account_id, 5_000, None).unwrap();
    }

    let mut engine =
        LedgerEngine::load(Box::new(JsonFilePersistence::new(ledger_path(&dir)))).unwrap();
    engine
        .purchase(PurchaseRequest::general(&account_id, 2_000))
        .unwrap();
    assert_eq!(
        engine.account(&account_id).unwrap().balance_cents,
        Cents::new(3_000)
    );

    // the purchase reached the file too
    let engine =
        LedgerEngine::load(Box::new(JsonFilePersistence::new(ledger_path(&dir)))).unwrap();
    assert_eq!(
        engine.account(&account_id).unwrap().balance_cents,
        Cents::new(3_000)
    );
}

#[test]
fn test_load_of_absent_file_yields_empty_engine() {
    let dir = TempDir::new().unwrap();
    let engine =
        LedgerEngine::load(Box::new(JsonFilePersistence::new(ledger_path(&dir)))).unwrap();
    assert!(engine.events().is_empty());
}

#[test]
fn test_nullable_fields_round_trip_as_absent_not_sentinel() {
    let dir = TempDir::new().unwrap();
    {
        let mut engine =
            LedgerEngine::new(Box::new(JsonFilePersistence::new(ledger_path(&dir))));
        let account = engine.create_account().unwrap();
        engine
            .create_bucket(&account.id, BucketSpec::named("Plain", 1))
            .unwrap();
    }

    let json = std::fs::read_to_string(ledger_path(&dir)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let bucket = &value["buckets"][0];
    let obj = bucket.as_object().unwrap();
    assert!(!obj.contains_key("cooldown_ends_at"));
    assert!(!obj.contains_key("target_cents"));
    assert!(!obj.contains_key("bill_rule"));
    // timestamps are absolute RFC 3339 strings
    let created = bucket["created_at"].as_str().unwrap();
    assert!(created.ends_with('Z') || created.contains('+'));
}

#[test]
fn test_bill_rule_survives_a_round_trip_untouched() {
    let dir = TempDir::new().unwrap();
    let bucket_id;
    {
        let mut engine =
            LedgerEngine::new(Box::new(JsonFilePersistence::new(ledger_path(&dir))));
        let account = engine.create_account().unwrap();
        let mut spec = BucketSpec::named("Electric", 1).fixed(9_000);
        spec.is_bill = true;
        spec.bill_rule = Some(BillRule {
            cadence: BillCadence::Monthly,
            next_due_at: None,
            payout_amount_cents: Cents::new(9_000),
            autopay_enabled: false,
        });
        bucket_id = engine.create_bucket(&account.id, spec).unwrap().id;
    }

    let engine =
        LedgerEngine::load(Box::new(JsonFilePersistence::new(ledger_path(&dir)))).unwrap();
    let bucket = engine.bucket(&bucket_id).unwrap();
    assert!(bucket.is_bill);
    let rule = bucket.bill_rule.as_ref().unwrap();
    assert_eq!(rule.cadence, BillCadence::Monthly);
    assert_eq!(rule.payout_amount_cents, Cents::new(9_000));
    assert!(!rule.autopay_enabled);
    assert_eq!(rule.next_due_at, None);
}

#[test]
fn test_memory_persistence_save_load_round_trip() {
    let mut persistence = safe_to_spend::MemoryPersistence::new();
    assert!(persistence.load().unwrap().is_none());

    let mut engine = LedgerEngine::in_memory();
    let account = engine.create_account().unwrap();
    engine.deposit(&account.id, 1_234, None).unwrap();

    let snapshot = LedgerSnapshot {
        accounts: vec![engine.account(&account.id).unwrap().clone()],
        buckets: vec![],
        events: engine.events().to_vec(),
    };
    persistence.save(&snapshot).unwrap();
    let loaded = persistence.load().unwrap().unwrap();
    assert_eq!(loaded.accounts.len(), 1);
    assert_eq!(loaded.events.len(), 1);
}
