//! Tests for atomic operations
//!
//! These tests verify:
//! - Check-then-mutate compare-and-swap semantics
//! - A failed check leaves every touched key unchanged
//! - Concurrent operations on one key: at most one commits
//! - Same-key mutations resolve to the last one queued
//! - Limits and deferred validation errors

use std::sync::Arc;

use tuplekv::{key, Commit, Config, Key, Kv, KvError, Lookup, MemoryStore, Value, Versionstamp};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_kv() -> Kv {
    Kv::new(Arc::new(MemoryStore::new()))
}

fn named(name: &str) -> Value {
    Value::from_serialize(&serde_json::json!({ "name": name })).unwrap()
}

async fn snapshot(kv: &Kv, keys: &[Key]) -> Vec<Option<(Value, Versionstamp)>> {
    kv.get_many(keys)
        .await
        .unwrap()
        .into_iter()
        .map(|lookup| lookup.into_entry().map(|e| (e.value, e.versionstamp)))
        .collect()
}

// =============================================================================
// Compare-and-swap Tests
// =============================================================================

#[tokio::test]
async fn test_users_42_scenario() {
    let kv = setup_kv();
    let k = key!["users", 42];

    let v1 = kv.set(&k, named("a"), None).await.unwrap();

    let first = kv.get(&k).await.unwrap().into_entry().unwrap();
    assert_eq!(first.key, k);
    assert_eq!(first.value, named("a"));
    assert_eq!(first.versionstamp, v1);

    let v2 = kv.set(&k, named("b"), None).await.unwrap();
    assert_ne!(v1, v2);

    let stale = kv
        .atomic()
        .check_entry(&first)
        .set(&k, named("c"), None)
        .commit()
        .await
        .unwrap();
    assert_eq!(stale, Commit::Conflict);
    assert_eq!(kv.get(&k).await.unwrap().value(), Some(&named("b")));

    let fresh = kv
        .atomic()
        .check(&k, Some(v2))
        .set(&k, named("c"), None)
        .commit()
        .await
        .unwrap();
    let v3 = match fresh {
        Commit::Committed(v3) => v3,
        Commit::Conflict => panic!("expected commit"),
    };
    assert_ne!(v3, v1);
    assert_ne!(v3, v2);

    let latest = kv.get(&k).await.unwrap();
    assert_eq!(latest.value(), Some(&named("c")));
    assert_eq!(latest.versionstamp(), Some(v3));
}

#[tokio::test]
async fn test_check_absent() {
    let kv = setup_kv();
    let k = key!["unique", "alice"];

    let created = kv.atomic().check(&k, None).set(&k, 1, None).commit().await.unwrap();
    assert!(created.is_committed());

    let again = kv.atomic().check(&k, None).set(&k, 2, None).commit().await.unwrap();
    assert_eq!(again, Commit::Conflict);
    assert_eq!(kv.get(&k).await.unwrap().value(), Some(&Value::from(1)));
}

#[tokio::test]
async fn test_check_lookup_miss_asserts_absence() {
    let kv = setup_kv();
    let k = key!["slot"];

    let miss = kv.get(&k).await.unwrap();
    assert!(matches!(miss, Lookup::Miss(_)));

    kv.set(&k, "taken", None).await.unwrap();

    let outcome = kv.atomic().check_lookup(&miss).set(&k, "mine", None).commit().await.unwrap();
    assert_eq!(outcome, Commit::Conflict);

    let hit = kv.get(&k).await.unwrap();
    let outcome = kv.atomic().check_lookup(&hit).set(&k, "mine", None).commit().await.unwrap();
    assert!(outcome.is_committed());
}

#[tokio::test]
async fn test_all_mutations_share_one_versionstamp() {
    let kv = setup_kv();
    let a = key!["a"];
    let b = key!["b"];

    let outcome = kv
        .atomic()
        .set(&a, 1, None)
        .set(&b, 2, None)
        .commit()
        .await
        .unwrap();
    let versionstamp = outcome.versionstamp().unwrap();

    assert_eq!(kv.get(&a).await.unwrap().versionstamp(), Some(versionstamp));
    assert_eq!(kv.get(&b).await.unwrap().versionstamp(), Some(versionstamp));
}

#[tokio::test]
async fn test_empty_operation_commits() {
    let kv = setup_kv();
    assert!(kv.atomic().commit().await.unwrap().is_committed());
}

// =============================================================================
// Atomicity Tests
// =============================================================================

#[tokio::test]
async fn test_conflict_leaves_state_unchanged() {
    let kv = setup_kv();
    let keys = vec![key!["acct", 1], key!["acct", 2], key!["acct", 3]];
    kv.set(&keys[0], 100, None).await.unwrap();
    kv.set(&keys[1], 50, None).await.unwrap();

    let before = snapshot(&kv, &keys).await;

    let stale = Versionstamp::from_commit_version(u64::MAX);
    let outcome = kv
        .atomic()
        .check(&keys[1], Some(stale))
        .set(&keys[0], 0, None)
        .delete(&keys[1])
        .set(&keys[2], 150, None)
        .commit()
        .await
        .unwrap();

    assert_eq!(outcome, Commit::Conflict);
    assert_eq!(snapshot(&kv, &keys).await, before);
}

#[tokio::test]
async fn test_one_failing_check_among_many() {
    let kv = setup_kv();
    let a = key!["a"];
    let b = key!["b"];
    kv.set(&a, 1, None).await.unwrap();
    kv.set(&b, 1, None).await.unwrap();

    let entry_a = kv.get(&a).await.unwrap().into_entry().unwrap();
    let entry_b = kv.get(&b).await.unwrap().into_entry().unwrap();
    kv.set(&b, 2, None).await.unwrap();

    let outcome = kv
        .atomic()
        .check_entry(&entry_a)
        .check_entry(&entry_b)
        .set(&a, 10, None)
        .commit()
        .await
        .unwrap();

    assert_eq!(outcome, Commit::Conflict);
    assert_eq!(kv.get(&a).await.unwrap().value(), Some(&Value::from(1)));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test]
async fn test_cas_race_single_winner() {
    let kv = setup_kv();
    let k = key!["counter"];
    kv.set(&k, 0, None).await.unwrap();
    let entry = kv.get(&k).await.unwrap().into_entry().unwrap();

    let first = kv.atomic().check_entry(&entry).set(&k, 1, None).commit();
    let second = kv.atomic().check_entry(&entry).set(&k, 2, None).commit();
    let (first, second) = tokio::join!(first, second);

    let outcomes = [first.unwrap(), second.unwrap()];
    let committed = outcomes.iter().filter(|o| o.is_committed()).count();
    assert_eq!(committed, 1);
    assert!(outcomes.contains(&Commit::Conflict));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_with_retry() {
    let kv = setup_kv();
    let k = key!["hits"];
    kv.set(&k, 0i64, None).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let kv = kv.clone();
        let k = k.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                loop {
                    let entry = kv.get(&k).await.unwrap().into_entry().unwrap();
                    let current: i64 = entry.value.deserialize_into().unwrap();
                    let outcome = kv
                        .atomic()
                        .check_entry(&entry)
                        .set(&k, current + 1, None)
                        .commit()
                        .await
                        .unwrap();
                    if outcome.is_committed() {
                        break;
                    }
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(kv.get(&k).await.unwrap().value(), Some(&Value::from(200i64)));
}

// =============================================================================
// Same-key Mutation Tests
// =============================================================================

#[tokio::test]
async fn test_last_queued_mutation_wins() {
    let kv = setup_kv();
    let k = key!["k"];

    kv.atomic()
        .set(&k, "first", None)
        .set(&k, "second", None)
        .commit()
        .await
        .unwrap();
    assert_eq!(kv.get(&k).await.unwrap().value(), Some(&Value::from("second")));

    kv.atomic().set(&k, "again", None).delete(&k).commit().await.unwrap();
    assert!(kv.get(&k).await.unwrap().is_miss());

    kv.atomic().delete(&k).set(&k, "back", None).commit().await.unwrap();
    assert_eq!(kv.get(&k).await.unwrap().value(), Some(&Value::from("back")));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[tokio::test]
async fn test_invalid_key_error_is_deferred_to_commit() {
    let kv = setup_kv();
    let ok = key!["ok"];

    let operation = kv
        .atomic()
        .set(&ok, 1, None)
        .set(&Key::root(), 2, None)
        .delete(&key!["other"]);
    assert_eq!(operation.mutation_count(), 2);

    assert!(matches!(operation.commit().await, Err(KvError::InvalidKey(_))));
    assert!(kv.get(&ok).await.unwrap().is_miss());
}

#[tokio::test]
async fn test_oversized_value_is_deferred_to_commit() {
    let config = Config::builder().max_value_size(32).build();
    let kv = Kv::with_config(Arc::new(MemoryStore::new()), config).unwrap();

    let outcome = kv
        .atomic()
        .set(&key!["big"], "y".repeat(100), None)
        .commit()
        .await;
    assert!(matches!(outcome, Err(KvError::ValueTooLarge { .. })));
}

#[tokio::test]
async fn test_limits_enforced() {
    let config = Config::builder().max_checks(2).max_mutations(2).build();
    let kv = Kv::with_config(Arc::new(MemoryStore::new()), config).unwrap();

    let too_many_checks = kv
        .atomic()
        .check(&key![1], None)
        .check(&key![2], None)
        .check(&key![3], None)
        .commit()
        .await;
    assert!(matches!(
        too_many_checks,
        Err(KvError::TooManyChecks { count: 3, max: 2 })
    ));

    let too_many_mutations = kv
        .atomic()
        .set(&key![1], 1, None)
        .set(&key![2], 2, None)
        .delete(&key![3])
        .commit()
        .await;
    assert!(matches!(
        too_many_mutations,
        Err(KvError::TooManyMutations { count: 3, max: 2 })
    ));

    // Same-key mutations collapse before the limit is applied
    let collapsed = kv
        .atomic()
        .set(&key![1], 1, None)
        .set(&key![1], 2, None)
        .set(&key![2], 3, None)
        .commit()
        .await
        .unwrap();
    assert!(collapsed.is_committed());
}
