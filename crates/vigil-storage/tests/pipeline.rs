//! End-to-end pipeline tests: engine over the SQLite store.

use std::sync::Arc;

use chrono::{Duration, Utc};

use vigil_core::{
    CounterStore, MaintenanceSweeper, ReviewPriority, SafetyCategory, SafetySignalEngine, UserId,
};
use vigil_storage::SqliteCounterStore;

fn engine_and_store() -> (Arc<SafetySignalEngine>, Arc<SqliteCounterStore>) {
    let store = Arc::new(SqliteCounterStore::in_memory().unwrap());
    let engine = Arc::new(SafetySignalEngine::new(
        store.clone() as Arc<dyn CounterStore>
    ));
    (engine, store)
}

#[tokio::test]
async fn insult_message_counts_toxicity_and_harassment() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-insult");

    engine.evaluate("I hate you, you stupid idiot", &user).await;

    let doc = store.read_counter_document(&user).unwrap().unwrap();
    assert!(doc.categories.contains_key(&SafetyCategory::Toxicity));
    assert!(doc.categories.contains_key(&SafetyCategory::Harassment));
    assert_eq!(doc.total_flags_30d as usize, doc.categories.len());
    assert!(!doc.flagged_for_review);
    assert_eq!(store.escalation_count().unwrap(), 0);
}

#[tokio::test]
async fn grooming_message_escalates_without_retaining_text() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-grooming");
    let text = "Let's meet in person, don't tell your parents";

    engine.evaluate(text, &user).await;

    let escalations = store.escalations_for(&user).unwrap();
    assert_eq!(escalations.len(), 1);
    assert!(escalations[0]
        .categories
        .contains(&SafetyCategory::ChildGrooming));
    assert_eq!(escalations[0].content_length, text.chars().count());

    let doc = store.read_counter_document(&user).unwrap().unwrap();
    assert!(doc.flagged_for_review);
    assert_eq!(doc.review_priority, Some(ReviewPriority::High));
    assert!(doc
        .flag_categories
        .contains(&SafetyCategory::ChildGrooming));

    // The stored document carries counts and lengths, never the message.
    let json = doc.to_json().to_string();
    assert!(!json.contains("meet in person"));
}

#[tokio::test]
async fn scam_message_counts_without_escalation() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-scam");

    engine
        .evaluate(
            "Congratulations you won, click here to claim, wire transfer now",
            &user,
        )
        .await;

    let doc = store.read_counter_document(&user).unwrap().unwrap();
    let scam = doc.categories.get(&SafetyCategory::Scam).unwrap();
    assert_eq!(scam.hits_30d, 1);
    assert_eq!(scam.timestamps.len(), 1);
    assert!(!doc.flagged_for_review);
    assert_eq!(store.escalation_count().unwrap(), 0);
}

#[tokio::test]
async fn sweep_prunes_forty_day_old_hits() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-sweep");
    let now = Utc::now();

    // A toxicity hit 40 days ago and a fresh spam hit.
    store
        .increment_counters(&user, &[SafetyCategory::Toxicity], now - Duration::days(40))
        .unwrap();
    engine.evaluate("buy now, limited time offer", &user).await;

    let sweeper = MaintenanceSweeper::new(store.clone() as Arc<dyn CounterStore>);
    let report = sweeper.sweep_user(&user, now).unwrap();
    assert_eq!(report.removed, 1);

    let doc = store.read_counter_document(&user).unwrap().unwrap();
    let toxicity = doc.categories.get(&SafetyCategory::Toxicity).unwrap();
    assert_eq!(toxicity.hits_30d, 0);
    assert!(toxicity.timestamps.is_empty());

    // Every counter agrees with its surviving timestamps, and the aggregate
    // agrees with the remaining categories.
    let mut remaining = 0;
    for counter in doc.categories.values() {
        assert_eq!(counter.hits_30d as usize, counter.timestamps.len());
        remaining += counter.hits_30d;
    }
    assert_eq!(doc.total_flags_30d, remaining);

    // Idempotent: nothing further to remove.
    let again = sweeper.sweep_user(&user, now).unwrap();
    assert_eq!(again.removed, 0);
}

#[tokio::test]
async fn safe_message_writes_nothing() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-safe");

    engine.evaluate("Nice weather today", &user).await;

    assert!(store.read_counter_document(&user).unwrap().is_none());
    assert_eq!(store.escalation_count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_count_exactly_once_each() {
    let (engine, store) = engine_and_store();
    let user = UserId::from("pipeline-concurrent");
    let n = 8;

    let handles: Vec<_> = (0..n)
        .map(|_| {
            engine.dispatch(
                "Congratulations you won, wire transfer now".to_string(),
                user.clone(),
            )
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let doc = store.read_counter_document(&user).unwrap().unwrap();
    let scam = doc.categories.get(&SafetyCategory::Scam).unwrap();
    assert_eq!(scam.hits_30d, n as i64);
    assert_eq!(scam.timestamps.len(), n);
}
