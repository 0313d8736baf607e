use chrono::Duration;
use spaced_core::model::{CardDraft, DeckId, Outcome};
use spaced_core::scheduler::Scheduler;
use spaced_core::time::{add_days, fixed_clock, fixed_now};
use storage::repository::{
    CardRepository, DeckRepository, NewCardRecord, NewDeckRecord, StorageError,
};
use storage::sqlite::{LATEST_SCHEMA_VERSION, SqliteRepository};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn deck_record(name: &str) -> NewDeckRecord {
    NewDeckRecord {
        name: name.into(),
        created_at: fixed_now(),
        next_review_date: fixed_clock().today(),
    }
}

fn card_record(deck_id: DeckId, front: &str, back: &str) -> NewCardRecord {
    NewCardRecord::new(
        CardDraft::new(deck_id, front, back)
            .validate(fixed_now(), fixed_clock().today())
            .unwrap(),
    )
}

#[tokio::test]
async fn sqlite_roundtrip_persists_deck_schedule_and_timing() {
    let repo = connect("memdb_deck_roundtrip").await;
    let today = fixed_clock().today();

    let id = repo.insert_new_deck(deck_record("Animals")).await.unwrap();
    let mut deck = repo.get_deck(id).await.unwrap().expect("deck");
    assert_eq!(deck.name(), "Animals");
    assert_eq!(deck.next_review_date(), today);

    deck.record_elapsed(42_000);
    deck.apply_pass(
        &Scheduler::new(),
        0,
        today,
        fixed_now() + Duration::minutes(2),
    );
    repo.upsert_deck(&deck).await.unwrap();

    let fetched = repo.get_deck(id).await.unwrap().expect("deck");
    assert_eq!(fetched.review_count(), 1);
    assert_eq!(fetched.last_review_date(), Some(today));
    assert_eq!(fetched.next_review_date(), add_days(today, 2));
    assert_eq!(fetched.max_time_ms(), 42_000);
    assert_eq!(fetched, deck);
}

#[tokio::test]
async fn sqlite_rejects_duplicate_deck_names() {
    let repo = connect("memdb_dupe_names").await;
    repo.insert_new_deck(deck_record("Verbs")).await.unwrap();
    let err = repo
        .insert_new_deck(deck_record("Verbs"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn sqlite_cards_are_indexed_by_deck_and_keep_counters() {
    let repo = connect("memdb_cards").await;
    let a = repo.insert_new_deck(deck_record("A")).await.unwrap();
    let b = repo.insert_new_deck(deck_record("B")).await.unwrap();

    let first = repo.insert_new_card(card_record(a, "dog", "inu")).await.unwrap();
    repo.insert_new_card(card_record(b, "cat", "neko")).await.unwrap();
    repo.insert_new_card(card_record(a, "bird", "tori")).await.unwrap();

    let cards = repo.cards_for_deck(a).await.unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].front(), "dog");
    assert_eq!(cards[1].front(), "bird");
    assert_eq!(repo.count_cards(a).await.unwrap(), 2);
    assert_eq!(repo.count_cards(b).await.unwrap(), 1);

    let today = fixed_clock().today();
    let mut card = repo.get_card(first).await.unwrap().expect("card");
    card.record_answer(Outcome::Correct, &Scheduler::new(), today);
    card.record_answer(Outcome::Incorrect, &Scheduler::new(), today);
    repo.upsert_card(&card).await.unwrap();

    let fetched = repo.get_card(first).await.unwrap().expect("card");
    assert_eq!(fetched.total_answer_count(), 2);
    assert_eq!(fetched.correct_count(), 1);
    assert_eq!(fetched.correct_answer_ratio(), 50);
    assert_eq!(fetched.interval_index(), 0);
    assert_eq!(fetched.last_reviewed(), Some(today));

    assert!(repo.delete_card(first).await.unwrap());
    assert!(!repo.delete_card(first).await.unwrap());
    assert_eq!(repo.count_cards(a).await.unwrap(), 1);
    assert!(repo.get_card(first).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_deck_delete_leaves_cards_for_the_caller() {
    let repo = connect("memdb_delete").await;
    let deck_id = repo.insert_new_deck(deck_record("Gone")).await.unwrap();
    repo.insert_new_card(card_record(deck_id, "q", "a")).await.unwrap();

    assert!(repo.delete_deck(deck_id).await.unwrap());
    assert!(repo.get_deck(deck_id).await.unwrap().is_none());
    assert_eq!(repo.count_cards(deck_id).await.unwrap(), 1);
    assert!(!repo.delete_deck(deck_id).await.unwrap());
}

#[tokio::test]
async fn sqlite_upgrades_version_one_rows() {
    let url = "sqlite:file:memdb_upgrade?mode=memory&cache=shared";
    let repo = SqliteRepository::connect(url).await.expect("connect");
    let pool = repo.pool();

    for statement in [
        "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
        "CREATE TABLE decks (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, \
         card_count INTEGER NOT NULL DEFAULT 0, review_count INTEGER NOT NULL DEFAULT 0, \
         last_review_date TEXT, next_review_date TEXT NOT NULL, created_at TEXT NOT NULL, \
         updated_at TEXT NOT NULL);",
        "CREATE TABLE cards (id INTEGER PRIMARY KEY AUTOINCREMENT, deck_id INTEGER NOT NULL, \
         front TEXT NOT NULL, back TEXT NOT NULL, total_answer_count INTEGER NOT NULL DEFAULT 0, \
         correct_count INTEGER NOT NULL DEFAULT 0, correct_answer_ratio INTEGER NOT NULL DEFAULT 0, \
         created_at TEXT NOT NULL);",
    ] {
        sqlx::query(statement).execute(pool).await.unwrap();
    }
    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (1, ?1)")
        .bind(fixed_now())
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO decks (name, card_count, review_count, next_review_date, created_at, updated_at) \
         VALUES ('Old', 1, 2, ?1, ?2, ?2)",
    )
    .bind(fixed_now().date_naive())
    .bind(fixed_now())
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO cards (deck_id, front, back, total_answer_count, correct_count, created_at) \
         VALUES (1, 'q', 'a', 3, 2, ?1)",
    )
    .bind(fixed_now())
    .execute(pool)
    .await
    .unwrap();

    assert_eq!(repo.schema_version().await.unwrap(), 1);
    repo.migrate().await.expect("upgrade");
    assert_eq!(repo.schema_version().await.unwrap(), LATEST_SCHEMA_VERSION);

    let deck = repo.get_deck(DeckId::new(1)).await.unwrap().expect("deck");
    assert_eq!(deck.review_count(), 2);
    assert_eq!(deck.max_time_ms(), 0);
    assert_eq!(deck.current_time_ms(), 0);

    let cards = repo.cards_for_deck(DeckId::new(1)).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].correct_answer_ratio(), 67);
    assert_eq!(cards[0].interval_index(), 0);
    assert_eq!(cards[0].next_review_date(), fixed_now().date_naive());
    assert_eq!(cards[0].last_reviewed(), None);

    // Re-running is a no-op.
    repo.migrate().await.expect("idempotent");
    assert_eq!(repo.schema_version().await.unwrap(), LATEST_SCHEMA_VERSION);
}
