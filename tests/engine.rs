mod common;

use common::{open_core, seed_profile};
use uniconnect::{Action, CoreError, InterestOutcome, Outcome};

#[tokio::test]
async fn mutual_interest_confirms_a_match() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    let first = core.engine().express_interest(1, 2).await.unwrap();
    assert_eq!(first, InterestOutcome::Recorded);

    let second = core.engine().express_interest(2, 1).await.unwrap();
    assert_eq!(second, InterestOutcome::Matched);

    assert_eq!(core.engine().query_mutual(1).await.unwrap(), vec![2]);
    assert_eq!(core.engine().query_mutual(2).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn repeated_interest_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    assert_eq!(
        core.engine().express_interest(1, 2).await.unwrap(),
        InterestOutcome::Recorded
    );
    assert_eq!(
        core.engine().express_interest(1, 2).await.unwrap(),
        InterestOutcome::Recorded
    );

    let stats = core.engine().stats(1).await.unwrap();
    assert_eq!(stats.interests_given, 1);
}

#[tokio::test]
async fn self_interest_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;

    let err = core.engine().express_interest(1, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::SelfInterest));

    let stats = core.engine().stats(1).await.unwrap();
    assert_eq!(stats.interests_given, 0);
}

#[tokio::test]
async fn interest_in_unknown_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;

    let err = core.engine().express_interest(1, 99).await.unwrap_err();
    assert!(matches!(err, CoreError::ProfileNotFound(99)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_symmetric_interest_yields_one_match() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    let e1 = core.engine().clone();
    let e2 = core.engine().clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { e1.express_interest(1, 2).await }),
        tokio::spawn(async move { e2.express_interest(2, 1).await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    // whichever call committed second observed the reciprocal interest
    assert!(a == InterestOutcome::Matched || b == InterestOutcome::Matched);

    assert_eq!(core.engine().query_mutual(1).await.unwrap(), vec![2]);
    assert_eq!(core.engine().query_mutual(2).await.unwrap(), vec![1]);
    assert_eq!(core.engine().stats(1).await.unwrap().matches, 1);
}

#[tokio::test]
async fn withdraw_removes_the_interest() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    core.engine().express_interest(1, 2).await.unwrap();
    core.engine().withdraw(1, 2).await.unwrap();

    // the reciprocal like no longer completes a pair
    assert_eq!(
        core.engine().express_interest(2, 1).await.unwrap(),
        InterestOutcome::Recorded
    );
    assert!(core.engine().query_mutual(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn withdraw_after_match_fails() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    core.engine().express_interest(1, 2).await.unwrap();
    core.engine().express_interest(2, 1).await.unwrap();

    let err = core.engine().withdraw(1, 2).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyMatched));
    assert_eq!(core.engine().query_mutual(1).await.unwrap(), vec![2]);
}

#[tokio::test]
async fn withdraw_without_interest_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    core.engine().withdraw(1, 2).await.unwrap();
}

#[tokio::test]
async fn matched_event_is_emitted_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 5, "Eve", 23, "History").await;
    seed_profile(&core, 3, "Cal", 24, "Biology").await;

    let mut rx = core.engine().subscribe();
    core.engine().express_interest(5, 3).await.unwrap();
    core.engine().express_interest(3, 5).await.unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!((event.actor_a, event.actor_b), (3, 5));

    // re-expressing after the match reports Matched but emits nothing new
    assert_eq!(
        core.engine().express_interest(5, 3).await.unwrap(),
        InterestOutcome::Matched
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_transaction_leaves_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    let mut tx = core.store().pool().begin().await.unwrap();
    sqlx::query("INSERT INTO interests (from_actor,to_actor,created_at) VALUES (1,2,0)")
        .execute(&mut *tx)
        .await
        .unwrap();
    drop(tx);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM interests")
        .fetch_one(core.store().pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn admirers_lists_unreciprocated_interest_only() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    for (id, name) in [(1, "Ada"), (2, "Ben"), (3, "Cal")] {
        seed_profile(&core, id, name, 21, "Math").await;
    }

    core.engine().express_interest(2, 1).await.unwrap();
    core.engine().express_interest(3, 1).await.unwrap();
    core.engine().express_interest(1, 3).await.unwrap(); // matches with 3

    assert_eq!(core.engine().admirers(1).await.unwrap(), vec![2]);
}

#[tokio::test]
async fn stats_derive_from_interest_and_pass_tables() {
    let dir = tempfile::tempdir().unwrap();
    let core = open_core(&dir).await;
    for (id, name) in [(1, "Ada"), (2, "Ben"), (3, "Cal")] {
        seed_profile(&core, id, name, 21, "Math").await;
    }

    core.engine().express_interest(2, 1).await.unwrap();
    core.engine().express_interest(1, 2).await.unwrap();
    core.engine().pass(3, 1).await.unwrap();

    let stats = core.engine().stats(1).await.unwrap();
    assert_eq!(stats.interests_given, 1);
    assert_eq!(stats.interests_received, 1);
    assert_eq!(stats.matches, 1);
    assert_eq!(stats.profile_views, 2);
}

#[tokio::test]
async fn submit_runs_admission_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = uniconnect::Config::default();
    cfg.store.path = dir.path().join("uniconnect.db");
    cfg.rate.max_actions = 2;
    let core = uniconnect::Core::open(&cfg).await.unwrap();
    seed_profile(&core, 1, "Ada", 21, "Math").await;
    seed_profile(&core, 2, "Ben", 22, "Physics").await;

    assert_eq!(
        core.submit(Action::Like {
            actor: 1,
            target: 2
        })
        .await
        .unwrap(),
        Outcome::Recorded
    );
    assert!(matches!(
        core.submit(Action::Browse {
            actor: 1,
            filter: None
        })
        .await
        .unwrap(),
        Outcome::NoCandidates
    ));

    // third action in the window is refused before it reaches the engine
    let denied = core
        .submit(Action::Like {
            actor: 1,
            target: 2,
        })
        .await
        .unwrap();
    assert!(matches!(denied, Outcome::Denied(_)));
    assert_eq!(core.engine().stats(1).await.unwrap().interests_given, 1);
}
