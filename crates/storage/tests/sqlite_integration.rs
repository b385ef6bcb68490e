use chrono::Duration;
use quiz_core::model::{GameResult, Grade, Profile, Subject, UserId};
use quiz_core::time::{day_bounds, fixed_now, fixed_today};
use storage::repository::{ProfileStore, ResultReporter, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_profile(id: &str, name: &str) -> Profile {
    Profile::new(UserId::new(id).unwrap(), name, Grade::Primary4, fixed_now()).unwrap()
}

fn build_result(user: &UserId, subject: Subject, score: u32, offset_minutes: i64) -> GameResult {
    GameResult::new(
        user.clone(),
        subject,
        Grade::Primary4,
        score,
        10,
        fixed_now() + Duration::minutes(offset_minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_profile_roundtrip_keeps_dates_and_points() {
    let repo = connect("memdb_profile_roundtrip").await;
    let mut profile = build_profile("learner-1", "Mei Ling");
    profile.record_completed_date(fixed_today() - Duration::days(1));
    repo.upsert_profile(&profile).await.unwrap();

    assert!(
        repo.append_completed_date(profile.user_id(), fixed_today())
            .await
            .unwrap()
    );
    assert!(
        !repo
            .append_completed_date(profile.user_id(), fixed_today())
            .await
            .unwrap()
    );

    let later = fixed_now() + Duration::minutes(3);
    assert_eq!(
        repo.accumulate_points(profile.user_id(), 70, later)
            .await
            .unwrap(),
        70
    );

    let stored = repo.get_profile(profile.user_id()).await.unwrap().unwrap();
    assert_eq!(stored.name(), "Mei Ling");
    assert_eq!(stored.grade(), Grade::Primary4);
    assert_eq!(stored.total_points(), 70);
    assert_eq!(stored.last_active(), later);
    assert_eq!(stored.completed_dates().len(), 2);
    assert_eq!(stored.completed_dates().latest(), Some(fixed_today()));

    assert!(
        repo.get_profile(&UserId::new("nobody").unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_stale_profile_update_keeps_credited_points() {
    let repo = connect("memdb_profile_stale_update").await;
    let profile = build_profile("learner-4", "Arjun");
    repo.upsert_profile(&profile).await.unwrap();

    // a copy read before the session was credited
    let mut stale = repo.get_profile(profile.user_id()).await.unwrap().unwrap();
    let later = fixed_now() + Duration::minutes(5);
    repo.accumulate_points(profile.user_id(), 40, later)
        .await
        .unwrap();

    stale.rename("Arjun K").unwrap();
    stale.set_grade(Grade::Primary3);
    repo.upsert_profile(&stale).await.unwrap();

    let stored = repo.get_profile(profile.user_id()).await.unwrap().unwrap();
    assert_eq!(stored.name(), "Arjun K");
    assert_eq!(stored.grade(), Grade::Primary3);
    assert_eq!(stored.total_points(), 40);
    assert_eq!(stored.last_active(), later);
}

#[tokio::test]
async fn sqlite_missing_profile_is_not_found() {
    let repo = connect("memdb_profile_missing").await;
    let ghost = UserId::new("ghost").unwrap();
    let err = repo
        .append_completed_date(&ghost, fixed_today())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    let err = repo
        .accumulate_points(&ghost, 10, fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_leaderboard_orders_by_points() {
    let repo = connect("memdb_leaderboard").await;
    for (id, points) in [("a", 120), ("b", 300), ("c", 40)] {
        let profile = build_profile(id, id);
        repo.upsert_profile(&profile).await.unwrap();
        repo.accumulate_points(profile.user_id(), points, fixed_now())
            .await
            .unwrap();
    }

    let top = repo.top_profiles(2).await.unwrap();
    let ids: Vec<&str> = top.iter().map(|p| p.user_id().as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(top[0].total_points(), 300);
}

#[tokio::test]
async fn sqlite_results_count_and_history() {
    let repo = connect("memdb_results").await;
    let user = UserId::new("learner-2").unwrap();
    let other = UserId::new("learner-3").unwrap();

    let first = repo
        .persist(&build_result(&user, Subject::Math, 50, 0))
        .await
        .unwrap();
    let second = repo
        .persist(&build_result(&user, Subject::Math, 80, 5))
        .await
        .unwrap();
    assert!(second > first);
    repo.persist(&build_result(&user, Subject::Chinese, 30, 10))
        .await
        .unwrap();
    repo.persist(&build_result(&other, Subject::Math, 100, 10))
        .await
        .unwrap();
    // the next calendar day
    repo.persist(&build_result(&user, Subject::Math, 90, 24 * 60))
        .await
        .unwrap();

    let (start, end) = day_bounds(fixed_today());
    let math_today = repo
        .count_results(&user, Some(Subject::Math), Some(start), Some(end))
        .await
        .unwrap();
    assert_eq!(math_today, 2);
    assert_eq!(repo.count_results(&user, None, None, None).await.unwrap(), 4);

    let history = repo.recent_results(&user, 3).await.unwrap();
    let scores: Vec<u32> = history.iter().map(|row| row.result.score()).collect();
    assert_eq!(scores, vec![90, 30, 80]);
    assert_eq!(history[2].id, second);
    assert_eq!(history[2].result.correct_answers(), 8);
}
