use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use quiz_core::model::{Grade, Profile, Question, QuestionDraft, Subject, UserId};
use quiz_core::quiz::Phase;
use quiz_core::time::{fixed_now, fixed_today};
use services::{
    AppServices, Clock, QuizLoopService, SessionController, SessionError, SessionSettings,
};
use storage::repository::{
    InMemoryRepository, ProfileStore, QuestionSource, ResultReporter, Storage, StorageError,
};

fn build_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            QuestionDraft::new(
                format!("Practice question {i}"),
                vec!["one".into(), "two".into(), "three".into(), "four".into()],
                0,
                "Option one is right",
            )
            .validate()
            .unwrap()
        })
        .collect()
}

fn seeded_repo(count: usize) -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.seed_questions(Subject::Math, Grade::Primary3, build_questions(count))
        .unwrap();
    repo
}

async fn onboard(repo: &InMemoryRepository, id: &str) -> UserId {
    let user = UserId::new(id).unwrap();
    let profile = Profile::new(user.clone(), "Learner", Grade::Primary3, fixed_now()).unwrap();
    repo.upsert_profile(&profile).await.unwrap();
    user
}

fn in_order(count: u32) -> SessionSettings {
    SessionSettings::new(count, false, None).unwrap()
}

fn loop_service(repo: &InMemoryRepository, settings: SessionSettings) -> QuizLoopService {
    QuizLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
    .with_settings(settings)
}

/// Plays the current pass; questions whose position satisfies `correct` get option 0.
fn play_pass(session: &mut SessionController, correct: impl Fn(usize) -> bool) {
    while session.phase() == Phase::Playing {
        let position = session.session().unwrap().current_index();
        let option = if correct(position) { 0 } else { 3 };
        session.select_option(option).unwrap();
        session.advance().unwrap();
    }
}

#[tokio::test]
async fn quiz_loop_persists_primary_score_after_retry() {
    let repo = seeded_repo(12);
    let user = onboard(&repo, "learner-1").await;
    let yesterday = fixed_today().checked_sub_days(Days::new(1)).unwrap();
    repo.append_completed_date(&user, yesterday).await.unwrap();
    let loop_svc = loop_service(&repo, in_order(10));

    let mut session = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap();
    session.ensure_available().unwrap();
    assert_eq!(session.progress().unwrap().total, 10);

    play_pass(&mut session, |i| i < 5);
    assert_eq!(session.phase(), Phase::Result);
    session.retry().unwrap();
    play_pass(&mut session, |_| true);
    assert_eq!(session.progress().unwrap().score, 50);

    let outcome = loop_svc.finish_session(&user, &mut session).await.unwrap();
    assert_eq!(outcome.final_score, 50);
    assert_eq!(outcome.total_questions, 10);
    assert_eq!(outcome.total_points, 50);
    assert_eq!(outcome.streak, 2);
    assert!(session.is_persisted());

    let profile = repo.get_profile(&user).await.unwrap().unwrap();
    assert_eq!(profile.total_points(), 50);
    assert!(profile.completed_dates().contains(fixed_today()));

    let history = repo.recent_results(&user, 20).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, outcome.result_id);
    assert_eq!(history[0].result.score(), 50);

    // finishing again is a no-op
    let again = loop_svc.finish_session(&user, &mut session).await.unwrap();
    assert_eq!(again, outcome);
    assert_eq!(repo.recent_results(&user, 20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_bank_gives_unavailable_session() {
    let repo = InMemoryRepository::new();
    let user = onboard(&repo, "learner-2").await;
    let loop_svc = loop_service(&repo, SessionSettings::default());

    let mut session = loop_svc
        .start_session(&user, Subject::Chinese, Grade::Primary4)
        .await
        .unwrap();
    assert_eq!(session.phase(), Phase::Unavailable);
    assert!(matches!(
        session.ensure_available(),
        Err(SessionError::QuestionSourceUnavailable { .. })
    ));
    assert!(matches!(
        loop_svc.finish_session(&user, &mut session).await,
        Err(SessionError::InvalidTransition(_))
    ));
}

struct BrokenSource;

#[async_trait]
impl QuestionSource for BrokenSource {
    async fn fetch(&self, _: Subject, _: Grade) -> Result<Vec<Question>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn failing_source_gives_unavailable_session() {
    let repo = InMemoryRepository::new();
    let user = onboard(&repo, "learner-3").await;
    let loop_svc = QuizLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(BrokenSource),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let session = loop_svc
        .start_session(&user, Subject::English, Grade::Primary3)
        .await
        .unwrap();
    assert_eq!(session.phase(), Phase::Unavailable);
}

#[tokio::test]
async fn start_requires_a_profile() {
    let repo = seeded_repo(3);
    let loop_svc = loop_service(&repo, SessionSettings::default());
    let err = loop_svc
        .start_session(&UserId::new("stranger").unwrap(), Subject::Math, Grade::Primary3)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownProfile(_)));
}

#[tokio::test]
async fn daily_limit_blocks_further_sessions() {
    let repo = seeded_repo(2);
    let user = onboard(&repo, "learner-4").await;
    let loop_svc = loop_service(&repo, SessionSettings::new(2, false, Some(1)).unwrap());

    let mut session = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap();
    play_pass(&mut session, |_| true);
    loop_svc.finish_session(&user, &mut session).await.unwrap();

    let err = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::DailyLimitReached {
            subject: Subject::Math,
            limit: 1
        }
    ));
}

#[tokio::test]
async fn abandoned_session_persists_nothing() {
    let repo = seeded_repo(4);
    let user = onboard(&repo, "learner-5").await;
    let loop_svc = loop_service(&repo, SessionSettings::default());

    let mut session = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap();
    session.select_option(0).unwrap();
    session.abandon();

    let profile = repo.get_profile(&user).await.unwrap().unwrap();
    assert_eq!(profile.total_points(), 0);
    assert!(profile.completed_dates().is_empty());
    assert!(repo.recent_results(&user, 20).await.unwrap().is_empty());
}

/// Profile store whose date appends fail a fixed number of times.
struct FlakyProfiles {
    inner: InMemoryRepository,
    date_failures: AtomicUsize,
    point_calls: AtomicUsize,
}

#[async_trait]
impl ProfileStore for FlakyProfiles {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, StorageError> {
        self.inner.get_profile(user_id).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        self.inner.upsert_profile(profile).await
    }

    async fn append_completed_date(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<bool, StorageError> {
        let remaining = self.date_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.date_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Connection("write timed out".into()));
        }
        self.inner.append_completed_date(user_id, date).await
    }

    async fn accumulate_points(
        &self,
        user_id: &UserId,
        delta: u32,
        at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.point_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.accumulate_points(user_id, delta, at).await
    }

    async fn top_profiles(&self, limit: u32) -> Result<Vec<Profile>, StorageError> {
        self.inner.top_profiles(limit).await
    }
}

#[tokio::test]
async fn finish_retry_never_double_credits_points() {
    let repo = seeded_repo(3);
    let user = onboard(&repo, "learner-6").await;
    let flaky = Arc::new(FlakyProfiles {
        inner: repo.clone(),
        date_failures: AtomicUsize::new(1),
        point_calls: AtomicUsize::new(0),
    });
    let loop_svc = QuizLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        flaky.clone(),
        Arc::new(repo.clone()),
    )
    .with_settings(in_order(3));

    let mut session = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap();
    play_pass(&mut session, |i| i != 1);

    let err = loop_svc
        .finish_session(&user, &mut session)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::PersistenceFailure {
            final_score: 20,
            ..
        }
    ));
    assert_eq!(session.phase(), Phase::Finished);
    assert!(session.result_id().is_some());
    assert!(!session.is_persisted());

    let outcome = loop_svc.finish_session(&user, &mut session).await.unwrap();
    assert_eq!(outcome.total_points, 20);
    assert_eq!(outcome.streak, 1);
    assert_eq!(flaky.point_calls.load(Ordering::SeqCst), 1);
    assert_eq!(repo.recent_results(&user, 20).await.unwrap().len(), 1);
    assert_eq!(
        repo.get_profile(&user).await.unwrap().unwrap().total_points(),
        20
    );
}

#[tokio::test]
async fn app_services_run_a_session_on_sqlite() {
    let questions = seeded_repo(5);
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_app_services?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        in_order(5),
        Arc::new(questions),
    )
    .await
    .unwrap();

    let user = UserId::new("sqlite-learner").unwrap();
    services
        .profiles()
        .load_or_create(&user, "Siti", Grade::Primary3)
        .await
        .unwrap();

    let loop_svc = services.quiz_loop();
    let mut session = loop_svc
        .start_session(&user, Subject::Math, Grade::Primary3)
        .await
        .unwrap();
    play_pass(&mut session, |i| i % 2 == 0);
    let outcome = loop_svc.finish_session(&user, &mut session).await.unwrap();
    assert_eq!(outcome.final_score, 30);

    let overview = services.profiles().overview(&user).await.unwrap();
    assert_eq!(overview.games_played, 1);
    assert_eq!(overview.streak, 1);
    assert_eq!(overview.profile.total_points(), 30);

    let board = services.results().leaderboard(10).await.unwrap();
    assert_eq!(board[0].user_id, user);
    assert_eq!(
        services
            .results()
            .games_played_today(&user, Subject::Math)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn in_memory_app_services_share_one_store() {
    let storage = Storage::in_memory();
    let services = AppServices::from_storage(
        &storage,
        Clock::fixed(fixed_now()),
        SessionSettings::default(),
        Arc::new(seeded_repo(1)),
    );
    let user = UserId::guest();
    services
        .profiles()
        .load_or_create(&user, "Guest", Grade::Primary4)
        .await
        .unwrap();
    assert!(storage.profiles.get_profile(&user).await.unwrap().is_some());
}
