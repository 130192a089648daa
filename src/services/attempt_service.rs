use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::{AttemptStore, CatalogStore, InsertAnswerOutcome, TransitionOutcome};
use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerPayload};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};
use crate::services::grading_service::GradingService;
use crate::services::validation_service::ValidationService;
use crate::utils::{pagination, time};

#[derive(Clone)]
pub struct AttemptService {
    catalog: Arc<dyn CatalogStore>,
    attempts: Arc<dyn AttemptStore>,
}

impl AttemptService {
    pub fn new(catalog: Arc<dyn CatalogStore>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { catalog, attempts }
    }

    pub async fn start_attempt(&self, test_id: Uuid, user_id: Uuid) -> Result<TestAttempt> {
        let test = self
            .catalog
            .get_test(test_id)
            .await?
            .ok_or(Error::TestNotFound(test_id))?;

        if !test.is_active {
            return Err(Error::TestInactive(test_id));
        }

        let attempt = self
            .attempts
            .create_attempt(&TestAttempt::begin(test.id, user_id, time::now()))
            .await?;

        tracing::info!(attempt_id = %attempt.id, %test_id, %user_id, "attempt started");
        Ok(attempt)
    }

    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        question_id: Uuid,
        payload: AnswerPayload,
        user_id: Uuid,
    ) -> Result<Answer> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;

        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::AttemptFinalized {
                attempt_id,
                status: attempt.status,
            });
        }

        let question = self
            .catalog
            .get_question(question_id)
            .await?
            .filter(|q| q.test_id == attempt.test_id)
            .ok_or(Error::QuestionNotInTest {
                question_id,
                test_id: attempt.test_id,
            })?;

        if self.attempts.find_answer(attempt_id, question_id).await?.is_some() {
            return Err(Error::DuplicateAnswer {
                attempt_id,
                question_id,
            });
        }

        ValidationService::validate_answer_submission(&question, &payload)?;

        let grade = GradingService::grade(&question, &payload).map_err(|e| {
            if matches!(e, Error::UnsupportedQuestionType { .. } | Error::InvalidAnswerKey { .. }) {
                tracing::error!(%attempt_id, %question_id, error = %e, "question cannot be graded");
            }
            e
        })?;

        let answer = Answer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id,
            answer: payload,
            is_correct: grade.is_correct,
            points_earned: grade.points_earned,
            answered_at: time::now(),
        };

        // The pre-checks above can race; the conditional insert is authoritative.
        match self.attempts.insert_answer_if_absent(&answer).await? {
            InsertAnswerOutcome::Inserted(stored) => {
                tracing::info!(
                    %attempt_id,
                    %question_id,
                    is_correct = stored.is_correct,
                    points_earned = stored.points_earned,
                    "answer accepted"
                );
                Ok(stored)
            }
            InsertAnswerOutcome::Duplicate => Err(Error::DuplicateAnswer {
                attempt_id,
                question_id,
            }),
            InsertAnswerOutcome::NotInProgress(status) => {
                Err(Error::AttemptFinalized { attempt_id, status })
            }
            InsertAnswerOutcome::AttemptMissing => Err(Error::AttemptNotFound(attempt_id)),
        }
    }

    pub async fn finish_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<AttemptResult> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;

        if attempt.status.is_terminal() {
            return Err(Error::AlreadyFinalized {
                attempt_id,
                status: attempt.status,
            });
        }

        let questions = self.catalog.list_questions(attempt.test_id).await?;
        let max_score: i32 = questions.iter().map(|q| q.points).sum();

        let completed = match self
            .attempts
            .complete_attempt(attempt_id, max_score, time::now())
            .await?
        {
            TransitionOutcome::Transitioned(completed) => completed,
            TransitionOutcome::AlreadyTerminal(status) => {
                return Err(Error::AlreadyFinalized { attempt_id, status })
            }
            TransitionOutcome::AttemptMissing => return Err(Error::AttemptNotFound(attempt_id)),
        };

        let answers = self.attempts.list_answers(attempt_id).await?;
        let result = AttemptResult::from_completed(&completed, &answers, questions.len())?;

        tracing::info!(
            %attempt_id,
            score = result.score,
            max_score = result.max_score,
            percentage = result.percentage,
            "attempt completed"
        );
        Ok(result)
    }

    /// Owner-initiated abandonment.
    pub async fn cancel_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<TestAttempt> {
        self.owned_attempt(attempt_id, user_id).await?;
        self.abandon_attempt(attempt_id).await
    }

    /// Moves an in-progress attempt to `abandoned`. Intended for timeout sweeps
    /// and other callers that act on behalf of the system, so there is no
    /// ownership check.
    pub async fn abandon_attempt(&self, attempt_id: Uuid) -> Result<TestAttempt> {
        match self.attempts.abandon_attempt(attempt_id, time::now()).await? {
            TransitionOutcome::Transitioned(attempt) => {
                tracing::info!(%attempt_id, "attempt abandoned");
                Ok(attempt)
            }
            TransitionOutcome::AlreadyTerminal(status) => {
                Err(Error::AlreadyFinalized { attempt_id, status })
            }
            TransitionOutcome::AttemptMissing => Err(Error::AttemptNotFound(attempt_id)),
        }
    }

    /// Abandons every in-progress attempt whose test duration plus `grace_minutes`
    /// has elapsed at `now`. Returns how many attempts were abandoned. Failures on
    /// single attempts are logged and skipped; only listing failures are returned.
    pub async fn abandon_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        grace_minutes: i64,
    ) -> Result<usize> {
        let mut durations: HashMap<Uuid, Option<i32>> = HashMap::new();
        let mut abandoned = 0;

        for attempt in self.attempts.list_in_progress().await? {
            let duration = match durations.get(&attempt.test_id) {
                Some(cached) => *cached,
                None => match self.catalog.get_test(attempt.test_id).await {
                    Ok(test) => {
                        let duration = test.map(|t| t.duration_minutes);
                        durations.insert(attempt.test_id, duration);
                        duration
                    }
                    // Not cached, so later attempts of this test retry the lookup.
                    Err(e) => {
                        tracing::error!(attempt_id = %attempt.id, test_id = %attempt.test_id, error = %e, "sweep could not load test");
                        continue;
                    }
                },
            };

            let Some(duration) = duration else {
                tracing::warn!(attempt_id = %attempt.id, test_id = %attempt.test_id, "attempt references a missing test");
                continue;
            };

            if time::attempt_deadline(attempt.started_at, duration, grace_minutes) > now {
                continue;
            }

            match self.attempts.abandon_attempt(attempt.id, now).await {
                Ok(TransitionOutcome::Transitioned(_)) => abandoned += 1,
                // Finished or cancelled between listing and now.
                Ok(TransitionOutcome::AlreadyTerminal(_) | TransitionOutcome::AttemptMissing) => {}
                Err(e) => {
                    tracing::error!(attempt_id = %attempt.id, error = %e, "sweep could not abandon attempt");
                }
            }
        }

        if abandoned > 0 {
            tracing::info!(abandoned, "expired attempts abandoned");
        }
        Ok(abandoned)
    }

    pub async fn get_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<AttemptDetails> {
        let attempt = self.owned_attempt(attempt_id, user_id).await?;
        let answers = self.attempts.list_answers(attempt_id).await?;
        Ok(AttemptDetails { attempt, answers })
    }

    pub async fn list_attempts(
        &self,
        user_id: Uuid,
        test_id: Option<Uuid>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<TestAttempt>, i64)> {
        let offset = pagination::page_offset(page, per_page);
        self.attempts
            .list_attempts(user_id, test_id, per_page, offset)
            .await
    }

    async fn owned_attempt(&self, attempt_id: Uuid, user_id: Uuid) -> Result<TestAttempt> {
        let attempt = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or(Error::AttemptNotFound(attempt_id))?;

        if !attempt.is_owned_by(user_id) {
            tracing::warn!(%attempt_id, caller = %user_id, "attempt accessed by non-owner");
            return Err(Error::NotOwner { attempt_id });
        }
        Ok(attempt)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt_id: Uuid,
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub time_taken_seconds: Option<i64>,
}

impl AttemptResult {
    fn from_completed(attempt: &TestAttempt, answers: &[Answer], total_questions: usize) -> Result<Self> {
        let (Some(score), Some(max_score)) = (attempt.score, attempt.max_score) else {
            return Err(Error::Integrity(format!(
                "completed attempt {} has no score",
                attempt.id
            )));
        };

        Ok(Self {
            attempt_id: attempt.id,
            score,
            max_score,
            percentage: percentage(score, max_score),
            correct_answers: answers.iter().filter(|a| a.is_correct).count(),
            total_questions,
            time_taken_seconds: attempt
                .completed_at
                .map(|done| time::elapsed_seconds(attempt.started_at, done)),
        })
    }
}

/// Share of `max_score` earned, in percent, rounded to one decimal.
pub fn percentage(score: i32, max_score: i32) -> f64 {
    if max_score <= 0 {
        return 0.0;
    }
    let raw = score as f64 / max_score as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptDetails {
    #[serde(flatten)]
    pub attempt: TestAttempt,
    pub answers: Vec<Answer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog_store::MockCatalogStore;
    use crate::database::MemoryStore;
    use crate::models::question::{AnswerKey, Question, QuestionDefinition, QuestionKind};
    use crate::models::test::{Test, TestDefinition};
    use chrono::Duration;
    use std::collections::BTreeSet;
    use tokio_test::assert_ok;

    fn multiple_choice(points: i32, key: &[u32]) -> QuestionDefinition {
        QuestionDefinition {
            text: "Pick the vowels".to_string(),
            kind: QuestionKind::MultipleChoice,
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: AnswerKey::Choices(key.iter().copied().collect::<BTreeSet<_>>()),
            points,
        }
    }

    fn open_ended(answer: &str) -> QuestionDefinition {
        QuestionDefinition {
            text: "Capital of France?".to_string(),
            kind: QuestionKind::OpenEnded,
            options: vec![],
            correct_answer: AnswerKey::Text(answer.to_string()),
            points: 1,
        }
    }

    fn definition(questions: Vec<QuestionDefinition>) -> TestDefinition {
        TestDefinition {
            title: "Quiz".to_string(),
            description: None,
            duration_minutes: 30,
            is_active: true,
            questions,
        }
    }

    async fn setup(questions: Vec<QuestionDefinition>) -> (AttemptService, Arc<MemoryStore>, Uuid, Vec<Question>) {
        let store = Arc::new(MemoryStore::new());
        let (test, questions) = store.insert_test(definition(questions)).await.unwrap();
        let service = AttemptService::new(store.clone(), store.clone());
        (service, store, test.id, questions)
    }

    fn selected(indices: &[u32]) -> AnswerPayload {
        AnswerPayload::SelectedOptions(indices.to_vec())
    }

    #[tokio::test]
    async fn start_attempt_creates_in_progress_attempt() {
        let (service, _, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();

        let attempt = service.start_attempt(test_id, user).await.unwrap();

        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert_eq!(attempt.user_id, user);
        assert!(attempt.score.is_none() && attempt.max_score.is_none());

        // Repeated starts are allowed and create distinct attempts.
        let second = service.start_attempt(test_id, user).await.unwrap();
        assert_ne!(attempt.id, second.id);
    }

    #[tokio::test]
    async fn start_attempt_rejects_unknown_and_inactive_tests() {
        let store = Arc::new(MemoryStore::new());
        let mut def = definition(vec![open_ended("Paris")]);
        def.is_active = false;
        let (inactive, _) = store.insert_test(def).await.unwrap();
        let service = AttemptService::new(store.clone(), store.clone());

        let missing = Uuid::new_v4();
        assert!(matches!(
            service.start_attempt(missing, Uuid::new_v4()).await,
            Err(Error::TestNotFound(id)) if id == missing
        ));
        assert!(matches!(
            service.start_attempt(inactive.id, Uuid::new_v4()).await,
            Err(Error::TestInactive(_))
        ));
    }

    #[tokio::test]
    async fn catalog_failures_propagate() {
        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_get_test()
            .returning(|_| Err(Error::Integrity("catalog unavailable".into())));
        let service = AttemptService::new(Arc::new(catalog), Arc::new(MemoryStore::new()));

        let err = service
            .start_attempt(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }

    #[tokio::test]
    async fn submit_grades_multiple_choice_without_partial_credit() {
        let (service, _, test_id, questions) = setup(vec![multiple_choice(2, &[0, 2])]).await;
        let user = Uuid::new_v4();
        let q = &questions[0];

        let first = service.start_attempt(test_id, user).await.unwrap();
        let answer = service
            .submit_answer(first.id, q.id, selected(&[0, 2]), user)
            .await
            .unwrap();
        assert!(answer.is_correct);
        assert_eq!(answer.points_earned, 2);

        let second = service.start_attempt(test_id, user).await.unwrap();
        let answer = service
            .submit_answer(second.id, q.id, selected(&[0]), user)
            .await
            .unwrap();
        assert!(!answer.is_correct);
        assert_eq!(answer.points_earned, 0);
    }

    #[tokio::test]
    async fn submit_grades_open_ended_case_insensitively() {
        let (service, _, test_id, questions) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        let answer = service
            .submit_answer(
                attempt.id,
                questions[0].id,
                AnswerPayload::TextAnswer("  paris  ".into()),
                user,
            )
            .await
            .unwrap();
        assert!(answer.is_correct);
        assert_eq!(answer.points_earned, 1);
    }

    #[tokio::test]
    async fn submit_checks_ownership_before_anything_else() {
        let (service, store, test_id, questions) = setup(vec![open_ended("Paris")]).await;
        let owner = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, owner).await.unwrap();

        let err = service
            .submit_answer(
                attempt.id,
                questions[0].id,
                AnswerPayload::TextAnswer("Paris".into()),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOwner { .. }));
        assert_eq!(store.answer_count(attempt.id).await, 0);

        let err = service
            .submit_answer(
                Uuid::new_v4(),
                questions[0].id,
                AnswerPayload::TextAnswer("Paris".into()),
                owner,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttemptNotFound(_)));
    }

    #[tokio::test]
    async fn submit_rejects_question_from_another_test() {
        let (service, store, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let (_, other_questions) = store
            .insert_test(definition(vec![open_ended("Berlin")]))
            .await
            .unwrap();
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        let err = service
            .submit_answer(
                attempt.id,
                other_questions[0].id,
                AnswerPayload::TextAnswer("Berlin".into()),
                user,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuestionNotInTest { .. }));
    }

    #[tokio::test]
    async fn resubmission_is_rejected_and_first_answer_kept() {
        let (service, store, test_id, questions) = setup(vec![multiple_choice(2, &[0, 2])]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();
        let q = &questions[0];

        assert_ok!(service.submit_answer(attempt.id, q.id, selected(&[0]), user).await);

        // Duplicate wins over a type mismatch in the second payload.
        let err = service
            .submit_answer(attempt.id, q.id, AnswerPayload::TextAnswer("a".into()), user)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAnswer { .. }));

        let err = service
            .submit_answer(attempt.id, q.id, selected(&[0, 2]), user)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAnswer { .. }));

        let details = service.get_attempt(attempt.id, user).await.unwrap();
        assert_eq!(details.answers.len(), 1);
        assert!(!details.answers[0].is_correct);
        assert_eq!(store.answer_count(attempt.id).await, 1);
    }

    #[tokio::test]
    async fn submit_rejects_wrong_payload_shape() {
        let (service, store, test_id, questions) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        let err = service
            .submit_answer(attempt.id, questions[0].id, selected(&[0]), user)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(store.answer_count(attempt.id).await, 0);
    }

    #[tokio::test]
    async fn unsupported_question_kind_is_not_graded_as_wrong() {
        let (service, store, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let odd = Question {
            id: Uuid::new_v4(),
            test_id,
            text: "Match the pairs".to_string(),
            kind: QuestionKind::Other("matching".to_string()),
            options: vec![],
            correct_answer: AnswerKey::Text("x".into()),
            points: 1,
            order_index: 5,
        };
        store.put_question(odd.clone()).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        let err = service
            .submit_answer(attempt.id, odd.id, AnswerPayload::TextAnswer("x".into()), user)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedQuestionType { .. }));
        assert_eq!(store.answer_count(attempt.id).await, 0);
    }

    #[tokio::test]
    async fn finish_scores_answered_questions_against_full_test() {
        let (service, _, test_id, questions) =
            setup(vec![multiple_choice(2, &[0, 2]), open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        service
            .submit_answer(attempt.id, questions[0].id, selected(&[0, 2]), user)
            .await
            .unwrap();

        let result = service.finish_attempt(attempt.id, user).await.unwrap();
        assert_eq!(result.score, 2);
        assert_eq!(result.max_score, 3);
        assert_eq!(result.percentage, 66.7);
        assert_eq!(result.correct_answers, 1);
        assert_eq!(result.total_questions, 2);
        assert!(result.time_taken_seconds.is_some());

        let details = service.get_attempt(attempt.id, user).await.unwrap();
        assert_eq!(details.attempt.status, AttemptStatus::Completed);
        assert!(details.attempt.completed_at.is_some());
    }

    #[tokio::test]
    async fn second_finish_fails_and_keeps_score() {
        let (service, _, test_id, questions) = setup(vec![multiple_choice(2, &[0, 2])]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();
        service
            .submit_answer(attempt.id, questions[0].id, selected(&[0, 2]), user)
            .await
            .unwrap();

        let first = service.finish_attempt(attempt.id, user).await.unwrap();
        let err = service.finish_attempt(attempt.id, user).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyFinalized {
                status: AttemptStatus::Completed,
                ..
            }
        ));

        let details = service.get_attempt(attempt.id, user).await.unwrap();
        assert_eq!(details.attempt.score, Some(first.score));
    }

    #[tokio::test]
    async fn finish_requires_owner() {
        let (service, _, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let attempt = service.start_attempt(test_id, Uuid::new_v4()).await.unwrap();

        assert!(matches!(
            service.finish_attempt(attempt.id, Uuid::new_v4()).await,
            Err(Error::NotOwner { .. })
        ));
        assert!(matches!(
            service.finish_attempt(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(Error::AttemptNotFound(_))
        ));
    }

    #[tokio::test]
    async fn completed_attempt_accepts_no_answers() {
        let (service, store, test_id, questions) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();
        service.finish_attempt(attempt.id, user).await.unwrap();

        let err = service
            .submit_answer(
                attempt.id,
                questions[0].id,
                AnswerPayload::TextAnswer("Paris".into()),
                user,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AttemptFinalized {
                status: AttemptStatus::Completed,
                ..
            }
        ));
        assert_eq!(store.answer_count(attempt.id).await, 0);
    }

    #[tokio::test]
    async fn abandoned_attempt_is_terminal() {
        let (service, _, test_id, questions) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        assert!(matches!(
            service.cancel_attempt(attempt.id, Uuid::new_v4()).await,
            Err(Error::NotOwner { .. })
        ));

        let abandoned = service.cancel_attempt(attempt.id, user).await.unwrap();
        assert_eq!(abandoned.status, AttemptStatus::Abandoned);
        assert!(abandoned.score.is_none());

        assert!(matches!(
            service
                .submit_answer(attempt.id, questions[0].id, AnswerPayload::TextAnswer("Paris".into()), user)
                .await,
            Err(Error::AttemptFinalized {
                status: AttemptStatus::Abandoned,
                ..
            })
        ));
        assert!(matches!(
            service.finish_attempt(attempt.id, user).await,
            Err(Error::AlreadyFinalized {
                status: AttemptStatus::Abandoned,
                ..
            })
        ));
        assert!(matches!(
            service.abandon_attempt(attempt.id).await,
            Err(Error::AlreadyFinalized { .. })
        ));
    }

    #[tokio::test]
    async fn expired_attempts_are_swept() {
        let (service, _, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        let stale = service.start_attempt(test_id, user).await.unwrap();
        let finished = service.start_attempt(test_id, user).await.unwrap();
        service.finish_attempt(finished.id, user).await.unwrap();

        // Not yet past duration (30) + grace (5).
        let early = time::now() + Duration::minutes(20);
        assert_eq!(service.abandon_expired(early, 5).await.unwrap(), 0);

        let late = time::now() + Duration::minutes(36);
        assert_eq!(service.abandon_expired(late, 5).await.unwrap(), 1);

        let details = service.get_attempt(stale.id, user).await.unwrap();
        assert_eq!(details.attempt.status, AttemptStatus::Abandoned);
        let details = service.get_attempt(finished.id, user).await.unwrap();
        assert_eq!(details.attempt.status, AttemptStatus::Completed);
    }

    #[tokio::test]
    async fn sweep_skips_attempts_whose_test_fails_to_load() {
        let store = Arc::new(MemoryStore::new());
        let broken_test = Uuid::new_v4();
        let healthy = Test {
            id: Uuid::new_v4(),
            title: "Quiz".to_string(),
            description: None,
            duration_minutes: 10,
            is_active: true,
            created_at: time::now(),
        };

        let mut catalog = MockCatalogStore::new();
        let found = healthy.clone();
        catalog.expect_get_test().returning(move |id| {
            if id == broken_test {
                Err(Error::Integrity("catalog row unreadable".into()))
            } else {
                Ok(Some(found.clone()))
            }
        });

        let user = Uuid::new_v4();
        let long_ago = time::now() - Duration::hours(2);
        let stuck = store
            .create_attempt(&TestAttempt::begin(broken_test, user, long_ago))
            .await
            .unwrap();
        let expired = store
            .create_attempt(&TestAttempt::begin(healthy.id, user, long_ago))
            .await
            .unwrap();

        let service = AttemptService::new(Arc::new(catalog), store.clone());
        assert_eq!(service.abandon_expired(time::now(), 5).await.unwrap(), 1);

        let expired = store.get_attempt(expired.id).await.unwrap().unwrap();
        assert_eq!(expired.status, AttemptStatus::Abandoned);
        let stuck = store.get_attempt(stuck.id).await.unwrap().unwrap();
        assert_eq!(stuck.status, AttemptStatus::InProgress);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn finish_racing_submissions_scores_exactly_the_committed_answers() {
        let definitions = (0..8).map(|_| open_ended("Paris")).collect();
        let (service, store, test_id, questions) = setup(definitions).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();

        let submissions: Vec<_> = questions
            .iter()
            .map(|q| {
                let service = service.clone();
                let (attempt_id, question_id) = (attempt.id, q.id);
                tokio::spawn(async move {
                    service
                        .submit_answer(attempt_id, question_id, AnswerPayload::TextAnswer("Paris".into()), user)
                        .await
                })
            })
            .collect();
        let finisher = {
            let service = service.clone();
            let attempt_id = attempt.id;
            tokio::spawn(async move { service.finish_attempt(attempt_id, user).await })
        };

        let mut committed = 0;
        for handle in submissions {
            match handle.await.unwrap() {
                Ok(answer) => committed += answer.points_earned,
                Err(Error::AttemptFinalized {
                    status: AttemptStatus::Completed,
                    ..
                }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let result = finisher.await.unwrap().unwrap();
        assert_eq!(result.max_score, 8);
        assert_eq!(result.score, committed);
        assert_eq!(store.answer_count(attempt.id).await as i32, committed);
    }

    #[tokio::test]
    async fn huge_page_yields_empty_list() {
        let (service, _, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        service.start_attempt(test_id, user).await.unwrap();

        let (page, total) = service.list_attempts(user, None, i64::MAX, 100).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_submissions_store_one_answer() {
        let (service, store, test_id, questions) = setup(vec![multiple_choice(2, &[0, 2])]).await;
        let user = Uuid::new_v4();
        let attempt = service.start_attempt(test_id, user).await.unwrap();
        let question_id = questions[0].id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .submit_answer(attempt.id, question_id, selected(&[0, 2]), user)
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(Error::DuplicateAnswer { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(store.answer_count(attempt.id).await, 1);
    }

    #[tokio::test]
    async fn list_attempts_pages_newest_first() {
        let (service, _, test_id, _) = setup(vec![open_ended("Paris")]).await;
        let user = Uuid::new_v4();
        for _ in 0..3 {
            service.start_attempt(test_id, user).await.unwrap();
        }
        service.start_attempt(test_id, Uuid::new_v4()).await.unwrap();

        let (page, total) = service.list_attempts(user, Some(test_id), 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page[0].started_at >= page[1].started_at);

        let (page, _) = service.list_attempts(user, None, 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(3, 3), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
