use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::attempt_store::{AttemptStore, InsertAnswerOutcome, TransitionOutcome};
use crate::database::catalog_store::CatalogStore;
use crate::error::Result;
use crate::models::answer::Answer;
use crate::models::question::Question;
use crate::models::test::{Test, TestDefinition};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};
use crate::services::validation_service::ValidationService;
use crate::utils::time;

#[derive(Default)]
struct MemoryState {
    tests: HashMap<Uuid, Test>,
    questions: HashMap<Uuid, Question>,
    attempts: HashMap<Uuid, TestAttempt>,
    answers: HashMap<(Uuid, Uuid), Answer>,
}

/// Process-local catalog and attempt storage. Each operation runs under one
/// lock, which gives the same atomicity as the Postgres row locks.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a test definition, returning the stored test and
    /// its questions in order.
    pub async fn insert_test(&self, definition: TestDefinition) -> Result<(Test, Vec<Question>)> {
        ValidationService::ensure_valid_test(&definition)?;

        let test = Test {
            id: Uuid::new_v4(),
            title: definition.title,
            description: definition.description,
            duration_minutes: definition.duration_minutes,
            is_active: definition.is_active,
            created_at: time::now(),
        };
        let questions: Vec<Question> = definition
            .questions
            .into_iter()
            .enumerate()
            .map(|(idx, def)| Question::from_definition(test.id, idx as i32, def))
            .collect();

        let mut state = self.state.lock().await;
        state.tests.insert(test.id, test.clone());
        for question in &questions {
            state.questions.insert(question.id, question.clone());
        }
        Ok((test, questions))
    }

    /// Stores a question as-is, without definition checks. Lets callers load
    /// catalog data that was written by another system.
    pub async fn put_question(&self, question: Question) {
        self.state
            .lock()
            .await
            .questions
            .insert(question.id, question);
    }

    async fn tests_newest_first<F>(&self, keep: F) -> Vec<Test>
    where
        F: Fn(&Test) -> bool,
    {
        let state = self.state.lock().await;
        let mut tests: Vec<Test> = state.tests.values().filter(|t| keep(t)).cloned().collect();
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        tests
    }

    pub async fn answer_count(&self, attempt_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .answers
            .keys()
            .filter(|(attempt, _)| *attempt == attempt_id)
            .count()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_test(&self, test_id: Uuid) -> Result<Option<Test>> {
        Ok(self.state.lock().await.tests.get(&test_id).cloned())
    }

    async fn get_question(&self, question_id: Uuid) -> Result<Option<Question>> {
        Ok(self.state.lock().await.questions.get(&question_id).cloned())
    }

    async fn list_questions(&self, test_id: Uuid) -> Result<Vec<Question>> {
        let state = self.state.lock().await;
        let mut questions: Vec<Question> = state
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        Ok(questions)
    }

    async fn list_tests(&self, limit: i64, offset: i64) -> Result<(Vec<Test>, i64)> {
        let tests = self.tests_newest_first(|_| true).await;
        let total = tests.len() as i64;
        let page = tests
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn search_tests(&self, title: &str, limit: i64) -> Result<Vec<Test>> {
        let needle = title.to_lowercase();
        let mut tests = self
            .tests_newest_first(|t| t.title.to_lowercase().contains(&needle))
            .await;
        tests.truncate(limit.max(0) as usize);
        Ok(tests)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create_attempt(&self, attempt: &TestAttempt) -> Result<TestAttempt> {
        let mut state = self.state.lock().await;
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt.clone())
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Option<TestAttempt>> {
        Ok(self.state.lock().await.attempts.get(&attempt_id).cloned())
    }

    async fn list_attempts(
        &self,
        user_id: Uuid,
        test_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TestAttempt>, i64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<TestAttempt> = state
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && test_id.map_or(true, |t| a.test_id == t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_in_progress(&self) -> Result<Vec<TestAttempt>> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.status == AttemptStatus::InProgress)
            .cloned()
            .collect())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let state = self.state.lock().await;
        let mut answers: Vec<Answer> = state
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.answered_at);
        Ok(answers)
    }

    async fn find_answer(&self, attempt_id: Uuid, question_id: Uuid) -> Result<Option<Answer>> {
        Ok(self
            .state
            .lock()
            .await
            .answers
            .get(&(attempt_id, question_id))
            .cloned())
    }

    async fn insert_answer_if_absent(&self, answer: &Answer) -> Result<InsertAnswerOutcome> {
        let mut state = self.state.lock().await;

        let Some(attempt) = state.attempts.get(&answer.attempt_id) else {
            return Ok(InsertAnswerOutcome::AttemptMissing);
        };
        if attempt.status != AttemptStatus::InProgress {
            return Ok(InsertAnswerOutcome::NotInProgress(attempt.status));
        }

        let key = (answer.attempt_id, answer.question_id);
        if state.answers.contains_key(&key) {
            return Ok(InsertAnswerOutcome::Duplicate);
        }
        state.answers.insert(key, answer.clone());
        Ok(InsertAnswerOutcome::Inserted(answer.clone()))
    }

    async fn complete_attempt(
        &self,
        attempt_id: Uuid,
        max_score: i32,
        completed_at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().await;

        let score: i32 = state
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .map(|a| a.points_earned)
            .sum();

        let Some(attempt) = state.attempts.get_mut(&attempt_id) else {
            return Ok(TransitionOutcome::AttemptMissing);
        };
        if attempt.status.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(attempt.status));
        }

        attempt.status = AttemptStatus::Completed;
        attempt.score = Some(score);
        attempt.max_score = Some(max_score);
        attempt.completed_at = Some(completed_at);
        Ok(TransitionOutcome::Transitioned(attempt.clone()))
    }

    async fn abandon_attempt(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<TransitionOutcome> {
        let mut state = self.state.lock().await;

        let Some(attempt) = state.attempts.get_mut(&attempt_id) else {
            return Ok(TransitionOutcome::AttemptMissing);
        };
        if attempt.status.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(attempt.status));
        }

        attempt.status = AttemptStatus::Abandoned;
        attempt.completed_at = Some(at);
        Ok(TransitionOutcome::Transitioned(attempt.clone()))
    }
}
