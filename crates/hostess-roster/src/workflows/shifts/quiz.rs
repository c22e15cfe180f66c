use std::collections::HashMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::{QuestionId, QuizQuestion, UserId};
use super::error::{ShiftServiceError, ValidationError};
use super::repository::{RepositoryError, RosterStore};
use super::session::Session;

/// Shuffle question order and, independently, every answer list.
///
/// The correct index follows its answer, so duplicate answer texts stay unambiguous.
pub fn shuffle<R>(mut questions: Vec<QuizQuestion>, rng: &mut R) -> Vec<QuizQuestion>
where
    R: Rng + ?Sized,
{
    questions.shuffle(rng);
    for question in &mut questions {
        let mut order: Vec<usize> = (0..question.answers.len()).collect();
        order.shuffle(rng);

        let answers = order
            .iter()
            .map(|&original| question.answers[original].clone())
            .collect();
        let correct = order
            .iter()
            .position(|&original| original == question.correct_answer_index)
            .unwrap_or(question.correct_answer_index);

        question.answers = answers;
        question.correct_answer_index = correct;
    }
    questions
}

/// Number of questions whose chosen index equals the correct one.
pub fn score(questions: &[QuizQuestion], answers: &HashMap<QuestionId, usize>) -> u32 {
    questions
        .iter()
        .filter(|question| answers.get(&question.id) == Some(&question.correct_answer_index))
        .count() as u32
}

/// State of one quiz run; dropped on submit or when the user walks away.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    questions: Vec<QuizQuestion>,
    answers: HashMap<QuestionId, usize>,
    position: usize,
}

impl QuizAttempt {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self {
            questions,
            answers: HashMap::new(),
            position: 0,
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.position)
    }

    pub fn answer(&mut self, question_id: QuestionId, answer_index: usize) {
        self.answers.insert(question_id, answer_index);
    }

    /// Move to the next question; `false` once the last one was passed.
    pub fn advance(&mut self) -> bool {
        if self.position < self.questions.len() {
            self.position += 1;
        }
        self.position < self.questions.len()
    }

    pub fn correct(&self) -> u32 {
        score(&self.questions, &self.answers)
    }

    pub fn total(&self) -> u32 {
        self.questions.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub fn validate_question(draft: &QuestionDraft) -> Result<(), ValidationError> {
    if draft.question.trim().is_empty() {
        return Err(ValidationError::Empty { field: "question" });
    }
    if draft.answers.iter().any(|answer| answer.trim().is_empty()) {
        return Err(ValidationError::Empty { field: "answer" });
    }
    if draft.answers.len() < 2 {
        return Err(ValidationError::TooFewAnswers);
    }
    if draft.correct_answer_index >= draft.answers.len() {
        return Err(ValidationError::CorrectAnswerOutOfRange {
            index: draft.correct_answer_index,
            answers: draft.answers.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub high_score: u32,
    pub new_record: bool,
}

pub struct QuizService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> QuizService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn start(&self) -> Result<QuizAttempt, ShiftServiceError> {
        let questions = self.store.questions().await?;
        let shuffled = shuffle(questions, &mut rand::thread_rng());
        Ok(QuizAttempt::new(shuffled))
    }

    pub async fn submit(
        &self,
        session: &Session,
        attempt: QuizAttempt,
    ) -> Result<QuizResult, ShiftServiceError> {
        self.record(session.user_id, attempt.correct(), attempt.total())
            .await
    }

    /// Persist the result only when it beats the stored high score. The total
    /// must match the current question bank.
    pub async fn record(
        &self,
        user_id: UserId,
        score: u32,
        total: u32,
    ) -> Result<QuizResult, ShiftServiceError> {
        if score > total {
            return Err(ValidationError::ScoreAboveTotal { score, total }.into());
        }
        let questions = self.question_count().await?;
        if usize::try_from(total).map_or(true, |total| total != questions) {
            return Err(ValidationError::QuizTotalMismatch { total, questions }.into());
        }

        let mut profile = self
            .store
            .fetch_profile(user_id)
            .await?
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))?;

        if score <= profile.quiz_score {
            return Ok(QuizResult {
                score,
                total,
                high_score: profile.quiz_score,
                new_record: false,
            });
        }

        profile.quiz_score = score;
        profile.quiz_total = total;
        self.store.update_profile(profile).await?;
        info!(user_id = %user_id, score, total, "quiz high score recorded");

        Ok(QuizResult {
            score,
            total,
            high_score: score,
            new_record: true,
        })
    }

    pub async fn question_count(&self) -> Result<usize, ShiftServiceError> {
        Ok(self.store.questions().await?.len())
    }

    pub async fn questions(&self, session: &Session) -> Result<Vec<QuizQuestion>, ShiftServiceError> {
        session.require_admin("editing the quiz")?;
        Ok(self.store.questions().await?)
    }

    pub async fn create_question(
        &self,
        session: &Session,
        draft: QuestionDraft,
    ) -> Result<QuizQuestion, ShiftServiceError> {
        session.require_admin("editing the quiz")?;
        validate_question(&draft)?;
        let question = QuizQuestion {
            id: QuestionId::new(),
            question: draft.question.trim().to_string(),
            answers: draft.answers,
            correct_answer_index: draft.correct_answer_index,
            image_url: draft.image_url,
            created_at: self.clock.now(),
        };
        Ok(self.store.insert_question(question).await?)
    }

    pub async fn update_question(
        &self,
        session: &Session,
        id: QuestionId,
        draft: QuestionDraft,
    ) -> Result<QuizQuestion, ShiftServiceError> {
        session.require_admin("editing the quiz")?;
        validate_question(&draft)?;
        let mut question = self
            .store
            .questions()
            .await?
            .into_iter()
            .find(|question| question.id == id)
            .ok_or(ShiftServiceError::Repository(RepositoryError::NotFound))?;
        question.question = draft.question.trim().to_string();
        question.answers = draft.answers;
        question.correct_answer_index = draft.correct_answer_index;
        question.image_url = draft.image_url;
        self.store.update_question(question.clone()).await?;
        Ok(question)
    }

    pub async fn delete_question(
        &self,
        session: &Session,
        id: QuestionId,
    ) -> Result<(), ShiftServiceError> {
        session.require_admin("editing the quiz")?;
        self.store.delete_question(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(text: &str, answers: &[&str], correct: usize) -> QuizQuestion {
        QuizQuestion {
            id: QuestionId::new(),
            question: text.to_string(),
            answers: answers.iter().map(|a| a.to_string()).collect(),
            correct_answer_index: correct,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn bank() -> Vec<QuizQuestion> {
        vec![
            question("Dress code?", &["Black", "White", "Red", "Blue"], 0),
            question("Arrive?", &["On time", "30 min early", "Late"], 1),
            question("Phones?", &["Allowed", "Silent", "Off", "Loud", "Away"], 2),
        ]
    }

    #[test]
    fn shuffled_index_still_points_at_correct_text() {
        let original = bank();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let shuffled = shuffle(original.clone(), &mut rng);
            assert_eq!(shuffled.len(), original.len());
            for question in &shuffled {
                let source = original
                    .iter()
                    .find(|candidate| candidate.id == question.id)
                    .expect("question survives shuffle");
                assert_eq!(
                    question.answers[question.correct_answer_index],
                    source.answers[source.correct_answer_index]
                );
                let mut sorted = question.answers.clone();
                sorted.sort();
                let mut expected = source.answers.clone();
                expected.sort();
                assert_eq!(sorted, expected);
            }
        }
    }

    #[test]
    fn duplicate_answer_texts_keep_their_position() {
        let original = vec![question("Twice?", &["Yes", "Yes", "No"], 1)];
        let mut rng = StdRng::seed_from_u64(7);
        let shuffled = shuffle(original, &mut rng);
        assert_eq!(shuffled[0].answers[shuffled[0].correct_answer_index], "Yes");
    }

    #[test]
    fn attempt_scores_only_matching_answers() {
        let questions = bank();
        let mut attempt = QuizAttempt::new(questions.clone());
        attempt.answer(questions[0].id, 0);
        attempt.answer(questions[1].id, 0);
        attempt.answer(questions[2].id, 2);
        assert_eq!(attempt.correct(), 2);
        assert_eq!(attempt.total(), 3);

        assert!(attempt.advance());
        assert!(attempt.advance());
        assert!(!attempt.advance());
        assert!(attempt.current().is_none());
    }

    #[test]
    fn question_validation() {
        let draft = QuestionDraft {
            question: "Where?".to_string(),
            answers: vec!["Here".to_string()],
            correct_answer_index: 0,
            image_url: None,
        };
        assert_eq!(validate_question(&draft), Err(ValidationError::TooFewAnswers));

        let out_of_range = QuestionDraft {
            answers: vec!["Here".to_string(), "There".to_string()],
            correct_answer_index: 2,
            ..draft
        };
        assert_eq!(
            validate_question(&out_of_range),
            Err(ValidationError::CorrectAnswerOutOfRange {
                index: 2,
                answers: 2
            })
        );
    }
}
