use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::content::{Layout, Question, QuizDocument, QuizMeta};
use crate::error::QuizError;
use crate::game_logic::AnswerPolicy;
use crate::game_logic::rank::{Rank, score_ratio};
use crate::game_logic::utils::{QuestionCount, is_answer_correct, pick_questions, shuffle};

const MISSING_QUESTION_TEXT: &str = "(no question text)";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting for an answer to the current question.
    Active,
    /// The current question has been scored; waiting for `advance`.
    Revealed,
    Finished,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub selected: String,
    pub is_correct: bool,
    pub correct_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub correct_count: u32,
    pub total: u32,
    pub ratio: f64,
    pub rank: Rank,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Next { index: usize },
    Finished(QuizResult),
}

/// What the front-end needs to draw the current question. Never carries the answer.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub number: usize,
    pub total: usize,
    pub question: String,
    pub options: Vec<String>,
    pub layout: Layout,
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub quiz_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<QuizMeta>,
    pub policy: AnswerPolicy,
    pub phase: SessionPhase,
    pub total_questions: usize,
    pub correct_count: u32,
    pub question: Option<QuestionView>,
    pub selected_answer: Option<String>,
    pub outcome: Option<AnswerOutcome>,
    pub result: Option<QuizResult>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    quiz_id: String,
    meta: Option<QuizMeta>,
    questions: Vec<Question>,
    order: Vec<usize>,
    current_index: usize,
    selected_answer: Option<String>,
    answered: bool,
    correct_count: u32,
    policy: AnswerPolicy,
    last_outcome: Option<AnswerOutcome>,
    result: Option<QuizResult>,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Picks `count` shuffled questions from the document and starts on the first one.
    pub fn new(
        quiz_id: String,
        document: QuizDocument,
        count: QuestionCount,
        policy: AnswerPolicy,
        shuffle_options: bool,
    ) -> Self {
        let mut questions = pick_questions(&document.questions, count);
        if shuffle_options {
            for question in &mut questions {
                question.options = shuffle(&question.options);
            }
        }
        Self::with_questions(quiz_id, document.meta, questions, policy)
    }

    /// Starts a session over `questions` in the given order.
    pub fn with_questions(
        quiz_id: String,
        meta: Option<QuizMeta>,
        questions: Vec<Question>,
        policy: AnswerPolicy,
    ) -> Self {
        // Picking already shuffled, so the order is the identity.
        let order = (0..questions.len()).collect();
        let mut session = Self {
            id: Uuid::new_v4(),
            quiz_id,
            meta,
            questions,
            order,
            current_index: 0,
            selected_answer: None,
            answered: false,
            correct_count: 0,
            policy,
            last_outcome: None,
            result: None,
            started_at: Utc::now(),
        };
        if session.questions.is_empty() {
            session.finish();
        }
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.result.is_some() {
            SessionPhase::Finished
        } else if self.answered {
            SessionPhase::Revealed
        } else {
            SessionPhase::Active
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.result.is_some() {
            return None;
        }
        self.order
            .get(self.current_index)
            .and_then(|&index| self.questions.get(index))
    }

    /// Records `option` as the pending answer. Under the immediate policy the answer is
    /// scored straight away and the outcome returned.
    pub fn select_option(&mut self, option: &str) -> Result<Option<AnswerOutcome>, QuizError> {
        match self.phase() {
            SessionPhase::Finished => return Err(QuizError::SessionFinished),
            SessionPhase::Revealed => return Err(QuizError::AlreadyAnswered),
            SessionPhase::Active => {}
        }

        let chosen = self
            .current_question()
            .and_then(|question| {
                question
                    .options
                    .iter()
                    .find(|candidate| candidate.as_str() == option)
                    .or_else(|| {
                        question
                            .options
                            .iter()
                            .find(|candidate| candidate.trim() == option.trim())
                    })
            })
            .cloned()
            .ok_or_else(|| QuizError::InvalidOption(option.to_string()))?;

        self.selected_answer = Some(chosen);

        match self.policy {
            AnswerPolicy::SubmitThenReveal => Ok(None),
            AnswerPolicy::Immediate => self.submit().map(Some),
        }
    }

    /// Scores the pending answer. Once a question is answered, further submits return the
    /// stored outcome without rescoring.
    pub fn submit(&mut self) -> Result<AnswerOutcome, QuizError> {
        if self.result.is_some() {
            return Err(QuizError::SessionFinished);
        }
        if let Some(outcome) = self.answered.then(|| self.last_outcome.clone()).flatten() {
            return Ok(outcome);
        }

        let selected = self.selected_answer.clone().ok_or(QuizError::NoSelection)?;
        let question = self.current_question().ok_or(QuizError::SessionFinished)?;

        let outcome = AnswerOutcome {
            is_correct: is_answer_correct(&question.answer, &selected),
            selected,
            correct_answer: question.answer.clone(),
            rationale: question.rationale.clone(),
        };

        if outcome.is_correct {
            self.correct_count += 1;
        }
        self.answered = true;
        self.last_outcome = Some(outcome.clone());

        tracing::debug!(
            quiz.id = %self.quiz_id,
            session.id = %self.id,
            question.index = self.current_index,
            correct = outcome.is_correct,
            "Answer submitted"
        );

        Ok(outcome)
    }

    /// Selects `option` (when given) and submits in one step.
    pub fn submit_option(&mut self, option: Option<&str>) -> Result<AnswerOutcome, QuizError> {
        if let (Some(option), SessionPhase::Active) = (option, self.phase()) {
            if let Some(outcome) = self.select_option(option)? {
                return Ok(outcome);
            }
        }
        self.submit()
    }

    pub fn advance(&mut self) -> Result<Progress, QuizError> {
        match self.phase() {
            SessionPhase::Finished => return Err(QuizError::SessionFinished),
            SessionPhase::Active => return Err(QuizError::NotAnswered),
            SessionPhase::Revealed => {}
        }

        self.selected_answer = None;
        self.answered = false;
        self.last_outcome = None;

        if self.current_index + 1 < self.order.len() {
            self.current_index += 1;
            Ok(Progress::Next {
                index: self.current_index,
            })
        } else {
            Ok(Progress::Finished(self.finish()))
        }
    }

    fn finish(&mut self) -> QuizResult {
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let result = QuizResult {
            correct_count: self.correct_count,
            total,
            ratio: score_ratio(self.correct_count, total),
            rank: Rank::from_score(self.correct_count, total),
            finished_at: Utc::now(),
        };
        self.result = Some(result.clone());
        result
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let question = self.current_question().map(|question| QuestionView {
            number: self.current_index + 1,
            total: self.questions.len(),
            question: if question.question.trim().is_empty() {
                MISSING_QUESTION_TEXT.to_string()
            } else {
                question.question.clone()
            },
            options: question.options.clone(),
            layout: question.layout,
        });

        SessionSnapshot {
            session_id: self.id,
            quiz_id: self.quiz_id.clone(),
            meta: self.meta.clone(),
            policy: self.policy,
            phase: self.phase(),
            total_questions: self.questions.len(),
            correct_count: self.correct_count,
            question,
            selected_answer: self.selected_answer.clone(),
            outcome: self.last_outcome.clone(),
            result: self.result.clone(),
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::question;

    fn session(questions: Vec<Question>, policy: AnswerPolicy) -> QuizSession {
        QuizSession::with_questions("capitals".to_string(), None, questions, policy)
    }

    fn two_questions() -> Vec<Question> {
        vec![
            question("First?", &["A", "X"], "A"),
            question("Second?", &["B", "Y"], "B"),
        ]
    }

    #[test]
    fn test_trimmed_answer_is_correct_and_counted_once() {
        let mut quiz = session(
            vec![question("Capital of France?", &["Paris ", "Rome"], "Paris")],
            AnswerPolicy::SubmitThenReveal,
        );

        assert_eq!(quiz.select_option("Paris ").unwrap(), None);
        let outcome = quiz.submit().unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.correct_answer, "Paris");
        assert_eq!(quiz.correct_count(), 1);

        let again = quiz.submit().unwrap();
        assert_eq!(again, outcome);
        assert_eq!(quiz.correct_count(), 1);
        assert_eq!(quiz.phase(), SessionPhase::Revealed);
    }

    #[test]
    fn test_submit_without_selection_is_rejected() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);
        assert_eq!(quiz.submit(), Err(QuizError::NoSelection));
        assert_eq!(quiz.phase(), SessionPhase::Active);
        assert_eq!(quiz.correct_count(), 0);
    }

    #[test]
    fn test_latest_selection_wins() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);
        quiz.select_option("X").unwrap();
        quiz.select_option("A").unwrap();
        assert!(quiz.submit().unwrap().is_correct);
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);
        assert_eq!(
            quiz.select_option("Z"),
            Err(QuizError::InvalidOption("Z".to_string()))
        );
        assert_eq!(quiz.snapshot().selected_answer, None);
    }

    #[test]
    fn test_advance_requires_answer() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);
        assert_eq!(quiz.advance(), Err(QuizError::NotAnswered));

        quiz.select_option("X").unwrap();
        assert_eq!(quiz.advance(), Err(QuizError::NotAnswered));
    }

    #[test]
    fn test_selection_locked_after_reveal() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);
        quiz.select_option("X").unwrap();
        quiz.submit().unwrap();
        assert_eq!(quiz.select_option("A"), Err(QuizError::AlreadyAnswered));
        assert_eq!(quiz.correct_count(), 0);
    }

    #[test]
    fn test_wrong_then_right_finishes_with_rank_b() {
        let mut quiz = session(two_questions(), AnswerPolicy::SubmitThenReveal);

        quiz.select_option("X").unwrap();
        assert!(!quiz.submit().unwrap().is_correct);
        assert_eq!(quiz.advance().unwrap(), Progress::Next { index: 1 });
        assert_eq!(quiz.current_question().unwrap().question, "Second?");

        let outcome = quiz.submit_option(Some("B")).unwrap();
        assert!(outcome.is_correct);

        let Progress::Finished(result) = quiz.advance().unwrap() else {
            panic!("expected the session to finish");
        };
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.total, 2);
        assert_eq!(result.ratio, 0.5);
        assert_eq!(result.rank, Rank::B);
        assert_eq!(quiz.phase(), SessionPhase::Finished);
        assert!(quiz.current_question().is_none());
    }

    #[test]
    fn test_finished_session_rejects_commands() {
        let mut quiz = session(
            vec![question("Only?", &["yes"], "yes")],
            AnswerPolicy::SubmitThenReveal,
        );
        quiz.submit_option(Some("yes")).unwrap();
        quiz.advance().unwrap();

        assert_eq!(quiz.select_option("yes"), Err(QuizError::SessionFinished));
        assert_eq!(quiz.submit(), Err(QuizError::SessionFinished));
        assert_eq!(quiz.advance(), Err(QuizError::SessionFinished));
        assert_eq!(quiz.result().unwrap().rank, Rank::S);
    }

    #[test]
    fn test_immediate_policy_scores_on_select() {
        let mut quiz = session(two_questions(), AnswerPolicy::Immediate);

        let outcome = quiz.select_option("A").unwrap().unwrap();
        assert!(outcome.is_correct);
        assert_eq!(quiz.phase(), SessionPhase::Revealed);
        assert_eq!(quiz.select_option("X"), Err(QuizError::AlreadyAnswered));
        assert_eq!(quiz.correct_count(), 1);
    }

    #[test]
    fn test_snapshot_hides_answer_until_revealed() {
        let mut questions = two_questions();
        questions[0].rationale = Some("Because A".to_string());
        let mut quiz = session(questions, AnswerPolicy::SubmitThenReveal);

        let before = serde_json::to_value(quiz.snapshot()).unwrap();
        assert_eq!(before["phase"], "active");
        assert_eq!(before["question"]["number"], 1);
        assert!(before["question"].get("answer").is_none());
        assert!(before["outcome"].is_null());

        quiz.submit_option(Some("X")).unwrap();
        let after = serde_json::to_value(quiz.snapshot()).unwrap();
        assert_eq!(after["phase"], "revealed");
        assert_eq!(after["outcome"]["correct_answer"], "A");
        assert_eq!(after["outcome"]["rationale"], "Because A");
    }

    #[test]
    fn test_snapshot_placeholder_for_blank_question() {
        let quiz = session(
            vec![question("  ", &["a"], "a")],
            AnswerPolicy::SubmitThenReveal,
        );
        assert_eq!(
            quiz.snapshot().question.unwrap().question,
            MISSING_QUESTION_TEXT
        );
    }

    #[test]
    fn test_empty_session_finishes_immediately() {
        let quiz = session(Vec::new(), AnswerPolicy::SubmitThenReveal);
        assert_eq!(quiz.phase(), SessionPhase::Finished);
        assert_eq!(quiz.result().unwrap().rank, Rank::C);
    }

    #[test]
    fn test_new_picks_subset_and_keeps_options() {
        let pool: Vec<Question> = (0..12)
            .map(|i| question(&format!("q{i}"), &["a", "b", "c"], "a"))
            .collect();
        let document = QuizDocument {
            meta: None,
            questions: pool,
        };

        let quiz = QuizSession::new(
            "pool".to_string(),
            document,
            QuestionCount::Limit(5),
            AnswerPolicy::Immediate,
            true,
        );

        assert_eq!(quiz.total(), 5);
        let mut options = quiz.current_question().unwrap().options.clone();
        options.sort();
        assert_eq!(options, vec!["a", "b", "c"]);
    }
}
