use serde::{Deserialize, Serialize};

pub mod rank;
pub mod session;
pub mod utils;

pub use rank::Rank;
pub use session::{Progress, QuizSession, SessionPhase, SessionSnapshot};
pub use utils::QuestionCount;

/// How a chosen option turns into a scored answer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
    /// Selecting only records a pending answer; `submit` scores and reveals it.
    #[default]
    SubmitThenReveal,
    /// Selecting an option scores and reveals it at once.
    Immediate,
}
