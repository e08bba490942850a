use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade for a completed session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    S,
    A,
    B,
    C,
}

impl Rank {
    /// Thresholds are inclusive lower bounds on the correct/total ratio.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.90 {
            Rank::S
        } else if ratio >= 0.75 {
            Rank::A
        } else if ratio >= 0.50 {
            Rank::B
        } else {
            Rank::C
        }
    }

    pub fn from_score(correct: u32, total: u32) -> Self {
        Self::from_ratio(score_ratio(correct, total))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `correct / total`, or 0 for an empty session.
pub fn score_ratio(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_thresholds() {
        assert_eq!(Rank::from_score(10, 10), Rank::S);
        assert_eq!(Rank::from_score(9, 10), Rank::S);
        assert_eq!(Rank::from_score(8, 10), Rank::A);
        assert_eq!(Rank::from_score(3, 4), Rank::A);
        assert_eq!(Rank::from_score(7, 10), Rank::B);
        assert_eq!(Rank::from_score(5, 10), Rank::B);
        assert_eq!(Rank::from_score(4, 10), Rank::C);
        assert_eq!(Rank::from_score(0, 10), Rank::C);
    }

    #[test]
    fn test_empty_session_is_rank_c() {
        assert_eq!(score_ratio(0, 0), 0.0);
        assert_eq!(Rank::from_score(0, 0), Rank::C);
    }

    #[test]
    fn test_rank_serializes_as_bare_letter() {
        assert_eq!(serde_json::to_string(&Rank::A).unwrap(), "\"A\"");
        assert_eq!(serde_json::from_str::<Rank>("\"S\"").unwrap(), Rank::S);
        assert_eq!(Rank::B.to_string(), "B");
    }
}
