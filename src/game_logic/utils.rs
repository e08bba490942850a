use rand::Rng;
use rand::thread_rng;

/// Number of questions used when the `n` parameter is absent or unusable.
pub const DEFAULT_QUESTION_COUNT: usize = 10;

/// Returns a uniformly shuffled copy of `items`, leaving the input untouched.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut thread_rng())
}

/// Fisher-Yates shuffle on a copy, walking from the last index down to 1.
///
/// # Arguments
///
/// * `items`: The sequence to permute.
/// * `rng`: Random source; every one of the `n!` orderings is equally likely
///   provided the source is uniform.
///
/// # Returns
///
/// A new `Vec` holding the same elements in permuted order.
pub fn shuffle_with<T: Clone, R: Rng>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

/// How many questions a session should draw from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCount {
    All,
    Limit(usize),
}

impl QuestionCount {
    /// Parses the `n` query parameter.
    ///
    /// The exact token `all` selects the whole pool. Anything else is read as a leading
    /// integer; absent, unparsable or zero values fall back to `default_count`, negatives
    /// clamp to 1.
    pub fn parse(raw: Option<&str>, default_count: usize) -> Self {
        let fallback = QuestionCount::Limit(default_count.max(1));
        let Some(raw) = raw.map(str::trim) else {
            return fallback;
        };

        if raw == "all" {
            return QuestionCount::All;
        }

        match parse_leading_integer(raw) {
            Some(0) | None => fallback,
            Some(n) if n < 0 => QuestionCount::Limit(1),
            Some(n) => QuestionCount::Limit(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    /// Resolves the count against a pool of `available` questions.
    pub fn resolve(self, available: usize) -> usize {
        match self {
            QuestionCount::All => available,
            QuestionCount::Limit(n) => n.min(available),
        }
    }
}

// Optional sign followed by digits; trailing characters are ignored ("12abc" -> 12).
fn parse_leading_integer(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Shuffles the pool and keeps the first `count` entries.
pub fn pick_questions<T: Clone>(pool: &[T], count: QuestionCount) -> Vec<T> {
    let mut picked = shuffle(pool);
    picked.truncate(count.resolve(pool.len()));
    picked
}

/// Judges a chosen option against the stored answer.
///
/// Surrounding whitespace is ignored on both sides; everything else, including case and
/// inner markup, must match exactly.
pub fn is_answer_correct(correct_answer: &str, selected: &str) -> bool {
    correct_answer.trim() == selected.trim()
}
