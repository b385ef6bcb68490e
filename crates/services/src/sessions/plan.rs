use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::Question;

/// Selection result for a session build.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    /// How many valid questions the source offered.
    pub available: usize,
}

impl SessionPlan {
    #[must_use]
    pub fn total(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Picks the questions for one session from everything the source returned.
pub struct SessionBuilder {
    limit: usize,
    shuffle: bool,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
            shuffle: false,
        }
    }

    /// Enable or disable shuffling before selection.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Take up to `limit` questions, shuffled or in source order.
    pub fn build(self, questions: impl IntoIterator<Item = Question>) -> SessionPlan {
        let mut candidates: Vec<Question> = questions.into_iter().collect();
        let available = candidates.len();

        if self.shuffle {
            let mut rng = rng();
            candidates.as_mut_slice().shuffle(&mut rng);
        }
        candidates.truncate(self.limit);

        SessionPlan {
            questions: candidates,
            available,
        }
    }
}
