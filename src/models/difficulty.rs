use serde::{Deserialize, Serialize};

/// Consecutive correct answers required before a difficulty auto-resolves.
pub const AUTO_RESOLVE_THRESHOLD: u32 = 3;

/// Maximum topics fed to the recovery strategy, ordered by severity.
pub const MAX_RECOVERY_TOPICS: usize = 5;

/// A topic a learner has struggled with.
///
/// Created lazily on the first miss (level 1); repeated misses raise the
/// level and reset the streak. Soft-resolved, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyTopic {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub topic: String,
    pub level: u32,
    pub resolved: bool,
    pub consecutive_correct: u32,
}

/// What happened when an answer was applied to a difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Correct answer, streak advanced but below the threshold.
    Progress { streak: u32 },
    /// Incorrect answer, streak reset to zero.
    StreakReset,
    /// Streak reached the threshold; the topic is now resolved.
    AutoResolved,
}

impl DifficultyTopic {
    pub fn new(user_id: &str, project_id: &str, topic: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            topic: topic.trim().to_string(),
            level: 1,
            resolved: false,
            consecutive_correct: 0,
        }
    }

    /// Record a repeated miss: severity rises, any streak is lost.
    pub fn register_miss(&mut self) {
        self.level += 1;
        self.consecutive_correct = 0;
        self.resolved = false;
    }

    /// Apply a quiz/flashcard answer and auto-resolve at the threshold.
    pub fn apply_answer(&mut self, correct: bool) -> AnswerOutcome {
        if !correct {
            self.consecutive_correct = 0;
            return AnswerOutcome::StreakReset;
        }

        self.consecutive_correct += 1;
        if self.consecutive_correct >= AUTO_RESOLVE_THRESHOLD {
            self.resolved = true;
            AnswerOutcome::AutoResolved
        } else {
            AnswerOutcome::Progress {
                streak: self.consecutive_correct,
            }
        }
    }

    /// Manually mark the topic resolved.
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_starts_at_level_one() {
        let topic = DifficultyTopic::new("u1", "p1", "  cell membranes ");
        assert_eq!(topic.level, 1);
        assert_eq!(topic.topic, "cell membranes");
        assert!(!topic.resolved);
        assert_eq!(topic.consecutive_correct, 0);
    }

    #[test]
    fn test_miss_raises_level_and_resets_streak() {
        let mut topic = DifficultyTopic::new("u1", "p1", "osmosis");
        topic.apply_answer(true);
        topic.register_miss();
        assert_eq!(topic.level, 2);
        assert_eq!(topic.consecutive_correct, 0);
    }

    #[test]
    fn test_auto_resolve_after_threshold() {
        let mut topic = DifficultyTopic::new("u1", "p1", "osmosis");
        assert_eq!(
            topic.apply_answer(true),
            AnswerOutcome::Progress { streak: 1 }
        );
        assert_eq!(
            topic.apply_answer(true),
            AnswerOutcome::Progress { streak: 2 }
        );
        assert_eq!(topic.apply_answer(true), AnswerOutcome::AutoResolved);
        assert!(topic.resolved);
    }

    #[test]
    fn test_incorrect_answer_resets_streak() {
        let mut topic = DifficultyTopic::new("u1", "p1", "osmosis");
        topic.apply_answer(true);
        topic.apply_answer(true);
        assert_eq!(topic.apply_answer(false), AnswerOutcome::StreakReset);
        assert_eq!(topic.consecutive_correct, 0);
        assert!(!topic.resolved);
    }
}
