//! Recovery strategy selection from a learner's difficulty topics.
//!
//! Pure and deterministic: the same difficulty list and subject name
//! always produce the same strategy, which makes this the easiest part
//! of the pipeline to unit test.

use std::fmt;

use crate::models::{DifficultyTopic, MAX_RECOVERY_TOPICS};

/// Recovery posture derived from the number of open difficulties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// No difficulties: challenge the learner with advanced content.
    Mastery,
    /// One or two difficulties: mix focused and general content to avoid
    /// saturating the learner with a single topic.
    Hybrid,
    /// Three or more difficulties: distribute everything across them.
    Focused,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Mastery => "mastery",
            StrategyKind::Hybrid => "hybrid",
            StrategyKind::Focused => "focused",
        };
        f.write_str(name)
    }
}

/// Retrieval queries and generation instructions for a recovery session.
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    pub queries: Vec<String>,
    pub instructions: String,
    /// Share of items that target the difficulty topics directly (0-100).
    pub focus_percentage: u8,
    pub kind: StrategyKind,
}

/// Choose the recovery strategy for the given unresolved difficulties.
///
/// Callers pass topics ordered by severity (level descending); anything
/// beyond [`MAX_RECOVERY_TOPICS`] is ignored to avoid diluting the
/// session.
pub fn select_strategy(difficulties: &[DifficultyTopic], subject: &str) -> RecoveryStrategy {
    let topics: Vec<&DifficultyTopic> =
        difficulties.iter().take(MAX_RECOVERY_TOPICS).collect();

    match topics.len() {
        0 => mastery_strategy(subject),
        1 | 2 => hybrid_strategy(&topics, subject),
        _ => focused_strategy(&topics),
    }
}

fn mastery_strategy(subject: &str) -> RecoveryStrategy {
    RecoveryStrategy {
        queries: vec![
            format!("advanced concepts in {subject}"),
            "complex case studies".to_string(),
            "differential diagnosis".to_string(),
        ],
        instructions: format!(
            "The learner has no recorded difficulties in {subject}, which \
             indicates command of the basic and intermediate material.\n\
             Generate HIGH-COMPLEXITY items: case studies, differential \
             reasoning, atypical situations and correlations across \
             multiple concepts. Favor critical reasoning over recall, and \
             never repeat the same question in a reworded form."
        ),
        focus_percentage: 0,
        kind: StrategyKind::Mastery,
    }
}

fn hybrid_strategy(topics: &[&DifficultyTopic], subject: &str) -> RecoveryStrategy {
    let primary = &topics[0].topic;
    let secondary = topics.get(1).map(|t| t.topic.as_str());

    let mut queries = vec![primary.clone()];
    if let Some(secondary) = secondary {
        queries.push(secondary.to_string());
    }
    queries.push(format!("concepts related to {primary}"));
    queries.push(format!("pathophysiology of {primary}"));
    queries.push(format!("clinical applications in {subject}"));

    let split = match secondary {
        Some(secondary) => format!(
            "40% of the items must focus specifically on \"{primary}\", \
             20% on \"{secondary}\", and the remaining 40% on related \
             topics and general context."
        ),
        None => format!(
            "40% of the items must focus specifically on \"{primary}\"; \
             the remaining 60% should cover related topics and general \
             context."
        ),
    };

    RecoveryStrategy {
        queries,
        instructions: format!(
            "The learner showed a specific difficulty with \"{primary}\"\
             {}.\n{split}\nVary the angle of each item (mechanism, \
             diagnosis, treatment, contraindication) and make every item \
             address a DIFFERENT aspect: close the gap without causing \
             fatigue through repetition.",
            secondary
                .map(|s| format!(" and \"{s}\""))
                .unwrap_or_default(),
        ),
        focus_percentage: 40,
        kind: StrategyKind::Hybrid,
    }
}

fn focused_strategy(topics: &[&DifficultyTopic]) -> RecoveryStrategy {
    let names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
    let numbered: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {name}", i + 1))
        .collect();

    RecoveryStrategy {
        queries: names.iter().map(|n| n.to_string()).collect(),
        instructions: format!(
            "The learner urgently needs to review these {} topics:\n{}\n\
             Distribute the items EVENLY across all topics, covering \
             definition, application, differential reasoning and \
             management for each. Where natural, build items that connect \
             two topics from the list. Be educational in every \
             justification: explain the why and the how, not only the \
             what.",
            names.len(),
            numbered.join("\n"),
        ),
        focus_percentage: 100,
        kind: StrategyKind::Focused,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str, level: u32) -> DifficultyTopic {
        let mut t = DifficultyTopic::new("u1", "p1", name);
        t.level = level;
        t
    }

    #[test]
    fn test_no_difficulties_is_mastery() {
        let strategy = select_strategy(&[], "Cardiology");
        assert_eq!(strategy.kind, StrategyKind::Mastery);
        assert_eq!(strategy.focus_percentage, 0);
        assert_eq!(strategy.queries.len(), 3);
        assert!(strategy.queries[0].contains("Cardiology"));
    }

    #[test]
    fn test_one_difficulty_is_hybrid() {
        let topics = vec![topic("arrhythmias", 2)];
        let strategy = select_strategy(&topics, "Cardiology");
        assert_eq!(strategy.kind, StrategyKind::Hybrid);
        assert_eq!(strategy.focus_percentage, 40);
        assert!(strategy.queries.contains(&"arrhythmias".to_string()));
        assert!(
            strategy
                .queries
                .contains(&"pathophysiology of arrhythmias".to_string())
        );
        assert!(strategy.instructions.contains("60%"));
    }

    #[test]
    fn test_two_difficulties_hybrid_split() {
        let topics = vec![topic("arrhythmias", 3), topic("heart failure", 1)];
        let strategy = select_strategy(&topics, "Cardiology");
        assert_eq!(strategy.kind, StrategyKind::Hybrid);
        assert_eq!(strategy.focus_percentage, 40);
        assert_eq!(strategy.queries.len(), 5);
        assert!(strategy.instructions.contains("20% on \"heart failure\""));
    }

    #[test]
    fn test_four_difficulties_is_focused() {
        let topics: Vec<DifficultyTopic> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| topic(name, 1))
            .collect();
        let strategy = select_strategy(&topics, "Cardiology");
        assert_eq!(strategy.kind, StrategyKind::Focused);
        assert_eq!(strategy.focus_percentage, 100);
        assert_eq!(strategy.queries, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_topics_capped_at_five() {
        let topics: Vec<DifficultyTopic> = (0..8).map(|i| topic(&format!("t{i}"), 1)).collect();
        let strategy = select_strategy(&topics, "Biology");
        assert_eq!(strategy.queries.len(), 5);
    }

    #[test]
    fn test_deterministic() {
        let topics = vec![topic("osmosis", 2), topic("diffusion", 1)];
        let a = select_strategy(&topics, "Biology");
        let b = select_strategy(&topics, "Biology");
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.focus_percentage, b.focus_percentage);
        assert_eq!(a.queries, b.queries);
        assert_eq!(a.instructions, b.instructions);
    }
}
