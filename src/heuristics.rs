//! Topic and difficulty inference for converted items.
//!
//! Both are rough, keyword- and length-based guesses, not scored models.
//! They sit behind small traits so the converter can take a different
//! strategy without touching the conversion walk.

use crate::models::{Area, Difficulty};

/// Assigns a free-text topic label to a question.
pub trait TopicClassifier: Send + Sync {
    fn classify(&self, text: &str, area: Area) -> String;
}

/// Estimates how hard a question is.
pub trait DifficultyEstimator: Send + Sync {
    fn estimate(&self, text: &str, alternative_count: usize) -> Difficulty;
}

/// Keyword lists per area. The first matching entry wins; no match yields
/// the area's generic label.
const CN_TOPICS: &[(&[&str], &str)] = &[
    (&["química", "quimica"], "Química"),
    (&["física", "fisica"], "Física"),
    (&["biologia"], "Biologia"),
];

const CH_TOPICS: &[(&[&str], &str)] = &[
    (&["história", "historia"], "História"),
    (&["geografia"], "Geografia"),
    (&["filosofia"], "Filosofia"),
    (&["sociologia"], "Sociologia"),
];

const LC_TOPICS: &[(&[&str], &str)] = &[
    (&["literatura"], "Literatura"),
    (&["gramática", "gramatica"], "Gramática"),
    (&["espanhol"], "Espanhol"),
    (&["inglês", "ingles"], "Inglês"),
];

const MT_TOPICS: &[(&[&str], &str)] = &[
    (&["álgebra", "algebra"], "Álgebra"),
    (&["geometria"], "Geometria"),
    (&["estatística", "estatistica"], "Estatística"),
];

/// Substring match over the lower-cased body.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordTopics;

impl KeywordTopics {
    fn table(area: Area) -> (&'static [(&'static [&'static str], &'static str)], &'static str) {
        match area {
            Area::NaturalSciences => (CN_TOPICS, "Ciências da Natureza"),
            Area::HumanSciences => (CH_TOPICS, "Ciências Humanas"),
            Area::Languages => (LC_TOPICS, "Linguagens"),
            Area::Mathematics => (MT_TOPICS, "Matemática"),
        }
    }
}

impl TopicClassifier for KeywordTopics {
    fn classify(&self, text: &str, area: Area) -> String {
        let lower = text.to_lowercase();
        let (table, generic) = Self::table(area);
        table
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(_, label)| *label)
            .unwrap_or(generic)
            .to_string()
    }
}

/// Body-length thresholds, counted in characters.
#[derive(Debug, Clone, Copy)]
pub struct LengthDifficulty {
    pub easy_below: usize,
    pub medium_below: usize,
}

impl Default for LengthDifficulty {
    fn default() -> Self {
        Self {
            easy_below: 500,
            medium_below: 1000,
        }
    }
}

impl DifficultyEstimator for LengthDifficulty {
    fn estimate(&self, text: &str, alternative_count: usize) -> Difficulty {
        let len = text.chars().count();
        if len < self.easy_below && alternative_count == 5 {
            Difficulty::Easy
        } else if len < self.medium_below {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }
    }
}
