//! Curriculum Pattern Library
//!
//! Named chart clips used by lessons and drills.

use serde::{Deserialize, Serialize};

use crate::candle::{Candle, Timeframe};
use crate::rng::{EntropySource, SeededStream};
use crate::synth::{synthesize_practice, synthesize_seeded, PatternArchetype, SynthesisRequest};

/// Curriculum difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Mastery,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "Beginner"),
            Difficulty::Intermediate => write!(f, "Intermediate"),
            Difficulty::Advanced => write!(f, "Advanced"),
            Difficulty::Mastery => write!(f, "Mastery"),
        }
    }
}

/// A named clip a lesson can request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumPattern {
    /// Content-store identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// What the clip illustrates
    pub description: String,
    pub archetype: PatternArchetype,
    pub bar_count: usize,
    pub base_price: f64,
    pub difficulty: Difficulty,
}

impl CurriculumPattern {
    fn request(&self, timeframe: Timeframe) -> SynthesisRequest {
        SynthesisRequest::new(self.bar_count, timeframe, self.base_price, self.archetype)
    }

    /// Reproducible clip for graded drills.
    pub fn generate_seeded(&self, timeframe: Timeframe, rng: &mut SeededStream) -> Vec<Candle> {
        synthesize_seeded(&self.request(timeframe), rng)
    }

    /// Fresh clip for lesson illustrations.
    pub fn generate_practice(&self, timeframe: Timeframe, source: &mut EntropySource) -> Vec<Candle> {
        synthesize_practice(&self.request(timeframe), source)
    }
}

/// Library of curriculum clips
pub struct PatternLibrary;

impl PatternLibrary {
    const DEFAULT_BASE_PRICE: f64 = 2000.0;

    pub fn all_patterns() -> Vec<CurriculumPattern> {
        vec![
            Self::model_one_daily(),
            Self::three_candles(),
            Self::turtle_soup(),
            Self::crt_ote(),
        ]
    }

    pub fn get_pattern(id: &str) -> Option<CurriculumPattern> {
        Self::all_patterns().into_iter().find(|p| p.id == id)
    }

    /// Like [`PatternLibrary::get_pattern`] but never fails: unknown ids get a ranging clip.
    pub fn resolve(id: &str) -> CurriculumPattern {
        Self::get_pattern(id).unwrap_or_else(|| {
            tracing::debug!(pattern = id, "Unknown curriculum pattern, using ranging clip");
            Self::ranging()
        })
    }

    pub fn by_difficulty(difficulty: Difficulty) -> Vec<CurriculumPattern> {
        Self::all_patterns()
            .into_iter()
            .filter(|p| p.difficulty == difficulty)
            .collect()
    }

    pub fn model_one_daily() -> CurriculumPattern {
        CurriculumPattern {
            id: "model-1-daily".to_string(),
            name: "Model #1".to_string(),
            description: "Thick up-close candles followed by a down-close below them.".to_string(),
            archetype: PatternArchetype::ModelOne,
            bar_count: 20,
            base_price: Self::DEFAULT_BASE_PRICE,
            difficulty: Difficulty::Beginner,
        }
    }

    pub fn three_candles() -> CurriculumPattern {
        CurriculumPattern {
            id: "three-candles".to_string(),
            name: "Accumulation, Manipulation, Distribution".to_string(),
            description: "Three legs: build orders, run liquidity, deliver.".to_string(),
            archetype: PatternArchetype::ThreePhase,
            bar_count: 15,
            base_price: Self::DEFAULT_BASE_PRICE,
            difficulty: Difficulty::Intermediate,
        }
    }

    pub fn turtle_soup() -> CurriculumPattern {
        CurriculumPattern {
            id: "turtle-soup".to_string(),
            name: "Turtle Soup".to_string(),
            description: "Price sweeps a prior high and closes back inside the range.".to_string(),
            archetype: PatternArchetype::TurtleSoup,
            bar_count: 15,
            base_price: Self::DEFAULT_BASE_PRICE,
            difficulty: Difficulty::Intermediate,
        }
    }

    pub fn crt_ote() -> CurriculumPattern {
        CurriculumPattern {
            id: "crt-ote".to_string(),
            name: "CRT Optimal Trade Entry".to_string(),
            description: "Impulsive leg followed by a deep retracement.".to_string(),
            archetype: PatternArchetype::ImpulseRetracement,
            bar_count: 13,
            base_price: Self::DEFAULT_BASE_PRICE,
            difficulty: Difficulty::Advanced,
        }
    }

    fn ranging() -> CurriculumPattern {
        CurriculumPattern {
            id: "ranging".to_string(),
            name: "Range".to_string(),
            description: "Sideways noise with no setup.".to_string(),
            archetype: PatternArchetype::Ranging,
            bar_count: 20,
            base_price: Self::DEFAULT_BASE_PRICE,
            difficulty: Difficulty::Beginner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_exist() {
        let patterns = PatternLibrary::all_patterns();
        assert_eq!(patterns.len(), 4);
        assert!(patterns.iter().all(|p| p.bar_count > 0));
    }

    #[test]
    fn test_get_pattern_by_id() {
        let pattern = PatternLibrary::get_pattern("crt-ote").unwrap();
        assert_eq!(pattern.archetype, PatternArchetype::ImpulseRetracement);
        assert_eq!(pattern.bar_count, 13);
        assert!(PatternLibrary::get_pattern("nope").is_none());
    }

    #[test]
    fn test_resolve_falls_back_to_ranging() {
        let pattern = PatternLibrary::resolve("nope");
        assert_eq!(pattern.archetype, PatternArchetype::Ranging);
        assert_eq!(pattern.bar_count, 20);
    }

    #[test]
    fn test_by_difficulty() {
        let intermediate = PatternLibrary::by_difficulty(Difficulty::Intermediate);
        assert_eq!(intermediate.len(), 2);
        assert!(PatternLibrary::by_difficulty(Difficulty::Mastery).is_empty());
    }

    #[test]
    fn test_generated_clip_lengths() {
        let mut rng = SeededStream::new(12345);
        for pattern in PatternLibrary::all_patterns() {
            let candles = pattern.generate_seeded(Timeframe::D1, &mut rng);
            assert_eq!(candles.len(), pattern.bar_count);
        }

        let mut source = EntropySource::new();
        let clip = PatternLibrary::turtle_soup().generate_practice(Timeframe::H4, &mut source);
        assert_eq!(clip.len(), 15);
        assert!(clip.iter().all(|c| c.is_valid()));
    }
}
