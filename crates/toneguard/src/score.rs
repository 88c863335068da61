//! Lexical and prosodic toxicity scoring.
//!
//! Both sub-scores live in [0, 1] and fuse as
//! `combined = 0.7 * lexical + 0.3 * prosodic`, clamped.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

const PROFANITY_WEIGHT: f32 = 0.40;
const THREAT_WEIGHT: f32 = 0.20;
const IDENTITY_WEIGHT: f32 = 0.10;
const SHOUTING_BONUS: f32 = 0.10;

/// Phrase lists driving the lexical score.
///
/// Deserializable so deployments can override the built-in lists with a
/// JSON file; missing fields keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    pub profanity: Vec<String>,
    pub threats: Vec<String>,
    pub identity: Vec<String>,
}

fn strings(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| (*t).to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            profanity: strings(&[
                "fuck", "shit", "bitch", "asshole", "bastard", "dickhead", "motherfucker",
            ]),
            threats: strings(&[
                "kill you",
                "hurt you",
                "beat you",
                "destroy you",
                "make you pay",
                "watch your back",
            ]),
            identity: strings(&[
                "people like you",
                "you people",
                "your kind",
                "go back to",
            ]),
        }
    }
}

impl Lexicon {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("parse lexicon json")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let json = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read {}", path_ref.display()))?;
        Self::from_json_str(&json)
    }

    /// Additive, saturating lexical score in [0, 1].
    ///
    /// Case-insensitive substring matches: each matching profanity term adds
    /// 0.40, each threat phrase 0.20, each identity-targeting phrase 0.10;
    /// an all-caps word adds the 0.10 shouting bonus. Matches compound up to
    /// the clamp, they are never averaged.
    #[must_use]
    pub fn lexical_score(&self, text: &str) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let lower = text.to_lowercase();

        let mut score = 0.0f32;
        for term in &self.profanity {
            if lower.contains(term.as_str()) {
                score += PROFANITY_WEIGHT;
            }
        }
        for term in &self.threats {
            if lower.contains(term.as_str()) {
                score += THREAT_WEIGHT;
            }
        }
        for term in &self.identity {
            if lower.contains(term.as_str()) {
                score += IDENTITY_WEIGHT;
            }
        }
        if text.split_whitespace().any(is_shouted) {
            score += SHOUTING_BONUS;
        }
        score.clamp(0.0, 1.0)
    }

    /// `0.7 * lexical + 0.3 * prosodic`, clamped to [0, 1].
    #[must_use]
    pub fn combined_score(&self, text: &str, peak16: f32, rms: f32) -> f32 {
        let fused = 0.7 * self.lexical_score(text) + 0.3 * prosody_score(peak16, rms);
        fused.clamp(0.0, 1.0)
    }
}

// Shouting heuristic: at least two characters, all alphabetic, all
// upper-case.
fn is_shouted(token: &str) -> bool {
    let mut len = 0usize;
    for c in token.chars() {
        if !c.is_alphabetic() || !c.is_uppercase() {
            return false;
        }
        len += 1;
    }
    len >= 2
}

/// Loudness-driven prosodic score in [0, 1].
///
/// `peak16` and `rms` are measured on the 16-bit sample scale by the
/// capture side. Zero (or negative) levels on both mean silence and score
/// zero; otherwise loudness is `0.6 * peak + 0.4 * rms` after
/// normalization, shaped by a logistic centered at 0.4 with steepness 6.
#[must_use]
pub fn prosody_score(peak16: f32, rms: f32) -> f32 {
    if peak16 <= 0.0 && rms <= 0.0 {
        return 0.0;
    }
    let peak_norm = (peak16 / 32_768.0).clamp(0.0, 1.0);
    let rms_norm = (rms / 2_500.0).clamp(0.0, 1.0);
    let loudness = 0.6 * peak_norm + 0.4 * rms_norm;
    let shaped = 1.0 / (1.0 + (-6.0 * (loudness - 0.4)).exp());
    shaped.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{Lexicon, prosody_score};

    #[test]
    fn clean_text_scores_zero() {
        let lex = Lexicon::default();
        assert_eq!(lex.lexical_score(""), 0.0);
        assert_eq!(lex.lexical_score("what a lovely morning"), 0.0);
    }

    #[test]
    fn profanity_scenario_matches_reference_arithmetic() {
        let lex = Lexicon::default();
        // One profanity hit, no shouting, silent audio.
        let lexical = lex.lexical_score("you fucking idiot");
        assert!((lexical - 0.40).abs() < 1e-6, "lexical {lexical}");

        assert_eq!(prosody_score(0.0, 0.0), 0.0);

        let combined = lex.combined_score("you fucking idiot", 0.0, 0.0);
        assert!((combined - 0.28).abs() < 1e-6, "combined {combined}");
    }

    #[test]
    fn matches_compound_and_saturate() {
        let lex = Lexicon::default();
        // Two profanity terms and a threat: 0.4 + 0.4 + 0.2, clamped to 1.
        let s = lex.lexical_score("fuck this shit, i will kill you");
        assert!((s - 1.0).abs() < 1e-6, "score {s}");
    }

    #[test]
    fn shouting_bonus_applies_once() {
        let lex = Lexicon::default();
        assert!((lex.lexical_score("STOP right there") - 0.10).abs() < 1e-6);
        assert!((lex.lexical_score("STOP IT NOW") - 0.10).abs() < 1e-6);
        // Mixed case, digits, or single letters do not count.
        assert_eq!(lex.lexical_score("Stop it"), 0.0);
        assert_eq!(lex.lexical_score("A B C"), 0.0);
        assert_eq!(lex.lexical_score("HE11O there"), 0.0);
    }

    #[test]
    fn prosody_is_zero_only_for_silent_levels() {
        assert_eq!(prosody_score(0.0, 0.0), 0.0);
        assert_eq!(prosody_score(-1.0, -5.0), 0.0);
        assert!(prosody_score(100.0, 0.0) > 0.0);
    }

    #[test]
    fn loud_scenario_matches_reference_arithmetic() {
        // peak 20000, rms 3000: peak_norm=0.61035, rms_norm=1 (clamped),
        // loudness=0.76621, logistic => ~0.9000.
        let p = prosody_score(20_000.0, 3_000.0);
        assert!(p > 0.8);
        assert!((p - 0.9000).abs() < 1e-3, "prosody {p}");

        let lex = Lexicon::default();
        let combined = lex.combined_score("", 20_000.0, 3_000.0);
        assert!((combined - 0.3 * p).abs() < 1e-6);
        assert!(combined < 0.3);
    }

    #[test]
    fn combined_is_always_in_unit_range() {
        let lex = Lexicon::default();
        let cases = [
            ("", 0.0, 0.0),
            ("fuck shit bitch asshole kill you", 32_768.0, 10_000.0),
            ("hello", -10.0, -10.0),
            ("KILL YOU NOW", 40_000.0, 0.0),
        ];
        for (text, peak, rms) in cases {
            let c = lex.combined_score(text, peak, rms);
            assert!((0.0..=1.0).contains(&c), "combined {c} for {text:?}");
        }
    }

    #[test]
    fn lexicon_overrides_from_json() {
        let lex = Lexicon::from_json_str(r#"{"profanity": ["zut"]}"#).expect("parse lexicon");
        assert!((lex.lexical_score("zut alors") - 0.40).abs() < 1e-6);
        // Defaults survive for the fields the file leaves out.
        assert!((lex.lexical_score("i will kill you") - 0.20).abs() < 1e-6);
        assert_eq!(lex.lexical_score("fuck"), 0.0);
    }
}
