//! Classification result and its display ordering

use crate::error::TransportError;
use leafy_common::api::PredictResponse;
use std::collections::HashMap;

/// Number of alternatives shown next to the winning class
pub const TOP_ALTERNATIVES: usize = 4;

/// Result of one prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Winning class name
    pub species: String,
    /// Confidence of the winning class (0.0 - 1.0)
    pub confidence: f64,
    /// Probability for every class the backend knows
    pub all_probabilities: HashMap<String, f64>,
}

impl PredictionResult {
    /// Validate a backend response
    ///
    /// Any probability outside [0,1] rejects the whole response so a partial
    /// result is never shown.
    pub fn from_response(response: PredictResponse) -> Result<Self, TransportError> {
        if response.class.trim().is_empty() {
            return Err(TransportError::MalformedResponse(
                "prediction has no class".to_string(),
            ));
        }
        if !is_probability(response.confidence) {
            return Err(TransportError::MalformedResponse(format!(
                "confidence {} out of range",
                response.confidence
            )));
        }
        if let Some((name, p)) = response.all_probs.iter().find(|(_, p)| !is_probability(**p)) {
            return Err(TransportError::MalformedResponse(format!(
                "probability {} for '{}' out of range",
                p, name
            )));
        }

        Ok(Self {
            species: response.class,
            confidence: response.confidence,
            all_probabilities: response.all_probs,
        })
    }

    /// All probabilities, highest first; ties broken by ascending name
    pub fn ranked_probabilities(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .all_probabilities
            .iter()
            .map(|(name, p)| (name.as_str(), *p))
            .collect();
        ranked.sort_by(|(name_a, a), (name_b, b)| b.total_cmp(a).then_with(|| name_a.cmp(name_b)));
        ranked
    }

    /// Top entries shown as "other possibilities"
    ///
    /// The winning class is not filtered out; it usually appears first.
    pub fn top_alternatives(&self) -> Vec<(&str, f64)> {
        let mut ranked = self.ranked_probabilities();
        ranked.truncate(TOP_ALTERNATIVES);
        ranked
    }

    /// Winning confidence as a percentage with one decimal ("87.0%")
    pub fn confidence_percent(&self) -> String {
        format_percent(self.confidence)
    }

    /// Species name title-cased for display
    pub fn display_name(&self) -> String {
        title_case(&self.species)
    }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

/// Format a probability as a percentage with one decimal place
pub fn format_percent(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Title-case each whitespace or underscore separated word
pub fn title_case(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
