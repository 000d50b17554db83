//! Extraction and validation of generative replies.

use crate::core::interventions::{Intervention, InterventionPriority, InterventionType};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Shape constraints for an accepted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaRules {
    pub prediction_count: usize,
    pub max_interventions: usize,
}

impl Default for SchemaRules {
    fn default() -> Self {
        Self {
            prediction_count: 3,
            max_interventions: 5,
        }
    }
}

/// A reply that passed validation. `interventions` is empty when the
/// service did not propose any.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReply {
    pub predictions: Vec<String>,
    pub interventions: Vec<Intervention>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// No JSON object found in the reply text
    NoJson,
    /// JSON found but not of the expected shape
    Shape(String),
    PredictionCount { expected: usize, actual: usize },
    TooManyInterventions { max: usize, actual: usize },
    ScoreOutOfRange { field: &'static str, value: f64 },
    EmptyField(&'static str),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::NoJson => write!(f, "reply contains no JSON object"),
            SchemaError::Shape(msg) => write!(f, "unexpected reply shape: {msg}"),
            SchemaError::PredictionCount { expected, actual } => {
                write!(f, "expected {expected} predictions, got {actual}")
            }
            SchemaError::TooManyInterventions { max, actual } => {
                write!(f, "at most {max} interventions allowed, got {actual}")
            }
            SchemaError::ScoreOutOfRange { field, value } => {
                write!(f, "{field} {value} outside 0-100")
            }
            SchemaError::EmptyField(field) => write!(f, "empty {field}"),
        }
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug, Deserialize)]
struct RawReply {
    predictions: Vec<String>,
    #[serde(default)]
    interventions: Vec<RawIntervention>,
}

#[derive(Debug, Deserialize)]
struct RawIntervention {
    #[serde(rename = "type")]
    kind: InterventionType,
    priority: InterventionPriority,
    title: String,
    description: String,
    impact_score: f64,
    effort_score: f64,
    #[serde(default)]
    target_id: Option<String>,
}

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").unwrap())
}

fn bare_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap())
}

/// Find a JSON object in reply text: the whole text, a fenced code block,
/// or the outermost braces, in that order.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value @ serde_json::Value::Object(_)) =
        serde_json::from_str::<serde_json::Value>(trimmed)
    {
        return Some(value);
    }

    let candidates = [
        fenced_block()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str()),
        bare_object().find(trimmed).map(|m| m.as_str()),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| match serde_json::from_str::<serde_json::Value>(candidate) {
            Ok(value @ serde_json::Value::Object(_)) => Some(value),
            _ => None,
        })
}

/// Extract and validate a reply.
pub fn parse_reply(text: &str, rules: &SchemaRules) -> Result<ValidatedReply, SchemaError> {
    let value = extract_json(text).ok_or(SchemaError::NoJson)?;
    let raw: RawReply =
        serde_json::from_value(value).map_err(|e| SchemaError::Shape(e.to_string()))?;
    validate(raw, rules)
}

fn validate(raw: RawReply, rules: &SchemaRules) -> Result<ValidatedReply, SchemaError> {
    if raw.predictions.len() != rules.prediction_count {
        return Err(SchemaError::PredictionCount {
            expected: rules.prediction_count,
            actual: raw.predictions.len(),
        });
    }
    if raw.predictions.iter().any(|p| p.trim().is_empty()) {
        return Err(SchemaError::EmptyField("prediction"));
    }
    if raw.interventions.len() > rules.max_interventions {
        return Err(SchemaError::TooManyInterventions {
            max: rules.max_interventions,
            actual: raw.interventions.len(),
        });
    }

    let interventions = raw
        .interventions
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            check_score("impact_score", item.impact_score)?;
            check_score("effort_score", item.effort_score)?;
            if item.title.trim().is_empty() {
                return Err(SchemaError::EmptyField("intervention title"));
            }
            Ok(Intervention {
                id: format!("ai-{}", idx + 1),
                kind: item.kind,
                priority: item.priority,
                title: item.title.trim().to_string(),
                description: item.description.trim().to_string(),
                impact_score: item.impact_score,
                effort_score: item.effort_score,
                target_id: item.target_id,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedReply {
        predictions: raw
            .predictions
            .into_iter()
            .map(|p| p.trim().to_string())
            .collect(),
        interventions,
    })
}

fn check_score(field: &'static str, value: f64) -> Result<(), SchemaError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(SchemaError::ScoreOutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "predictions": ["Wednesday stacks an exam after two labs", "Sleep drops below 6h on Thursday", "Friday is clear for recovery"],
        "interventions": [
            {"type": "reschedule", "priority": "high", "title": "Move the Thursday coffee chat",
             "description": "Free the evening before the exam", "impact_score": 55, "effort_score": 20}
        ]
    }"#;

    #[test]
    fn test_extract_direct_fenced_and_embedded() {
        assert!(extract_json(VALID).is_some());

        let fenced = format!("Here you go:\n```json\n{VALID}\n```\nGood luck!");
        assert!(extract_json(&fenced).is_some());

        let embedded = format!("Sure. {VALID} Let me know.");
        assert!(extract_json(&embedded).is_some());

        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("[1, 2, 3]"), None);
    }

    #[test]
    fn test_parse_valid_reply() {
        let reply = parse_reply(VALID, &SchemaRules::default()).unwrap();
        assert_eq!(reply.predictions.len(), 3);
        assert_eq!(reply.interventions.len(), 1);
        assert_eq!(reply.interventions[0].id, "ai-1");
        assert_eq!(reply.interventions[0].kind, InterventionType::Reschedule);
    }

    #[test]
    fn test_predictions_only_reply() {
        let text = r#"{"predictions": ["a", "b", "c"]}"#;
        let reply = parse_reply(text, &SchemaRules::default()).unwrap();
        assert!(reply.interventions.is_empty());
    }

    #[test]
    fn test_wrong_prediction_count() {
        let text = r#"{"predictions": ["only one"]}"#;
        assert_eq!(
            parse_reply(text, &SchemaRules::default()),
            Err(SchemaError::PredictionCount {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_score_out_of_range() {
        let text = r#"{"predictions": ["a", "b", "c"], "interventions": [
            {"type": "delegate", "priority": "low", "title": "x", "description": "y",
             "impact_score": 150, "effort_score": 10}]}"#;
        assert!(matches!(
            parse_reply(text, &SchemaRules::default()),
            Err(SchemaError::ScoreOutOfRange {
                field: "impact_score",
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_type_is_shape_error() {
        let text = r#"{"predictions": ["a", "b", "c"], "interventions": [
            {"type": "meditate", "priority": "low", "title": "x", "description": "y",
             "impact_score": 10, "effort_score": 10}]}"#;
        assert!(matches!(
            parse_reply(text, &SchemaRules::default()),
            Err(SchemaError::Shape(_))
        ));
    }
}
