//! Analysis documents produced by the inference stage.
//!
//! Two payload shapes exist: the adaptation analysis written by the analysis
//! worker ([`RegularAnalysis`]) and the trend report shape
//! ([`TrendingAnalysis`]). Modelled fields hold the stored JSON as is and
//! unmodelled keys land in `extra`, so any JSON object loads and a translated
//! copy differs from its source only in translated strings.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::{Error, Result};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid fenced block regex")
});

/// Which analysis payload shape a document has.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Regular,
    Trending,
}

impl AnalysisKind {
    pub fn from_trending_flag(is_trending: bool) -> Self {
        if is_trending {
            Self::Trending
        } else {
            Self::Regular
        }
    }
}

/// Languages with a dedicated translation column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    En,
    De,
}

impl TargetLanguage {
    /// ISO 639-1 code sent to the translation API.
    pub fn code(&self) -> &'static str {
        self.into()
    }

    /// Candidate column holding translations into this language.
    pub fn column(&self) -> &'static str {
        match self {
            Self::En => "analysis_en",
            Self::De => "analysis_de",
        }
    }
}

fn number_like(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Keep a present key even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A modelled sub-document, or whatever was stored there instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Typed(T),
    Raw(Value),
}

/// A single text leaf; anything but a string is left alone.
fn text_leaf(value: &mut Option<Value>) -> Option<&mut String> {
    match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

/// A list of text leaves, also accepted as a single string.
fn text_list(value: &mut Option<Value>) -> Vec<&mut String> {
    match value {
        Some(Value::String(text)) => vec![text],
        Some(Value::Array(items)) => items
            .iter_mut()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One entry of the shot-list template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub shot: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub on_screen_text: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How to reuse the mechanic for unrelated content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reapplication {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub target_topics: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub production_needs: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub engagement_factors: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub shot_list_template: Option<Lenient<Vec<Lenient<Shot>>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Adaptation analysis of a single candidate.
///
/// Scores stay exactly as stored; use [`extract_score`] to read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegularAnalysis {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub adaptation_score: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub original_mechanic: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub why_viral: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub reapplication: Option<Lenient<Reapplication>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegularAnalysis {
    fn text_fields_mut(&mut self) -> Vec<&mut String> {
        let mut fields: Vec<&mut String> = Vec::new();
        fields.extend(text_leaf(&mut self.original_mechanic));
        fields.extend(text_leaf(&mut self.why_viral));
        if let Some(Lenient::Typed(reapplication)) = self.reapplication.as_mut() {
            fields.extend(text_list(&mut reapplication.target_topics));
            fields.extend(text_list(&mut reapplication.production_needs));
            fields.extend(text_list(&mut reapplication.engagement_factors));
            if let Some(Lenient::Typed(shots)) = reapplication.shot_list_template.as_mut() {
                for shot in shots.iter_mut() {
                    if let Lenient::Typed(shot) = shot {
                        fields.extend(text_leaf(&mut shot.description));
                        fields.extend(text_leaf(&mut shot.on_screen_text));
                    }
                }
            }
        }
        fields
    }
}

/// Trend report payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendingAnalysis {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub virality_score: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub hook: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub audio_usage: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub why_trending: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub content_ideas: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrendingAnalysis {
    fn text_fields_mut(&mut self) -> Vec<&mut String> {
        let mut fields: Vec<&mut String> = Vec::new();
        fields.extend(text_leaf(&mut self.summary));
        fields.extend(text_leaf(&mut self.hook));
        fields.extend(text_leaf(&mut self.format));
        fields.extend(text_leaf(&mut self.audio_usage));
        fields.extend(text_leaf(&mut self.why_trending));
        fields.extend(text_list(&mut self.content_ideas));
        fields
    }
}

/// A stored analysis, typed by its payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisDocument {
    Regular(RegularAnalysis),
    Trending(TrendingAnalysis),
}

impl AnalysisDocument {
    pub fn from_value(kind: AnalysisKind, value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::validation("analysis document must be a JSON object"));
        }
        Ok(match kind {
            AnalysisKind::Regular => Self::Regular(serde_json::from_value(value)?),
            AnalysisKind::Trending => Self::Trending(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Regular(_) => AnalysisKind::Regular,
            Self::Trending(_) => AnalysisKind::Trending,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Regular(doc) => serde_json::to_value(doc)?,
            Self::Trending(doc) => serde_json::to_value(doc)?,
        })
    }

    /// Translatable text leaves in document order. Scores and list
    /// structure are never part of this set.
    pub fn text_fields_mut(&mut self) -> Vec<&mut String> {
        match self {
            Self::Regular(doc) => doc.text_fields_mut(),
            Self::Trending(doc) => doc.text_fields_mut(),
        }
    }
}

/// Parse model output into a JSON value.
///
/// Accepts bare JSON, JSON inside a fenced code block, and JSON surrounded
/// by prose. Text that still doesn't parse is kept under `raw_analysis`
/// with an `error` marker.
pub fn parse_model_output(text: &str) -> Value {
    let trimmed = text.trim();
    let fenced = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let candidates = [Some(trimmed), fenced, outermost_object(trimmed)];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            match value {
                Value::Object(_) => return value,
                Value::Array(mut items) if items.len() == 1 && items[0].is_object() => {
                    return items.remove(0);
                }
                _ => {}
            }
        }
    }

    json!({
        "raw_analysis": text,
        "error": "Failed to parse analysis JSON",
    })
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Numeric `adaptation_score` of a parsed analysis, if any.
pub fn extract_score(value: &Value) -> Option<f64> {
    value.get("adaptation_score").and_then(number_like)
}

/// Whether a score clears the adaptability threshold.
pub fn is_adaptable(score: f64, threshold: f64) -> bool {
    score >= threshold
}
