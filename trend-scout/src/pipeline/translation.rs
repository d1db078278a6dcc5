//! Translation of a stored analysis into a language-specific column.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::database::repositories::CandidateRepository;
use crate::domain::{AnalysisDocument, AnalysisKind, TargetLanguage};
use crate::providers::TextTranslator;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutcome {
    pub target_lang: TargetLanguage,
    pub kind: AnalysisKind,
    pub fields_translated: usize,
    pub translated: Value,
}

pub struct TranslationWorker {
    candidates: Arc<dyn CandidateRepository>,
    translator: Arc<dyn TextTranslator>,
}

impl TranslationWorker {
    pub fn new(candidates: Arc<dyn CandidateRepository>, translator: Arc<dyn TextTranslator>) -> Self {
        Self {
            candidates,
            translator,
        }
    }

    /// Translate the text leaves of the stored analysis, one field per call,
    /// and store the result in the column for `target`.
    pub async fn translate(
        &self,
        external_id: &str,
        target: TargetLanguage,
        kind: AnalysisKind,
    ) -> Result<TranslationOutcome> {
        let candidate = self.candidates.get_candidate(external_id).await?;
        let raw = candidate
            .gemini_analysis
            .as_deref()
            .ok_or_else(|| Error::NoAnalysisFound(external_id.to_string()))?;

        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::validation(format!("stored analysis is not valid JSON: {e}")))?;
        // Any object loads; only non-objects are rejected.
        let mut document = AnalysisDocument::from_value(kind, value)?;

        let mut fields_translated = 0;
        for field in document.text_fields_mut() {
            if field.trim().is_empty() {
                continue;
            }
            *field = self.translator.translate(field.as_str(), target).await?;
            fields_translated += 1;
        }

        let translated = document.to_value()?;
        self.candidates
            .save_translation(external_id, target, &translated.to_string())
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => e,
                other => Error::Persist(other.to_string()),
            })?;

        info!(
            candidate_id = %external_id,
            lang = %target,
            %kind,
            fields = fields_translated,
            "Analysis translated"
        );
        Ok(TranslationOutcome {
            target_lang: target,
            kind,
            fields_translated,
            translated,
        })
    }
}
