//! JSON parsing/serialization helpers with consistent warning logs.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Where a JSON blob came from, for log fields.
#[derive(Debug, Clone, Copy)]
pub enum JsonContext<'a> {
    CandidateField {
        candidate_id: &'a str,
        field: &'static str,
    },
    JobField {
        job_id: i64,
        field: &'static str,
    },
    /// A job that has no id yet.
    NewJob {
        candidate_id: &'a str,
        job_type: &'static str,
        field: &'static str,
    },
}

fn warn_parse_error(
    raw_len: usize,
    error: serde_json::Error,
    ctx: JsonContext<'_>,
    msg: &'static str,
) {
    match ctx {
        JsonContext::CandidateField {
            candidate_id,
            field,
        } => {
            warn!(
                candidate_id = %candidate_id,
                field,
                raw_len,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::JobField { job_id, field } => {
            warn!(
                job_id,
                field,
                raw_len,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::NewJob {
            candidate_id,
            job_type,
            field,
        } => {
            warn!(
                candidate_id = %candidate_id,
                job_type,
                field,
                raw_len,
                error = %error,
                "{msg}"
            );
        }
    }
}

fn warn_serialize_error(error: serde_json::Error, ctx: JsonContext<'_>, msg: &'static str) {
    match ctx {
        JsonContext::CandidateField {
            candidate_id,
            field,
        } => {
            warn!(
                candidate_id = %candidate_id,
                field,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::JobField { job_id, field } => {
            warn!(
                job_id,
                field,
                error = %error,
                "{msg}"
            );
        }
        JsonContext::NewJob {
            candidate_id,
            job_type,
            field,
        } => {
            warn!(
                candidate_id = %candidate_id,
                job_type,
                field,
                error = %error,
                "{msg}"
            );
        }
    }
}

pub fn parse_optional<T: DeserializeOwned>(
    raw: Option<&str>,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> Option<T> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn_parse_error(raw.len(), error, ctx, msg);
            None
        }
    }
}

pub fn parse_optional_or_default<T: DeserializeOwned + Default>(
    raw: Option<&str>,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> T {
    parse_optional(raw, ctx, msg).unwrap_or_default()
}

pub fn parse_or_default<T: DeserializeOwned + Default>(
    raw: &str,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> T {
    // Treat empty string as "no value" - return default without warning
    if raw.is_empty() {
        return T::default();
    }

    match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn_parse_error(raw.len(), error, ctx, msg);
            T::default()
        }
    }
}

/// Serialize `value`, falling back to `fallback` (and logging) on failure.
pub fn to_string_or<T: Serialize>(
    value: &T,
    fallback: &str,
    ctx: JsonContext<'_>,
    msg: &'static str,
) -> String {
    match serde_json::to_string(value) {
        Ok(s) => s,
        Err(error) => {
            warn_serialize_error(error, ctx, msg);
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> JsonContext<'static> {
        JsonContext::CandidateField {
            candidate_id: "1",
            field: "hashtags",
        }
    }

    #[test]
    fn test_parse_or_default_handles_garbage() {
        let tags: Vec<String> = parse_or_default("not json", ctx(), "bad");
        assert!(tags.is_empty());
        let tags: Vec<String> = parse_or_default(r#"["a"]"#, ctx(), "bad");
        assert_eq!(tags, vec!["a".to_string()]);
    }

    #[test]
    fn test_parse_optional_none() {
        let parsed: Option<Vec<String>> = parse_optional(None, ctx(), "bad");
        assert!(parsed.is_none());
    }

    #[test]
    fn test_to_string_or_falls_back_for_new_job() {
        let ctx = JsonContext::NewJob {
            candidate_id: "1",
            job_type: "translate",
            field: "payload",
        };
        // Tuple keys cannot become JSON object keys.
        let unserializable = std::collections::HashMap::from([((1, 2), 3)]);
        assert_eq!(to_string_or(&unserializable, "{}", ctx, "bad"), "{}");

        let garbage: Vec<String> = parse_or_default("[", ctx, "bad");
        assert!(garbage.is_empty());
        assert_eq!(to_string_or(&vec!["a"], "{}", ctx, "bad"), r#"["a"]"#);
    }
}
