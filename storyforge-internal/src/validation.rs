use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorDetails, FieldError};

/// Maximum prompt length in characters, after trimming.
pub const MAX_PROMPT_CHARS: usize = 2000;
/// Maximum tone label length in characters, after trimming.
pub const MAX_TONE_CHARS: usize = 50;

/// Wire shape of a generation request (`POST /v1/generate`).
///
/// The same constraints are enforced on the client before the request
/// leaves the session and on the server before any quota or ownership
/// check runs. The server never trusts the client-side check.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateParams {
    pub prompt: String,
    pub tone: String,
    pub project_id: Uuid,
    pub chapter_id: Uuid,
}

/// A generation request that passed schema validation. Prompt and tone
/// are stored trimmed, which is the form forwarded to the backend and
/// recorded in the usage log.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidGenerateRequest {
    pub prompt: String,
    pub tone: String,
    pub project_id: Uuid,
    pub chapter_id: Uuid,
}

impl GenerateParams {
    /// Validate field constraints, collecting every offending field rather
    /// than short-circuiting on the first one.
    pub fn validate(&self) -> Result<ValidGenerateRequest, Error> {
        let mut fields = Vec::new();

        let prompt = self.prompt.trim();
        if prompt.is_empty() {
            fields.push(FieldError {
                field: "prompt",
                message: "must not be empty".to_string(),
            });
        } else if prompt.chars().count() > MAX_PROMPT_CHARS {
            fields.push(FieldError {
                field: "prompt",
                message: format!("must be at most {MAX_PROMPT_CHARS} characters"),
            });
        }

        let tone = self.tone.trim();
        if tone.is_empty() {
            fields.push(FieldError {
                field: "tone",
                message: "must not be empty".to_string(),
            });
        } else if tone.chars().count() > MAX_TONE_CHARS {
            fields.push(FieldError {
                field: "tone",
                message: format!("must be at most {MAX_TONE_CHARS} characters"),
            });
        }

        if self.project_id.is_nil() {
            fields.push(FieldError {
                field: "projectId",
                message: "must be a valid project id".to_string(),
            });
        }
        if self.chapter_id.is_nil() {
            fields.push(FieldError {
                field: "chapterId",
                message: "must be a valid chapter id".to_string(),
            });
        }

        if !fields.is_empty() {
            return Err(Error::new(ErrorDetails::Validation { fields }));
        }

        Ok(ValidGenerateRequest {
            prompt: prompt.to_string(),
            tone: tone.to_string(),
            project_id: self.project_id,
            chapter_id: self.chapter_id,
        })
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::panic)]

    use super::*;

    fn params(prompt: &str, tone: &str) -> GenerateParams {
        GenerateParams {
            prompt: prompt.to_string(),
            tone: tone.to_string(),
            project_id: Uuid::now_v7(),
            chapter_id: Uuid::now_v7(),
        }
    }

    fn validation_fields(error: Error) -> Vec<FieldError> {
        match error.get_owned_details() {
            ErrorDetails::Validation { fields } => fields,
            other => panic!("expected a validation error, got: {other}"),
        }
    }

    #[test]
    fn test_valid_request_is_trimmed() {
        let request = params("  Continue the duel scene.  ", " dramatic ");
        let valid = match request.validate() {
            Ok(valid) => valid,
            Err(e) => panic!("expected validation to pass, got: {e}"),
        };
        assert_eq!(valid.prompt, "Continue the duel scene.");
        assert_eq!(valid.tone, "dramatic");
    }

    #[test]
    fn test_prompt_at_limit_accepted() {
        let request = params(&"a".repeat(MAX_PROMPT_CHARS), "noir");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_prompt_over_limit_rejected_citing_prompt_field() {
        let request = params(&"a".repeat(MAX_PROMPT_CHARS + 1), "noir");
        let Err(error) = request.validate() else {
            panic!("expected an over-limit prompt to be rejected");
        };
        let fields = validation_fields(error);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "prompt");
    }

    #[test]
    fn test_trimming_happens_before_length_check() {
        // 2000 content characters padded with whitespace must still pass
        let padded = format!("  {}  ", "a".repeat(MAX_PROMPT_CHARS));
        let request = params(&padded, "noir");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_whitespace_only_prompt_rejected() {
        let request = params("   \n\t  ", "noir");
        let Err(error) = request.validate() else {
            panic!("expected a whitespace-only prompt to be rejected");
        };
        let fields = validation_fields(error);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "prompt");
        assert_eq!(fields[0].message, "must not be empty");
    }

    #[test]
    fn test_multiple_offending_fields_are_all_reported() {
        let request = params("", &"t".repeat(MAX_TONE_CHARS + 1));
        let Err(error) = request.validate() else {
            panic!("expected both fields to be rejected");
        };
        let fields = validation_fields(error);
        let names: Vec<&str> = fields.iter().map(|e| e.field).collect();
        assert_eq!(names, vec!["prompt", "tone"]);
    }

    #[test]
    fn test_nil_project_id_rejected() {
        let request = GenerateParams {
            prompt: "Continue the scene.".to_string(),
            tone: "noir".to_string(),
            project_id: Uuid::nil(),
            chapter_id: Uuid::now_v7(),
        };
        let Err(error) = request.validate() else {
            panic!("expected a nil project id to be rejected");
        };
        let fields = validation_fields(error);
        assert_eq!(fields[0].field, "projectId");
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let body = serde_json::json!({
            "prompt": "Continue the scene.",
            "tone": "noir",
            "projectId": "01890a5d-ac96-774b-b9aa-5b06c3f2a071",
            "chapterId": "01890a5d-ac96-774b-b9aa-5b06c3f2a072",
        });
        let parsed: Result<GenerateParams, _> = serde_json::from_value(body);
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let body = serde_json::json!({
            "prompt": "Continue the scene.",
            "tone": "noir",
            "projectId": "01890a5d-ac96-774b-b9aa-5b06c3f2a071",
            "chapterId": "01890a5d-ac96-774b-b9aa-5b06c3f2a072",
            "model": "gpt-4o",
        });
        let parsed: Result<GenerateParams, _> = serde_json::from_value(body);
        assert!(parsed.is_err());
    }
}
