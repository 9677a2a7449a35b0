use axum::extract::{Extension, State};
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::SessionIdentity;
use crate::error::{Error, ErrorDetails};
use crate::gateway_util::{AppState, AppStateData, StructuredJson};
use crate::generation::system_instruction;
use crate::store::{CreditOutcome, UsageLogEntry, PROMPT_TYPE_STORY_GENERATION};
use crate::validation::GenerateParams;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GenerateResponse {
    pub text: String,
}

/// A handler for `POST /v1/generate`, the authoritative gate in front of
/// the generation backend.
///
/// Checks run in a fixed order and short-circuit on the first failure:
/// authentication, schema validation, quota, ownership, backend call. No
/// side effects happen before the commit step, so a rejected or failed
/// request never consumes a credit and never writes a usage log entry.
pub async fn generate_handler(
    State(app_state): AppState,
    identity: Option<Extension<SessionIdentity>>,
    StructuredJson(params): StructuredJson<GenerateParams>,
) -> Result<Json<GenerateResponse>, Error> {
    // 1. Authentication. The middleware normally attaches the identity;
    // a missing extension means the route was reached without it.
    let Some(Extension(identity)) = identity else {
        return Err(Error::new(ErrorDetails::Authentication {
            message: "No session identity attached to request".to_string(),
        }));
    };

    // 2. Schema validation
    let request = params.validate()?;

    // 3. Quota check. Advisory client-side checks are never trusted; the
    // profile is re-read here on every request.
    let profile = app_state
        .profile_store
        .get_profile(identity.account_id)
        .await?;
    if profile.chapter_quota_exhausted() {
        return Err(Error::new(ErrorDetails::QuotaExceeded {
            quota: profile.monthly_chapter_credits,
        }));
    }

    // 4. Ownership check. A missing project and a project owned by another
    // account produce the same error, so callers cannot probe for the
    // existence of other users' projects.
    let owner = app_state
        .project_store
        .get_project_owner(request.project_id)
        .await?;
    if owner != Some(identity.account_id) {
        return Err(Error::new(ErrorDetails::AccessDenied {
            project_id: request.project_id,
        }));
    }

    // 5. Generation. A backend failure surfaces immediately; the quota is
    // not consumed and nothing is logged.
    let text = app_state
        .generation_client
        .generate(
            &app_state.http_client,
            &system_instruction(&request.tone),
            &request.prompt,
        )
        .await?;

    // 6. Commit
    commit_usage(&app_state, identity.account_id, &request, &text).await;

    Ok(Json(GenerateResponse { text }))
}

/// Record a successful generation: consume one chapter credit, then append
/// one usage log entry.
///
/// The generation already happened, so neither write may fail the request.
/// Losing the conditional-increment race means a concurrent request from
/// the same account took the last credit after our quota check passed; the
/// under-billing is accepted and logged.
async fn commit_usage(
    app_state: &AppStateData,
    account_id: Uuid,
    request: &crate::validation::ValidGenerateRequest,
    output_text: &str,
) {
    match app_state.profile_store.consume_chapter_credit(account_id).await {
        Ok(CreditOutcome::Consumed) => {}
        Ok(CreditOutcome::Exhausted) => {
            tracing::warn!(
                "Account {account_id} exhausted its quota between check and commit; generation not billed"
            );
        }
        Err(e) => {
            tracing::warn!(
                "Failed to consume chapter credit for account {account_id}; generation not billed: {e}"
            );
        }
    }

    let entry = UsageLogEntry {
        id: Uuid::now_v7(),
        account_id,
        project_id: request.project_id,
        prompt_type: PROMPT_TYPE_STORY_GENERATION.to_string(),
        tone: request.tone.clone(),
        input_prompt: request.prompt.clone(),
        output_text: output_text.to_string(),
        model_used: app_state.generation_client.model_name().to_string(),
        timestamp: Utc::now(),
    };
    if let Err(e) = app_state.usage_log.append(entry).await {
        // Persistence warning only: the entry is lost but the response is
        // still returned to the caller.
        tracing::warn!("Failed to append usage log entry for account {account_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::panic, clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    use axum::http::StatusCode;

    use crate::gateway_util::tests::mock_app_state;
    use crate::generation::GenerationClient;
    use crate::store::{ProfileStore, ProjectStore, UsageLog};
    use crate::subscription::{Profile, SubscriptionTier};
    use crate::validation::MAX_PROMPT_CHARS;

    struct Fixture {
        app_state: AppStateData,
        account_id: Uuid,
        project_id: Uuid,
    }

    fn profile(account_id: Uuid, quota: u32, used: u32) -> Profile {
        Profile {
            account_id,
            subscription_tier: SubscriptionTier::Free,
            monthly_chapter_credits: quota,
            monthly_image_credits: 30,
            credits_used_this_month: used,
            images_used_this_month: 0,
        }
    }

    fn fixture(quota: u32, used: u32) -> Fixture {
        let account_id = Uuid::now_v7();
        let project_id = Uuid::now_v7();
        let app_state = mock_app_state(
            ProfileStore::new_mock(vec![profile(account_id, quota, used)], true),
            ProjectStore::new_mock(HashMap::from([(project_id, account_id)]), true),
            UsageLog::new_mock(true),
            GenerationClient::Mock {
                response: "The rain had not stopped for three days.".to_string(),
                healthy: true,
            },
        );
        Fixture {
            app_state,
            account_id,
            project_id,
        }
    }

    fn params(fixture: &Fixture, prompt: &str) -> GenerateParams {
        GenerateParams {
            prompt: prompt.to_string(),
            tone: "noir".to_string(),
            project_id: fixture.project_id,
            chapter_id: Uuid::now_v7(),
        }
    }

    async fn call(
        fixture: &Fixture,
        identity: Option<SessionIdentity>,
        params: GenerateParams,
    ) -> Result<Json<GenerateResponse>, Error> {
        generate_handler(
            State(fixture.app_state.clone()),
            identity.map(Extension),
            StructuredJson(params),
        )
        .await
    }

    fn identity(fixture: &Fixture) -> Option<SessionIdentity> {
        Some(SessionIdentity {
            account_id: fixture.account_id,
        })
    }

    async fn credits_used(fixture: &Fixture) -> u32 {
        fixture
            .app_state
            .profile_store
            .get_profile(fixture.account_id)
            .await
            .unwrap()
            .credits_used_this_month
    }

    #[tokio::test]
    async fn test_successful_generation_increments_and_logs_once() {
        let fixture = fixture(5, 4);
        let request = params(&fixture, "Continue the duel scene.");

        let response = call(&fixture, identity(&fixture), request).await.unwrap();
        assert_eq!(response.0.text, "The rain had not stopped for three days.");

        assert_eq!(credits_used(&fixture).await, 5);

        let entries = fixture.app_state.usage_log.mock_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].input_prompt, "Continue the duel scene.");
        assert_eq!(entries[0].output_text, "The rain had not stopped for three days.");
        assert_eq!(entries[0].model_used, "mock-generation-model");
        assert_eq!(entries[0].prompt_type, PROMPT_TYPE_STORY_GENERATION);
        assert_eq!(entries[0].account_id, fixture.account_id);
        assert_eq!(entries[0].project_id, fixture.project_id);
    }

    #[tokio::test]
    async fn test_missing_identity_rejected_before_anything_else() {
        let fixture = fixture(5, 0);
        let request = params(&fixture, "Continue the duel scene.");

        let error = call(&fixture, None, request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(credits_used(&fixture).await, 0);
        assert!(fixture.app_state.usage_log.mock_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_quota_rejected_with_counter_unchanged() {
        let fixture = fixture(5, 5);
        let request = params(&fixture, "Continue the duel scene.");

        let error = call(&fixture, identity(&fixture), request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        match error.get_details() {
            ErrorDetails::QuotaExceeded { quota } => assert_eq!(*quota, 5),
            other => panic!("expected a quota error, got: {other}"),
        }

        assert_eq!(credits_used(&fixture).await, 5);
        assert!(fixture.app_state.usage_log.mock_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_body_includes_quota_for_display() {
        let fixture = fixture(5, 5);
        let request = params(&fixture, "Continue the duel scene.");

        let error = call(&fixture, identity(&fixture), request).await.unwrap_err();
        let (_, body) = error.to_response_json();
        assert_eq!(
            body["message"],
            "You've used all 5 credits this month. Upgrade to get more!"
        );
    }

    #[tokio::test]
    async fn test_foreign_and_missing_projects_are_indistinguishable() {
        let fixture = fixture(5, 0);

        // Project owned by someone else
        let foreign_project = Uuid::now_v7();
        if let ProjectStore::Mock { owners, .. } = &fixture.app_state.project_store {
            owners.write().await.insert(foreign_project, Uuid::now_v7());
        }
        let mut request = params(&fixture, "Continue the duel scene.");
        request.project_id = foreign_project;
        let foreign_error = call(&fixture, identity(&fixture), request).await.unwrap_err();

        // Project that does not exist at all
        let mut request = params(&fixture, "Continue the duel scene.");
        request.project_id = Uuid::now_v7();
        let missing_error = call(&fixture, identity(&fixture), request).await.unwrap_err();

        let (foreign_status, foreign_body) = foreign_error.to_response_json();
        let (missing_status, missing_body) = missing_error.to_response_json();
        assert_eq!(foreign_status, StatusCode::FORBIDDEN);
        assert_eq!(foreign_status, missing_status);
        assert_eq!(foreign_body, missing_body);

        assert_eq!(credits_used(&fixture).await, 0);
        assert!(fixture.app_state.usage_log.mock_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_happens_before_any_store_access() {
        let account_id = Uuid::now_v7();
        // Unhealthy stores: the handler must reject on validation without
        // ever touching them
        let app_state = mock_app_state(
            ProfileStore::new_mock(vec![profile(account_id, 5, 0)], false),
            ProjectStore::new_mock(HashMap::new(), false),
            UsageLog::new_mock(false),
            GenerationClient::Mock {
                response: String::new(),
                healthy: false,
            },
        );
        let fixture = Fixture {
            app_state,
            account_id,
            project_id: Uuid::now_v7(),
        };

        let request = params(&fixture, "   ");
        let error = call(&fixture, identity(&fixture), request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        match error.get_details() {
            ErrorDetails::Validation { fields } => {
                assert_eq!(fields[0].field, "prompt");
            }
            other => panic!("expected a validation error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn test_prompt_over_limit_rejected() {
        let fixture = fixture(5, 0);
        let request = params(&fixture, &"a".repeat(MAX_PROMPT_CHARS + 1));

        let error = call(&fixture, identity(&fixture), request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(credits_used(&fixture).await, 0);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_no_side_effects() {
        let account_id = Uuid::now_v7();
        let project_id = Uuid::now_v7();
        let app_state = mock_app_state(
            ProfileStore::new_mock(vec![profile(account_id, 5, 2)], true),
            ProjectStore::new_mock(HashMap::from([(project_id, account_id)]), true),
            UsageLog::new_mock(true),
            GenerationClient::Mock {
                response: String::new(),
                healthy: false,
            },
        );
        let fixture = Fixture {
            app_state,
            account_id,
            project_id,
        };

        let request = params(&fixture, "Continue the duel scene.");
        let error = call(&fixture, identity(&fixture), request).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let (_, body) = error.to_response_json();
        assert_eq!(body["error"], "An error occurred while generating content");

        assert_eq!(credits_used(&fixture).await, 2);
        assert!(fixture.app_state.usage_log.mock_entries().await.is_empty());
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn test_log_append_failure_does_not_fail_the_request() {
        let account_id = Uuid::now_v7();
        let project_id = Uuid::now_v7();
        let app_state = mock_app_state(
            ProfileStore::new_mock(vec![profile(account_id, 5, 0)], true),
            ProjectStore::new_mock(HashMap::from([(project_id, account_id)]), true),
            UsageLog::new_mock(false),
            GenerationClient::Mock {
                response: "Generated text.".to_string(),
                healthy: true,
            },
        );
        let fixture = Fixture {
            app_state,
            account_id,
            project_id,
        };

        let request = params(&fixture, "Continue the duel scene.");
        let response = call(&fixture, identity(&fixture), request).await.unwrap();
        assert_eq!(response.0.text, "Generated text.");

        // The credit increment is not rolled back by the log failure
        assert_eq!(credits_used(&fixture).await, 1);
        assert!(logs_contain("Failed to append usage log entry"));
    }

    #[tokio::test]
    async fn test_prompt_and_tone_are_trimmed_before_forwarding() {
        let fixture = fixture(5, 0);
        let mut request = params(&fixture, "  Continue the duel scene.  ");
        request.tone = "  noir  ".to_string();

        call(&fixture, identity(&fixture), request).await.unwrap();

        let entries = fixture.app_state.usage_log.mock_entries().await;
        assert_eq!(entries[0].input_prompt, "Continue the duel scene.");
        assert_eq!(entries[0].tone, "noir");
    }
}
