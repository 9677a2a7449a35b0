use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::endpoints::generate::GenerateResponse;
use crate::error::{Error, ErrorDetails};
use crate::subscription::{Feature, SubscriptionSnapshot};
use crate::validation::GenerateParams;

/// Client-side gate in front of the gateway.
///
/// Holds a locally cached subscription snapshot so the UI can display
/// credit counters and avoid round trips that would certainly be rejected.
/// Every check here is advisory only: the gateway re-validates everything
/// server-side and is the sole authority.
pub struct StoryForgeClient {
    http_client: Client,
    base_url: Url,
    session_token: SecretString,
    subscription: SubscriptionSnapshot,
}

impl StoryForgeClient {
    pub fn new(http_client: Client, base_url: Url, session_token: SecretString) -> Self {
        Self {
            http_client,
            base_url,
            session_token,
            subscription: SubscriptionSnapshot::default(),
        }
    }

    /// The cached snapshot, for credit-counter display.
    pub fn subscription(&self) -> &SubscriptionSnapshot {
        &self.subscription
    }

    /// Pure check against the cached snapshot; never performs I/O.
    pub fn can_generate_chapter(&self) -> bool {
        self.subscription.can_generate_chapter()
    }

    pub fn can_generate_image(&self) -> bool {
        self.subscription.can_generate_image()
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.subscription.tier.has_feature(feature)
    }

    /// Re-fetch the subscription snapshot and replace the cached copy
    /// wholesale (last write wins, no merge logic).
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let url = self.endpoint_url("v1/subscription")?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.session_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::ClientSide {
                    message: format!("Error fetching subscription: {e}"),
                })
            })?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::new(ErrorDetails::Authentication {
                message: "Session rejected while refreshing subscription".to_string(),
            }));
        }
        if !response.status().is_success() {
            return Err(Error::new(ErrorDetails::ClientSide {
                message: format!(
                    "Gateway returned status {} refreshing subscription",
                    response.status()
                ),
            }));
        }
        self.subscription = response.json::<SubscriptionSnapshot>().await.map_err(|e| {
            Error::new(ErrorDetails::ClientSide {
                message: format!("Error parsing subscription response: {e}"),
            })
        })?;
        Ok(())
    }

    /// Submit a generation request.
    ///
    /// Runs the same field validation the gateway enforces, then the
    /// advisory quota pre-check, before anything leaves the session. Both
    /// failure modes return without a network call. On success the cached
    /// snapshot is refreshed so displayed counters stay reasonably fresh.
    pub async fn submit(
        &mut self,
        prompt: &str,
        tone: &str,
        project_id: Uuid,
        chapter_id: Uuid,
    ) -> Result<String, Error> {
        let params = GenerateParams {
            prompt: prompt.to_string(),
            tone: tone.to_string(),
            project_id,
            chapter_id,
        };
        params.validate()?;

        if !self.can_generate_chapter() {
            return Err(Error::new(ErrorDetails::QuotaExceeded {
                quota: self.subscription.monthly_chapter_credits,
            }));
        }

        let url = self.endpoint_url("v1/generate")?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.session_token.expose_secret())
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::ClientSide {
                    message: format!("Error submitting generation request: {e}"),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or_default();
            return Err(self.map_rejection(status, &body, project_id));
        }

        let generated = response.json::<GenerateResponse>().await.map_err(|e| {
            Error::new(ErrorDetails::ClientSide {
                message: format!("Error parsing generation response: {e}"),
            })
        })?;

        // Keep the displayed counters fresh. The generation already
        // succeeded, so a failed refresh only goes stale, not wrong.
        if let Err(e) = self.refresh().await {
            tracing::warn!("Failed to refresh subscription after generation: {e}");
        }

        Ok(generated.text)
    }

    /// Map a gateway rejection back onto the error taxonomy using the safe
    /// wire shape. Anything unrecognized becomes a generic client error.
    fn map_rejection(&self, status: reqwest::StatusCode, body: &Value, project_id: Uuid) -> Error {
        let error_label = body.get("error").and_then(Value::as_str).unwrap_or("");
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Error::new(ErrorDetails::Authentication {
                message: "Session rejected by gateway".to_string(),
            }),
            reqwest::StatusCode::FORBIDDEN if error_label == "Credit limit reached" => {
                Error::new(ErrorDetails::QuotaExceeded {
                    quota: self.subscription.monthly_chapter_credits,
                })
            }
            reqwest::StatusCode::FORBIDDEN => {
                Error::new(ErrorDetails::AccessDenied { project_id })
            }
            _ => Error::new(ErrorDetails::ClientSide {
                message: format!("Gateway returned status {status}: {error_label}"),
            }),
        }
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(|e| {
            Error::new(ErrorDetails::ClientSide {
                message: format!("Invalid gateway URL `{}`: {e}", self.base_url),
            })
        })
    }

    /// Overwrite the cached snapshot directly (tests and optimistic UI).
    pub fn set_subscription(&mut self, snapshot: SubscriptionSnapshot) {
        self.subscription = snapshot;
    }
}

/// Short user-facing message for a failed operation, in place of any
/// technical error detail.
pub fn user_facing_message(error: &Error) -> &'static str {
    match error.get_details() {
        ErrorDetails::QuotaExceeded { .. } => {
            "You've reached your monthly credit limit. Upgrade to keep writing!"
        }
        ErrorDetails::Authentication { .. } => {
            "Authentication failed. Please try logging in again."
        }
        ErrorDetails::Validation { .. } => "Please check your input and try again.",
        ErrorDetails::AccessDenied { .. } => "The requested item could not be found.",
        _ => "An unexpected error occurred. Please try again.",
    }
}
