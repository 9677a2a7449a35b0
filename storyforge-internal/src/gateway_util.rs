use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{rejection::JsonRejection, FromRequest, Json, Request};
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::auth::{require_session, Auth, SessionIdentity};
use crate::config_parser::Config;
use crate::endpoints;
use crate::error::{Error, ErrorDetails};
use crate::generation::GenerationClient;
use crate::store::{ProfileStore, ProjectStore, UsageLog};

const DEFAULT_HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Canned output used when no generation backend is configured.
const MOCK_GENERATION_RESPONSE: &str =
    "The gateway is running without a generation backend; configure `[generation]` to produce real prose.";

/// Represents the authentication state of the gateway
#[derive(Clone)]
pub enum AuthenticationInfo {
    Enabled(Auth),
    Disabled,
}

/// State for the API
#[derive(Clone)]
pub struct AppStateData {
    pub config: Arc<Config>,
    pub http_client: Client,
    pub authentication_info: AuthenticationInfo,
    pub profile_store: ProfileStore,
    pub project_store: ProjectStore,
    pub usage_log: UsageLog,
    pub generation_client: GenerationClient,
}
pub type AppState = axum::extract::State<AppStateData>;

impl AppStateData {
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        let http_client = setup_http_client()?;
        let authentication_info = setup_authentication(&config);

        let profile_store = match &config.profile_store {
            Some(store) => {
                ProfileStore::new_production(http_client.clone(), store.base_url.clone())
            }
            None => {
                tracing::warn!(
                    "No `[profile_store]` configured; using an in-memory mock profile store"
                );
                ProfileStore::new_mock(Vec::new(), true)
            }
        };
        let project_store = match &config.project_store {
            Some(store) => {
                ProjectStore::new_production(http_client.clone(), store.base_url.clone())
            }
            None => {
                tracing::warn!(
                    "No `[project_store]` configured; using an in-memory mock project store"
                );
                ProjectStore::new_mock(HashMap::new(), true)
            }
        };
        let usage_log = match &config.usage_log {
            Some(store) => UsageLog::new_production(http_client.clone(), store.base_url.clone()),
            None => {
                tracing::warn!("No `[usage_log]` configured; using an in-memory mock usage log");
                UsageLog::new_mock(true)
            }
        };

        let generation_client = match &config.generation {
            Some(generation) => {
                let api_key = std::env::var(&generation.api_key_env_var).map_err(|_| {
                    Error::new(ErrorDetails::AppState {
                        message: format!(
                            "Generation backend API key environment variable `{}` is not set",
                            generation.api_key_env_var
                        ),
                    })
                })?;
                GenerationClient::Production {
                    base_url: generation.base_url.clone(),
                    api_key: SecretString::from(api_key),
                    model_name: generation.model_name.clone(),
                }
            }
            None => {
                tracing::warn!(
                    "No `[generation]` configured; using a mock generation backend"
                );
                GenerationClient::Mock {
                    response: MOCK_GENERATION_RESPONSE.to_string(),
                    healthy: true,
                }
            }
        };

        Ok(Self {
            config,
            http_client,
            authentication_info,
            profile_store,
            project_store,
            usage_log,
            generation_client,
        })
    }
}

fn setup_authentication(config: &Config) -> AuthenticationInfo {
    if !config.auth.enabled {
        return AuthenticationInfo::Disabled;
    }
    let sessions = config
        .auth
        .sessions
        .iter()
        .map(|(hashed_token, account_id)| {
            (
                hashed_token.clone(),
                SessionIdentity {
                    account_id: *account_id,
                },
            )
        })
        .collect();
    AuthenticationInfo::Enabled(Auth::new(sessions))
}

pub fn setup_http_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(DEFAULT_HTTP_CLIENT_TIMEOUT)
        .build()
        .map_err(|e| {
            Error::new(ErrorDetails::AppState {
                message: format!("Failed to build HTTP client: {e}"),
            })
        })
}

/// Build the gateway router: the gated generation/subscription routes
/// (behind the session middleware when authentication is enabled), plus the
/// unauthenticated status routes and the fallback.
pub fn build_router(app_state: AppStateData) -> Router {
    let gated_routes = Router::new()
        .route("/v1/generate", post(endpoints::generate::generate_handler))
        .route(
            "/v1/subscription",
            get(endpoints::subscription::subscription_handler),
        );

    // Apply the session middleware only if authentication is enabled
    let gated_routes = match &app_state.authentication_info {
        AuthenticationInfo::Enabled(auth) => gated_routes.layer(
            axum::middleware::from_fn_with_state(auth.clone(), require_session),
        ),
        AuthenticationInfo::Disabled => gated_routes,
    };

    Router::new()
        .merge(gated_routes)
        .route("/status", get(endpoints::status::status_handler))
        .route("/health", get(endpoints::status::health_handler))
        .fallback(endpoints::fallback::handle_404)
        .with_state(app_state)
}

#[derive(Debug)]
pub struct StructuredJson<T>(pub T);

impl<S, T> FromRequest<S> for StructuredJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: Send + Sync + DeserializeOwned,
{
    type Rejection = Error;

    #[instrument(skip_all, level = "trace", name = "StructuredJson::from_request")]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Retrieve the request body as Bytes before deserializing it
        let bytes = bytes::Bytes::from_request(req, state).await.map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: format!("{} ({})", e, e.status()),
            })
        })?;

        // Convert the entire body into `serde_json::Value`
        let value = Json::<serde_json::Value>::from_bytes(&bytes)
            .map_err(|e| {
                Error::new(ErrorDetails::JsonRequest {
                    message: format!("{} ({})", e, e.status()),
                })
            })?
            .0;

        // Now use `serde_path_to_error::deserialize` to attempt deserialization into `T`
        let deserialized: T = serde_path_to_error::deserialize(&value).map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: e.to_string(),
            })
        })?;

        Ok(StructuredJson(deserialized))
    }
}
