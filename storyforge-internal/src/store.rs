use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::error::{Error, ErrorDetails};
use crate::subscription::Profile;

/// Category label recorded with every chapter-generation log entry.
pub const PROMPT_TYPE_STORY_GENERATION: &str = "story_generation";

/// Outcome of the conditional credit increment.
///
/// The increment only succeeds while `credits_used_this_month` is below the
/// monthly quota, which closes the check-then-act race between concurrent
/// requests from the same account: the loser observes `Exhausted` instead
/// of pushing the counter past the ceiling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreditOutcome {
    Consumed,
    Exhausted,
}

#[derive(Debug, Deserialize)]
struct ConsumeCreditResponse {
    consumed: bool,
}

/// Connection to the account/profile store.
#[derive(Clone, Debug)]
pub enum ProfileStore {
    Production {
        client: Client,
        base_url: Url,
    },
    Mock {
        profiles: Arc<RwLock<HashMap<Uuid, Profile>>>,
        healthy: bool,
    },
}

impl ProfileStore {
    pub fn new_production(client: Client, base_url: Url) -> Self {
        Self::Production { client, base_url }
    }

    pub fn new_mock(profiles: Vec<Profile>, healthy: bool) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.account_id, profile))
            .collect();
        Self::Mock {
            profiles: Arc::new(RwLock::new(profiles)),
            healthy,
        }
    }

    pub async fn get_profile(&self, account_id: Uuid) -> Result<Profile, Error> {
        match self {
            ProfileStore::Production { client, base_url } => {
                let url = join_url(base_url, &format!("profiles/{account_id}"))?;
                let response = client.get(url).send().await.map_err(|e| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Error fetching profile: {e}"),
                    })
                })?;
                if !response.status().is_success() {
                    return Err(Error::new(ErrorDetails::ProfileStore {
                        message: format!(
                            "Profile store returned status {} for account {account_id}",
                            response.status()
                        ),
                    }));
                }
                response.json::<Profile>().await.map_err(|e| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Error parsing profile response: {e}"),
                    })
                })
            }
            ProfileStore::Mock { profiles, healthy } => {
                if !healthy {
                    return Err(Error::new(ErrorDetails::ProfileStore {
                        message: "Mock profile store is not healthy".to_string(),
                    }));
                }
                let profiles = profiles.read().await;
                profiles.get(&account_id).cloned().ok_or_else(|| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Profile not found for account {account_id}"),
                    })
                })
            }
        }
    }

    /// Increment the consumed-chapter counter by exactly 1, but only while
    /// it is below the monthly quota (`UPDATE ... WHERE used < quota`
    /// semantics on the production store).
    pub async fn consume_chapter_credit(&self, account_id: Uuid) -> Result<CreditOutcome, Error> {
        match self {
            ProfileStore::Production { client, base_url } => {
                let url = join_url(
                    base_url,
                    &format!("profiles/{account_id}/consume-chapter-credit"),
                )?;
                let response = client.post(url).send().await.map_err(|e| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Error consuming chapter credit: {e}"),
                    })
                })?;
                if !response.status().is_success() {
                    return Err(Error::new(ErrorDetails::ProfileStore {
                        message: format!(
                            "Profile store returned status {} consuming credit for account {account_id}",
                            response.status()
                        ),
                    }));
                }
                let body = response.json::<ConsumeCreditResponse>().await.map_err(|e| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Error parsing consume-credit response: {e}"),
                    })
                })?;
                if body.consumed {
                    Ok(CreditOutcome::Consumed)
                } else {
                    Ok(CreditOutcome::Exhausted)
                }
            }
            ProfileStore::Mock { profiles, healthy } => {
                if !healthy {
                    return Err(Error::new(ErrorDetails::ProfileStore {
                        message: "Mock profile store is not healthy".to_string(),
                    }));
                }
                let mut profiles = profiles.write().await;
                let profile = profiles.get_mut(&account_id).ok_or_else(|| {
                    Error::new(ErrorDetails::ProfileStore {
                        message: format!("Profile not found for account {account_id}"),
                    })
                })?;
                if profile.credits_used_this_month >= profile.monthly_chapter_credits {
                    return Ok(CreditOutcome::Exhausted);
                }
                profile.credits_used_this_month += 1;
                Ok(CreditOutcome::Consumed)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    owner_id: Uuid,
}

/// Connection to the project store. The gateway only ever reads the owning
/// account id of a project.
#[derive(Clone, Debug)]
pub enum ProjectStore {
    Production {
        client: Client,
        base_url: Url,
    },
    Mock {
        owners: Arc<RwLock<HashMap<Uuid, Uuid>>>,
        healthy: bool,
    },
}

impl ProjectStore {
    pub fn new_production(client: Client, base_url: Url) -> Self {
        Self::Production { client, base_url }
    }

    pub fn new_mock(owners: HashMap<Uuid, Uuid>, healthy: bool) -> Self {
        Self::Mock {
            owners: Arc::new(RwLock::new(owners)),
            healthy,
        }
    }

    /// Returns the owning account id, or `None` if the project does not
    /// exist. Callers must treat those two cases identically on the wire.
    pub async fn get_project_owner(&self, project_id: Uuid) -> Result<Option<Uuid>, Error> {
        match self {
            ProjectStore::Production { client, base_url } => {
                let url = join_url(base_url, &format!("projects/{project_id}"))?;
                let response = client.get(url).send().await.map_err(|e| {
                    Error::new(ErrorDetails::ProjectStore {
                        message: format!("Error fetching project: {e}"),
                    })
                })?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(Error::new(ErrorDetails::ProjectStore {
                        message: format!(
                            "Project store returned status {} for project {project_id}",
                            response.status()
                        ),
                    }));
                }
                let record = response.json::<ProjectRecord>().await.map_err(|e| {
                    Error::new(ErrorDetails::ProjectStore {
                        message: format!("Error parsing project response: {e}"),
                    })
                })?;
                Ok(Some(record.owner_id))
            }
            ProjectStore::Mock { owners, healthy } => {
                if !healthy {
                    return Err(Error::new(ErrorDetails::ProjectStore {
                        message: "Mock project store is not healthy".to_string(),
                    }));
                }
                let owners = owners.read().await;
                Ok(owners.get(&project_id).copied())
            }
        }
    }
}

/// One durable audit record per successful generation. Append-only; never
/// mutated or deleted by the gateway.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UsageLogEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub prompt_type: String,
    pub tone: String,
    pub input_prompt: String,
    pub output_text: String,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
}

/// Connection to the append-only usage log.
#[derive(Clone, Debug)]
pub enum UsageLog {
    Production {
        client: Client,
        base_url: Url,
    },
    Mock {
        entries: Arc<RwLock<Vec<UsageLogEntry>>>,
        healthy: bool,
    },
}

impl UsageLog {
    pub fn new_production(client: Client, base_url: Url) -> Self {
        Self::Production { client, base_url }
    }

    pub fn new_mock(healthy: bool) -> Self {
        Self::Mock {
            entries: Arc::new(RwLock::new(Vec::new())),
            healthy,
        }
    }

    pub async fn append(&self, entry: UsageLogEntry) -> Result<(), Error> {
        match self {
            UsageLog::Production { client, base_url } => {
                let url = join_url(base_url, "usage-log")?;
                let response = client.post(url).json(&entry).send().await.map_err(|e| {
                    Error::new(ErrorDetails::UsageLog {
                        message: format!("Error appending usage log entry: {e}"),
                    })
                })?;
                if !response.status().is_success() {
                    return Err(Error::new(ErrorDetails::UsageLog {
                        message: format!(
                            "Usage log returned status {} for entry {}",
                            response.status(),
                            entry.id
                        ),
                    }));
                }
                Ok(())
            }
            UsageLog::Mock { entries, healthy } => {
                if !healthy {
                    return Err(Error::new(ErrorDetails::UsageLog {
                        message: "Mock usage log is not healthy".to_string(),
                    }));
                }
                let mut entries = entries.write().await;
                entries.push(entry);
                Ok(())
            }
        }
    }

    /// Read back the recorded entries (mock only, for tests).
    pub async fn mock_entries(&self) -> Vec<UsageLogEntry> {
        match self {
            UsageLog::Production { .. } => Vec::new(),
            UsageLog::Mock { entries, .. } => entries.read().await.clone(),
        }
    }
}

fn join_url(base_url: &Url, path: &str) -> Result<Url, Error> {
    base_url.join(path).map_err(|e| {
        Error::new(ErrorDetails::Config {
            message: format!("Failed to construct store URL from `{base_url}` and `{path}`: {e}"),
        })
    })
}
