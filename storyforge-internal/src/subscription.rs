use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Credits granted to accounts that have never picked a plan.
pub const DEFAULT_CHAPTER_CREDITS: u32 = 5;
pub const DEFAULT_IMAGE_CREDITS: u32 = 30;

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Studio,
}

/// Tier-gated feature sets, checked by the client before showing
/// upgrade-only UI affordances.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Feature {
    Pro,
    Studio,
}

impl SubscriptionTier {
    /// Pro features are available on Pro and Studio; Studio features only on Studio.
    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::Pro => matches!(self, SubscriptionTier::Pro | SubscriptionTier::Studio),
            Feature::Studio => matches!(self, SubscriptionTier::Studio),
        }
    }
}

/// An account's subscription record as stored in the profile store.
///
/// The consumed counters are monotonically non-decreasing within a billing
/// period. They are incremented only by the gateway commit step and zeroed
/// only by the external period-rollover process.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Profile {
    pub account_id: Uuid,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default = "default_chapter_credits")]
    pub monthly_chapter_credits: u32,
    #[serde(default = "default_image_credits")]
    pub monthly_image_credits: u32,
    #[serde(default)]
    pub credits_used_this_month: u32,
    #[serde(default)]
    pub images_used_this_month: u32,
}

fn default_chapter_credits() -> u32 {
    DEFAULT_CHAPTER_CREDITS
}

fn default_image_credits() -> u32 {
    DEFAULT_IMAGE_CREDITS
}

impl Profile {
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            subscription_tier: SubscriptionTier::default(),
            monthly_chapter_credits: DEFAULT_CHAPTER_CREDITS,
            monthly_image_credits: DEFAULT_IMAGE_CREDITS,
            credits_used_this_month: 0,
            images_used_this_month: 0,
        }
    }

    pub fn chapter_quota_exhausted(&self) -> bool {
        self.credits_used_this_month >= self.monthly_chapter_credits
    }
}

/// The client-side view of a subscription, returned by `GET /v1/subscription`
/// and cached wholesale by the client gate (last write wins).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSnapshot {
    pub tier: SubscriptionTier,
    pub monthly_chapter_credits: u32,
    pub monthly_image_credits: u32,
    pub credits_used_this_month: u32,
    pub images_used_this_month: u32,
}

impl Default for SubscriptionSnapshot {
    fn default() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            monthly_chapter_credits: DEFAULT_CHAPTER_CREDITS,
            monthly_image_credits: DEFAULT_IMAGE_CREDITS,
            credits_used_this_month: 0,
            images_used_this_month: 0,
        }
    }
}

impl From<&Profile> for SubscriptionSnapshot {
    fn from(profile: &Profile) -> Self {
        Self {
            tier: profile.subscription_tier,
            monthly_chapter_credits: profile.monthly_chapter_credits,
            monthly_image_credits: profile.monthly_image_credits,
            credits_used_this_month: profile.credits_used_this_month,
            images_used_this_month: profile.images_used_this_month,
        }
    }
}

impl SubscriptionSnapshot {
    pub fn can_generate_chapter(&self) -> bool {
        self.credits_used_this_month < self.monthly_chapter_credits
    }

    pub fn can_generate_image(&self) -> bool {
        self.images_used_this_month < self.monthly_image_credits
    }
}
