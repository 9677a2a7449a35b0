use axum::extract::{Extension, State};
use axum::response::Json;

use crate::auth::SessionIdentity;
use crate::error::{Error, ErrorDetails};
use crate::gateway_util::AppState;
use crate::subscription::SubscriptionSnapshot;

/// A handler for `GET /v1/subscription`.
///
/// Returns the caller's subscription snapshot for the client gate's
/// `refresh()` operation. The snapshot is read fresh from the profile
/// store on every call; the gateway keeps no per-account state.
pub async fn subscription_handler(
    State(app_state): AppState,
    identity: Option<Extension<SessionIdentity>>,
) -> Result<Json<SubscriptionSnapshot>, Error> {
    let Some(Extension(identity)) = identity else {
        return Err(Error::new(ErrorDetails::Authentication {
            message: "No session identity attached to request".to_string(),
        }));
    };

    let profile = app_state
        .profile_store
        .get_profile(identity.account_id)
        .await?;
    Ok(Json(SubscriptionSnapshot::from(&profile)))
}
