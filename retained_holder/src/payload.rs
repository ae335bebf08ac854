//! Platform result translation per holder kind

use crate::HolderConfig;
use lifecycle::Outcome;
use ui_api::{ActivityResult, GrantResult, Intent, ResultCode};

/// What a holder specialisation stores and how platform results map onto it
pub trait HolderPayload: 'static {
    /// Value continuations of this holder are resumed with (inside an
    /// [`Outcome`])
    type Value: 'static;

    /// Runtime class of the holder fragment
    const CLASS: &'static str;

    /// Fragment tag the holder is registered under
    fn tag(config: &HolderConfig) -> &str;

    /// Maps an activity result; `None` leaves it to the host's default
    /// handling
    fn translate_activity_result(_result: ActivityResult) -> Option<Outcome<Self::Value>> {
        None
    }

    /// Maps a permission grant; `None` leaves it to the host's default
    /// handling
    fn translate_permissions(_grant: GrantResult) -> Option<Outcome<Self::Value>> {
        None
    }
}

/// Holder for `start_activity_for_result` continuations
pub struct ActivityResultPayload;

impl HolderPayload for ActivityResultPayload {
    type Value = Option<Intent>;

    const CLASS: &'static str = "RetainedContinuationFragment";

    fn tag(config: &HolderConfig) -> &str {
        &config.activity_holder_tag
    }

    fn translate_activity_result(result: ActivityResult) -> Option<Outcome<Self::Value>> {
        match result.result_code {
            ResultCode::OK => Some(Outcome::Ok(result.data)),
            ResultCode::CANCELED => Some(Outcome::Cancelled),
            _ => None,
        }
    }
}

/// Holder for `request_permissions` continuations
///
/// Resumes with `Ok(None)` when every permission was denied and with
/// `Cancelled` when the platform reported no grants at all.
///
/// An empty grant list means the request was interrupted before the user
/// answered, so it is reported as `Cancelled` on purpose and is not folded
/// into the all-denied `Ok(None)` case. Callers that only test for
/// `Ok(None)` will not mistake an interrupted request for a refusal.
pub struct PermissionPayload;

impl HolderPayload for PermissionPayload {
    type Value = Option<GrantResult>;

    const CLASS: &'static str = "PermissionContinuationFragment";

    fn tag(config: &HolderConfig) -> &str {
        &config.permission_holder_tag
    }

    fn translate_permissions(grant: GrantResult) -> Option<Outcome<Self::Value>> {
        if grant.is_empty() {
            Some(Outcome::Cancelled)
        } else if grant.all_denied() {
            Some(Outcome::Ok(None))
        } else {
            Some(Outcome::Ok(Some(grant)))
        }
    }
}
