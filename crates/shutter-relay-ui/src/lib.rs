#![warn(missing_docs)]
//! # shutter-relay-ui
//!
//! ## Purpose
//! Projects controller state into display text for the UI shell.
//!
//! ## Responsibilities
//! - Render [`ConnectionState`] plus permission retryability into a status
//!   snapshot.
//! - Stay a pure consumer: no transition logic, no feedback into the
//!   controller.
//!
//! ## Error model
//! Projection is total; every state maps to text.

use shutter_relay_core::ConnectionState;
use shutter_relay_permission::MediaAccess;

/// Flat display snapshot derived from controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Short uppercase headline for the primary control.
    pub headline: String,
    /// Longer status line rendered below the control.
    pub detail: String,
    /// Whether the settings escape hatch should be offered.
    pub offer_settings: bool,
}

/// Renders controller state and last observed permission into text.
pub fn project_status(state: &ConnectionState, access: MediaAccess) -> StatusSnapshot {
    let headline = match state {
        ConnectionState::Connecting => "CONNECTING...",
        ConnectionState::Connected => "CONNECTED",
        _ => "NOT CONNECTED",
    }
    .to_string();

    let permanently_denied = access == MediaAccess::DeniedPermanently;
    let detail = match state {
        ConnectionState::Idle => "Ready".to_string(),
        ConnectionState::NeedsPermission if permanently_denied => {
            "Media permission is disabled. Open system settings to enable it.".to_string()
        }
        ConnectionState::NeedsPermission => "Grant media permission to sync.".to_string(),
        ConnectionState::Connecting => "Syncing recent photos...".to_string(),
        ConnectionState::Connected => "Sync complete".to_string(),
        ConnectionState::Failed(message) => format!("Sync failed: {message}"),
    };

    StatusSnapshot {
        headline,
        detail,
        offer_settings: permanently_denied,
    }
}
