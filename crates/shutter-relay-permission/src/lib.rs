#![warn(missing_docs)]
//! # shutter-relay-permission
//!
//! ## Purpose
//! Models the runtime media-read permission and the prompt policy around it.
//!
//! ## Responsibilities
//! - Define a host-agnostic permission probe trait.
//! - Track the last observed grant state across foreground transitions.
//! - Enforce the one-prompt-per-request policy and never re-prompt after a
//!   permanent denial.
//! - Expose the out-of-band system-settings escape hatch as a trait.
//!
//! ## Data flow
//! Host foreground/tap events call into [`PermissionGate`], which consults a
//! [`PermissionProbe`] and records the resulting [`MediaAccess`] for the
//! connection controller to act on.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors; every probe
//! interaction resolves to a [`MediaAccess`] value.
//!
//! ## Security and privacy notes
//! A permanent denial is a steady state requiring user action in system
//! settings; the gate will never issue another native prompt for it.

use std::sync::Arc;

use tracing::info;

/// Grant state of the media-read capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAccess {
    /// Capability is granted.
    Granted,
    /// Capability is denied but the host can still show a prompt.
    DeniedRetryable,
    /// Host reports that no further prompts will be shown.
    DeniedPermanently,
}

impl MediaAccess {
    /// Returns `true` when the capability is granted.
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Host permission surface consumed by the gate.
///
/// `status` reads the current grant state without side effects. Hosts that
/// cannot distinguish permanence without prompting report `DeniedRetryable`
/// from `status`; permanence is learned from a `request` outcome.
pub trait PermissionProbe: Send + Sync {
    /// Reads the current grant state.
    fn status(&self) -> MediaAccess;

    /// Triggers at most one native prompt and blocks for its outcome.
    fn request(&self) -> MediaAccess;
}

/// Fire-and-forget deep link into the host's per-app settings screen.
pub trait SettingsOpener: Send + Sync {
    /// Opens the per-app settings screen; no result is read back.
    fn open_app_settings(&self);
}

/// Tracks observed grant state and enforces prompt policy.
pub struct PermissionGate {
    probe: Arc<dyn PermissionProbe>,
    last: MediaAccess,
}

impl PermissionGate {
    /// Creates a gate and records the probe's initial status.
    pub fn new(probe: Arc<dyn PermissionProbe>) -> Self {
        let last = probe.status();
        Self { probe, last }
    }

    /// Returns the most recently observed grant state.
    pub fn last_observed(&self) -> MediaAccess {
        self.last
    }

    /// Re-reads the grant state without prompting.
    ///
    /// A previously learned permanent denial is sticky until the host
    /// reports the capability granted again (settings change).
    pub fn refresh(&mut self) -> MediaAccess {
        let status = self.probe.status();
        self.last = match (status, self.last) {
            (MediaAccess::Granted, _) => MediaAccess::Granted,
            (_, MediaAccess::DeniedPermanently) => MediaAccess::DeniedPermanently,
            (status, _) => status,
        };
        self.last
    }

    /// Requests the capability, issuing at most one native prompt.
    ///
    /// After a permanent denial no prompt is issued; the recorded state is
    /// returned unchanged and the caller must route the user to settings.
    pub fn request(&mut self) -> MediaAccess {
        if self.last == MediaAccess::DeniedPermanently {
            info!("permission request suppressed: denial is permanent");
            return MediaAccess::DeniedPermanently;
        }

        self.last = self.probe.request();
        if self.last == MediaAccess::DeniedPermanently {
            info!("permission denied permanently; prompts are exhausted");
        }
        self.last
    }
}

/// Deterministic scripted probe for tests.
///
/// `status` outcomes are consumed in order, repeating the final entry once
/// the script runs out; each `request` consumes one prompt outcome and
/// counts as an issued native dialog.
pub struct ScriptedProbe {
    statuses: std::sync::Mutex<Vec<MediaAccess>>,
    prompt_outcomes: std::sync::Mutex<Vec<MediaAccess>>,
    prompts_issued: std::sync::atomic::AtomicU32,
}

impl ScriptedProbe {
    /// Creates a probe with scripted status and prompt outcomes.
    pub fn new(statuses: Vec<MediaAccess>, prompt_outcomes: Vec<MediaAccess>) -> Self {
        Self {
            statuses: std::sync::Mutex::new(statuses),
            prompt_outcomes: std::sync::Mutex::new(prompt_outcomes),
            prompts_issued: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Creates a probe that always reports the capability granted.
    pub fn granted() -> Self {
        Self::new(vec![MediaAccess::Granted], vec![MediaAccess::Granted])
    }

    /// Returns how many native prompts were issued.
    pub fn prompts_issued(&self) -> u32 {
        self.prompts_issued
            .load(std::sync::atomic::Ordering::Acquire)
    }

    fn next_from(script: &std::sync::Mutex<Vec<MediaAccess>>) -> MediaAccess {
        let mut script = script.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if script.len() > 1 {
            return script.remove(0);
        }
        script.first().copied().unwrap_or(MediaAccess::DeniedRetryable)
    }
}

impl PermissionProbe for ScriptedProbe {
    fn status(&self) -> MediaAccess {
        Self::next_from(&self.statuses)
    }

    fn request(&self) -> MediaAccess {
        self.prompts_issued
            .fetch_add(1, std::sync::atomic::Ordering::AcqRel);
        Self::next_from(&self.prompt_outcomes)
    }
}
