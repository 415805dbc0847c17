//! Non-navigational gates for UI actions and regions.

use serde::Serialize;

use tenantgate_auth::{AccessRequirement, Decision, DenyReason};

use crate::notice::Notice;
use crate::resolver::ResolutionState;

/// Shared decision for action and content gates.
///
/// A requirement naming neither a permission nor the tenancy-owner role is a
/// configuration error on a gate and denies. Missing or loading state denies.
fn gate_decision(requirement: &AccessRequirement, state: Option<&ResolutionState>) -> Decision {
    if requirement.is_unconstrained() {
        tracing::warn!("gate requirement names no permission and no role; denying");
        return Decision::Deny(DenyReason::AmbiguousRequirement);
    }

    match state {
        Some(state) => state.decide(requirement),
        None => Decision::Deny(DenyReason::Unresolved),
    }
}

/// What a content gate shows when access is denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback<T> {
    Nothing,
    /// Generic notice (see [`Notice`]).
    Notice,
    Custom(T),
}

impl<T> Default for Fallback<T> {
    fn default() -> Self {
        Fallback::Nothing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome<T> {
    Rendered(T),
    Fallback(T),
    Notice(Notice),
    Nothing,
}

impl<T> ContentOutcome<T> {
    pub fn is_rendered(&self) -> bool {
        matches!(self, ContentOutcome::Rendered(_))
    }
}

/// Hides or replaces a UI region the principal may not see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentGate<T> {
    pub requirement: AccessRequirement,
    pub fallback: Fallback<T>,
}

impl<T: Clone> ContentGate<T> {
    pub fn new(requirement: AccessRequirement) -> Self {
        Self {
            requirement,
            fallback: Fallback::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback<T>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn decide(&self, state: Option<&ResolutionState>) -> Decision {
        gate_decision(&self.requirement, state)
    }

    /// Render `children` if allowed, otherwise the configured fallback.
    ///
    /// Nothing is rendered while permissions are still loading so that no
    /// notice flashes before the resolution settles.
    pub fn render(&self, state: Option<&ResolutionState>, children: T) -> ContentOutcome<T> {
        match self.decide(state) {
            Decision::Allow => ContentOutcome::Rendered(children),
            Decision::Deny(DenyReason::Unresolved) => ContentOutcome::Nothing,
            Decision::Deny(_) => match &self.fallback {
                Fallback::Nothing => ContentOutcome::Nothing,
                Fallback::Notice => ContentOutcome::Notice(
                    state
                        .and_then(ResolutionState::notice)
                        .unwrap_or(Notice::InsufficientPermission),
                ),
                Fallback::Custom(fallback) => ContentOutcome::Fallback(fallback.clone()),
            },
        }
    }
}

/// How a denied action is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenDenied {
    Hide,
    #[default]
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Enabled,
    Disabled { reason: DenyReason },
    Hidden,
}

impl ActionStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ActionStatus::Enabled)
    }
}

/// Enables, disables or hides a UI action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGate {
    pub requirement: AccessRequirement,
    pub when_denied: WhenDenied,
}

impl ActionGate {
    pub fn new(requirement: AccessRequirement) -> Self {
        Self {
            requirement,
            when_denied: WhenDenied::default(),
        }
    }

    pub fn hide_when_denied(mut self) -> Self {
        self.when_denied = WhenDenied::Hide;
        self
    }

    pub fn status(&self, state: Option<&ResolutionState>) -> ActionStatus {
        match gate_decision(&self.requirement, state) {
            Decision::Allow => ActionStatus::Enabled,
            // Still loading: keep the control visible but inert.
            Decision::Deny(reason @ DenyReason::Unresolved) => ActionStatus::Disabled { reason },
            Decision::Deny(reason) => match self.when_denied {
                WhenDenied::Hide => ActionStatus::Hidden,
                WhenDenied::Disable => ActionStatus::Disabled { reason },
            },
        }
    }

    /// Run `action` only if the gate allows it.
    pub fn run<R>(&self, state: Option<&ResolutionState>, action: impl FnOnce() -> R) -> Result<R, DenyReason> {
        gate_decision(&self.requirement, state).into_result()?;
        Ok(action())
    }
}
