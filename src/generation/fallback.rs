use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    error::UpstreamFailure,
    generation::{EndpointTarget, FallbackReason, GenerationResult},
};

pub const DEFAULT_RETRY_BUDGET: u32 = 1;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Current route for a pipeline instance. Only ever moves from `ViaBackend`
/// to `Direct`; concurrent callers racing on it at worst retry once more.
#[derive(Debug)]
pub struct TargetSelector {
    via_backend: AtomicBool,
}

impl TargetSelector {
    pub fn new(initial: EndpointTarget) -> Self {
        Self {
            via_backend: AtomicBool::new(initial == EndpointTarget::ViaBackend),
        }
    }

    pub fn current(&self) -> EndpointTarget {
        if self.via_backend.load(Ordering::Relaxed) {
            EndpointTarget::ViaBackend
        } else {
            EndpointTarget::Direct
        }
    }

    /// Returns true when this call performed the switch.
    pub fn switch_to_direct(&self) -> bool {
        self.via_backend.swap(false, Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Re-attempt after the given delay.
    Retry(Duration),
    GiveUp,
}

/// Retry budget shared by target switches and backoff retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: DEFAULT_RETRY_BUDGET,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.budget.saturating_add(1)
    }

    /// Decides what follows a failed attempt made against `target`.
    /// A backend that cannot be reached is abandoned without waiting.
    pub fn next_step(
        &self,
        failure: &UpstreamFailure,
        target: EndpointTarget,
        retries_used: u32,
    ) -> NextStep {
        if retries_used >= self.budget {
            return NextStep::GiveUp;
        }
        if target == EndpointTarget::ViaBackend && failure.is_transport() {
            NextStep::Retry(Duration::ZERO)
        } else {
            NextStep::Retry(self.backoff)
        }
    }
}

pub fn apology_text(failure: &UpstreamFailure) -> String {
    format!("[FALLBACK RESPONSE] Maaf, API AI tidak tersedia saat ini. Error: {failure}")
}

pub fn exhausted(failure: &UpstreamFailure) -> GenerationResult {
    GenerationResult::Fallback {
        text: apology_text(failure),
        reason: FallbackReason::Exhausted,
    }
}
