//! Transition guards for job status updates.
//!
//! Job monitors deliver status events at least once and without ordering
//! guarantees across publishers. The guard decides whether a reported state is
//! a legal successor of the last recorded one; events that fail the guard are
//! treated as stale or duplicate deliveries.

use super::states::JobState;

/// Trait for implementing state transition guards
pub trait StateGuard<S> {
    /// Check if moving from `current` to `next` is allowed
    fn check(&self, current: Option<S>, next: S) -> bool;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard rejecting backwards, repeated, and post-final job transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStateTransitionGuard;

impl JobStateTransitionGuard {
    fn rank(state: JobState) -> u8 {
        match state {
            JobState::Submitted => 0,
            JobState::Queued => 1,
            JobState::Active | JobState::Executing => 2,
            JobState::Suspended => 3,
            JobState::Complete | JobState::Failed | JobState::Canceled => 4,
        }
    }
}

impl StateGuard<JobState> for JobStateTransitionGuard {
    fn check(&self, current: Option<JobState>, next: JobState) -> bool {
        let Some(current) = current else {
            return true;
        };

        if current == next || current.is_final() {
            return false;
        }

        match (current, next) {
            // A held job may be released back into the queue or onto nodes
            (JobState::Suspended, JobState::Queued)
            | (JobState::Suspended, JobState::Active)
            | (JobState::Suspended, JobState::Executing) => true,
            (_, JobState::Suspended) => true,
            (JobState::Active, JobState::Executing) | (JobState::Executing, JobState::Active) => {
                true
            }
            (current, next) => Self::rank(next) > Self::rank(current),
        }
    }

    fn description(&self) -> &'static str {
        "Job state must move forward from the last recorded state"
    }
}

/// Convenience wrapper around [`JobStateTransitionGuard`]
pub fn is_valid_job_transition(current: Option<JobState>, next: JobState) -> bool {
    JobStateTransitionGuard.check(current, next)
}
