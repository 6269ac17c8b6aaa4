// State machine module for job and process lifecycle handling
//
// Job states arrive asynchronously from remote monitors; the guards decide which
// reported transitions are applied and which are dropped as stale.

pub mod guards;
pub mod states;

pub use guards::{is_valid_job_transition, JobStateTransitionGuard, StateGuard};
pub use states::{JobState, ProcessState};
