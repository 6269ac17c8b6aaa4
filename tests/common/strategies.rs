#![allow(dead_code)]

use proptest::prelude::*;

use gateway_orchestrator::models::DataType;
use gateway_orchestrator::state_machine::JobState;
use gateway_orchestrator::testing::fixtures::{input_object, output_object};
use gateway_orchestrator::testing::ProcessFixture;

/// DAG entry placed before the job submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    EnvSetup,
    InputStaging,
}

/// DAG entry placed after the job submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStep {
    OutputStaging,
    Archive,
}

/// A process DAG shaped `setup* JOB_SUBMISSION collect*`
#[derive(Debug, Clone)]
pub struct ProcessShape {
    pub setup: Vec<SetupStep>,
    pub collect: Vec<CollectStep>,
    pub max_retry: u32,
    pub auto_schedule: bool,
}

impl ProcessShape {
    pub fn fixture(&self, process_id: &str) -> ProcessFixture {
        let mut fixture = ProcessFixture::new(process_id)
            .with_max_retry(self.max_retry)
            .with_auto_schedule(self.auto_schedule);

        for (idx, step) in self.setup.iter().enumerate() {
            fixture = match step {
                SetupStep::EnvSetup => fixture.env_setup(&format!("env-{idx}")),
                SetupStep::InputStaging => fixture.input_staging(
                    &format!("in-{idx}"),
                    input_object(&format!("input-{idx}"), Some("in.dat"), DataType::Uri),
                    &format!("/data/in-{idx}.dat"),
                    &format!("/scratch/in-{idx}.dat"),
                ),
            };
        }

        fixture = fixture.job_submission("submit");

        for (idx, step) in self.collect.iter().enumerate() {
            fixture = match step {
                CollectStep::OutputStaging => fixture.output_staging(
                    &format!("out-{idx}"),
                    output_object(&format!("output-{idx}"), Some("out.dat"), DataType::Uri),
                    &format!("/scratch/out-{idx}.dat"),
                    &format!("/archive/out-{idx}.dat"),
                ),
                CollectStep::Archive => fixture.archive(
                    &format!("archive-{idx}"),
                    "/scratch",
                    &format!("/archive/bundle-{idx}.tar"),
                ),
            };
        }
        fixture.with_max_retry(self.max_retry)
    }
}

pub fn setup_step_strategy() -> impl Strategy<Value = SetupStep> {
    prop_oneof![Just(SetupStep::EnvSetup), Just(SetupStep::InputStaging)]
}

pub fn collect_step_strategy() -> impl Strategy<Value = CollectStep> {
    prop_oneof![Just(CollectStep::OutputStaging), Just(CollectStep::Archive)]
}

pub fn process_shape_strategy() -> impl Strategy<Value = ProcessShape> {
    (
        prop::collection::vec(setup_step_strategy(), 0..6),
        prop::collection::vec(collect_step_strategy(), 0..6),
        0u32..5,
        any::<bool>(),
    )
        .prop_map(|(setup, collect, max_retry, auto_schedule)| ProcessShape {
            setup,
            collect,
            max_retry,
            auto_schedule,
        })
}

pub fn job_state_strategy() -> impl Strategy<Value = JobState> {
    prop_oneof![
        Just(JobState::Submitted),
        Just(JobState::Queued),
        Just(JobState::Active),
        Just(JobState::Executing),
        Just(JobState::Complete),
        Just(JobState::Failed),
        Just(JobState::Canceled),
        Just(JobState::Suspended),
    ]
}

/// Path fragments that may contain shell metacharacters but no backslash
pub fn raw_file_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._ ()\\[\\]{}$^?&%-]{1,24}"
}

pub fn clean_segment_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,10}"
}

/// Experiment data directories, with or without a leading separator
pub fn data_dir_strategy() -> impl Strategy<Value = String> {
    (
        any::<bool>(),
        prop::collection::vec(clean_segment_strategy(), 1..4),
    )
        .prop_map(|(absolute, segments)| {
            let joined = segments.join("/");
            if absolute {
                format!("/{joined}")
            } else {
                joined
            }
        })
}
