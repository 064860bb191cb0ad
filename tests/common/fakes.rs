//! In-process stand-ins for the external services
//!
//! Each fake keeps just enough state for the tests to script answers and
//! inspect the calls that were made.

use aef_orchestrator::jobs::{AdapterError, BackendAdapter, JobHandle, JobSpec};
use aef_orchestrator::pipeline::{WorkflowEngine, WorkflowEngineError};
use aef_orchestrator::scheduling::{SchedulerError, SchedulerJobSpec, SchedulerService};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::constants::DEFAULT_JOB_HANDLE;

/// Execution backend answering from queues of scripted results.
///
/// With an empty queue, submissions return `DEFAULT_JOB_HANDLE` and polls
/// report `RUNNING`.
#[derive(Default)]
pub struct ScriptedBackend {
    submit_answers: Mutex<VecDeque<Result<String, AdapterError>>>,
    poll_answers: Mutex<VecDeque<Result<String, AdapterError>>>,
    submitted: Mutex<Vec<JobSpec>>,
    polled: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn push_submit(&self, answer: Result<&str, AdapterError>) {
        self.submit_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
    }

    pub fn push_poll(&self, answer: Result<&str, AdapterError>) {
        self.poll_answers
            .lock()
            .unwrap()
            .push_back(answer.map(str::to_string));
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polled_handles(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    async fn submit(&self, _target: &str, spec: &JobSpec) -> Result<String, AdapterError> {
        self.submitted.lock().unwrap().push(spec.clone());
        self.submit_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_JOB_HANDLE.to_string()))
    }

    async fn poll(
        &self,
        _target: &str,
        _spec: &JobSpec,
        handle: &JobHandle,
    ) -> Result<String, AdapterError> {
        self.polled.lock().unwrap().push(handle.to_string());
        self.poll_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("RUNNING".to_string()))
    }
}

/// Workflow engine that records every start and numbers the executions.
#[derive(Default)]
pub struct RecordingEngine {
    starts: Mutex<Vec<(String, JsonValue)>>,
    reject_with: Mutex<Option<u16>>,
}

#[allow(dead_code)]
impl RecordingEngine {
    /// Makes every following start fail with `status`.
    pub fn reject_with(&self, status: u16) {
        *self.reject_with.lock().unwrap() = Some(status);
    }

    pub fn starts(&self) -> Vec<(String, JsonValue)> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowEngine for RecordingEngine {
    async fn start_execution(
        &self,
        workflow_name: &str,
        argument: &JsonValue,
    ) -> Result<String, WorkflowEngineError> {
        if let Some(status) = *self.reject_with.lock().unwrap() {
            return Err(WorkflowEngineError::Rejected {
                status,
                message: "workflow not found".to_string(),
            });
        }
        let mut starts = self.starts.lock().unwrap();
        starts.push((workflow_name.to_string(), argument.clone()));
        Ok(format!("exec-{:04}", starts.len()))
    }
}

/// One job as the fake scheduling service holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredJob {
    pub spec: SchedulerJobSpec,
    pub paused: bool,
}

/// Scheduling service keeping its jobs in memory, with the real service's
/// conflict answers.
#[derive(Default)]
pub struct InMemoryScheduler {
    jobs: Mutex<HashMap<String, StoredJob>>,
    unavailable: Mutex<bool>,
}

#[allow(dead_code)]
impl InMemoryScheduler {
    pub fn job(&self, name: &str) -> Option<StoredJob> {
        self.jobs.lock().unwrap().get(name).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Makes every following call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> Result<(), SchedulerError> {
        if *self.unavailable.lock().unwrap() {
            return Err(SchedulerError::Rejected {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn set_paused(&self, name: &str, paused: bool) -> Result<(), SchedulerError> {
        self.check_available()?;
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
        if job.paused == paused {
            return Err(SchedulerError::AlreadyInState(name.to_string()));
        }
        job.paused = paused;
        Ok(())
    }
}

#[async_trait]
impl SchedulerService for InMemoryScheduler {
    async fn create_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError> {
        self.check_available()?;
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.name) {
            return Err(SchedulerError::AlreadyExists(job.name.clone()));
        }
        jobs.insert(
            job.name.clone(),
            StoredJob {
                spec: job.clone(),
                paused: false,
            },
        );
        Ok(())
    }

    async fn update_job(&self, job: &SchedulerJobSpec) -> Result<(), SchedulerError> {
        self.check_available()?;
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .get_mut(&job.name)
            .ok_or_else(|| SchedulerError::NotFound(job.name.clone()))?;
        stored.spec = job.clone();
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.check_available()?;
        self.jobs
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))
    }

    async fn pause_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.set_paused(name, true)
    }

    async fn resume_job(&self, name: &str) -> Result<(), SchedulerError> {
        self.set_paused(name, false)
    }
}
