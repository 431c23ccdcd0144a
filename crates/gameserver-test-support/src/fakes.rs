//! Scripted collaborators that record every call.

use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use gameserver_core::{
    CollaboratorError, ConfirmRequest, Confirmer, ContentDownloader, FetchRequest, LogOptions,
    LogStream, StopResult, Supervisor, TransientUnit,
};
use gameserver_fsops::RECORD_FILE_NAME;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rejected(reason: &str) -> CollaboratorError {
    CollaboratorError::Rejected {
        reason: reason.to_string(),
    }
}

/// Supervisor call observed by [`FakeSupervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    /// `is_active(unit)`.
    IsActive(String),
    /// `state(unit)`.
    State(String),
    /// `run_transient(unit)`.
    RunTransient(TransientUnit),
    /// `stop(unit)`.
    Stop(String),
    /// `tail_logs(unit, options)`.
    TailLogs(String, LogOptions),
}

#[derive(Debug, Default)]
struct SupervisorState {
    active: BTreeSet<String>,
    calls: Vec<SupervisorCall>,
    query_failure: Option<String>,
    stop_failure: Option<String>,
    run_failure: Option<String>,
    log_lines: Vec<String>,
}

/// In-memory supervisor with scripted unit state.
#[derive(Debug, Default)]
pub struct FakeSupervisor {
    state: Mutex<SupervisorState>,
}

impl FakeSupervisor {
    /// Supervisor with no active units.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `unit` active.
    #[must_use]
    pub fn with_active(self, unit: &str) -> Self {
        lock(&self.state).active.insert(unit.to_string());
        self
    }

    /// Fail every `is_active` and `state` query.
    #[must_use]
    pub fn failing_queries(self, reason: &str) -> Self {
        lock(&self.state).query_failure = Some(reason.to_string());
        self
    }

    /// Fail every `stop`.
    #[must_use]
    pub fn failing_stop(self, reason: &str) -> Self {
        lock(&self.state).stop_failure = Some(reason.to_string());
        self
    }

    /// Fail every `run_transient`.
    #[must_use]
    pub fn failing_run(self, reason: &str) -> Self {
        lock(&self.state).run_failure = Some(reason.to_string());
        self
    }

    /// Journal lines returned by `tail_logs`.
    #[must_use]
    pub fn with_log_lines(self, lines: &[&str]) -> Self {
        lock(&self.state).log_lines = lines.iter().map(ToString::to_string).collect();
        self
    }

    /// Calls observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SupervisorCall> {
        lock(&self.state).calls.clone()
    }

    /// Units launched so far.
    #[must_use]
    pub fn launched(&self) -> Vec<TransientUnit> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                SupervisorCall::RunTransient(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether `unit` is currently marked active.
    #[must_use]
    pub fn is_unit_active(&self, unit: &str) -> bool {
        lock(&self.state).active.contains(unit)
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn is_active(&self, unit: &str) -> Result<bool, CollaboratorError> {
        let mut state = lock(&self.state);
        state.calls.push(SupervisorCall::IsActive(unit.to_string()));
        if let Some(reason) = &state.query_failure {
            return Err(rejected(reason));
        }
        Ok(state.active.contains(unit))
    }

    async fn state(&self, unit: &str) -> Result<String, CollaboratorError> {
        let mut state = lock(&self.state);
        state.calls.push(SupervisorCall::State(unit.to_string()));
        if let Some(reason) = &state.query_failure {
            return Err(rejected(reason));
        }
        let label = if state.active.contains(unit) {
            "active"
        } else {
            "inactive"
        };
        Ok(label.to_string())
    }

    async fn run_transient(&self, unit: &TransientUnit) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        state.calls.push(SupervisorCall::RunTransient(unit.clone()));
        if let Some(reason) = &state.run_failure {
            return Err(rejected(reason));
        }
        state.active.insert(unit.unit_name.clone());
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<StopResult, CollaboratorError> {
        let mut state = lock(&self.state);
        state.calls.push(SupervisorCall::Stop(unit.to_string()));
        if let Some(reason) = &state.stop_failure {
            return Err(rejected(reason));
        }
        if state.active.remove(unit) {
            Ok(StopResult::Stopped)
        } else {
            Ok(StopResult::WasNotRunning)
        }
    }

    async fn tail_logs(
        &self,
        unit: &str,
        options: &LogOptions,
    ) -> Result<LogStream, CollaboratorError> {
        let mut state = lock(&self.state);
        state
            .calls
            .push(SupervisorCall::TailLogs(unit.to_string(), options.clone()));
        let lines: Vec<Result<String, CollaboratorError>> =
            state.log_lines.iter().cloned().map(Ok).collect();
        Ok(Box::pin(tokio_stream::iter(lines)))
    }
}

/// Scripted result of a fake fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchOutcome {
    /// Write the scripted files and succeed.
    #[default]
    Succeed,
    /// Write the scripted files, then exit with the given code.
    Fail(i32),
    /// Behave as if the operator pressed Ctrl-C.
    Interrupt,
}

#[derive(Debug)]
struct FakeFile {
    relative: String,
    contents: Vec<u8>,
    executable: bool,
}

#[derive(Debug, Default)]
struct DownloaderState {
    outcome: FetchOutcome,
    files: Vec<FakeFile>,
    requests: Vec<FetchRequest>,
    record_present_at_fetch: Vec<bool>,
}

/// Downloader that records requests and populates the target directory.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    state: Mutex<DownloaderState>,
}

impl FakeDownloader {
    /// Downloader that succeeds without writing files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of every fetch.
    #[must_use]
    pub fn with_outcome(self, outcome: FetchOutcome) -> Self {
        lock(&self.state).outcome = outcome;
        self
    }

    /// Write `contents` to `relative` under the target directory on each fetch.
    #[must_use]
    pub fn with_file(self, relative: &str, contents: &[u8]) -> Self {
        self.push_file(relative, contents, false)
    }

    /// Like [`FakeDownloader::with_file`], with the file marked executable.
    #[must_use]
    pub fn with_executable(self, relative: &str, contents: &[u8]) -> Self {
        self.push_file(relative, contents, true)
    }

    fn push_file(self, relative: &str, contents: &[u8], executable: bool) -> Self {
        lock(&self.state).files.push(FakeFile {
            relative: relative.to_string(),
            contents: contents.to_vec(),
            executable,
        });
        self
    }

    /// Requests observed so far.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        lock(&self.state).requests.clone()
    }

    /// For each fetch, whether a completion record existed when it started.
    #[must_use]
    pub fn record_present_at_fetch(&self) -> Vec<bool> {
        lock(&self.state).record_present_at_fetch.clone()
    }
}

#[async_trait]
impl ContentDownloader for FakeDownloader {
    async fn fetch(&self, request: &FetchRequest) -> Result<(), CollaboratorError> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        let record_present = request.target_dir.join(RECORD_FILE_NAME).exists();
        state.record_present_at_fetch.push(record_present);

        if state.outcome == FetchOutcome::Interrupt {
            return Err(CollaboratorError::Interrupted);
        }
        for file in &state.files {
            write_fake_file(&request.target_dir.join(&file.relative), file).map_err(|source| {
                CollaboratorError::Spawn {
                    program: "fake-downloader".to_string(),
                    source,
                }
            })?;
        }
        match state.outcome {
            FetchOutcome::Fail(code) => Err(CollaboratorError::Exit {
                program: "steamcmd".to_string(),
                code: Some(code),
                diagnostic: None,
            }),
            FetchOutcome::Succeed | FetchOutcome::Interrupt => Ok(()),
        }
    }
}

fn write_fake_file(path: &std::path::Path, file: &FakeFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &file.contents)?;
    if file.executable {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Confirmer answering from a script; unscripted questions are declined.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    asked: Vec<ConfirmRequest>,
}

impl ScriptedConfirm {
    /// Answer questions in order.
    #[must_use]
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far.
    #[must_use]
    pub fn asked(&self) -> &[ConfirmRequest] {
        &self.asked
    }
}

impl Confirmer for ScriptedConfirm {
    fn confirm(&mut self, request: &ConfirmRequest) -> bool {
        self.asked.push(request.clone());
        self.answers.pop_front().unwrap_or(false)
    }
}
