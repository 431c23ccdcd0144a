//! Action planner: executes update, start, stop, restart, and clean for one descriptor.
//!
//! # Design
//! - Each operation runs its steps strictly in order and stops at the first failure.
//! - The completion record is erased before a fetch and written only after the fetch and
//!   measurement succeed, so an aborted update always re-enters `NeedsFetch`.
//! - An interrupt raised through [`ActionPlanner::interrupt_flag`] after the fetch stops the
//!   update before its record is written.
//! - Clean collects per-path user data outcomes instead of aborting on the first failure.
//! - Host configuration arrives through [`HostSettings`]; nothing reads the environment here.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use gameserver_config::{HostSettings, ServiceDescriptor};
use gameserver_fsops::{
    CleanCandidate, CompletionRecord, discover_loader, erase_record, expand_clean_paths,
    fix_interpreters, format_size, measure, remove_path, write_record,
};
use tracing::{info, instrument, warn};

use crate::collaborators::{
    ConfirmRequest, Confirmer, ContentDownloader, FetchRequest, StopResult, Supervisor,
    TransientUnit,
};
use crate::decision::{DownloadDecision, evaluate};
use crate::error::{CoreError, CoreResult, PreconditionError, error_chain};
use crate::plan::{
    Operation, PlanOutcome, PlanReport, RemovalOutcome, RemovalResult, StepKind, StepLog,
    display_path,
};

/// Executes operator requests against the supervisor, the downloader, and the filesystem.
#[derive(Clone)]
pub struct ActionPlanner {
    supervisor: Arc<dyn Supervisor>,
    downloader: Arc<dyn ContentDownloader>,
    settings: HostSettings,
    interrupted: Arc<AtomicBool>,
}

impl ActionPlanner {
    /// Build a planner over the given collaborators.
    #[must_use]
    pub fn new(
        supervisor: Arc<dyn Supervisor>,
        downloader: Arc<dyn ContentDownloader>,
        settings: HostSettings,
    ) -> Self {
        Self {
            supervisor,
            downloader,
            settings,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once set, aborts a running update before its completion record is written.
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Host settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Supervisor used by the plans.
    #[must_use]
    pub fn supervisor(&self) -> &dyn Supervisor {
        self.supervisor.as_ref()
    }

    /// Bring installed content in line with the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotManaged`] without a content reference, a collaborator
    /// error when the fetch fails, [`CoreError::Interrupted`] when the operator interrupts it,
    /// and filesystem errors from the record or measurement steps.
    #[instrument(name = "planner.update", skip_all, fields(game = descriptor.id(), force = force))]
    pub async fn update(
        &self,
        descriptor: &ServiceDescriptor,
        force: bool,
    ) -> CoreResult<PlanReport> {
        let mut log = StepLog::default();
        let Some(reference) = descriptor.content_ref() else {
            return Err(not_managed(descriptor));
        };
        let reason = match evaluate(descriptor, force) {
            DownloadDecision::NotApplicable => return Err(not_managed(descriptor)),
            DownloadDecision::UpToDate(record) => {
                log.completed(StepKind::Evaluate, Some("up to date".to_string()));
                return Ok(report(
                    Operation::Update,
                    descriptor,
                    log,
                    PlanOutcome::UpToDate {
                        last_updated: record.last_updated,
                    },
                ));
            }
            DownloadDecision::NeedsFetch(reason) => reason,
        };
        log.completed(StepKind::Evaluate, Some(reason.as_str().to_string()));

        let install_dir = descriptor.install_dir();
        let erased = erase_record(install_dir)?;
        log.completed(
            StepKind::EraseRecord,
            Some((if erased { "previous record removed" } else { "no previous record" }).to_string()),
        );

        fs::create_dir_all(install_dir).map_err(|source| CoreError::Io {
            operation: "install_dir.create",
            path: install_dir.to_path_buf(),
            source,
        })?;
        log.completed(StepKind::PrepareInstallDir, None);

        info!(content_ref = %reference, reason = reason.as_str(), "fetching content");
        self.downloader
            .fetch(&FetchRequest::new(reference, install_dir))
            .await
            .map_err(|source| {
                warn!(error = %source, "fetch failed; no completion record written");
                CoreError::collaborator("fetch", source)
            })?;
        log.completed(StepKind::Fetch, Some(reference.redacted()));

        self.fix_interpreters(install_dir, &mut log);

        let stats = measure(install_dir)?;
        log.completed(
            StepKind::Measure,
            Some(format!(
                "{} files, {}",
                stats.file_count,
                format_size(stats.total_bytes)
            )),
        );

        if self.interrupted.load(Ordering::SeqCst) {
            warn!("interrupt received after fetch; completion record not written");
            return Err(CoreError::Interrupted { operation: "update" });
        }
        let record = CompletionRecord::success(reference, install_dir, stats, Utc::now());
        write_record(install_dir, &record)?;
        log.completed(StepKind::WriteRecord, None);

        Ok(report(
            Operation::Update,
            descriptor,
            log,
            PlanOutcome::Fetched {
                reason,
                file_count: record.file_count,
                total_size_human: record.total_size_human,
            },
        ))
    }

    /// Launch the game as a transient unit.
    ///
    /// # Errors
    ///
    /// Returns a precondition error when managed content is not up to date, the executable is
    /// missing, or the unit is already active; collaborator errors from the supervisor.
    #[instrument(name = "planner.start", skip_all, fields(game = descriptor.id()))]
    pub async fn start(&self, descriptor: &ServiceDescriptor) -> CoreResult<PlanReport> {
        let mut log = StepLog::default();
        self.start_steps(descriptor, &mut log).await?;
        Ok(report(Operation::Start, descriptor, log, PlanOutcome::Started))
    }

    /// Stop the game when it is active. Stopping an inactive unit succeeds.
    ///
    /// # Errors
    ///
    /// Returns collaborator errors from the supervisor.
    #[instrument(name = "planner.stop", skip_all, fields(game = descriptor.id()))]
    pub async fn stop(&self, descriptor: &ServiceDescriptor) -> CoreResult<PlanReport> {
        let mut log = StepLog::default();
        let stopped = self.stop_steps(descriptor, &mut log).await?;
        let outcome = if stopped {
            PlanOutcome::Stopped
        } else {
            PlanOutcome::AlreadyStopped
        };
        Ok(report(Operation::Stop, descriptor, log, outcome))
    }

    /// Stop, wait for the settle delay, and start.
    ///
    /// The delay is observed even when the unit was not active.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::stop`] or [`Self::start`].
    #[instrument(name = "planner.restart", skip_all, fields(game = descriptor.id()))]
    pub async fn restart(&self, descriptor: &ServiceDescriptor) -> CoreResult<PlanReport> {
        let mut log = StepLog::default();
        let was_active = self.stop_steps(descriptor, &mut log).await?;

        let delay = self.settings.settle_delay;
        tokio::time::sleep(delay).await;
        log.completed(StepKind::Settle, Some(format!("{}ms", delay.as_millis())));

        self.start_steps(descriptor, &mut log).await?;
        Ok(report(
            Operation::Restart,
            descriptor,
            log,
            PlanOutcome::Restarted { was_active },
        ))
    }

    /// Stop the game, then remove its install directory and optionally its user data.
    ///
    /// # Errors
    ///
    /// Returns collaborator errors from the initial stop and filesystem errors from removing
    /// the install directory. User data failures are reported per path instead.
    #[instrument(name = "planner.clean", skip_all, fields(game = descriptor.id(), include_user_data = include_user_data))]
    pub async fn clean(
        &self,
        descriptor: &ServiceDescriptor,
        include_user_data: bool,
        confirmer: &mut dyn Confirmer,
    ) -> CoreResult<PlanReport> {
        let mut log = StepLog::default();
        self.stop_steps(descriptor, &mut log).await?;

        let install_dir_removed = self.remove_install_dir(descriptor, confirmer, &mut log)?;
        let user_data = if include_user_data {
            self.remove_user_data(descriptor, confirmer, &mut log)
        } else {
            Vec::new()
        };

        Ok(report(
            Operation::Clean,
            descriptor,
            log,
            PlanOutcome::Cleaned {
                install_dir_removed,
                user_data,
            },
        ))
    }

    async fn start_steps(
        &self,
        descriptor: &ServiceDescriptor,
        log: &mut StepLog,
    ) -> CoreResult<()> {
        if descriptor.content_ref().is_some() {
            let decision = evaluate(descriptor, false);
            if !matches!(decision, DownloadDecision::UpToDate(_)) {
                return Err(PreconditionError::ContentNotReady {
                    id: descriptor.id().to_string(),
                    state: decision.label(),
                }
                .into());
            }
            log.completed(StepKind::Evaluate, Some(decision.label().to_string()));

            let executable = descriptor.executable_path();
            if !executable.exists() {
                return Err(PreconditionError::ExecutableMissing {
                    id: descriptor.id().to_string(),
                    path: executable.to_path_buf(),
                }
                .into());
            }
            log.completed(StepKind::CheckExecutable, Some(display_path(executable)));
        } else {
            log.skipped(StepKind::Evaluate, "content not managed");
        }

        let unit = descriptor.unit_name();
        let active = self
            .supervisor
            .is_active(unit)
            .await
            .map_err(|source| CoreError::collaborator("is_active", source))?;
        if active {
            return Err(PreconditionError::AlreadyRunning {
                id: descriptor.id().to_string(),
                unit: unit.to_string(),
            }
            .into());
        }
        log.completed(StepKind::CheckActive, Some("inactive".to_string()));

        self.supervisor
            .run_transient(&TransientUnit::from_descriptor(descriptor))
            .await
            .map_err(|source| CoreError::collaborator("run_transient", source))?;
        log.completed(StepKind::RunUnit, Some(unit.to_string()));
        Ok(())
    }

    async fn stop_steps(
        &self,
        descriptor: &ServiceDescriptor,
        log: &mut StepLog,
    ) -> CoreResult<bool> {
        let unit = descriptor.unit_name();
        let active = self
            .supervisor
            .is_active(unit)
            .await
            .map_err(|source| CoreError::collaborator("is_active", source))?;
        log.completed(
            StepKind::CheckActive,
            Some((if active { "active" } else { "inactive" }).to_string()),
        );
        if !active {
            log.skipped(StepKind::StopUnit, "unit not active");
            return Ok(false);
        }

        match self
            .supervisor
            .stop(unit)
            .await
            .map_err(|source| CoreError::collaborator("stop", source))?
        {
            StopResult::Stopped => {
                log.completed(StepKind::StopUnit, Some(unit.to_string()));
                Ok(true)
            }
            StopResult::WasNotRunning => {
                log.skipped(StepKind::StopUnit, "unit was not running");
                Ok(false)
            }
        }
    }

    fn fix_interpreters(&self, install_dir: &Path, log: &mut StepLog) {
        if !self.settings.interpreter_fixup {
            log.skipped(StepKind::FixInterpreters, "disabled");
            return;
        }
        let Some(loader) = self.settings.dynamic_loader.clone().or_else(discover_loader) else {
            warn!("no dynamic loader found; interpreter fix-up skipped");
            log.skipped(StepKind::FixInterpreters, "no dynamic loader found");
            return;
        };
        let fixup = fix_interpreters(install_dir, &loader, &self.settings.patchelf_program);
        log.completed(
            StepKind::FixInterpreters,
            Some(format!(
                "patched {}, failed {}",
                fixup.patched.len(),
                fixup.failed.len()
            )),
        );
    }

    fn remove_install_dir(
        &self,
        descriptor: &ServiceDescriptor,
        confirmer: &mut dyn Confirmer,
        log: &mut StepLog,
    ) -> CoreResult<bool> {
        let install_dir = descriptor.install_dir();
        if fs::symlink_metadata(install_dir).is_err() {
            log.skipped(StepKind::RemoveInstallDir, "install directory absent");
            return Ok(false);
        }
        if self.is_protected(install_dir) {
            warn!(path = %install_dir.display(), "refusing to remove protected install directory");
            log.skipped(StepKind::RemoveInstallDir, "protected path");
            return Ok(false);
        }
        let request = ConfirmRequest::RemoveInstallDir {
            game: descriptor.name().to_string(),
            path: install_dir.to_path_buf(),
        };
        if !confirmer.confirm(&request) {
            log.skipped(StepKind::RemoveInstallDir, "declined");
            return Ok(false);
        }
        remove_path(install_dir)?;
        log.completed(StepKind::RemoveInstallDir, Some(display_path(install_dir)));
        Ok(true)
    }

    fn remove_user_data(
        &self,
        descriptor: &ServiceDescriptor,
        confirmer: &mut dyn Confirmer,
        log: &mut StepLog,
    ) -> Vec<RemovalOutcome> {
        let mut outcomes = Vec::new();
        let mut existing = Vec::new();
        for candidate in expand_clean_paths(descriptor.clean_paths(), &self.settings.home_dir) {
            match candidate {
                CleanCandidate::Existing(path) => existing.push(path),
                CleanCandidate::Refused { path, reason } => outcomes.push(RemovalOutcome {
                    target: display_path(&path),
                    result: RemovalResult::Refused {
                        reason: reason.to_string(),
                    },
                }),
                CleanCandidate::Rejected { pattern, reason } => outcomes.push(RemovalOutcome {
                    target: pattern,
                    result: RemovalResult::Rejected {
                        reason: reason.to_string(),
                    },
                }),
            }
        }

        if existing.is_empty() {
            log.skipped(StepKind::RemoveUserData, "no user data found");
            return outcomes;
        }
        let request = ConfirmRequest::RemoveUserData {
            game: descriptor.name().to_string(),
            paths: existing.clone(),
        };
        if !confirmer.confirm(&request) {
            log.skipped(StepKind::RemoveUserData, "declined");
            return outcomes;
        }

        let total = existing.len();
        let mut removed = 0usize;
        for path in existing {
            let result = match remove_path(&path) {
                Ok(()) => {
                    removed += 1;
                    RemovalResult::Removed
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "user data removal failed");
                    RemovalResult::Failed {
                        message: error_chain(&err),
                    }
                }
            };
            outcomes.push(RemovalOutcome {
                target: display_path(&path),
                result,
            });
        }
        log.completed(
            StepKind::RemoveUserData,
            Some(format!("{removed} of {total} removed")),
        );
        outcomes
    }

    fn is_protected(&self, path: &Path) -> bool {
        path == Path::new("/") || path == self.settings.home_dir
    }
}

fn not_managed(descriptor: &ServiceDescriptor) -> CoreError {
    PreconditionError::NotManaged {
        id: descriptor.id().to_string(),
    }
    .into()
}

fn report(
    operation: Operation,
    descriptor: &ServiceDescriptor,
    log: StepLog,
    outcome: PlanOutcome,
) -> PlanReport {
    PlanReport {
        operation,
        game: descriptor.id().to_string(),
        unit: descriptor.unit_name().to_string(),
        steps: log.into_steps(),
        outcome,
    }
}
