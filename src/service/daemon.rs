use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::{check_job_name, BackupJobConfig, Domain, ManagerConfig};
use crate::core::{validate_backup_job, DaemonError, Outcome, Report};
use crate::observability::{EventLog, JobEvent};
use crate::platform::launchd::{read_job_file, LaunchdJob};
use crate::platform::{file_ops, Authorization, JobScheduler, LaunchctlScheduler};

/// One entry of the job listing
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    pub name: String,
    pub path: PathBuf,
    pub loaded: bool,
    /// Decoded job, `enabled` reflecting the load state
    pub config: Option<BackupJobConfig>,
    /// Why the description could not be decoded
    pub problem: Option<String>,
}

/// Turns backup jobs into job descriptions and scheduler state
pub struct DaemonUtility<S> {
    config: ManagerConfig,
    scheduler: S,
    events: EventLog,
}

impl DaemonUtility<LaunchctlScheduler> {
    /// Utility backed by the real `launchctl`
    pub fn launchctl(config: ManagerConfig) -> Self {
        let scheduler = LaunchctlScheduler::new(config.launchctl_path.clone());
        Self::new(config, scheduler)
    }
}

impl<S: JobScheduler> DaemonUtility<S> {
    pub fn new(config: ManagerConfig, scheduler: S) -> Self {
        let events = EventLog::new(config.event_log_path());
        Self {
            config,
            scheduler,
            events,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// System daemons can only be touched with elevated privileges
    fn require_privilege(&self, auth: &Authorization) -> Result<(), DaemonError> {
        if self.config.domain == Domain::System && !auth.is_privileged() {
            return Err(DaemonError::Authorization(
                "managing system backup daemons requires elevated authorization (run as root or with --sudo)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn is_loaded(&self, name: &str, auth: &Authorization) -> Result<bool, DaemonError> {
        check_job_name(name)?;
        self.require_privilege(auth)?;
        self.scheduler.is_loaded(&self.config.label_for(name), auth).await
    }

    // ------------------------------------------------------------------
    // Primitive operations
    // ------------------------------------------------------------------

    /// Ask launchd to stop and forget `name`
    pub async fn unload_daemon(&self, name: &str, auth: &Authorization) -> Outcome {
        Outcome::from_result(
            self.try_unload(name, auth).await,
            format!("Unloaded backup daemon '{}'", name),
        )
    }

    async fn try_unload(&self, name: &str, auth: &Authorization) -> Result<(), DaemonError> {
        if !self.is_loaded(name, auth).await? {
            return Err(DaemonError::NotLoaded(name.to_string()));
        }

        let label = self.config.label_for(name);
        let path = self.config.plist_path(name);
        let existing = path.exists().then_some(path.as_path());
        if existing.is_none() {
            warn!("Job description for {} is gone, removing by label", label);
        }

        self.scheduler.unload(&label, existing, auth).await?;
        info!("Unloaded {}", label);
        Ok(())
    }

    /// Record in the event log that `name` was disabled
    pub async fn log_unload(&self, name: &str, auth: &Authorization) -> Outcome {
        self.log_event(name, JobEvent::Disabled, auth).await
    }

    /// Record in the event log that `name` was enabled
    pub async fn log_load(&self, name: &str, auth: &Authorization) -> Outcome {
        self.log_event(name, JobEvent::Enabled, auth).await
    }

    async fn log_event(&self, name: &str, event: JobEvent, auth: &Authorization) -> Outcome {
        let result = match check_job_name(name).and_then(|()| self.require_privilege(auth)) {
            Ok(()) => self.events.record(name, event, auth).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!("Failed to log {} event for '{}': {}", event, name, e);
        }
        Outcome::from_result(
            result,
            format!("Logged '{}' as {} in {}", name, event, self.events.path().display()),
        )
    }

    /// Ask launchd to read the description of `name` and schedule it
    pub async fn load_daemon(&self, name: &str, auth: &Authorization) -> Outcome {
        Outcome::from_result(
            self.try_load(name, auth).await,
            format!("Loaded backup daemon '{}'", name),
        )
    }

    async fn try_load(&self, name: &str, auth: &Authorization) -> Result<(), DaemonError> {
        check_job_name(name)?;
        self.require_privilege(auth)?;

        // Missing or malformed descriptions never reach launchd
        read_job_file(&self.config, name).await?;

        if self.is_loaded(name, auth).await? {
            return Err(DaemonError::AlreadyLoaded(name.to_string()));
        }

        let label = self.config.label_for(name);
        let path = self.config.plist_path(name);
        self.scheduler.load(&label, &path, auth).await?;
        info!("Loaded {}", label);
        Ok(())
    }

    /// Delete the description of `name`; refused while the job is loaded
    pub async fn remove_daemon_file(&self, name: &str, auth: &Authorization) -> Outcome {
        let path = self.config.plist_path(name);
        Outcome::from_result(
            self.try_remove_file(name, auth).await,
            format!("Removed job description {}", path.display()),
        )
    }

    async fn try_remove_file(&self, name: &str, auth: &Authorization) -> Result<(), DaemonError> {
        if self.is_loaded(name, auth).await? {
            return Err(DaemonError::StillLoaded(name.to_string()));
        }

        let path = self.config.plist_path(name);
        match file_ops::remove_file(&path, auth).await {
            Err(DaemonError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(DaemonError::MissingFile {
                    name: name.to_string(),
                    path,
                })
            }
            other => other,
        }
    }

    /// Serialize `job` and write it atomically as the description of `name`
    pub async fn add_daemon_file(&self, name: &str, job: &BackupJobConfig, auth: &Authorization) -> Outcome {
        let path = self.config.plist_path(name);
        Outcome::from_result(
            self.try_add_file(name, job, auth).await,
            format!("Wrote job description {}", path.display()),
        )
    }

    async fn try_add_file(&self, name: &str, job: &BackupJobConfig, auth: &Authorization) -> Result<(), DaemonError> {
        check_job_name(name)?;
        if job.name != name {
            return Err(DaemonError::Validation(format!(
                "Job name '{}' does not match description name '{}'",
                job.name, name
            )));
        }
        job.check_fields()?;
        self.require_privilege(auth)?;

        let xml = LaunchdJob::from_config(&self.config, job).to_xml()?;
        let path = self.config.plist_path(name);
        file_ops::write_atomic(&path, &xml, auth).await?;
        debug!("Wrote {} bytes to {}", xml.len(), path.display());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Composite operations
    // ------------------------------------------------------------------

    /// Create a new job: validate, write its description, load it if enabled
    pub async fn add_job(&self, job: &BackupJobConfig, auth: &Authorization) -> Report {
        let mut report = Report::default();

        // Authorize before validation touches the destination
        if let Err(e) = self.require_privilege(auth) {
            report.push(Outcome::failed(&e));
            return report;
        }

        let Some(job) = self.validate_into(job, &mut report).await else {
            return report;
        };

        if self.config.plist_path(&job.name).exists() {
            report.push(Outcome::failed(&DaemonError::AlreadyExists(job.name.clone())));
            return report;
        }

        if !report.push(self.add_daemon_file(&job.name, &job, auth).await) {
            return report;
        }

        if job.enabled {
            self.enable_into(&job.name, auth, &mut report).await;
        }

        report
    }

    /// Apply an edited job, reloading it when it was or should be scheduled
    pub async fn update_job(&self, job: &BackupJobConfig, auth: &Authorization) -> Report {
        let mut report = Report::default();

        // Authorize before validation touches the destination
        if let Err(e) = self.require_privilege(auth) {
            report.push(Outcome::failed(&e));
            return report;
        }

        let Some(job) = self.validate_into(job, &mut report).await else {
            return report;
        };

        let path = self.config.plist_path(&job.name);
        if !path.exists() {
            report.push(Outcome::failed(&DaemonError::MissingFile {
                name: job.name.clone(),
                path,
            }));
            return report;
        }

        let loaded = match self.is_loaded(&job.name, auth).await {
            Ok(loaded) => loaded,
            Err(e) => {
                report.push(Outcome::failed(&e));
                return report;
            }
        };

        if loaded {
            if !report.push(self.unload_daemon(&job.name, auth).await) {
                return report;
            }
            report.push(self.log_unload(&job.name, auth).await);
        }

        if !report.push(self.add_daemon_file(&job.name, &job, auth).await) {
            return report;
        }

        if job.enabled {
            self.enable_into(&job.name, auth, &mut report).await;
        }

        report
    }

    /// Load `name` and log the transition
    pub async fn enable_job(&self, name: &str, auth: &Authorization) -> Report {
        let mut report = Report::default();
        self.enable_into(name, auth, &mut report).await;
        report
    }

    /// Unload `name` and log the transition; both are reported separately
    pub async fn disable_job(&self, name: &str, auth: &Authorization) -> Report {
        let mut report = Report::default();
        report.push(self.unload_daemon(name, auth).await);
        report.push(self.log_unload(name, auth).await);
        report
    }

    /// Unload `name` if needed, then remove its description
    pub async fn delete_job(&self, name: &str, auth: &Authorization) -> Report {
        let mut report = Report::default();

        let loaded = match self.is_loaded(name, auth).await {
            Ok(loaded) => loaded,
            Err(e) => {
                report.push(Outcome::failed(&e));
                return report;
            }
        };

        if loaded {
            if !report.push(self.unload_daemon(name, auth).await) {
                return report;
            }
            report.push(self.log_unload(name, auth).await);
        }

        report.push(self.remove_daemon_file(name, auth).await);
        report
    }

    /// Decode the description of `name`, with `enabled` taken from launchd
    pub async fn read_job(&self, name: &str, auth: &Authorization) -> Result<BackupJobConfig, DaemonError> {
        check_job_name(name)?;
        let (_, mut job) = read_job_file(&self.config, name).await?;
        job.enabled = self.is_loaded(name, auth).await?;
        Ok(job)
    }

    /// Every BackupMinder job description in the daemon directory
    pub async fn list_jobs(&self, auth: &Authorization) -> Result<Vec<JobListing>, DaemonError> {
        self.require_privilege(auth)?;

        let dir = self.config.daemon_directory();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DaemonError::io(format!("Failed to read {}", dir.display()), e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DaemonError::io(format!("Failed to read {}", dir.display()), e))?
        {
            let file_name = entry.file_name();
            let Some(label) = file_name.to_str().and_then(|f| f.strip_suffix(".plist")) else {
                continue;
            };
            if let Some(name) = self.config.name_for_label(label) {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut listings = Vec::with_capacity(names.len());
        for name in names {
            let loaded = match check_job_name(&name) {
                Ok(()) => self.scheduler.is_loaded(&self.config.label_for(&name), auth).await?,
                Err(_) => false,
            };
            let path = self.config.plist_path(&name);

            let (config, problem) = match check_job_name(&name) {
                Err(e) => (None, Some(e.to_string())),
                Ok(()) => match read_job_file(&self.config, &name).await {
                    Ok((_, mut job)) => {
                        job.enabled = loaded;
                        (Some(job), None)
                    }
                    Err(e) => (None, Some(e.to_string())),
                },
            };

            listings.push(JobListing {
                name,
                path,
                loaded,
                config,
                problem,
            });
        }

        Ok(listings)
    }

    async fn validate_into(&self, job: &BackupJobConfig, report: &mut Report) -> Option<BackupJobConfig> {
        match validate_backup_job(job).await {
            Ok(result) => {
                for warning in &result.warnings {
                    warn!("Validation warning for '{}': {}", job.name, warning);
                }
                report.warnings = result.warnings;
                Some(result.config)
            }
            Err(e) => {
                report.push(Outcome::failed(&DaemonError::Validation(format!("{:#}", e))));
                None
            }
        }
    }

    async fn enable_into(&self, name: &str, auth: &Authorization, report: &mut Report) {
        if report.push(self.load_daemon(name, auth).await) {
            report.push(self.log_load(name, auth).await);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Schedule;
    use crate::core::ErrorKind;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    /// In-process stand-in for launchd
    #[derive(Default)]
    struct MemoryScheduler {
        loaded: Mutex<HashSet<String>>,
        calls: Mutex<Vec<String>>,
        reject_loads: bool,
        reject_unloads: bool,
    }

    impl MemoryScheduler {
        fn rejecting() -> Self {
            Self {
                reject_loads: true,
                ..Self::default()
            }
        }

        fn stuck() -> Self {
            Self {
                reject_unloads: true,
                ..Self::default()
            }
        }

        fn loaded(&self, label: &str) -> bool {
            self.loaded.lock().unwrap().contains(label)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl JobScheduler for MemoryScheduler {
        async fn load(&self, label: &str, plist: &Path, _auth: &Authorization) -> Result<(), DaemonError> {
            self.calls.lock().unwrap().push(format!("load {}", label));
            if self.reject_loads || !plist.exists() {
                return Err(DaemonError::Subprocess {
                    program: "launchctl".to_string(),
                    code: 5,
                    stderr: "Load failed: 5: Input/output error".to_string(),
                });
            }
            self.loaded.lock().unwrap().insert(label.to_string());
            Ok(())
        }

        async fn unload(&self, label: &str, plist: Option<&Path>, _auth: &Authorization) -> Result<(), DaemonError> {
            let how = if plist.is_some() { "unload" } else { "remove" };
            self.calls.lock().unwrap().push(format!("{} {}", how, label));
            if self.reject_unloads {
                return Err(DaemonError::Subprocess {
                    program: "launchctl".to_string(),
                    code: 16,
                    stderr: "Unload failed: 16: Resource busy".to_string(),
                });
            }
            if !self.loaded.lock().unwrap().remove(label) {
                return Err(DaemonError::Subprocess {
                    program: "launchctl".to_string(),
                    code: 113,
                    stderr: String::new(),
                });
            }
            Ok(())
        }

        async fn is_loaded(&self, label: &str, _auth: &Authorization) -> Result<bool, DaemonError> {
            Ok(self.loaded(label))
        }
    }

    struct Fixture {
        dir: TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let source = dunce::canonicalize(dir.path()).unwrap().join("Documents");
            let destination = dunce::canonicalize(dir.path()).unwrap().join("Archive");
            std::fs::create_dir(&source).unwrap();
            std::fs::create_dir(&destination).unwrap();
            Self { dir, source, destination }
        }

        fn manager(&self, domain: Domain) -> ManagerConfig {
            ManagerConfig {
                domain,
                daemon_directory: Some(self.dir.path().join("LaunchDaemons")),
                event_log_path: Some(self.dir.path().join("Logs").join("BackupMinder.log")),
                ..ManagerConfig::default()
            }
        }

        fn utility(&self) -> DaemonUtility<MemoryScheduler> {
            DaemonUtility::new(self.manager(Domain::User), MemoryScheduler::default())
        }

        fn job(&self, name: &str, enabled: bool) -> BackupJobConfig {
            BackupJobConfig {
                name: name.to_string(),
                source_path: self.source.clone(),
                destination_path: self.destination.clone(),
                name_filter: ".numbers".to_string(),
                retention_count: 4,
                warning_days: 3,
                enabled,
                schedule: Schedule::Weekly { day: 5, hour: 22, minute: 15 },
            }
        }

        fn log_lines(&self) -> Vec<String> {
            let path = self.dir.path().join("Logs").join("BackupMinder.log");
            std::fs::read_to_string(path)
                .map(|s| s.lines().map(str::to_string).collect())
                .unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn test_add_file_round_trips() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();
        let job = fx.job("numbers", true);

        let outcome = utility.add_daemon_file("numbers", &job, &auth).await;
        assert!(outcome.is_success(), "{}", outcome);

        let read = utility.read_job("numbers", &auth).await.unwrap();
        assert_eq!(read, BackupJobConfig { enabled: false, ..job });
    }

    #[tokio::test]
    async fn test_add_file_rejects_mismatched_name() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let outcome = utility
            .add_daemon_file("other", &fx.job("numbers", true), &Authorization::user())
            .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.kind, Some(ErrorKind::Validation));
        assert!(!fx.manager(Domain::User).plist_path("other").exists());
    }

    #[tokio::test]
    async fn test_load_after_add_succeeds() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        let outcome = utility.load_daemon("numbers", &auth).await;

        assert!(outcome.is_success(), "{}", outcome);
        assert!(utility.scheduler().loaded("com.backupminder.numbers"));
        assert!(utility.read_job("numbers", &auth).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_load_without_file_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let outcome = utility.load_daemon("numbers", &Authorization::user()).await;
        assert!(!outcome.is_success());
        assert!(!outcome.explanation.is_empty());
        assert!(outcome.explanation.contains("not found"));
        assert!(utility.scheduler().calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let path = fx.manager(Domain::User).plist_path("numbers");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"<plist>broken").unwrap();

        let outcome = utility.load_daemon("numbers", &Authorization::user()).await;
        assert!(!outcome.is_success());
        assert!(outcome.explanation.contains("malformed"));
        assert!(utility.scheduler().calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_twice_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        assert!(utility.load_daemon("numbers", &auth).await.is_success());

        let outcome = utility.load_daemon("numbers", &auth).await;
        assert!(!outcome.is_success());
        assert!(outcome.explanation.contains("already loaded"));
    }

    #[tokio::test]
    async fn test_scheduler_rejection_is_reported() {
        let fx = Fixture::new();
        let utility = DaemonUtility::new(fx.manager(Domain::User), MemoryScheduler::rejecting());
        let auth = Authorization::user();

        utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        let outcome = utility.load_daemon("numbers", &auth).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.kind, Some(ErrorKind::Subprocess));
        assert!(outcome.explanation.contains("Input/output error"));
    }

    #[tokio::test]
    async fn test_unload_never_loaded_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let outcome = utility.unload_daemon("numbers", &Authorization::user()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.explanation, "Job 'numbers' is not loaded");
        assert!(utility.scheduler().calls().is_empty());
    }

    #[tokio::test]
    async fn test_unload_by_label_when_file_vanished() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        utility.load_daemon("numbers", &auth).await;
        std::fs::remove_file(fx.manager(Domain::User).plist_path("numbers")).unwrap();

        assert!(utility.unload_daemon("numbers", &auth).await.is_success());
        assert!(utility.scheduler().calls().contains(&"remove com.backupminder.numbers".to_string()));
    }

    #[tokio::test]
    async fn test_log_unload_appends_one_line_per_call() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        // Unload fails, the log entry is still written
        assert!(!utility.unload_daemon("numbers", &auth).await.is_success());
        assert!(utility.log_unload("numbers", &auth).await.is_success());
        assert_eq!(fx.log_lines().len(), 1);

        assert!(utility.log_unload("numbers", &auth).await.is_success());
        let lines = fx.log_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("Backup daemon 'numbers' disabled"));
    }

    #[tokio::test]
    async fn test_full_lifecycle_leaves_nothing() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();
        let path = fx.manager(Domain::User).plist_path("numbers");

        assert!(utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await.is_success());
        assert!(utility.load_daemon("numbers", &auth).await.is_success());
        assert!(utility.unload_daemon("numbers", &auth).await.is_success());
        assert!(utility.remove_daemon_file("numbers", &auth).await.is_success());

        assert!(!path.exists());
        assert!(!utility.scheduler().loaded("com.backupminder.numbers"));
    }

    #[tokio::test]
    async fn test_remove_refused_while_loaded() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();
        let path = fx.manager(Domain::User).plist_path("numbers");

        utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        utility.load_daemon("numbers", &auth).await;

        let outcome = utility.remove_daemon_file("numbers", &auth).await;
        assert!(!outcome.is_success());
        assert!(outcome.explanation.contains("still loaded"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let outcome = utility.remove_daemon_file("numbers", &Authorization::user()).await;
        assert!(!outcome.is_success());
        assert!(outcome.explanation.contains("not found"));
    }

    #[tokio::test]
    async fn test_delete_loaded_job() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        let report = utility.add_job(&fx.job("numbers", true), &auth).await;
        assert!(report.is_success(), "{:?}", report);

        let report = utility.delete_job("numbers", &auth).await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.steps.len(), 3);

        assert!(!fx.manager(Domain::User).plist_path("numbers").exists());
        assert!(!utility.scheduler().loaded("com.backupminder.numbers"));
        assert_eq!(
            utility.scheduler().calls(),
            vec!["load com.backupminder.numbers", "unload com.backupminder.numbers"]
        );
    }

    #[tokio::test]
    async fn test_add_job_enabled_loads_and_logs() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        let report = utility.add_job(&fx.job("numbers", true), &auth).await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.steps.len(), 3);
        assert!(fx.log_lines()[0].ends_with("Backup daemon 'numbers' enabled"));

        let again = utility.add_job(&fx.job("numbers", true), &auth).await;
        assert!(!again.is_success());
        assert!(again.steps[0].explanation.contains("already exists"));
    }

    #[tokio::test]
    async fn test_add_job_disabled_only_writes() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        let report = utility.add_job(&fx.job("numbers", false), &auth).await;
        assert!(report.is_success(), "{:?}", report);
        assert_eq!(report.steps.len(), 1);
        assert!(utility.scheduler().calls().is_empty());
        assert!(fx.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_add_job_validation_blocks_side_effects() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let mut job = fx.job("numbers", true);
        job.source_path = fx.source.join("missing");

        let report = utility.add_job(&job, &Authorization::user()).await;
        assert!(!report.is_success());
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].kind, Some(ErrorKind::Validation));
        assert!(!fx.manager(Domain::User).daemon_directory().exists());
    }

    #[tokio::test]
    async fn test_update_enabled_job_reloads() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_job(&fx.job("numbers", true), &auth).await;

        let mut edited = fx.job("numbers", true);
        edited.retention_count = 9;
        let report = utility.update_job(&edited, &auth).await;
        assert!(report.is_success(), "{:?}", report);

        let read = utility.read_job("numbers", &auth).await.unwrap();
        assert_eq!(read.retention_count, 9);
        assert!(read.enabled);
        assert_eq!(
            utility.scheduler().calls(),
            vec![
                "load com.backupminder.numbers",
                "unload com.backupminder.numbers",
                "load com.backupminder.numbers"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_can_disable() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_job(&fx.job("numbers", true), &auth).await;
        let report = utility.update_job(&fx.job("numbers", false), &auth).await;
        assert!(report.is_success(), "{:?}", report);

        assert!(!utility.read_job("numbers", &auth).await.unwrap().enabled);
        assert!(fx.log_lines().last().unwrap().ends_with("disabled"));
    }

    #[tokio::test]
    async fn test_update_stops_at_failed_unload() {
        let fx = Fixture::new();
        let utility = DaemonUtility::new(fx.manager(Domain::User), MemoryScheduler::stuck());
        let auth = Authorization::user();

        assert!(utility.add_job(&fx.job("numbers", true), &auth).await.is_success());

        let mut edited = fx.job("numbers", true);
        edited.retention_count = 9;
        let report = utility.update_job(&edited, &auth).await;

        assert!(!report.is_success());
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].kind, Some(ErrorKind::Subprocess));
        assert!(report.steps[0].explanation.contains("Resource busy"));

        // Description untouched, no reload, only the original enable logged
        let read = utility.read_job("numbers", &auth).await.unwrap();
        assert_eq!(read.retention_count, 4);
        assert_eq!(
            utility.scheduler().calls(),
            vec!["load com.backupminder.numbers", "unload com.backupminder.numbers"]
        );
        assert_eq!(fx.log_lines().len(), 1);
        assert!(fx.log_lines()[0].ends_with("enabled"));
    }

    #[tokio::test]
    async fn test_update_unknown_job_fails() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let report = utility.update_job(&fx.job("numbers", true), &Authorization::user()).await;
        assert!(!report.is_success());
        assert!(report.steps[0].explanation.contains("not found"));
    }

    #[tokio::test]
    async fn test_disable_reports_both_outcomes() {
        let fx = Fixture::new();
        let utility = fx.utility();

        let report = utility.disable_job("numbers", &Authorization::user()).await;
        assert_eq!(report.steps.len(), 2);
        assert!(!report.steps[0].is_success());
        assert!(report.steps[1].is_success());
        assert_eq!(fx.log_lines().len(), 1);
    }

    #[tokio::test]
    async fn test_enable_then_disable() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();

        utility.add_job(&fx.job("numbers", false), &auth).await;
        assert!(utility.enable_job("numbers", &auth).await.is_success());
        assert!(utility.scheduler().loaded("com.backupminder.numbers"));

        assert!(utility.disable_job("numbers", &auth).await.is_success());
        assert!(!utility.scheduler().loaded("com.backupminder.numbers"));
        assert_eq!(fx.log_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_system_domain_requires_privilege() {
        let fx = Fixture::new();
        let manager = fx.manager(Domain::System);
        let utility = DaemonUtility::new(manager.clone(), MemoryScheduler::default());
        let auth = Authorization::user();

        let outcome = utility.add_daemon_file("numbers", &fx.job("numbers", true), &auth).await;
        assert_eq!(outcome.kind, Some(ErrorKind::Authorization));
        assert!(!manager.plist_path("numbers").exists());

        for outcome in [
            utility.load_daemon("numbers", &auth).await,
            utility.unload_daemon("numbers", &auth).await,
            utility.remove_daemon_file("numbers", &auth).await,
            utility.log_unload("numbers", &auth).await,
            utility.log_load("numbers", &auth).await,
        ] {
            assert_eq!(outcome.kind, Some(ErrorKind::Authorization));
        }

        let report = utility.disable_job("numbers", &auth).await;
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|o| o.kind == Some(ErrorKind::Authorization)));

        assert!(utility.list_jobs(&auth).await.is_err());
        assert!(utility.scheduler().calls().is_empty());
        assert!(fx.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_system_domain_checks_privilege_before_validation() {
        let fx = Fixture::new();
        let manager = fx.manager(Domain::System);
        let utility = DaemonUtility::new(manager.clone(), MemoryScheduler::default());
        let auth = Authorization::user();

        // Retention 0 would produce a validation warning
        let mut job = fx.job("numbers", true);
        job.retention_count = 0;

        for report in [utility.add_job(&job, &auth).await, utility.update_job(&job, &auth).await] {
            assert_eq!(report.steps.len(), 1);
            assert_eq!(report.steps[0].kind, Some(ErrorKind::Authorization));
            assert!(report.warnings.is_empty());
        }
        assert!(!manager.plist_path("numbers").exists());
        assert!(std::fs::read_dir(&fx.destination).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_system_domain_with_root() {
        use crate::platform::Privilege;

        let fx = Fixture::new();
        let utility = DaemonUtility::new(fx.manager(Domain::System), MemoryScheduler::default());
        let auth = Authorization::with_privilege(Privilege::Root);

        let report = utility.add_job(&fx.job("numbers", true), &auth).await;
        assert!(report.is_success(), "{:?}", report);
    }

    #[tokio::test]
    async fn test_list_jobs() {
        let fx = Fixture::new();
        let utility = fx.utility();
        let auth = Authorization::user();
        let manager = fx.manager(Domain::User);

        utility.add_job(&fx.job("beta", true), &auth).await;
        utility.add_job(&fx.job("alpha", false), &auth).await;
        std::fs::write(manager.plist_path("broken"), b"garbage").unwrap();
        std::fs::write(manager.daemon_directory().join("com.apple.other.plist"), b"x").unwrap();
        std::fs::write(manager.daemon_directory().join("notes.txt"), b"x").unwrap();

        let listings = utility.list_jobs(&auth).await.unwrap();
        let names: Vec<&str> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "broken"]);

        assert!(!listings[0].loaded);
        assert!(listings[1].loaded);
        assert!(listings[1].config.as_ref().unwrap().enabled);
        assert!(listings[2].config.is_none());
        assert!(listings[2].problem.as_ref().unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn test_list_jobs_without_directory() {
        let fx = Fixture::new();
        let listings = fx.utility().list_jobs(&Authorization::user()).await.unwrap();
        assert!(listings.is_empty());
    }
}
