// src/lifecycle/session.rs

//! Package-manager session
//!
//! Enabling or disabling a module marks packages for installation or
//! removal; nothing touches the system until [`PackageSession::commit`].
//! The session remembers which source descriptors it created and removed
//! so a failed commit can put them back.

use crate::error::{Error, Result};
use crate::source::SourceDescriptorStore;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error as ThisError;
use tracing::{debug, error, info, warn};

/// Why a package transaction could not be committed
#[derive(Debug, ThisError)]
pub enum CommitError {
    #[error("{0}")]
    DependenciesUnresolvable(String),

    #[error("{0}")]
    DownloadFailed(String),

    #[error(transparent)]
    Other(#[from] Error),
}

/// Installs and removes the packages modules ship
pub trait PackageManager {
    /// Mark `specs` for installation from the package source `source_id`
    fn install_packages(
        &mut self,
        specs: &[String],
        source_id: &str,
        strict: bool,
        allow_erasing: bool,
    ) -> Result<()>;

    /// Mark every installed package from `source_id` for removal
    fn remove_all_from(&mut self, source_id: &str) -> Result<usize>;

    /// Mark installed packages with a newer build in `source_id` for upgrade
    fn upgrade_packages_from(&mut self, source_id: &str) -> Result<usize>;

    fn commit_transaction(&mut self) -> std::result::Result<(), CommitError>;
}

/// One package transaction and the descriptor changes it depends on
pub struct PackageSession {
    manager: Box<dyn PackageManager>,
    host_managed: bool,
    /// Modules whose descriptors this session created
    enabling: Vec<String>,
    /// Modules whose descriptors this session removed, with their base URLs
    disabling: Vec<(String, String)>,
    marked: usize,
}

impl PackageSession {
    /// Open a session that commits its own transaction
    pub fn open(manager: Box<dyn PackageManager>) -> Self {
        debug!("Opening package session");
        Self {
            manager,
            host_managed: false,
            enabling: Vec::new(),
            disabling: Vec::new(),
            marked: 0,
        }
    }

    /// Open a session inside a transaction someone else commits
    pub fn host_managed(manager: Box<dyn PackageManager>) -> Self {
        Self {
            host_managed: true,
            ..Self::open(manager)
        }
    }

    pub fn is_host_managed(&self) -> bool {
        self.host_managed
    }

    /// Packages marked so far
    pub fn marked(&self) -> usize {
        self.marked
    }

    pub fn enabling(&self) -> &[String] {
        &self.enabling
    }

    pub fn disabling(&self) -> &[(String, String)] {
        &self.disabling
    }

    pub fn install(
        &mut self,
        specs: &[String],
        source_id: &str,
        strict: bool,
        allow_erasing: bool,
    ) -> Result<()> {
        debug!("Marking {} package(s) from {}", specs.len(), source_id);
        self.manager
            .install_packages(specs, source_id, strict, allow_erasing)?;
        self.marked += specs.len();
        Ok(())
    }

    pub fn remove_all_from(&mut self, source_id: &str) -> Result<usize> {
        let count = self.manager.remove_all_from(source_id)?;
        debug!("Marked {} package(s) from {} for removal", count, source_id);
        self.marked += count;
        Ok(count)
    }

    pub fn upgrade_from(&mut self, source_id: &str) -> Result<usize> {
        let count = self.manager.upgrade_packages_from(source_id)?;
        debug!("Marked {} package(s) from {} for upgrade", count, source_id);
        self.marked += count;
        Ok(count)
    }

    pub fn record_enabling(&mut self, module: &str) {
        self.enabling.push(module.to_string());
    }

    pub fn record_disabling(&mut self, module: &str, base_url: &str) {
        self.disabling
            .push((module.to_string(), base_url.to_string()));
    }

    /// Commit the package transaction
    ///
    /// Skipped for host-managed sessions and when nothing was marked. On
    /// failure the descriptors this session touched are restored.
    pub fn commit(&mut self, descriptors: &dyn SourceDescriptorStore) -> Result<()> {
        if self.host_managed {
            debug!("Package transaction is committed by the host");
            return Ok(());
        }
        if self.marked == 0 {
            debug!("No packages marked, skipping package transaction");
            self.clear();
            return Ok(());
        }

        info!("Committing package transaction ({} package(s))", self.marked);
        let result = self.manager.commit_transaction();
        let Err(err) = result else {
            self.clear();
            return Ok(());
        };

        warn!("Package transaction failed, restoring source descriptors");
        self.rollback(descriptors);
        self.clear();

        Err(match err {
            CommitError::DependenciesUnresolvable(msg) => {
                Error::TransactionError(format!("Dependencies cannot be resolved: {}", msg))
            }
            CommitError::DownloadFailed(msg) => {
                Error::TransactionError(format!("Required package cannot be downloaded: {}", msg))
            }
            CommitError::Other(e) => e,
        })
    }

    fn rollback(&self, descriptors: &dyn SourceDescriptorStore) {
        for module in &self.enabling {
            if let Err(e) = descriptors.remove(module) {
                error!("Cannot remove source descriptor of {}: {}", module, e);
            }
        }
        for (module, url) in &self.disabling {
            if let Err(e) = descriptors.create(module, url) {
                error!("Cannot restore source descriptor of {}: {}", module, e);
            }
        }
    }

    fn clear(&mut self) {
        self.enabling.clear();
        self.disabling.clear();
        self.marked = 0;
    }

    /// End the session, discarding anything not committed
    pub fn close(self) {
        if self.marked > 0 && !self.host_managed {
            warn!("Closing package session with {} uncommitted package(s)", self.marked);
        }
        debug!("Package session closed");
    }
}

/// A queued package operation; every one is scoped to a module source
#[derive(Debug, Clone, PartialEq, Eq)]
enum PackageOp {
    Install {
        specs: Vec<String>,
        source_id: String,
        strict: bool,
        allow_erasing: bool,
    },
    RemoveFrom(String),
    UpgradeFrom(String),
}

impl PackageOp {
    /// Command-line arguments after the global ones
    fn args(&self) -> Vec<String> {
        let scoped = |source_id: &str, verb: &str| {
            vec![
                "repository-packages".to_string(),
                source_id.to_string(),
                verb.to_string(),
            ]
        };

        match self {
            PackageOp::Install {
                specs,
                source_id,
                strict,
                allow_erasing,
            } => {
                let mut args = vec![format!("--setopt=strict={}", strict)];
                if *allow_erasing {
                    args.push("--allowerasing".to_string());
                }
                args.extend(scoped(source_id, "install"));
                args.extend(specs.iter().cloned());
                args
            }
            PackageOp::RemoveFrom(source_id) => scoped(source_id, "remove"),
            PackageOp::UpgradeFrom(source_id) => scoped(source_id, "upgrade"),
        }
    }
}

/// Highest transaction id in a `history list` table
fn last_transaction_in(listing: &str) -> Option<u64> {
    listing
        .lines()
        .filter_map(|line| line.split('|').next()?.trim().parse::<u64>().ok())
        .max()
}

/// Map a failed package-manager run to a commit error
///
/// dnf exits with 1 for every failed transaction and 200 when its lock is
/// held, so exit codes cannot separate download failures from depsolve
/// failures. Those two are told apart by the error text; a download error
/// worded without "download" or "cannot retrieve" is reported as
/// unresolvable dependencies.
fn classify_failure(code: Option<i32>, stderr: &str) -> CommitError {
    let stderr = stderr.trim().to_string();
    match code {
        Some(1) => {
            let lowered = stderr.to_lowercase();
            if lowered.contains("download") || lowered.contains("cannot retrieve") {
                CommitError::DownloadFailed(stderr)
            } else {
                CommitError::DependenciesUnresolvable(stderr)
            }
        }
        Some(200) => CommitError::Other(Error::TransactionError(format!(
            "Package manager is locked by another process: {}",
            stderr
        ))),
        Some(code) => CommitError::Other(Error::TransactionError(format!(
            "Package manager exited with status {}: {}",
            code, stderr
        ))),
        None => CommitError::Other(Error::TransactionError(format!(
            "Package manager was killed by a signal: {}",
            stderr
        ))),
    }
}

/// Drives an external package-manager command (`dnf` by default)
///
/// Queued operations run one invocation each on commit. When one fails,
/// the transactions the earlier ones recorded in the package history are
/// undone, newest first, before the error is returned.
#[derive(Debug, Clone)]
pub struct CommandPackageManager {
    command: String,
    root: PathBuf,
    queue: Vec<PackageOp>,
}

impl CommandPackageManager {
    pub fn new(command: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            root: root.into(),
            queue: Vec::new(),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("-y");
        if self.root != Path::new("/") {
            cmd.arg(format!("--installroot={}", self.root.display()));
        }
        cmd
    }

    fn query(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.base_command();
        cmd.arg("-q").args(args);

        let output = cmd.output().map_err(|e| {
            Error::TransactionError(format!("Failed to run {}: {}", self.command, e))
        })?;
        if !output.status.success() {
            return Err(Error::TransactionError(format!(
                "{} {} failed: {}",
                self.command,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Installed packages whose origin is `source_id`
    fn installed_from(&self, source_id: &str) -> Result<Vec<String>> {
        let listing = self.query(&[
            "repoquery",
            "--installed",
            "--queryformat",
            "%{name} %{from_repo}\n",
        ])?;

        Ok(listing
            .lines()
            .filter_map(|line| {
                let (name, repo) = line.trim().split_once(' ')?;
                (repo.trim_start_matches('@') == source_id).then(|| name.to_string())
            })
            .collect())
    }

    fn last_transaction(&self) -> Result<Option<u64>> {
        Ok(last_transaction_in(&self.query(&["history", "list"])?))
    }

    fn run(&self, op: &PackageOp) -> std::result::Result<(), CommitError> {
        let mut cmd = self.base_command();
        cmd.args(op.args());

        debug!("Running {:?}", cmd);
        let output = cmd.output().map_err(|e| {
            CommitError::Other(Error::TransactionError(format!(
                "Failed to run {}: {}",
                self.command, e
            )))
        })?;
        if output.status.success() {
            return Ok(());
        }
        Err(classify_failure(
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }

    /// Undo every history transaction newer than `checkpoint`
    fn undo_since(&self, checkpoint: Option<u64>) {
        let latest = match self.last_transaction() {
            Ok(Some(latest)) => latest,
            Ok(None) => return,
            Err(e) => {
                error!("Cannot read package history, applied operations stay: {}", e);
                return;
            }
        };

        let first = checkpoint.map_or(1, |id| id + 1);
        for id in (first..=latest).rev() {
            info!("Undoing package transaction {}", id);
            let mut cmd = self.base_command();
            cmd.args(["history", "undo", &id.to_string()]);
            match cmd.output() {
                Ok(output) if output.status.success() => {}
                Ok(output) => error!(
                    "Cannot undo package transaction {}: {}",
                    id,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                Err(e) => error!("Cannot undo package transaction {}: {}", id, e),
            }
        }
    }
}

impl PackageManager for CommandPackageManager {
    fn install_packages(
        &mut self,
        specs: &[String],
        source_id: &str,
        strict: bool,
        allow_erasing: bool,
    ) -> Result<()> {
        self.queue.push(PackageOp::Install {
            specs: specs.to_vec(),
            source_id: source_id.to_string(),
            strict,
            allow_erasing,
        });
        Ok(())
    }

    fn remove_all_from(&mut self, source_id: &str) -> Result<usize> {
        let installed = self.installed_from(source_id)?;
        if !installed.is_empty() {
            self.queue.push(PackageOp::RemoveFrom(source_id.to_string()));
        }
        Ok(installed.len())
    }

    fn upgrade_packages_from(&mut self, source_id: &str) -> Result<usize> {
        let installed = self.installed_from(source_id)?;
        if !installed.is_empty() {
            self.queue.push(PackageOp::UpgradeFrom(source_id.to_string()));
        }
        Ok(installed.len())
    }

    fn commit_transaction(&mut self) -> std::result::Result<(), CommitError> {
        let queue = std::mem::take(&mut self.queue);
        if queue.is_empty() {
            return Ok(());
        }

        let checkpoint = self.last_transaction()?;
        for (applied, op) in queue.iter().enumerate() {
            if let Err(e) = self.run(op) {
                if applied > 0 {
                    warn!(
                        "Package operation failed after {} applied, undoing them",
                        applied
                    );
                    self.undo_since(checkpoint);
                }
                return Err(e);
            }
        }
        Ok(())
    }
}
