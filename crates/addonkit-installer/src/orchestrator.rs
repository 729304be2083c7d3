use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use addonkit_core::{AddonMetadata, AddonName, ArchiveCodec, NamePolicy, PackageArchive, ZipCodec};
use addonkit_resolver::PackageResolver;
use anyhow::Context;

use crate::backup::{BackupManager, BackupRecord};
use crate::config::{AddonkitConfig, DEFAULT_IMPORT_SCRIPT};
use crate::error::{describe, ledger_write_error, AddonError, HookPhase};
use crate::fs_utils::{dir_exists, file_exists, remove_dir_recursive};
use crate::hooks::{AddonRegistry, DataImporter, HookContext};
use crate::layout::{AddonLayout, LEDGER_FILE};
use crate::ledger::LedgerStore;
use crate::lock::{read_lock_intents, AddonLock};
use crate::prompt::{NonInteractive, Prompt};
use crate::types::{
    AddonStatus, BackupRequest, DoctorFinding, InstallOutcome, InstallReport, InstallRequest,
    RemoveOutcome, RemoveRequest, TransactionPhase, UpdateOutcome, UpdateRequest,
};

/// Runs install, update, remove and backup as transactions over one
/// installation area.
pub struct LifecycleOrchestrator {
    layout: AddonLayout,
    name_policy: NamePolicy,
    codec: Box<dyn ArchiveCodec>,
    registry: AddonRegistry,
    importer: Option<Box<dyn DataImporter>>,
    prompt: Box<dyn Prompt>,
    import_script: String,
}

impl LifecycleOrchestrator {
    pub fn new(layout: AddonLayout) -> Self {
        Self {
            layout,
            name_policy: NamePolicy::default(),
            codec: Box::new(ZipCodec),
            registry: AddonRegistry::new(),
            importer: None,
            prompt: Box::new(NonInteractive),
            import_script: DEFAULT_IMPORT_SCRIPT.to_string(),
        }
    }

    pub fn from_config(config: &AddonkitConfig, root: &Path) -> anyhow::Result<Self> {
        let mut orchestrator = Self::new(config.layout(root))
            .with_name_policy(config.name_policy)
            .with_import_script(config.import_script.trim());
        if let Some(importer) = config.importer()? {
            orchestrator = orchestrator.with_importer(Box::new(importer));
        }
        tracing::debug!(
            root = %orchestrator.layout.root().display(),
            package_dir = %orchestrator.layout.package_dir().display(),
            addons_dir = %orchestrator.layout.addons_dir().display(),
            "addon layout resolved"
        );
        Ok(orchestrator)
    }

    pub fn with_name_policy(mut self, name_policy: NamePolicy) -> Self {
        self.name_policy = name_policy;
        self
    }

    pub fn with_codec(mut self, codec: Box<dyn ArchiveCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_registry(mut self, registry: AddonRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_importer(mut self, importer: Box<dyn DataImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn with_prompt(mut self, prompt: Box<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_import_script(mut self, import_script: impl Into<String>) -> Self {
        self.import_script = import_script.into();
        self
    }

    pub fn ledger(&self) -> LedgerStore {
        LedgerStore::new(self.layout.ledger_path())
    }

    pub fn resolver(&self) -> PackageResolver {
        PackageResolver::new(self.layout.package_dir())
    }

    /// Normalizes `raw` under the configured policy. The ledger shares the
    /// addons directory, so its file name is not a valid addon name.
    pub fn addon_name(&self, raw: &str) -> Result<AddonName, AddonError> {
        let name = self
            .name_policy
            .normalize(raw)
            .map_err(|err| AddonError::InvalidName {
                raw: raw.to_string(),
                reason: describe(&err),
            })?;
        if name.as_str().eq_ignore_ascii_case(LEDGER_FILE) {
            return Err(AddonError::InvalidName {
                raw: raw.to_string(),
                reason: format!("{LEDGER_FILE} is reserved for the addon ledger"),
            });
        }
        Ok(name)
    }

    pub fn install(&self, request: &InstallRequest) -> Result<InstallOutcome, AddonError> {
        let name = self.addon_name(&request.name)?;
        let mut lock = AddonLock::acquire(&self.layout, &name, "install")?;
        let addon_dir = self.layout.addon_dir(&name);
        let installed = dir_exists(&addon_dir);

        if !request.confirmed {
            let question = if installed {
                format!("addon {name} is already installed. Replace it?")
            } else {
                format!("install addon {name}?")
            };
            match self.prompt.confirm(&question) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(addon = %name, "install cancelled");
                    return Ok(InstallOutcome::Cancelled {
                        name: name.to_string(),
                    });
                }
                Err(err) if installed => {
                    tracing::debug!(
                        addon = %name,
                        error = %describe(&err),
                        "replacement not confirmed"
                    );
                    return Err(AddonError::AlreadyInstalled {
                        name: name.to_string(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        let archive = self.resolve_archive(
            &name,
            request.version.as_deref(),
            request.backup_id.as_deref(),
        )?;

        let mut previous_version = None;
        let mut backup = None;
        if installed {
            previous_version = AddonMetadata::load(&addon_dir)
                .ok()
                .map(|metadata| metadata.version);
            backup = Some(self.take_backup(&mut lock, &name)?);
        }

        let metadata = self.apply_archive(
            &mut lock,
            &name,
            &archive,
            request.password.as_deref(),
            backup.as_ref(),
        )?;
        self.commit(&mut lock, &name, &metadata.version)?;

        tracing::info!(
            addon = %name,
            version = %metadata.version,
            archive = %archive.file_name,
            "addon installed"
        );
        Ok(InstallOutcome::Installed(InstallReport {
            name: name.to_string(),
            version: metadata.version,
            previous_version,
            archive: archive.path,
            backup,
        }))
    }

    pub fn update(&self, request: &UpdateRequest) -> Result<UpdateOutcome, AddonError> {
        let name = self.addon_name(&request.name)?;
        let mut lock = AddonLock::acquire(&self.layout, &name, "update")?;
        let addon_dir = self.layout.addon_dir(&name);
        if !dir_exists(&addon_dir) {
            return Err(AddonError::PackageNotFound {
                name: name.to_string(),
                detail: format!("not installed under {}", self.layout.addons_dir().display()),
            });
        }

        let installed = AddonMetadata::load(&addon_dir)
            .with_context(|| format!("cannot read installed version of addon {name}"))?;
        let candidate = self.resolver().resolve_update(name.as_str(), &installed.version)?;
        let Some(archive) = candidate else {
            tracing::info!(addon = %name, version = %installed.version, "addon is up to date");
            return Ok(UpdateOutcome::UpToDate {
                name: name.to_string(),
                version: installed.version,
            });
        };
        let target = archive.version().unwrap_or_default().to_string();

        if !request.confirmed {
            let question = format!(
                "update addon {name} from {} to {target}?",
                installed.version
            );
            if !self.prompt.confirm(&question)? {
                tracing::info!(addon = %name, "update cancelled");
                return Ok(UpdateOutcome::Cancelled {
                    name: name.to_string(),
                });
            }
        }

        let backup = self.take_backup(&mut lock, &name)?;
        let metadata = self.apply_archive(
            &mut lock,
            &name,
            &archive,
            request.password.as_deref(),
            Some(&backup),
        )?;
        self.commit(&mut lock, &name, &metadata.version)?;

        tracing::info!(
            addon = %name,
            from = %installed.version,
            to = %metadata.version,
            "addon updated"
        );
        Ok(UpdateOutcome::Updated(InstallReport {
            name: name.to_string(),
            version: metadata.version,
            previous_version: Some(installed.version),
            archive: archive.path,
            backup: Some(backup),
        }))
    }

    pub fn remove(&self, request: &RemoveRequest) -> Result<RemoveOutcome, AddonError> {
        let name = self.addon_name(&request.name)?;
        let mut lock = AddonLock::acquire(&self.layout, &name, "remove")?;
        let addon_dir = self.layout.addon_dir(&name);
        if !dir_exists(&addon_dir) {
            return Err(AddonError::PackageNotFound {
                name: name.to_string(),
                detail: format!("not installed under {}", self.layout.addons_dir().display()),
            });
        }

        // Only a readable descriptor with an explicit off state allows removal.
        let metadata = AddonMetadata::load(&addon_dir).map_err(|err| AddonError::AddonBusy {
            name: name.to_string(),
            detail: format!("cannot confirm it is disabled: {}", describe(&err)),
        })?;
        if metadata.is_enabled() {
            return Err(AddonError::AddonBusy {
                name: name.to_string(),
                detail: "disable it before removing".to_string(),
            });
        }
        let version = metadata.version.clone();

        if !request.confirmed {
            let question = format!("remove addon {name} {version}?");
            if !self.prompt.confirm(&question)? {
                tracing::info!(addon = %name, "remove cancelled");
                return Ok(RemoveOutcome::Cancelled {
                    name: name.to_string(),
                });
            }
        }

        if let Some(hook) = self.registry.get(&name) {
            lock.set_phase(TransactionPhase::RunningHook);
            let ctx = HookContext {
                name: &name,
                addon_dir: &addon_dir,
                metadata: &metadata,
            };
            hook.uninstall(&ctx)
                .map_err(|err| AddonError::InstallHookFailed {
                    name: name.to_string(),
                    phase: HookPhase::Uninstall,
                    reason: describe(&err),
                })?;
        }

        lock.set_phase(TransactionPhase::Committing);
        remove_dir_recursive(&addon_dir).map_err(|err| removal_error(&addon_dir, err))?;
        let ledger = self.ledger();
        ledger
            .subtract([name.as_str()])
            .map_err(|err| ledger_write_error(ledger.path().to_path_buf(), err))?;
        lock.set_phase(TransactionPhase::Done);

        tracing::info!(addon = %name, version = %version, "addon removed");
        Ok(RemoveOutcome::Removed {
            name: name.to_string(),
            version,
        })
    }

    /// Snapshots the installation without touching it or the ledger.
    pub fn backup(&self, request: &BackupRequest) -> Result<BackupRecord, AddonError> {
        let name = self.addon_name(&request.name)?;
        let mut lock = AddonLock::acquire(&self.layout, &name, "backup")?;
        if !dir_exists(&self.layout.addon_dir(&name)) {
            return Err(AddonError::PackageNotFound {
                name: name.to_string(),
                detail: format!("not installed under {}", self.layout.addons_dir().display()),
            });
        }

        let out_dir = request
            .out_dir
            .as_deref()
            .unwrap_or_else(|| self.layout.package_dir());
        let record = BackupManager::new(&self.layout, self.codec.as_ref())
            .snapshot(&name, out_dir, request.password.as_deref())
            .map_err(|err| AddonError::BackupFailed {
                name: name.to_string(),
                reason: describe(&err),
            })?;
        lock.record_backup(&record.path);
        lock.set_phase(TransactionPhase::Done);

        tracing::info!(addon = %name, archive = %record.path.display(), "addon backed up");
        Ok(record)
    }

    /// Ledger entries and installed directories, joined with the archives
    /// available for each.
    pub fn list(&self) -> Result<Vec<AddonStatus>, AddonError> {
        let ledger = self.ledger().read()?;
        let mut names: BTreeSet<String> = ledger.addons.keys().cloned().collect();
        names.extend(self.installed_dir_names()?);

        let resolver = self.resolver();
        let mut statuses = Vec::with_capacity(names.len());
        for raw in names {
            let mut status = AddonStatus {
                ledger_version: ledger.version_of(&raw).map(str::to_string),
                installed_version: None,
                enabled: None,
                available_versions: Vec::new(),
                backups: Vec::new(),
                name: raw,
            };
            let Ok(name) = AddonName::new(status.name.as_str()) else {
                statuses.push(status);
                continue;
            };

            if let Ok(metadata) = AddonMetadata::load(&self.layout.addon_dir(&name)) {
                status.enabled = Some(metadata.is_enabled());
                status.installed_version = Some(metadata.version);
            }
            for archive in resolver.list_archives(name.as_str())? {
                if let Some(backup_id) = archive.backup_id() {
                    status.backups.push(backup_id.to_string());
                } else if let Some(version) = archive.version() {
                    status.available_versions.push(version.to_string());
                }
            }
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Drift between the ledger and the installation area, plus lock files
    /// left behind by interrupted operations. Changes nothing.
    pub fn doctor(&self) -> Result<Vec<DoctorFinding>, AddonError> {
        let ledger = self.ledger().read()?;
        let mut findings = Vec::new();

        for (raw, ledger_version) in &ledger.addons {
            let metadata = AddonName::new(raw.as_str())
                .ok()
                .and_then(|name| AddonMetadata::load(&self.layout.addon_dir(&name)).ok());
            match metadata {
                None => findings.push(DoctorFinding::LedgerWithoutInstall {
                    name: raw.clone(),
                    version: ledger_version.clone(),
                }),
                Some(metadata) if &metadata.version != ledger_version => {
                    findings.push(DoctorFinding::VersionMismatch {
                        name: raw.clone(),
                        ledger_version: ledger_version.clone(),
                        installed_version: metadata.version,
                    });
                }
                Some(_) => {}
            }
        }

        for raw in self.installed_dir_names()? {
            if ledger.version_of(&raw).is_some() {
                continue;
            }
            let Ok(name) = AddonName::new(raw.as_str()) else {
                continue;
            };
            if let Ok(metadata) = AddonMetadata::load(&self.layout.addon_dir(&name)) {
                findings.push(DoctorFinding::InstallWithoutLedger {
                    name: raw,
                    version: metadata.version,
                });
            }
        }

        for (lock_path, intent) in read_lock_intents(&self.layout)? {
            findings.push(match intent {
                Some(intent) => DoctorFinding::StaleLock {
                    lock_path,
                    addon: Some(intent.addon),
                    operation: Some(intent.operation),
                    phase: Some(intent.phase),
                    backup: intent.backup,
                },
                None => DoctorFinding::StaleLock {
                    lock_path,
                    addon: None,
                    operation: None,
                    phase: None,
                    backup: None,
                },
            });
        }

        Ok(findings)
    }

    fn resolve_archive(
        &self,
        name: &AddonName,
        version: Option<&str>,
        backup_id: Option<&str>,
    ) -> Result<PackageArchive, AddonError> {
        let resolver = self.resolver();
        let resolved = resolver.resolve(name.as_str(), version, backup_id)?;
        resolved.ok_or_else(|| {
            let wanted = match (backup_id, version) {
                (Some(backup_id), _) => format!("backup {backup_id}"),
                (None, Some(version)) => format!("version {version}"),
                (None, None) => "any version".to_string(),
            };
            AddonError::PackageNotFound {
                name: name.to_string(),
                detail: format!(
                    "no archive for {wanted} in {}",
                    resolver.package_dir().display()
                ),
            }
        })
    }

    fn take_backup(
        &self,
        lock: &mut AddonLock,
        name: &AddonName,
    ) -> Result<BackupRecord, AddonError> {
        let record = BackupManager::new(&self.layout, self.codec.as_ref())
            .backup(name)
            .map_err(|err| AddonError::BackupFailed {
                name: name.to_string(),
                reason: describe(&err),
            })?;
        lock.record_backup(&record.path);
        Ok(record)
    }

    /// Unpack, validate, run the install hook and the data import. Any
    /// failure rolls the addon directory back before returning.
    fn apply_archive(
        &self,
        lock: &mut AddonLock,
        name: &AddonName,
        archive: &PackageArchive,
        password: Option<&str>,
        backup: Option<&BackupRecord>,
    ) -> Result<AddonMetadata, AddonError> {
        let addon_dir = self.layout.addon_dir(name);

        lock.set_phase(TransactionPhase::Unpacking);
        if let Err(err) = self.codec.unpack(&archive.path, &addon_dir, password) {
            let cause = AddonError::InvalidPackage {
                name: name.to_string(),
                reason: describe(&err),
            };
            return Err(self.abort(lock, name, backup, cause));
        }

        lock.set_phase(TransactionPhase::Validating);
        let metadata = match AddonMetadata::load(&addon_dir) {
            Ok(metadata) => metadata,
            Err(err) => {
                let cause = AddonError::InvalidPackage {
                    name: name.to_string(),
                    reason: describe(&err),
                };
                return Err(self.abort(lock, name, backup, cause));
            }
        };
        if metadata.name != name.as_str() {
            tracing::warn!(
                addon = %name,
                descriptor_name = %metadata.name,
                "descriptor name differs from addon name"
            );
        }

        lock.set_phase(TransactionPhase::RunningHook);
        if let Err(cause) = self.run_install_hooks(name, &addon_dir, &metadata) {
            return Err(self.abort(lock, name, backup, cause));
        }

        Ok(metadata)
    }

    fn run_install_hooks(
        &self,
        name: &AddonName,
        addon_dir: &Path,
        metadata: &AddonMetadata,
    ) -> Result<(), AddonError> {
        if let Some(hook) = self.registry.get(name) {
            let ctx = HookContext {
                name,
                addon_dir,
                metadata,
            };
            hook.install(&ctx)
                .map_err(|err| AddonError::InstallHookFailed {
                    name: name.to_string(),
                    phase: HookPhase::Install,
                    reason: describe(&err),
                })?;
        }

        let script = addon_dir.join(&self.import_script);
        if !file_exists(&script) {
            return Ok(());
        }
        match &self.importer {
            Some(importer) => importer
                .import(name, &script)
                .map_err(|err| AddonError::InstallHookFailed {
                    name: name.to_string(),
                    phase: HookPhase::DataImport,
                    reason: describe(&err),
                }),
            None => {
                tracing::warn!(
                    addon = %name,
                    script = %script.display(),
                    "no data importer configured, import script skipped"
                );
                Ok(())
            }
        }
    }

    /// Removes the partial installation and restores `backup`. Returns the
    /// error to surface: `cause` itself, or `RollbackFailed` wrapping it.
    fn abort(
        &self,
        lock: &mut AddonLock,
        name: &AddonName,
        backup: Option<&BackupRecord>,
        cause: AddonError,
    ) -> AddonError {
        lock.set_phase(TransactionPhase::Aborting);
        tracing::warn!(addon = %name, error = %cause, "rolling back");

        let addon_dir = self.layout.addon_dir(name);
        let mut failures = Vec::new();
        if let Err(err) = remove_dir_recursive(&addon_dir) {
            failures.push(format!(
                "failed to remove partial install {}: {err}",
                addon_dir.display()
            ));
        } else if let Some(record) = backup {
            let manager = BackupManager::new(&self.layout, self.codec.as_ref());
            if let Err(err) = manager.restore(record, name) {
                failures.push(describe(&err));
            }
        }

        if failures.is_empty() {
            lock.set_phase(TransactionPhase::RolledBack);
            return cause;
        }

        if let Some(record) = backup {
            failures.push(format!("backup archive: {}", record.path.display()));
        }
        let rollback = failures.join("; ");
        tracing::warn!(addon = %name, rollback = %rollback, "rollback incomplete");
        AddonError::RollbackFailed {
            cause: Box::new(cause),
            rollback,
        }
    }

    fn commit(
        &self,
        lock: &mut AddonLock,
        name: &AddonName,
        version: &str,
    ) -> Result<(), AddonError> {
        lock.set_phase(TransactionPhase::Committing);
        let ledger = self.ledger();
        ledger
            .merge([(name.as_str(), version)])
            .map_err(|err| ledger_write_error(ledger.path().to_path_buf(), err))?;
        lock.set_phase(TransactionPhase::Done);
        Ok(())
    }

    fn installed_dir_names(&self) -> Result<Vec<String>, AddonError> {
        let dir = self.layout.addons_dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to read addons directory: {}", dir.display()))
                    .into());
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read addons directory: {}", dir.display()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') || !dir_exists(&entry.path()) {
                continue;
            }
            names.push(file_name);
        }
        names.sort();
        Ok(names)
    }
}

fn removal_error(path: &Path, err: io::Error) -> AddonError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return AddonError::PermissionDenied {
            path: path.to_path_buf(),
            source: err,
        };
    }
    anyhow::Error::new(err)
        .context(format!("failed to remove {}", path.display()))
        .into()
}
