//! Rebase orchestrator.
//!
//! A rebase is a loop of git steps: start the rebase, and every time git
//! stops on a conflict, resolve the conflicted files, stage them and continue.
//! The loop is modelled as a [`RebasePhase`] state machine whose transitions
//! are pure, so the control flow can be tested without git. Side effects live
//! in [`Rebaser::run`], which reads the current phase, performs its action and
//! feeds the outcome back as a [`RebaseEvent`].

use std::path::PathBuf;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RebaserConfig;
use crate::conflict::ConflictResolver;
use crate::errors::{CoreError, RebaseError, ResolveError};
use crate::git::{GitCli, RebaseTool};

/// Marker git prints when there is nothing to rebase.
const UP_TO_DATE_MARKER: &str = "up to date";

// ---------------------------------------------------------------------------
// Result & phases
// ---------------------------------------------------------------------------

/// Final outcome of a rebase attempt.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RebaseResult {
    /// The branch was rebased and every conflict resolved.
    Success,
    /// The branch already contained the target.
    UpToDate,
    /// A conflict could not be resolved; the rebase was aborted.
    Conflicts,
    /// Something else went wrong; the rebase was aborted.
    Error,
}

impl RebaseResult {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::UpToDate)
    }
}

impl std::fmt::Display for RebaseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::UpToDate => write!(f, "upToDate"),
            Self::Conflicts => write!(f, "conflicts"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// States of the rebase loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebasePhase {
    Idle,
    Rebasing,
    Conflicted,
    Resolving,
    Success,
    UpToDate,
    Conflicts,
    Error,
}

/// Outcomes that move the loop from one phase to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseEvent {
    Start,
    Rebased,
    AlreadyUpToDate,
    StepFailed,
    FilesListed,
    NoConflictedFiles,
    Resolved,
    Unresolved,
    Failed,
}

impl std::fmt::Display for RebasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Rebasing => write!(f, "rebasing"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Resolving => write!(f, "resolving"),
            Self::Success => write!(f, "success"),
            Self::UpToDate => write!(f, "up_to_date"),
            Self::Conflicts => write!(f, "conflicts"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl RebasePhase {
    /// Apply `event` to this phase.
    ///
    /// Every non-terminal phase accepts [`RebaseEvent::Failed`]; terminal
    /// phases accept nothing.
    pub fn transition(self, event: RebaseEvent) -> Result<Self, RebaseError> {
        use RebaseEvent as E;
        use RebasePhase as P;

        let next = match (self, event) {
            (P::Idle, E::Start) => P::Rebasing,
            (P::Rebasing, E::Rebased) => P::Success,
            (P::Rebasing, E::AlreadyUpToDate) => P::UpToDate,
            (P::Rebasing, E::StepFailed) => P::Conflicted,
            (P::Conflicted, E::FilesListed) => P::Resolving,
            (P::Conflicted, E::NoConflictedFiles) => P::Error,
            (P::Resolving, E::Resolved) => P::Rebasing,
            (P::Resolving, E::Unresolved) => P::Conflicts,
            (phase, E::Failed) if !phase.is_terminal() => P::Error,
            (from, event) => {
                return Err(RebaseError::InvalidTransition {
                    from: from.to_string(),
                    event: format!("{event:?}"),
                })
            }
        };
        debug!(from = %self, to = %next, ?event, "rebase transition");
        Ok(next)
    }

    /// The result for a terminal phase, `None` otherwise.
    pub fn result(self) -> Option<RebaseResult> {
        match self {
            Self::Success => Some(RebaseResult::Success),
            Self::UpToDate => Some(RebaseResult::UpToDate),
            Self::Conflicts => Some(RebaseResult::Conflicts),
            Self::Error => Some(RebaseResult::Error),
            Self::Idle | Self::Rebasing | Self::Conflicted | Self::Resolving => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.result().is_some()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// What to rebase onto and how to treat files the resolver gives up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseOptions {
    pub branch: String,
    pub interactive: bool,
    /// Editor command; the conflicted file path is appended.
    pub editor: Vec<String>,
}

impl RebaseOptions {
    pub fn from_config(config: &RebaserConfig) -> Self {
        Self {
            branch: config.rebase.branch.clone(),
            interactive: config.rebase.interactive,
            editor: config.rebase.editor.clone(),
        }
    }
}

/// Drives one rebase from start to a terminal [`RebaseResult`].
pub struct Rebaser<G> {
    git: G,
    resolver: ConflictResolver,
    options: RebaseOptions,
}

impl Rebaser<GitCli> {
    /// Validate `config` and open its repository through the `git` CLI.
    pub fn from_config(config: &RebaserConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let git = GitCli::new(
            &config.rebase.repository,
            &config.identity.name,
            &config.identity.email,
        )?;
        Ok(Self::new(
            git,
            ConflictResolver::new(config.resolver.clone()),
            RebaseOptions::from_config(config),
        ))
    }
}

impl<G: RebaseTool> Rebaser<G> {
    pub fn new(git: G, resolver: ConflictResolver, options: RebaseOptions) -> Self {
        Self {
            git,
            resolver,
            options,
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    /// Rebase onto the configured branch.
    ///
    /// `Conflicts` and `Error` leave the repository as it was before the
    /// rebase started. Only an I/O failure on a conflicted file escapes as
    /// an error, after the rebase has been aborted.
    #[instrument(skip(self), fields(branch = %self.options.branch))]
    pub async fn run(&self) -> Result<RebaseResult, RebaseError> {
        let mut phase = RebasePhase::Idle;
        let mut continuing = false;
        let mut files = Vec::new();

        let result = loop {
            if let Some(result) = phase.result() {
                break result;
            }

            let event = match phase {
                RebasePhase::Idle => RebaseEvent::Start,
                RebasePhase::Rebasing => self.step(continuing).await,
                RebasePhase::Conflicted => match self.git.conflicted_files().await {
                    Ok(listed) if !listed.is_empty() => {
                        files = listed;
                        RebaseEvent::FilesListed
                    }
                    Ok(_) => {
                        warn!("failed to determine files with conflicts");
                        RebaseEvent::NoConflictedFiles
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to list files with conflicts");
                        RebaseEvent::NoConflictedFiles
                    }
                },
                RebasePhase::Resolving => match self.resolve_all(&files).await {
                    Ok(true) => match self.git.stage_all().await {
                        Ok(()) => {
                            continuing = true;
                            RebaseEvent::Resolved
                        }
                        Err(e) => {
                            error!(error = %e, "failed to stage resolved files");
                            RebaseEvent::Failed
                        }
                    },
                    Ok(false) => RebaseEvent::Unresolved,
                    Err(e) => {
                        self.abort().await;
                        return Err(e.into());
                    }
                },
                terminal => {
                    return Err(RebaseError::InvalidTransition {
                        from: terminal.to_string(),
                        event: "step".into(),
                    })
                }
            };
            phase = phase.transition(event)?;
        };

        if matches!(result, RebaseResult::Conflicts | RebaseResult::Error) {
            self.abort().await;
        }
        self.report(result);
        Ok(result)
    }

    async fn step(&self, continuing: bool) -> RebaseEvent {
        let args = if continuing {
            vec!["--continue"]
        } else {
            vec![self.options.branch.as_str()]
        };
        match self.git.rebase(&args).await {
            Ok(output) if output.contains(UP_TO_DATE_MARKER) => RebaseEvent::AlreadyUpToDate,
            Ok(_) => RebaseEvent::Rebased,
            Err(e) => {
                debug!(error = %e, "rebase step stopped");
                RebaseEvent::StepFailed
            }
        }
    }

    /// Resolve `files` in order, stopping at the first one left unresolved.
    async fn resolve_all(&self, files: &[PathBuf]) -> Result<bool, ResolveError> {
        for file in files {
            if self.resolver.resolve_file(file).await? {
                continue;
            }
            if self.options.interactive && self.edit(file).await {
                continue;
            }
            warn!(file = %file.display(), "failed to resolve conflicts");
            return Ok(false);
        }
        Ok(true)
    }

    /// Hand `file` to the editor; a zero exit status counts as resolved.
    async fn edit(&self, file: &std::path::Path) -> bool {
        let Some((program, args)) = self.options.editor.split_first() else {
            return false;
        };
        info!(file = %file.display(), editor = %program, "opening editor for manual resolution");
        match Command::new(program).args(args).arg(file).status().await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(
                    file = %file.display(),
                    code = ?status.code(),
                    "unable to resolve conflict with editor"
                );
                false
            }
            Err(e) => {
                warn!(editor = %program, error = %e, "failed to start editor");
                false
            }
        }
    }

    async fn abort(&self) {
        if let Err(e) = self.git.rebase(&["--abort"]).await {
            warn!(error = %e, "failed to abort rebase");
        }
    }

    fn report(&self, result: RebaseResult) {
        let branch = &self.options.branch;
        match result {
            RebaseResult::Success => info!(%branch, "successfully rebased"),
            RebaseResult::UpToDate => info!(%branch, "already up to date"),
            RebaseResult::Conflicts => warn!(
                %branch,
                "could not rebase due to conflicts that could not be automatically resolved"
            ),
            RebaseResult::Error => error!(%branch, "failed to rebase due to an error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::errors::{ConfigError, GitError};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    /// Replays canned git responses and records what was asked of it.
    #[derive(Default)]
    struct ScriptedGit {
        rebases: Mutex<VecDeque<Result<String, GitError>>>,
        listings: Mutex<VecDeque<Result<Vec<PathBuf>, GitError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGit {
        fn rebase_ok(self, output: &str) -> Self {
            self.rebases.lock().unwrap().push_back(Ok(output.into()));
            self
        }

        fn rebase_conflict(self) -> Self {
            self.rebases.lock().unwrap().push_back(Err(GitError::CommandFailed {
                exit_code: 1,
                stderr: "CONFLICT (content): Merge conflict".into(),
            }));
            self
        }

        fn listing(self, files: Vec<PathBuf>) -> Self {
            self.listings.lock().unwrap().push_back(Ok(files));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RebaseTool for ScriptedGit {
        async fn rebase(&self, args: &[&str]) -> Result<String, GitError> {
            self.calls.lock().unwrap().push(format!("rebase {}", args.join(" ")));
            if args == ["--abort"] {
                return Ok(String::new());
            }
            self.rebases
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }

        async fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError> {
            self.calls.lock().unwrap().push("diff".into());
            self.listings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn stage_all(&self) -> Result<(), GitError> {
            self.calls.lock().unwrap().push("add".into());
            Ok(())
        }
    }

    fn rebaser(git: ScriptedGit, interactive: bool, editor: &[&str]) -> Rebaser<ScriptedGit> {
        Rebaser::new(
            git,
            ConflictResolver::new(ResolverConfig::default()),
            RebaseOptions {
                branch: "main".into(),
                interactive,
                editor: editor.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    const RESOLVABLE: &str =
        "<<<<<<< HEAD\nversion: \"8.0.0\"\n=======\nversion: \"7.0.1\"\n>>>>>>> abc (Apply patch)\n";
    const UNRESOLVABLE: &str = "<<<<<<< HEAD\n# ours\n=======\n# theirs\n>>>>>>> abc\n";

    #[test]
    fn test_transitions() {
        use RebaseEvent as E;
        use RebasePhase as P;

        assert_eq!(P::Idle.transition(E::Start).unwrap(), P::Rebasing);
        assert_eq!(P::Rebasing.transition(E::Rebased).unwrap(), P::Success);
        assert_eq!(P::Rebasing.transition(E::AlreadyUpToDate).unwrap(), P::UpToDate);
        assert_eq!(P::Rebasing.transition(E::StepFailed).unwrap(), P::Conflicted);
        assert_eq!(P::Conflicted.transition(E::FilesListed).unwrap(), P::Resolving);
        assert_eq!(P::Conflicted.transition(E::NoConflictedFiles).unwrap(), P::Error);
        assert_eq!(P::Resolving.transition(E::Resolved).unwrap(), P::Rebasing);
        assert_eq!(P::Resolving.transition(E::Unresolved).unwrap(), P::Conflicts);
    }

    #[test]
    fn test_every_active_phase_can_fail() {
        for phase in [
            RebasePhase::Idle,
            RebasePhase::Rebasing,
            RebasePhase::Conflicted,
            RebasePhase::Resolving,
        ] {
            assert_eq!(phase.transition(RebaseEvent::Failed).unwrap(), RebasePhase::Error);
        }
    }

    #[test]
    fn test_terminal_phases_reject_events() {
        for phase in [
            RebasePhase::Success,
            RebasePhase::UpToDate,
            RebasePhase::Conflicts,
            RebasePhase::Error,
        ] {
            assert!(phase.is_terminal());
            assert!(matches!(
                phase.transition(RebaseEvent::Failed),
                Err(RebaseError::InvalidTransition { .. })
            ));
        }
        assert!(RebasePhase::Idle.transition(RebaseEvent::Resolved).is_err());
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RebaserConfig::default();
        config.rebase.repository = dir.path().to_path_buf();
        config.rebase.branch = "develop".into();

        let rebaser = Rebaser::<GitCli>::from_config(&config).unwrap();
        assert_eq!(rebaser.options.branch, "develop");
        assert_eq!(rebaser.git().repo_path(), dir.path());
    }

    #[test]
    fn test_from_config_errors() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = RebaserConfig::default();
        config.rebase.repository = dir.path().join("missing");
        assert!(matches!(
            Rebaser::<GitCli>::from_config(&config),
            Err(CoreError::Git(GitError::RepositoryNotFound(_)))
        ));

        let mut config = RebaserConfig::default();
        config.rebase.repository = dir.path().to_path_buf();
        config.rebase.branch = " ".into();
        assert!(matches!(
            Rebaser::<GitCli>::from_config(&config),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_result_display_and_serde() {
        assert_eq!(RebaseResult::UpToDate.to_string(), "upToDate");
        assert_eq!(RebaseResult::Conflicts.to_string(), "conflicts");
        assert_eq!(serde_json::to_string(&RebaseResult::UpToDate).unwrap(), "\"upToDate\"");
        assert!(RebaseResult::Success.is_success());
        assert!(!RebaseResult::Error.is_success());
    }

    #[tokio::test]
    async fn test_up_to_date() {
        let git = ScriptedGit::default().rebase_ok("Current branch feature is up to date.\n");
        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::UpToDate);
        assert_eq!(r.git().calls(), vec!["rebase main"]);
    }

    #[tokio::test]
    async fn test_clean_rebase() {
        let git = ScriptedGit::default()
            .rebase_ok("Successfully rebased and updated refs/heads/feature.\n");
        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Success);
        assert_eq!(r.git().calls(), vec!["rebase main"]);
    }

    #[tokio::test]
    async fn test_conflict_resolved_then_continue() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "global.json", RESOLVABLE);
        let git = ScriptedGit::default()
            .rebase_conflict()
            .listing(vec![file.clone()])
            .rebase_ok("Successfully rebased.\n");

        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Success);
        assert_eq!(
            r.git().calls(),
            vec!["rebase main", "diff", "add", "rebase --continue"]
        );
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "version: \"8.0.0\"\n");
    }

    #[tokio::test]
    async fn test_conflicts_over_several_commits() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a.yml", RESOLVABLE);
        let second = write(dir.path(), "b.yml", RESOLVABLE);
        let git = ScriptedGit::default()
            .rebase_conflict()
            .listing(vec![first])
            .rebase_conflict()
            .listing(vec![second])
            .rebase_ok("");

        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Success);
        assert_eq!(
            r.git().calls(),
            vec![
                "rebase main",
                "diff",
                "add",
                "rebase --continue",
                "diff",
                "add",
                "rebase --continue"
            ]
        );
    }

    #[tokio::test]
    async fn test_unresolvable_conflict_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "settings.yml", UNRESOLVABLE);
        let git = ScriptedGit::default().rebase_conflict().listing(vec![file.clone()]);

        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Conflicts);
        assert_eq!(r.git().calls(), vec!["rebase main", "diff", "rebase --abort"]);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), UNRESOLVABLE);
    }

    #[tokio::test]
    async fn test_stops_at_first_unresolved_file() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.yml", UNRESOLVABLE);
        let good = write(dir.path(), "good.yml", RESOLVABLE);
        let git = ScriptedGit::default().rebase_conflict().listing(vec![bad, good.clone()]);

        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Conflicts);
        assert_eq!(std::fs::read_to_string(&good).unwrap(), RESOLVABLE);
    }

    #[tokio::test]
    async fn test_no_conflicted_files_is_an_error() {
        let git = ScriptedGit::default().rebase_conflict().listing(Vec::new());
        let r = rebaser(git, false, &[]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Error);
        assert_eq!(r.git().calls(), vec!["rebase main", "diff", "rebase --abort"]);
    }

    #[tokio::test]
    async fn test_io_failure_aborts_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let git = ScriptedGit::default()
            .rebase_conflict()
            .listing(vec![dir.path().join("missing.json")]);

        let r = rebaser(git, false, &[]);
        assert!(matches!(r.run().await, Err(RebaseError::ResolveError(_))));
        assert_eq!(r.git().calls(), vec!["rebase main", "diff", "rebase --abort"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interactive_editor_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "settings.yml", UNRESOLVABLE);
        let git = ScriptedGit::default()
            .rebase_conflict()
            .listing(vec![file])
            .rebase_ok("");

        let r = rebaser(git, true, &["true"]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Success);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interactive_editor_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "settings.yml", UNRESOLVABLE);
        let git = ScriptedGit::default().rebase_conflict().listing(vec![file]);

        let r = rebaser(git, true, &["false"]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Conflicts);
        assert!(r.git().calls().contains(&"rebase --abort".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_editor_ignored_when_not_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "settings.yml", UNRESOLVABLE);
        let git = ScriptedGit::default().rebase_conflict().listing(vec![file]);

        let r = rebaser(git, false, &["true"]);
        assert_eq!(r.run().await.unwrap(), RebaseResult::Conflicts);
    }
}
