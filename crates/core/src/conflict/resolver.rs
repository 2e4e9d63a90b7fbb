//! File-level conflict resolution.
//!
//! The [`ConflictResolver`] decides how a conflicted file is handled from its
//! name alone:
//!
//! - a lock file is deleted and regenerated by the package manager;
//! - a container file is merged in line mode only;
//! - anything else is merged in line mode with chunk mode as fallback.
//!
//! A merged file is only written back when every region resolved, and the
//! write goes through a temporary file in the same directory so a crash never
//! leaves it half-written.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::merger::{merge_region, MergeMode};
use super::region::{join_lines, ConflictedText, Segment};
use crate::config::ResolverConfig;
use crate::errors::ResolveError;

/// How a conflicted file is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    LockFile,
    ContainerFile,
    Manifest,
}

impl FileKind {
    fn merge_mode(self) -> MergeMode {
        match self {
            FileKind::ContainerFile => MergeMode::LineOnly,
            FileKind::LockFile | FileKind::Manifest => MergeMode::LineThenChunk,
        }
    }
}

/// Resolve every conflict region in `text`.
///
/// Returns `None` if any region cannot be resolved or the markers are
/// malformed. Text without conflict regions comes back unchanged.
pub fn resolve_text(text: &str, mode: MergeMode) -> Option<String> {
    let parsed = ConflictedText::parse(text)?;
    let mut lines = Vec::new();
    for segment in &parsed.segments {
        match segment {
            Segment::Line(line) => lines.push(*line),
            Segment::Conflict(region) => lines.extend(merge_region(region, mode)?),
        }
    }
    Some(join_lines(&lines, parsed.line_ending))
}

/// Resolves conflicted files in place.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl ConflictResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn file_kind(&self, path: &Path) -> FileKind {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.ends_with(&self.config.lock_file_name) {
            FileKind::LockFile
        } else if name == self.config.container_file_name {
            FileKind::ContainerFile
        } else {
            FileKind::Manifest
        }
    }

    /// Resolve one conflicted file.
    ///
    /// `Ok(false)` means the file was left untouched (or, for a lock file,
    /// could not be regenerated); errors are reserved for I/O failures.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn resolve_file(&self, path: &Path) -> Result<bool, ResolveError> {
        match self.file_kind(path) {
            FileKind::LockFile => self.regenerate_lock_file(path).await,
            kind => self.merge_file(path, kind.merge_mode()).await,
        }
    }

    async fn merge_file(&self, path: &Path, mode: MergeMode) -> Result<bool, ResolveError> {
        let bytes = tokio::fs::read(path).await.map_err(io_error(path))?;
        let Ok(text) = String::from_utf8(bytes) else {
            warn!("conflicted file is not UTF-8 text");
            return Ok(false);
        };

        let Some(resolved) = resolve_text(&text, mode) else {
            info!("conflict could not be resolved automatically");
            return Ok(false);
        };

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&target, &resolved))
            .await
            .map_err(std::io::Error::other)
            .and_then(|written| written)
            .map_err(io_error(path))?;
        info!(?mode, "resolved conflict");
        Ok(true)
    }

    async fn regenerate_lock_file(&self, path: &Path) -> Result<bool, ResolveError> {
        let Some((program, args)) = self.config.install_command.split_first() else {
            warn!("no install command configured");
            return Ok(false);
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(path)(e)),
        }

        debug!(program = %program, ?args, dir = %dir.display(), "regenerating lock file");
        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(program = %program, error = %e, "failed to start install command");
                return Ok(false);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "install command failed");
            return Ok(false);
        }

        info!("regenerated lock file");
        Ok(true)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ResolveError + '_ {
    move |source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace `path` with `contents`, keeping its permissions. Blocking; run it
/// on the blocking pool.
fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolver() -> ConflictResolver {
        ConflictResolver::new(ResolverConfig::default())
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_file_kind() {
        let r = resolver();
        assert_eq!(r.file_kind(Path::new("web/package-lock.json")), FileKind::LockFile);
        assert_eq!(r.file_kind(Path::new("docker/Dockerfile")), FileKind::ContainerFile);
        assert_eq!(r.file_kind(Path::new("Dockerfile.dev")), FileKind::Manifest);
        assert_eq!(r.file_kind(Path::new("Directory.Packages.props")), FileKind::Manifest);
    }

    #[test]
    fn test_resolve_text_without_regions_is_identical() {
        for text in ["a\nb\n", "a\r\nb\r\n", "", "no newline"] {
            assert_eq!(resolve_text(text, MergeMode::LineThenChunk).as_deref(), Some(text));
        }
    }

    #[test]
    fn test_resolve_text_line_mode() {
        let text = "name: app\n<<<<<<< HEAD\nversion: \"8.0.0\"\n=======\nversion: \"7.0.1\"\n>>>>>>> abc (Apply patch)\n";
        assert_eq!(
            resolve_text(text, MergeMode::LineOnly).as_deref(),
            Some("name: app\nversion: \"8.0.0\"\n")
        );
    }

    #[test]
    fn test_resolve_text_zero_padded_image_tag() {
        let text = "<<<<<<< HEAD\nFROM ubuntu:22.04\n=======\nFROM ubuntu:20.04\n>>>>>>> abc\n";
        assert_eq!(
            resolve_text(text, MergeMode::LineOnly).as_deref(),
            Some("FROM ubuntu:22.04\n")
        );

        let text = "<<<<<<< HEAD\nFROM ubuntu:20.04\n=======\nFROM ubuntu:22.04\n>>>>>>> abc\n";
        assert_eq!(
            resolve_text(text, MergeMode::LineOnly).as_deref(),
            Some("FROM ubuntu:22.04\n")
        );
    }

    #[test]
    fn test_resolve_text_keeps_crlf() {
        let text = "{\r\n<<<<<<< HEAD\r\n  \"a\": \"1.0.0\"\r\n=======\r\n  \"a\": \"1.2.0\"\r\n>>>>>>> abc\r\n}\r\n";
        assert_eq!(
            resolve_text(text, MergeMode::LineThenChunk).as_deref(),
            Some("{\r\n  \"a\": \"1.2.0\"\r\n}\r\n")
        );
    }

    #[test]
    fn test_resolve_text_chunk_mode() {
        let text = concat!(
            "  \"dependencies\": {\n",
            "<<<<<<< HEAD\n",
            "    \"react\": \"^18.2.0\",\n",
            "    \"zod\": \"^3.22.0\",\n",
            "    \"vite\": \"^4.4.0\",\n",
            "=======\n",
            "    \"react\": \"^18.1.0\",\n",
            "    \"vite\": \"^4.5.0\",\n",
            ">>>>>>> abc\n",
            "  }\n",
        );
        assert_eq!(resolve_text(text, MergeMode::LineOnly), None);
        assert_eq!(
            resolve_text(text, MergeMode::LineThenChunk).as_deref(),
            Some(concat!(
                "  \"dependencies\": {\n",
                "    \"react\": \"^18.2.0\",\n",
                "    \"zod\": \"^3.22.0\",\n",
                "    \"vite\": \"^4.5.0\",\n",
                "  }\n",
            ))
        );
    }

    #[test]
    fn test_resolve_text_unresolvable() {
        let text = "<<<<<<< HEAD\n# pinned by ops\n=======\n# bumped\n>>>>>>> abc\n";
        assert_eq!(resolve_text(text, MergeMode::LineThenChunk), None);
    }

    #[tokio::test]
    async fn test_resolve_file_writes_merged_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "Directory.Packages.props",
            "<Project>\n<<<<<<< HEAD\n  <PackageVersion Include=\"Polly\" Version=\"7.2.4\" />\n=======\n  <PackageVersion Include=\"Polly\" Version=\"8.0.0\" />\n>>>>>>> abc\n</Project>\n",
        );

        assert!(resolver().resolve_file(&path).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<Project>\n  <PackageVersion Include=\"Polly\" Version=\"8.0.0\" />\n</Project>\n"
        );
    }

    #[tokio::test]
    async fn test_resolve_file_leaves_unresolvable_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let contents = "<<<<<<< HEAD\nRUN a\n=======\nRUN b\n>>>>>>> abc\n";
        let path = write(dir.path(), "settings.yml", contents);

        assert!(!resolver().resolve_file(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn test_container_file_has_no_chunk_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let contents = "<<<<<<< HEAD\nFROM node:20.8.0\nFROM nginx:1.25.2\n=======\nFROM node:20.9.0\n>>>>>>> abc\n";
        let path = write(dir.path(), "Dockerfile", contents);
        assert!(!resolver().resolve_file(&path).await.unwrap());

        let other = write(dir.path(), "base.dockerfile", contents);
        assert!(resolver().resolve_file(&other).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&other).unwrap(),
            "FROM node:20.9.0\nFROM nginx:1.25.2\n"
        );
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(!resolver().resolve_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolver().resolve_file(&dir.path().join("gone.json")).await;
        assert!(matches!(result, Err(ResolveError::Io { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_file_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "versions.sh",
            "<<<<<<< HEAD\nFROM ubuntu:22.04\n=======\nFROM ubuntu:24.04\n>>>>>>> abc\n",
        );
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o750)).unwrap();

        assert!(resolver().resolve_file(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "FROM ubuntu:24.04\n");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_file_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "package-lock.json", "<<<<<<< HEAD\n=======\n>>>>>>> abc\n");
        let resolver = ConflictResolver::new(ResolverConfig {
            install_command: vec![
                "sh".into(),
                "-c".into(),
                "echo regenerated > package-lock.json".into(),
            ],
            ..ResolverConfig::default()
        });

        assert!(resolver.resolve_file(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "regenerated\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_file_install_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "package-lock.json", "conflicted");

        let failing = ConflictResolver::new(ResolverConfig {
            install_command: vec!["false".into()],
            ..ResolverConfig::default()
        });
        assert!(!failing.resolve_file(&path).await.unwrap());
        assert!(!path.exists());

        let missing = ConflictResolver::new(ResolverConfig {
            install_command: vec!["rebaser-no-such-package-manager".into()],
            ..ResolverConfig::default()
        });
        assert!(!missing.resolve_file(&path).await.unwrap());
    }
}
