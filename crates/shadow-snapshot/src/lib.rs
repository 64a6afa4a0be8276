//! Produces portable git bundles from a local working tree, including any
//! uncommitted changes, for the shadow lifecycle engine.
//!
//! A naive `git bundle --all` of the local repository omits references that
//! only exist on the remote (relevant when downstream lock files pin commits
//! that live on the remote but not on any local branch), so the engine
//! best-effort fetches from `origin` first and enumerates
//! `refs/heads/*`, `refs/tags/*`, and `refs/remotes/*` explicitly rather than
//! relying on `--all`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

mod error;
pub use error::{Error, Result};

/// Fixed author used for the synthetic commit that captures uncommitted
/// changes, so "Shadow snapshot" commits are recognizable in history.
pub const SNAPSHOT_AUTHOR: &str = "Shadow <shadow@localhost>";
/// Commit message for the synthetic uncommitted-changes commit.
pub const SNAPSHOT_MESSAGE: &str = "Shadow snapshot: uncommitted changes";

/// Output of a single snapshot operation.
#[derive(Debug, Clone)]
pub struct SnapshotResult {
    pub bundle_path: PathBuf,
    pub has_uncommitted: bool,
    pub commit_sha: String,
    pub size_bytes: u64,
}

/// Snapshots local working trees into deterministic bundle paths under
/// `<snapshots_dir>/<org>/<name>.bundle`.
pub struct SnapshotEngine {
    snapshots_dir: PathBuf,
}

impl SnapshotEngine {
    pub fn new(snapshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshots_dir: snapshots_dir.into(),
        }
    }

    /// Deterministic bundle path for a given spec, regardless of whether it
    /// has been snapshotted yet.
    pub fn bundle_path(&self, org: &str, name: &str) -> PathBuf {
        self.snapshots_dir.join(org).join(format!("{name}.bundle"))
    }

    /// Produce a bundle for `local_path` at `snapshots/<org>/<name>.bundle`.
    pub fn snapshot(&self, local_path: &Path, org: &str, name: &str) -> Result<SnapshotResult> {
        if !is_git_repo(local_path) {
            return Err(Error::invalid_local_path(local_path.display().to_string()));
        }

        let dest = self.bundle_path(org, name);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Best-effort: the repo may be origin-less, or offline.
        if let Err(e) = fetch_origin(local_path) {
            tracing::debug!(repo = %local_path.display(), error = %e, "origin fetch skipped");
        }

        let dirty = has_uncommitted_changes(local_path)?;

        let (source_repo, _scratch_guard, commit_sha) = if dirty {
            let scratch = tempfile::tempdir()?;
            let scratch_repo = scratch.path().join("repo");
            clone_local(local_path, &scratch_repo)?;
            copy_worktree_contents(local_path, &scratch_repo)?;
            restore_remote_tracking_refs(local_path, &scratch_repo)?;
            let sha = create_snapshot_commit(&scratch_repo)?;
            (scratch_repo, Some(scratch), sha)
        } else {
            let sha = rev_parse(local_path, "HEAD")?;
            (local_path.to_path_buf(), None, sha)
        };

        let refs = concrete_refs(&source_repo)?;
        write_bundle(&source_repo, &dest, &refs)?;

        let size_bytes = std::fs::metadata(&dest)?.len();

        Ok(SnapshotResult {
            bundle_path: dest,
            has_uncommitted: dirty,
            commit_sha,
            size_bytes,
        })
    }
}

fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .args(["-C", &path.to_string_lossy(), "rev-parse", "--git-dir"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::snapshot_failed(format!("failed to spawn git {args:?}: {e}")))
}

fn run_git_ok(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(dir, args)?;
    if !output.status.success() {
        return Err(Error::snapshot_failed(format!(
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn has_uncommitted_changes(repo: &Path) -> Result<bool> {
    let status = run_git_ok(repo, &["status", "--porcelain"])?;
    Ok(!status.is_empty())
}

fn fetch_origin(repo: &Path) -> Result<()> {
    run_git_ok(repo, &["fetch", "origin", "--prune"]).map(|_| ())
}

fn rev_parse(repo: &Path, rev: &str) -> Result<String> {
    run_git_ok(repo, &["rev-parse", rev])
}

fn clone_local(source: &Path, dest: &Path) -> Result<()> {
    run_git_ok(
        source.parent().unwrap_or(Path::new(".")),
        &[
            "clone",
            "--no-hardlinks",
            &source.to_string_lossy(),
            &dest.to_string_lossy(),
        ],
    )
    .map(|_| ())
}

/// Overwrite the clone's working tree with the original's current working
/// tree, so uncommitted edits (staged or not) are captured. `.git` is
/// excluded since it is the clone's own repository state.
fn copy_worktree_contents(source: &Path, dest: &Path) -> Result<()> {
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let target = dest.join(entry.file_name());
        copy_entry(&entry.path(), &target)?;
    }
    Ok(())
}

fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_dir() {
        if dst.exists() {
            std::fs::remove_dir_all(dst)?;
        }
        std::fs::create_dir_all(dst)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            copy_entry(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else if meta.file_type().is_symlink() {
        if dst.exists() || dst.symlink_metadata().is_ok() {
            let _ = std::fs::remove_file(dst);
        }
        let target = std::fs::read_link(src)?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, dst)?;
        #[cfg(not(unix))]
        std::fs::copy(src, dst).map(|_| ())?;
    } else {
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
        std::fs::copy(src, dst)?;
    }
    Ok(())
}

/// Cloning a local repository reassigns `refs/remotes/origin/*` to the
/// source's local branches, not its own remote-tracking refs, so any commits
/// only reachable via the source's remote-tracking refs (e.g. from the best
/// effort fetch above) would otherwise be lost. Re-fetch them explicitly.
fn restore_remote_tracking_refs(source: &Path, dest: &Path) -> Result<()> {
    let refspec = "refs/remotes/origin/*:refs/remotes/origin/*";
    let output = run_git(
        dest,
        &["fetch", &source.to_string_lossy(), refspec, "--update-head-ok"],
    )?;
    if !output.status.success() {
        tracing::debug!(
            stderr = %String::from_utf8_lossy(&output.stderr),
            "no remote-tracking refs to restore"
        );
    }
    Ok(())
}

fn create_snapshot_commit(repo: &Path) -> Result<String> {
    run_git_ok(repo, &["add", "--all"])?;
    run_git_ok(
        repo,
        &[
            "-c",
            &format!("user.name={}", author_name()),
            "-c",
            &format!("user.email={}", author_email()),
            "commit",
            "--allow-empty",
            "--author",
            SNAPSHOT_AUTHOR,
            "-m",
            SNAPSHOT_MESSAGE,
        ],
    )?;
    rev_parse(repo, "HEAD")
}

fn author_name() -> &'static str {
    "Shadow"
}

fn author_email() -> &'static str {
    "shadow@localhost"
}

/// Every concrete (non-symbolic) ref under `refs/heads`, `refs/tags`, and
/// `refs/remotes`.
fn concrete_refs(repo: &Path) -> Result<Vec<String>> {
    let output = run_git(
        repo,
        &[
            "for-each-ref",
            "--format=%(refname)%00%(symref)",
            "refs/heads",
            "refs/tags",
            "refs/remotes",
        ],
    )?;
    if !output.status.success() {
        return Err(Error::snapshot_failed(format!(
            "failed to enumerate refs: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut refs = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(2, '\0');
        let name = parts.next().unwrap_or("");
        let symref = parts.next().unwrap_or("");
        if name.is_empty() || !symref.is_empty() {
            continue;
        }
        refs.push(name.to_string());
    }
    Ok(refs)
}

fn write_bundle(repo: &Path, dest: &Path, refs: &[String]) -> Result<()> {
    if refs.is_empty() {
        return Err(Error::snapshot_failed(
            "repository has no branches or tags to bundle",
        ));
    }
    let mut args: Vec<&str> = vec!["bundle", "create"];
    let dest_str = dest.to_string_lossy().to_string();
    args.push(&dest_str);
    for r in refs {
        args.push(r.as_str());
    }
    let output = run_git(repo, &args)?;
    if !output.status.success() {
        return Err(Error::snapshot_failed(format!(
            "git bundle create failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Remove all bundles for `org` (used by destroy/cleanup paths).
pub fn cleanup_org(snapshots_dir: &Path, org: &str) -> Result<()> {
    let dir = snapshots_dir.join(org);
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) {
        run_git_ok(dir, &["init", "-q", "-b", "main"]).unwrap();
        run_git_ok(dir, &["config", "user.name", "Test"]).unwrap();
        run_git_ok(dir, &["config", "user.email", "test@example.com"]).unwrap();
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        run_git_ok(dir, &["add", "."]).unwrap();
        run_git_ok(dir, &["commit", "-q", "-m", "initial"]).unwrap();
    }

    #[test]
    fn rejects_non_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let snaps = tempfile::tempdir().unwrap();
        let engine = SnapshotEngine::new(snaps.path());
        let result = engine.snapshot(dir.path(), "acme", "r1");
        assert!(matches!(result, Err(Error::InvalidLocalPath { .. })));
    }

    #[test]
    fn clean_repo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let head = rev_parse(dir.path(), "HEAD").unwrap();

        let snaps = tempfile::tempdir().unwrap();
        let engine = SnapshotEngine::new(snaps.path());
        let result = engine.snapshot(dir.path(), "acme", "r1").unwrap();

        assert!(!result.has_uncommitted);
        assert_eq!(result.commit_sha, head);
        assert!(result.bundle_path.ends_with("acme/r1.bundle"));
        assert!(result.size_bytes > 0);
    }

    #[test]
    fn dirty_repo_produces_snapshot_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let head = rev_parse(dir.path(), "HEAD").unwrap();
        std::fs::write(dir.path().join("README.md"), "changed\n").unwrap();
        std::fs::write(dir.path().join("new.txt"), "new\n").unwrap();

        let snaps = tempfile::tempdir().unwrap();
        let engine = SnapshotEngine::new(snaps.path());
        let result = engine.snapshot(dir.path(), "acme", "r1").unwrap();

        assert!(result.has_uncommitted);
        assert_ne!(result.commit_sha, head);
    }

    #[test]
    fn bundle_path_is_deterministic() {
        let snaps = tempfile::tempdir().unwrap();
        let engine = SnapshotEngine::new(snaps.path());
        assert_eq!(
            engine.bundle_path("acme", "r1"),
            snaps.path().join("acme").join("r1.bundle")
        );
    }
}
