//! Shared harness for the CLI specs.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use serde_json::json;

const GIT_IDENTITY: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Spec Runner"),
    ("GIT_AUTHOR_EMAIL", "specs@example.com"),
    ("GIT_COMMITTER_NAME", "Spec Runner"),
    ("GIT_COMMITTER_EMAIL", "specs@example.com"),
];

/// `lk` with no project: for help and version output.
pub fn cli() -> Run {
    Run::new(Command::cargo_bin("lk").expect("lk binary is built"))
}

/// A scratch repository plus a state directory kept outside of it.
pub struct Project {
    repo: TempDir,
    state: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            repo: TempDir::new().expect("repo tempdir"),
            state: TempDir::new().expect("state tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    /// Write `contents` to `rel` under the repository, creating parents.
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, contents).expect("write file");
        path
    }

    /// `git init` on `main` with one commit.
    pub fn git_init(&self) {
        self.git(&["init", "--quiet", "--initial-branch=main"]);
        self.file("README.md", "# scratch\n");
        self.git(&["add", "README.md"]);
        self.git(&["commit", "--quiet", "-m", "initial commit"]);
    }

    /// Run git in the repository and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.path(), args)
    }

    pub fn lk(&self) -> Run {
        let mut cmd = Command::cargo_bin("lk").expect("lk binary is built");
        cmd.current_dir(self.path())
            .arg("--repo")
            .arg(self.path())
            .env("LK_STATE_DIR", self.state_path());
        Run::new(cmd)
    }

    /// Append an event through the CLI.
    pub fn event(&self, event: serde_json::Value) {
        self.lk().args(&["events", "append", &event.to_string()]).passes();
    }

    pub fn create(&self, wu: &str, lane: &str, title: &str) {
        self.event(json!({
            "type": "create", "wuId": wu, "lane": lane, "title": title,
            "timestamp": "2026-03-01T09:00:00Z",
        }));
    }
}

/// Run git in `dir` with a fixed identity, asserting success.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .envs(GIT_IDENTITY)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {} failed:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Pid of a process that has already exited.
pub fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().expect("spawn true");
    let pid = child.id();
    child.wait().expect("wait for true");
    pid
}

pub struct Run {
    cmd: Command,
}

impl Run {
    fn new(mut cmd: Command) -> Self {
        cmd.env("NO_COLOR", "1").env_remove("LK_LOG").env_remove("LK_LOG_FILE").envs(GIT_IDENTITY);
        Self { cmd }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.cmd.write_stdin(input);
        self
    }

    pub fn passes(self) -> Outcome {
        let outcome = self.output();
        assert!(
            outcome.code == Some(0),
            "expected success, got {:?}\nstdout:\n{}\nstderr:\n{}",
            outcome.code,
            outcome.stdout,
            outcome.stderr
        );
        outcome
    }

    pub fn fails_with(self, code: i32) -> Outcome {
        let outcome = self.output();
        assert!(
            outcome.code == Some(code),
            "expected exit {code}, got {:?}\nstdout:\n{}\nstderr:\n{}",
            outcome.code,
            outcome.stdout,
            outcome.stderr
        );
        outcome
    }

    fn output(mut self) -> Outcome {
        let output = self.cmd.output().expect("lk runs");
        Outcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

pub struct Outcome {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl Outcome {
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout lacks {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(!self.stdout.contains(needle), "stdout has {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr lacks {needle:?}:\n{}", self.stderr);
        self
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout.trim_end(), expected.trim_end());
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{}", self.stdout))
    }
}
