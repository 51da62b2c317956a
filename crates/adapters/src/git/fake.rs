// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory git for tests.
//!
//! Models a commit graph, local branches, one remote, and worktrees, enough
//! to exercise merge/rebase/push races without a real repository. Failure
//! modes (rebase conflicts, remote races, failing commands) are scripted.

use super::{GitAdapter, GitError, PushOutcome, WorktreeInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Commit {
    parents: Vec<String>,
    message: String,
}

#[derive(Debug, Clone)]
struct Worktree {
    head: String,
    branch: Option<String>,
    /// Ref the worktree was created from (for detached worktrees).
    source: String,
    dirty: Vec<String>,
}

impl Worktree {
    fn on_branch(head: String, branch: &str) -> Self {
        Self {
            head,
            branch: Some(branch.to_string()),
            source: branch.to_string(),
            dirty: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    commits: HashMap<String, Commit>,
    branches: BTreeMap<String, String>,
    remote: BTreeMap<String, String>,
    tracking: BTreeMap<String, String>,
    worktrees: BTreeMap<PathBuf, Worktree>,
    current: Option<String>,
    next_sha: u64,
    conflicts: HashSet<String>,
    advance_on_fetch: usize,
    reject_pushes: usize,
    fail_ops: HashMap<&'static str, usize>,
    calls: Vec<String>,
}

impl State {
    fn new_commit(&mut self, parents: Vec<String>, message: &str) -> String {
        self.next_sha += 1;
        let sha = format!("{:040x}", self.next_sha);
        self.commits.insert(sha.clone(), Commit { parents, message: message.to_string() });
        sha
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        if self.commits.contains_key(rev) {
            return Some(rev.to_string());
        }
        if let Some(sha) = self.branches.get(rev) {
            return Some(sha.clone());
        }
        if let Some(sha) = rev.strip_prefix("refs/heads/").and_then(|b| self.branches.get(b)) {
            return Some(sha.clone());
        }
        rev.strip_prefix("origin/")
            .or_else(|| rev.strip_prefix("refs/remotes/origin/"))
            .and_then(|b| self.tracking.get(b))
            .cloned()
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut stack = vec![descendant.to_string()];
        let mut seen = HashSet::new();
        while let Some(sha) = stack.pop() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    /// Commits reachable from `tip` but not from `base`, oldest first.
    fn commits_between(&self, base: &str, tip: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = Some(tip.to_string());
        while let Some(sha) = cur {
            if self.is_ancestor(&sha, base) {
                break;
            }
            cur = self.commits.get(&sha).and_then(|c| c.parents.first().cloned());
            out.push(sha);
        }
        out.reverse();
        out
    }

    fn take_failure(&mut self, op: &'static str) -> Result<(), GitError> {
        match self.fail_ops.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(GitError::Command {
                    command: op.to_string(),
                    code: Some(128),
                    stderr: "scripted failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn worktree(&self, path: &Path) -> Result<&Worktree, GitError> {
        self.worktrees.get(path).ok_or_else(|| GitError::Command {
            command: "worktree".to_string(),
            code: Some(128),
            stderr: format!("not a worktree: {}", path.display()),
        })
    }

    fn set_worktree_head(&mut self, path: &Path, sha: String) {
        if let Some(wt) = self.worktrees.get_mut(path) {
            wt.head = sha.clone();
            if let Some(branch) = wt.branch.clone() {
                self.branches.insert(branch, sha);
            }
        }
    }
}

/// Fake git repository with a remote named `origin`.
#[derive(Clone)]
pub struct FakeGit {
    root: PathBuf,
    state: Arc<Mutex<State>>,
}

impl FakeGit {
    /// Repository whose local and remote `main` share one root commit.
    /// `root` is the path reported for the main working copy.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut state = State::default();
        let sha = state.new_commit(Vec::new(), "initial");
        state.branches.insert("main".to_string(), sha.clone());
        state.remote.insert("main".to_string(), sha.clone());
        state.tracking.insert("main".to_string(), sha.clone());
        state.current = Some("main".to_string());
        state.worktrees.insert(root.clone(), Worktree::on_branch(sha, "main"));
        Self { root, state: Arc::new(Mutex::new(state)) }
    }

    /// Add a commit on a local branch, creating the branch from `main` if needed.
    pub fn commit(&self, branch: &str, message: &str) -> String {
        let mut state = self.state.lock();
        let parent = state
            .branches
            .get(branch)
            .or_else(|| state.branches.get("main"))
            .cloned()
            .unwrap_or_default();
        let sha = state.new_commit(vec![parent], message);
        state.branches.insert(branch.to_string(), sha.clone());
        let checked_out: Vec<PathBuf> = state
            .worktrees
            .iter()
            .filter(|(_, wt)| wt.branch.as_deref() == Some(branch))
            .map(|(p, _)| p.clone())
            .collect();
        for path in checked_out {
            if let Some(wt) = state.worktrees.get_mut(&path) {
                wt.head = sha.clone();
            }
        }
        sha
    }

    /// Simulate another agent pushing a commit to the remote branch.
    pub fn commit_remote(&self, branch: &str, message: &str) -> String {
        let mut state = self.state.lock();
        let parent = state.remote.get(branch).cloned().unwrap_or_default();
        let sha = state.new_commit(vec![parent], message);
        state.remote.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Every rebase of `branch` conflicts.
    pub fn conflict_on_rebase(&self, branch: &str) {
        self.state.lock().conflicts.insert(branch.to_string());
    }

    /// The remote trunk gains a commit right before each of the next `n` fetches.
    pub fn advance_remote_on_fetch(&self, n: usize) {
        self.state.lock().advance_on_fetch = n;
    }

    /// Reject the next `n` pushes as if another agent won the race; each
    /// rejection also advances the remote.
    pub fn reject_next_pushes(&self, n: usize) {
        self.state.lock().reject_pushes = n;
    }

    /// Fail the next `n` calls of an operation (`"push"`, `"fetch"`, ...).
    pub fn fail_next(&self, op: &'static str, n: usize) {
        self.state.lock().fail_ops.insert(op, n);
    }

    /// Register a worktree that exists outside any adapter call.
    pub fn add_existing_worktree(&self, path: impl Into<PathBuf>, branch: &str) {
        let mut state = self.state.lock();
        let head = state.resolve(branch).unwrap_or_default();
        state.worktrees.insert(path.into(), Worktree::on_branch(head, branch));
    }

    pub fn set_dirty(&self, worktree: &Path, paths: &[&str]) {
        if let Some(wt) = self.state.lock().worktrees.get_mut(worktree) {
            wt.dirty = paths.iter().map(|p| p.to_string()).collect();
        }
    }

    pub fn remote_tip(&self, branch: &str) -> Option<String> {
        self.state.lock().remote.get(branch).cloned()
    }

    pub fn local_tip(&self, branch: &str) -> Option<String> {
        self.state.lock().branches.get(branch).cloned()
    }

    pub fn has_worktree(&self, path: &Path) -> bool {
        self.state.lock().worktrees.contains_key(path)
    }

    pub fn branches(&self) -> Vec<String> {
        self.state.lock().branches.keys().cloned().collect()
    }

    /// Whether `ancestor` is reachable from `descendant` (shas or refs).
    pub fn reachable(&self, ancestor: &str, descendant: &str) -> bool {
        let state = self.state.lock();
        match (state.resolve(ancestor), state.resolve(descendant)) {
            (Some(a), Some(d)) => state.is_ancestor(&a, &d),
            _ => false,
        }
    }

    /// Messages of commits between `base` and `tip`, oldest first.
    pub fn messages_between(&self, base: &str, tip: &str) -> Vec<String> {
        let state = self.state.lock();
        let (Some(base), Some(tip)) = (state.resolve(base), state.resolve(tip)) else {
            return Vec::new();
        };
        state
            .commits_between(&base, &tip)
            .iter()
            .filter_map(|sha| state.commits.get(sha).map(|c| c.message.clone()))
            .collect()
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == op).count()
    }

    fn enter(&self, op: &'static str) -> Result<parking_lot::MutexGuard<'_, State>, GitError> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        state.take_failure(op)?;
        Ok(state)
    }
}

fn unknown(rev: &str) -> GitError {
    GitError::UnknownRevision(rev.to_string())
}

#[async_trait]
impl GitAdapter for FakeGit {
    async fn fetch(&self, _remote: &str, branch: &str) -> Result<String, GitError> {
        let mut state = self.enter("fetch")?;
        if state.advance_on_fetch > 0 {
            state.advance_on_fetch -= 1;
            let parent = state.remote.get(branch).cloned().unwrap_or_default();
            let sha = state.new_commit(vec![parent], "concurrent trunk commit");
            state.remote.insert(branch.to_string(), sha);
        }
        let tip = state.remote.get(branch).cloned().ok_or_else(|| unknown(branch))?;
        state.tracking.insert(branch.to_string(), tip.clone());
        Ok(tip)
    }

    async fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitError> {
        let state = self.enter("rev_parse")?;
        Ok(state.resolve(rev))
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let state = self.enter("branch_exists")?;
        Ok(state.branches.contains_key(branch))
    }

    async fn create_branch(&self, branch: &str, start: &str) -> Result<(), GitError> {
        let mut state = self.enter("create_branch")?;
        let sha = state.resolve(start).ok_or_else(|| unknown(start))?;
        state.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), GitError> {
        let mut state = self.enter("delete_branch")?;
        state.branches.remove(branch);
        Ok(())
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitError> {
        let mut state = self.enter("update_ref")?;
        let sha = state.resolve(sha).ok_or_else(|| unknown(sha))?;
        state.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        let state = self.enter("is_ancestor")?;
        let a = state.resolve(ancestor).ok_or_else(|| unknown(ancestor))?;
        let d = state.resolve(descendant).ok_or_else(|| unknown(descendant))?;
        Ok(state.is_ancestor(&a, &d))
    }

    async fn log_contains(&self, rev: &str, needle: &str) -> Result<bool, GitError> {
        let state = self.enter("log_contains")?;
        let tip = state.resolve(rev).ok_or_else(|| unknown(rev))?;
        let mut stack = vec![tip];
        let mut seen = HashSet::new();
        while let Some(sha) = stack.pop() {
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = state.commits.get(&sha) {
                if commit.message.contains(needle) {
                    return Ok(true);
                }
                stack.extend(commit.parents.iter().cloned());
            }
        }
        Ok(false)
    }

    async fn current_branch(&self) -> Result<Option<String>, GitError> {
        let state = self.enter("current_branch")?;
        Ok(state.current.clone())
    }

    async fn fast_forward(&self, branch: &str, sha: &str) -> Result<(), GitError> {
        let mut state = self.enter("fast_forward")?;
        let target = state.resolve(sha).ok_or_else(|| unknown(sha))?;
        if let Some(current) = state.branches.get(branch).cloned() {
            if !state.is_ancestor(&current, &target) {
                return Err(GitError::NotFastForward { branch: branch.to_string(), target });
            }
        }
        state.branches.insert(branch.to_string(), target.clone());
        let root = self.root.clone();
        if state.current.as_deref() == Some(branch) {
            if let Some(wt) = state.worktrees.get_mut(&root) {
                wt.head = target;
            }
        }
        Ok(())
    }

    async fn push(
        &self,
        _remote: &str,
        local: &str,
        remote_branch: &str,
    ) -> Result<PushOutcome, GitError> {
        let mut state = self.enter("push")?;
        let sha = state.resolve(local).ok_or_else(|| unknown(local))?;
        if state.reject_pushes > 0 {
            state.reject_pushes -= 1;
            let parent = state.remote.get(remote_branch).cloned().unwrap_or_default();
            let raced = state.new_commit(vec![parent], "racing push");
            state.remote.insert(remote_branch.to_string(), raced);
            return Ok(PushOutcome::Rejected { reason: "non-fast-forward".to_string() });
        }
        if let Some(current) = state.remote.get(remote_branch).cloned() {
            if !state.is_ancestor(&current, &sha) {
                return Ok(PushOutcome::Rejected { reason: "non-fast-forward".to_string() });
            }
        }
        state.remote.insert(remote_branch.to_string(), sha);
        Ok(PushOutcome::Pushed)
    }

    async fn add_worktree(&self, path: &Path, branch: &str) -> Result<(), GitError> {
        let mut state = self.enter("add_worktree")?;
        let head = state.branches.get(branch).cloned().ok_or_else(|| unknown(branch))?;
        if state.worktrees.contains_key(path) {
            return Err(GitError::Command {
                command: "worktree add".to_string(),
                code: Some(128),
                stderr: format!("'{}' already exists", path.display()),
            });
        }
        state.worktrees.insert(path.to_path_buf(), Worktree::on_branch(head, branch));
        Ok(())
    }

    async fn add_detached_worktree(&self, path: &Path, rev: &str) -> Result<(), GitError> {
        let mut state = self.enter("add_detached_worktree")?;
        let head = state.resolve(rev).ok_or_else(|| unknown(rev))?;
        let worktree = Worktree { head, branch: None, source: rev.to_string(), dirty: Vec::new() };
        state.worktrees.insert(path.to_path_buf(), worktree);
        Ok(())
    }

    async fn remove_worktree(&self, path: &Path) -> Result<(), GitError> {
        let mut state = self.enter("remove_worktree")?;
        state.worktrees.remove(path);
        Ok(())
    }

    async fn worktrees(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        let state = self.enter("worktrees")?;
        Ok(state
            .worktrees
            .iter()
            .map(|(path, wt)| WorktreeInfo {
                path: path.clone(),
                head: wt.head.clone(),
                branch: wt.branch.clone(),
            })
            .collect())
    }

    async fn head(&self, worktree: &Path) -> Result<String, GitError> {
        let state = self.enter("head")?;
        Ok(state.worktree(worktree)?.head.clone())
    }

    async fn reset_hard(&self, worktree: &Path, rev: &str) -> Result<(), GitError> {
        let mut state = self.enter("reset_hard")?;
        state.worktree(worktree)?;
        let sha = state.resolve(rev).ok_or_else(|| unknown(rev))?;
        state.set_worktree_head(worktree, sha);
        if let Some(wt) = state.worktrees.get_mut(worktree) {
            wt.dirty.clear();
        }
        Ok(())
    }

    async fn merge_ff_only(&self, worktree: &Path, rev: &str) -> Result<bool, GitError> {
        let mut state = self.enter("merge_ff_only")?;
        let head = state.worktree(worktree)?.head.clone();
        let target = state.resolve(rev).ok_or_else(|| unknown(rev))?;
        if !state.is_ancestor(&head, &target) {
            return Ok(false);
        }
        state.set_worktree_head(worktree, target);
        Ok(true)
    }

    async fn rebase(&self, worktree: &Path, onto: &str) -> Result<bool, GitError> {
        let mut state = self.enter("rebase")?;
        let wt = state.worktree(worktree)?.clone();
        let name = wt.branch.clone().unwrap_or(wt.source.clone());
        if state.conflicts.contains(&name) {
            return Ok(false);
        }
        let onto = state.resolve(onto).ok_or_else(|| unknown(onto))?;
        if state.is_ancestor(&onto, &wt.head) {
            return Ok(true);
        }
        let mut tip = onto.clone();
        for sha in state.commits_between(&onto, &wt.head) {
            let message = state.commits.get(&sha).map(|c| c.message.clone()).unwrap_or_default();
            tip = state.new_commit(vec![tip], &message);
        }
        state.set_worktree_head(worktree, tip);
        Ok(true)
    }

    async fn uncommitted_changes(&self, worktree: &Path) -> Result<Vec<String>, GitError> {
        let state = self.enter("uncommitted_changes")?;
        Ok(state.worktree(worktree)?.dirty.clone())
    }

    async fn commit_all(&self, worktree: &Path, message: &str) -> Result<bool, GitError> {
        let mut state = self.enter("commit_all")?;
        let wt = state.worktree(worktree)?.clone();
        if wt.dirty.is_empty() {
            return Ok(false);
        }
        let sha = state.new_commit(vec![wt.head], message);
        state.set_worktree_head(worktree, sha);
        if let Some(wt) = state.worktrees.get_mut(worktree) {
            wt.dirty.clear();
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
