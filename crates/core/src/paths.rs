//! Fan-out directory placement for per-worker artifacts.

use std::path::{Path, PathBuf};

/// Directory path that spreads sequential ids over a shallow tree.
///
/// The id is read backwards and its first character is dropped, one
/// directory level per remaining character: `"1234"` becomes `4/3/2`.
/// Low-order characters vary fastest, so consecutive ids land in different
/// directories and no directory holds more than one entry per possible
/// character. Nothing is created on disk.
pub fn shard_path(id: &str) -> PathBuf {
    let mut chars: Vec<char> = id.chars().rev().collect();
    chars.pop();
    chars.into_iter().map(|c| c.to_string()).collect()
}

/// Where a worker keeps its logs: `root/<shard_path(id)>/worker_id_<id>`.
pub fn worker_log_dir(root: &Path, worker_id: impl std::fmt::Display) -> PathBuf {
    let id = worker_id.to_string();
    root.join(shard_path(&id)).join(format!("worker_id_{}", id))
}
