//! Process observation via procfs.
//!
//! Managed daemons are identified by the pair (pid, create time). The
//! create time is the kernel start tick from `/proc/<pid>/stat`, so a
//! recycled PID never matches a record written for an earlier process.
//! Signal *sending* is not done here -- signals go through the executor as
//! `kill` commands so they can be escalated to root and observed by tests.

use std::fs;

/// A process's start time in clock ticks since boot, or `None` if the
/// process does not exist.
pub fn create_time(pid: i32) -> Option<u64> {
    stat_fields(pid).and_then(|fields| fields.get(19).and_then(|s| s.parse().ok()))
}

/// Parent PID of `pid`, if it exists.
pub fn parent_pid(pid: i32) -> Option<i32> {
    stat_fields(pid).and_then(|fields| fields.get(1).and_then(|s| s.parse().ok()))
}

/// Whether `pid` currently names a live (non-zombie) process.
pub fn pid_alive(pid: i32) -> bool {
    match stat_fields(pid) {
        Some(fields) => fields.first().is_some_and(|state| state != "Z" && state != "X"),
        None => false,
    }
}

/// Whether `pid` is alive *and* is the same process the record was written
/// for, per the create-time pairing.
pub fn alive(pid: i32, recorded_create_time: u64) -> bool {
    pid_alive(pid) && create_time(pid) == Some(recorded_create_time)
}

/// The process tree rooted at `pid`, breadth-first, root included.
///
/// Returns an empty list if the root is gone or its create time no longer
/// matches.
pub fn process_tree(pid: i32, recorded_create_time: u64) -> Vec<i32> {
    if !alive(pid, recorded_create_time) {
        return Vec::new();
    }

    let all = all_pids();
    let mut tree = vec![pid];
    let mut cursor = 0;
    while cursor < tree.len() {
        let parent = tree[cursor];
        cursor += 1;
        for &candidate in &all {
            if parent_pid(candidate) == Some(parent) && !tree.contains(&candidate) {
                tree.push(candidate);
            }
        }
    }
    tree
}

fn all_pids() -> Vec<i32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str().and_then(|name| name.parse().ok()))
        .collect()
}

/// Fields of `/proc/<pid>/stat` after the `(comm)` field: index 0 is the
/// process state, 1 the ppid, 19 the start time.
fn stat_fields(pid: i32) -> Option<Vec<String>> {
    let raw = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // comm may itself contain spaces and parentheses; split after the last ')'.
    let after_comm = raw.rsplit_once(')')?.1;
    Some(after_comm.split_whitespace().map(str::to_owned).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        let pid = std::process::id() as i32;
        assert!(pid_alive(pid));
        let ct = create_time(pid).expect("own create time");
        assert!(alive(pid, ct));
        assert!(!alive(pid, ct.wrapping_add(1)));
    }

    #[test]
    fn nonexistent_pid_is_dead() {
        // PIDs are capped well below this on any default Linux config.
        assert!(!pid_alive(i32::MAX - 7));
        assert_eq!(create_time(i32::MAX - 7), None);
    }

    #[test]
    fn process_tree_contains_root() {
        let pid = std::process::id() as i32;
        let ct = create_time(pid).expect("own create time");
        let tree = process_tree(pid, ct);
        assert!(tree.contains(&pid));
    }
}
