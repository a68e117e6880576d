//! Tracking of running child processes.
//!
//! Every program started by [`execute`](super::execute) runs in its own
//! process group and is registered here until it exits. On a termination
//! signal the signal thread calls [`terminate_children`], which stops
//! each group (SIGTERM, then SIGKILL after a grace period) so that no
//! build keeps writing into the workspace after it has been removed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry of running child process ids.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    shutting_down: bool,
}

impl ChildRegistry {
    /// Get or create the global registry.
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Track a running child.
    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!("Registered child process {}", pid);
    }

    /// Stop tracking a child that has exited.
    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
    }

    /// Number of tracked children.
    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Whether termination has started. No new children may be spawned.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Mark termination as started and hand out the children to stop.
    fn begin_shutdown(&mut self) -> Vec<u32> {
        self.shutting_down = true;
        self.pids.iter().copied().collect()
    }
}

/// Lock the global registry, recovering from poisoning.
pub(crate) fn lock_children(registry: &Mutex<ChildRegistry>) -> MutexGuard<'_, ChildRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stop every registered child: SIGTERM to its process group, then
/// SIGKILL to whatever is still alive after `grace_period`.
///
/// The registry lock is not held while waiting, so the thread that owns
/// a child can still reap and unregister it.
pub fn terminate_children(grace_period: Duration) {
    let registry = ChildRegistry::global();
    let pids = lock_children(&registry).begin_shutdown();
    if pids.is_empty() {
        return;
    }
    tracing::warn!("Terminating {} child process(es)", pids.len());
    stop_all(&pids, grace_period);
}

fn stop_all(pids: &[u32], grace_period: Duration) {
    for &pid in pids {
        send_to_group(pid, Signal::Term);
    }

    let start = Instant::now();
    while start.elapsed() < grace_period {
        if !pids.iter().any(|&pid| is_alive(pid)) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    for &pid in pids {
        if is_alive(pid) {
            tracing::warn!("Process group {} ignored SIGTERM, killing it", pid);
            send_to_group(pid, Signal::Kill);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_to_group(pid: u32, signal: Signal) {
    let sig = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: kill() only sends a signal; negative pid addresses the group
    // the child leads (it was spawned with process_group(0)).
    let rc = unsafe { libc::kill(-pid, sig) };
    if rc != 0 {
        // Fall back to the process itself.
        // SAFETY: as above.
        unsafe { libc::kill(pid, sig) };
    }
}

#[cfg(not(unix))]
fn send_to_group(_pid: u32, _signal: Signal) {}

/// Whether `pid` is running. Zombies count as dead.
#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks for existence.
    if unsafe { libc::kill(raw, 0) } != 0 {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => {
            // The state follows the parenthesized command name.
            let state = stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next());
            !matches!(state, Some("Z") | Some("X"))
        }
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    false
}
