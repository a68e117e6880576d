//! Scoped temporary workspace.
//!
//! Source builds are staged in one directory per run,
//! `<root>/trellis-setup-<pid>`. The directory is created lazily, the
//! first time a component needs it, and removed exactly once:
//!
//! - when the [`Workspace`] is dropped (normal return and error unwind)
//! - from the signal thread started by [`init_signal_handlers`]
//!   (SIGINT, SIGTERM, SIGHUP), which first stops every running child
//!   process group and then exits with `128 + signal`
//!
//! Both paths go through the global [`CleanupRegistry`], whose mutex
//! makes removal and creation mutually exclusive.

pub mod copy;

pub use copy::copy_tree;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use crate::error::Result;
#[cfg(unix)]
use crate::shell::terminate_children;

static CLEANUP_REGISTRY: OnceLock<Arc<Mutex<CleanupRegistry>>> = OnceLock::new();

/// Registry of workspace directories to remove on exit.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    paths: HashSet<PathBuf>,
    shutting_down: bool,
}

impl CleanupRegistry {
    /// Get or create the global registry.
    pub fn global() -> Arc<Mutex<CleanupRegistry>> {
        CLEANUP_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(CleanupRegistry::default())))
            .clone()
    }

    /// Track a directory for removal.
    pub fn register(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
        tracing::debug!("Registered workspace {}", path.display());
    }

    /// Remove one tracked directory (if it exists) and stop tracking it.
    pub fn release(&mut self, path: &Path) {
        if self.paths.remove(path) {
            remove_dir(path);
        }
    }

    /// Remove every tracked directory. Later registrations are refused.
    pub fn release_all(&mut self) {
        self.shutting_down = true;
        for path in self.paths.drain() {
            remove_dir(&path);
        }
    }

    /// Number of tracked directories.
    pub fn count(&self) -> usize {
        self.paths.len()
    }
}

fn remove_dir(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => tracing::debug!("Removed workspace {}", path.display()),
        Err(e) => tracing::warn!("Failed to remove workspace {}: {}", path.display(), e),
    }
}

/// The run's staging directory.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    registry: Arc<Mutex<CleanupRegistry>>,
}

impl Workspace {
    /// Prefix of every workspace directory name.
    pub const PREFIX: &'static str = "trellis-setup-";

    /// Plan a workspace under `root` and arm its cleanup. Nothing is
    /// created on disk yet.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let path = root
            .as_ref()
            .join(format!("{}{}", Self::PREFIX, std::process::id()));
        let registry = CleanupRegistry::global();
        lock_registry(&registry).register(&path);
        Self { path, registry }
    }

    /// The workspace path (which may not exist yet).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory has been created.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the directory if needed and return its path.
    pub fn ensure(&mut self) -> Result<&Path> {
        let guard = lock_registry(&self.registry);
        if guard.shutting_down {
            return Err(anyhow::anyhow!("shutting down, refusing to create workspace").into());
        }
        if !self.path.is_dir() {
            std::fs::create_dir_all(&self.path)?;
            tracing::info!("Created workspace {}", self.path.display());
        }
        drop(guard);
        Ok(&self.path)
    }

    /// Directory for a named source tree inside the workspace.
    pub fn staging_dir(&mut self, name: &str) -> Result<PathBuf> {
        Ok(self.ensure()?.join(name))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        lock_registry(&self.registry).release(&self.path);
    }
}

/// Lock a registry even if a panicking thread poisoned it, so cleanup
/// is never skipped.
fn lock_registry(registry: &Mutex<CleanupRegistry>) -> MutexGuard<'_, CleanupRegistry> {
    registry.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Workspace registry was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// How long a stopped child gets to exit before it is killed.
pub const CHILD_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Start the signal thread that stops running children and removes
/// workspaces on SIGINT, SIGTERM and SIGHUP. Call once at startup.
#[cfg(unix)]
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            let name = match sig {
                SIGINT => "SIGINT",
                SIGTERM => "SIGTERM",
                SIGHUP => "SIGHUP",
                _ => "signal",
            };
            tracing::warn!("Received {}, removing workspace", name);

            terminate_children(CHILD_GRACE_PERIOD);
            lock_registry(&CleanupRegistry::global()).release_all();

            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Signals are not handled on this platform; drop-based cleanup still
/// runs.
#[cfg(not(unix))]
pub fn init_signal_handlers() -> std::io::Result<()> {
    Ok(())
}
