//! Platform queries.

use std::path::Path;

/// Check if running as root.
///
/// Decides whether privileged system installs need a `sudo` prefix.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid() is a simple syscall that returns the effective user ID
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        false
    }
}

/// Whether `program` resolves to an executable on `PATH` (or is an
/// executable path itself).
pub fn command_exists(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate);
    }

    std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path).any(|dir| is_executable(&dir.join(program)))
        })
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && path
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_does_not_exist() {
        assert!(!command_exists("definitely-not-a-real-program-4242"));
    }

    #[cfg(unix)]
    #[test]
    fn sh_exists_on_unix() {
        assert!(command_exists("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn explicit_path_checks_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        assert!(!command_exists(script.to_str().unwrap()));

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(command_exists(script.to_str().unwrap()));
    }
}
