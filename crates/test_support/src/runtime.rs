use anyhow::{bail, Result};
use std::{
    env,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Make sure testcontainers can reach a Docker API socket.
///
/// Honors `DOCKER_HOST`, then `/var/run/docker.sock`, then the usual Podman
/// socket locations (exporting `DOCKER_HOST` for the latter).
///
/// # Errors
/// Returns an error naming the sockets that were tried.
pub fn ensure_container_runtime() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match INIT.get_or_init(detect) {
        Ok(()) => Ok(()),
        Err(message) => bail!("{message}"),
    }
}

/// `true` when a runtime is reachable. Prints the reason to stderr otherwise.
#[must_use]
pub fn container_runtime_available() -> bool {
    match ensure_container_runtime() {
        Ok(()) => true,
        Err(err) => {
            eprintln!("skipping: {err}");
            false
        }
    }
}

fn detect() -> Result<(), String> {
    if let Ok(docker_host) = env::var("DOCKER_HOST") {
        return match docker_host_socket(&docker_host) {
            Some(path) if !wait_for_socket(path, SOCKET_WAIT_TIMEOUT) => Err(format!(
                "`DOCKER_HOST` points to `{docker_host}`, but the socket is not accepting connections"
            )),
            _ => Ok(()),
        };
    }

    let docker_socket = Path::new("/var/run/docker.sock");
    if wait_for_socket(docker_socket, SOCKET_WAIT_TIMEOUT) {
        return Ok(());
    }

    let podman = podman_sockets();
    if let Some(path) = podman
        .iter()
        .find(|path| wait_for_socket(path, SOCKET_WAIT_TIMEOUT))
    {
        env::set_var("DOCKER_HOST", format!("unix://{}", path.display()));
        return Ok(());
    }

    let tried: Vec<String> = std::iter::once(docker_socket.to_path_buf())
        .chain(podman)
        .map(|path| path.display().to_string())
        .collect();
    Err(format!(
        "no container runtime socket found (tried {}); start Docker or `podman.socket`, or set `DOCKER_HOST`",
        tried.join(", ")
    ))
}

fn docker_host_socket(docker_host: &str) -> Option<&Path> {
    if let Some(path) = docker_host.strip_prefix("unix://") {
        return Some(Path::new(path));
    }
    docker_host.starts_with('/').then(|| Path::new(docker_host))
}

fn podman_sockets() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime_dir).join("podman/podman.sock"));
    }
    candidates.push(PathBuf::from("/run/podman/podman.sock"));
    candidates
}

fn wait_for_socket(path: &Path, timeout: Duration) -> bool {
    if !path.exists() {
        return false;
    }
    let start = Instant::now();
    while start.elapsed() < timeout {
        if UnixStream::connect(path).is_ok() {
            return true;
        }
        thread::sleep(Duration::from_millis(200));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_host_socket_paths() {
        assert_eq!(
            docker_host_socket("unix:///run/podman/podman.sock"),
            Some(Path::new("/run/podman/podman.sock"))
        );
        assert_eq!(
            docker_host_socket("/var/run/docker.sock"),
            Some(Path::new("/var/run/docker.sock"))
        );
        assert_eq!(docker_host_socket("tcp://127.0.0.1:2375"), None);
    }

    #[test]
    fn missing_socket_is_not_connectable() {
        assert!(!wait_for_socket(
            Path::new("/nonexistent/membership.sock"),
            Duration::from_millis(10)
        ));
    }
}
