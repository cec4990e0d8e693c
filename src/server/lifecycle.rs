// Inference server lifecycle
//
// Detects an already-running llama.cpp-style server via its health route, or
// spawns one from config and waits until it reports healthy. A server we
// spawned is ours to stop; an external one is left alone.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{config_dir, EndpointConfig, ServerConfig};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What `ensure_server` found or started
#[derive(Debug)]
pub enum ServerHandle {
    /// Something already answers on the endpoint
    External,
    /// We spawned it and will stop it on shutdown
    Managed(ManagedServer),
    /// Nothing answers and auto-start was not possible; calls will fail
    Unavailable,
}

#[derive(Debug)]
pub struct ManagedServer {
    child: Child,
    pid: Option<u32>,
    slot: ServerPid,
}

/// PID of the server we spawned, shared with the Ctrl-C handler.
///
/// Filled as soon as the child exists, so an interrupt during the startup
/// wait can still stop it. Zero means no managed server.
#[derive(Debug, Clone, Default)]
pub struct ServerPid(Arc<AtomicU32>);

impl ServerPid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u32> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn set(&self, pid: Option<u32>) {
        self.0.store(pid.unwrap_or(0), Ordering::SeqCst);
    }
}

/// Result of one GET on the health route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Health {
    /// 2xx
    Ready,
    /// Answered with another status (llama.cpp sends 503 while loading)
    Loading,
    /// No HTTP answer at all
    Down,
}

impl ServerHandle {
    /// Stop a managed server: SIGTERM, grace period, then kill
    pub async fn shutdown(self) -> Result<()> {
        let ServerHandle::Managed(mut server) = self else {
            return Ok(());
        };
        server.slot.set(None);

        if let Some(pid) = server.pid {
            info!(pid = pid, "Stopping inference server");
            terminate_pid(pid);
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, server.child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for inference server")?;
                debug!(%status, "Inference server exited");
            }
            Err(_) => {
                warn!("Inference server did not stop gracefully, killing");
                server
                    .child
                    .kill()
                    .await
                    .context("Failed to kill inference server")?;
            }
        }
        Ok(())
    }
}

/// Make sure a completion server is reachable, starting one if configured to.
///
/// A server that answers but is not ready yet is waited for, never replaced.
/// The PID of a spawned server is published to `slot` before the startup wait.
pub async fn ensure_server(
    server: &ServerConfig,
    endpoint: &EndpointConfig,
    slot: &ServerPid,
) -> Result<ServerHandle> {
    let client = Client::builder()
        .timeout(HEALTH_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;
    let health_url = endpoint.health_url();
    let timeout = Duration::from_secs(server.startup_timeout_secs);

    match probe_health(&client, &health_url).await {
        Health::Ready => {
            info!(url = %endpoint.base_url, "Using running inference server");
            return Ok(ServerHandle::External);
        }
        Health::Loading => {
            info!(url = %endpoint.base_url, "Inference server is still loading, waiting");
            wait_until_healthy(None, &client, &health_url, timeout).await?;
            info!(url = %endpoint.base_url, "Using running inference server");
            return Ok(ServerHandle::External);
        }
        Health::Down => {}
    }

    if !server.auto_start {
        warn!(
            url = %endpoint.base_url,
            "Inference server not reachable and auto-start is disabled"
        );
        return Ok(ServerHandle::Unavailable);
    }

    let Some(model_path) = &server.model_path else {
        warn!(
            url = %endpoint.base_url,
            "Inference server not reachable and no server.model_path configured"
        );
        return Ok(ServerHandle::Unavailable);
    };

    let (host, port) = endpoint.host_port()?;
    let args = server_args(server, model_path, &host, port);
    let log_path = log_path(server)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open server log: {}", log_path.display()))?;
    let log_err = log_file
        .try_clone()
        .context("Failed to duplicate server log handle")?;

    info!(binary = %server.binary, ?args, log = %log_path.display(), "Starting inference server");

    let mut child = Command::new(&server.binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start inference server '{}'", server.binary))?;

    let pid = child.id();
    slot.set(pid);

    if let Err(e) = wait_until_healthy(Some(&mut child), &client, &health_url, timeout).await {
        // dropping the child kills it
        slot.set(None);
        return Err(e);
    }

    info!(pid = ?pid, "Inference server ready");
    Ok(ServerHandle::Managed(ManagedServer {
        child,
        pid,
        slot: slot.clone(),
    }))
}

/// Command line for the server binary
pub fn server_args(
    server: &ServerConfig,
    model_path: &std::path::Path,
    host: &str,
    port: u16,
) -> Vec<String> {
    let mut args = vec![
        "-m".to_string(),
        model_path.display().to_string(),
        "--host".to_string(),
        host.to_string(),
        "--port".to_string(),
        port.to_string(),
    ];
    args.extend(server.extra_args.iter().cloned());
    args
}

fn log_path(server: &ServerConfig) -> Result<PathBuf> {
    if let Some(path) = &server.log_file {
        return Ok(path.clone());
    }
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir.join("server.log"))
}

async fn probe_health(client: &Client, url: &str) -> Health {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => Health::Ready,
        Ok(response) => {
            debug!(status = %response.status(), "Health probe: not ready");
            Health::Loading
        }
        Err(e) => {
            debug!("Health probe failed: {}", e);
            Health::Down
        }
    }
}

/// Poll the health route until 2xx. With `child`, also fail fast if it exits.
async fn wait_until_healthy(
    mut child: Option<&mut Child>,
    client: &Client,
    health_url: &str,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if let Some(child) = child.as_deref_mut() {
            if let Some(status) = child
                .try_wait()
                .context("Failed to poll inference server process")?
            {
                bail!("Inference server exited during startup ({status}); see server log");
            }
        }
        if probe_health(client, health_url).await == Health::Ready {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            bail!(
                "Inference server not healthy after {}s at {}",
                timeout.as_secs(),
                health_url
            );
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Ask a process to exit (SIGTERM). Safe to call from a signal handler thread.
#[cfg(target_family = "unix")]
pub fn terminate_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!(pid = pid, "SIGTERM failed: {}", e);
    }
}

#[cfg(not(target_family = "unix"))]
pub fn terminate_pid(pid: u32) {
    // kill_on_drop covers normal exits; nothing portable to do from a handler
    debug!(pid = pid, "No SIGTERM on this platform");
}
