use super::BootstrapError;
use crate::config::DisplayConfig;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Screen size and color depth, written `WIDTHxHEIGHTxDEPTH`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            depth: 24,
        }
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

impl FromStr for ScreenGeometry {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static GEOMETRY: OnceLock<Option<Regex>> = OnceLock::new();

        let invalid = || BootstrapError::InvalidGeometry(s.to_string());
        let re = GEOMETRY
            .get_or_init(|| Regex::new(r"^\s*(\d+)x(\d+)x(\d+)\s*$").ok())
            .as_ref()
            .ok_or_else(invalid)?;
        let caps = re.captures(s).ok_or_else(invalid)?;

        let field = |i: usize| -> Result<u32, BootstrapError> {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .ok_or_else(invalid)
        };

        Ok(Self {
            width: field(1)?,
            height: field(2)?,
            depth: field(3)?,
        })
    }
}

impl Serialize for ScreenGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScreenGeometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Arguments passed to the display server
pub fn server_args(config: &DisplayConfig) -> Vec<String> {
    vec![
        config.display_name(),
        "-screen".to_string(),
        "0".to_string(),
        config.geometry.to_string(),
        // no access control
        "-ac".to_string(),
    ]
}

/// Identity of the socket file, to tell a fresh one from a leftover
#[derive(Debug, Clone, PartialEq, Eq)]
struct SocketStamp {
    modified: Option<SystemTime>,
    #[cfg(unix)]
    inode: u64,
}

impl SocketStamp {
    fn read(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            #[cfg(unix)]
            inode: std::os::unix::fs::MetadataExt::ino(&meta),
        })
    }
}

/// A spawned display server and the socket state it started from
pub struct DisplayServer {
    child: Child,
    stale_socket: Option<SocketStamp>,
}

impl DisplayServer {
    /// Spawn `program`, remembering any socket that already exists so a
    /// leftover from an earlier server is not taken for readiness
    fn spawn(program: &str, args: &[String], config: &DisplayConfig) -> Result<Self, BootstrapError> {
        let socket = config.socket_path();
        let stale_socket = SocketStamp::read(&socket);
        if stale_socket.is_some() {
            tracing::warn!("Display socket {:?} already exists, waiting for a fresh one", socket);
        }

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| BootstrapError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(Self { child, stale_socket })
    }

    /// The socket exists and is not the one seen before spawning
    fn socket_is_fresh(&self, socket: &Path) -> bool {
        match SocketStamp::read(socket) {
            Some(stamp) => self.stale_socket.as_ref() != Some(&stamp),
            None => false,
        }
    }
}

/// Spawn the display server in the background
pub fn start_server(config: &DisplayConfig) -> Result<DisplayServer, BootstrapError> {
    let args = server_args(config);
    tracing::info!("Starting display server: {} {}", config.server, args.join(" "));
    DisplayServer::spawn(&config.server, &args, config)
}

/// Poll until the server has created its socket. Fails when the server exits
/// first or the readiness timeout passes. A socket left over from an earlier
/// server does not count.
pub async fn wait_until_ready(config: &DisplayConfig, server: &mut DisplayServer) -> Result<(), BootstrapError> {
    let socket = config.socket_path();
    let timeout = Duration::from_millis(config.readiness_timeout_ms);
    let interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let deadline = Instant::now() + timeout;

    loop {
        match server.child.try_wait() {
            Ok(Some(status)) => {
                tracing::error!("Display server exited before becoming ready: {}", status);
                return Err(BootstrapError::DisplayExited(status));
            }
            Ok(None) => {}
            Err(e) => return Err(BootstrapError::Wait(e)),
        }

        if server.socket_is_fresh(&socket) {
            tracing::info!("Display {} ready ({:?})", config.display_name(), socket);
            return Ok(());
        }

        if Instant::now() >= deadline {
            tracing::error!("Display {} not ready after {:?}", config.display_name(), timeout);
            return Err(BootstrapError::ReadinessTimeout {
                socket,
                timeout,
            });
        }

        tokio::time::sleep(interval).await;
    }
}
