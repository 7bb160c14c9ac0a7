use std::path::PathBuf;

use regex::Regex;

use crate::procfs::CmdlineFilter;

const DEFAULT_PROCFS: &str = "/proc";
const DEFAULT_ROOTFS: &str = "/";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DATA_ROOT: &str = "/app/data";

/// Errors that may occur while reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid command line pattern in `{var}`: {source}")]
    InvalidPattern {
        var: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("invalid pid `{value}` in `{var}`: {source}")]
    InvalidPid {
        var: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings of the tracer daemon, read once at startup from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// procfs directory, different from `/proc` when host volumes are mapped into a container.
    pub procfs: PathBuf,
    /// Host root, used to look up `/etc/hostname`.
    pub rootfs: PathBuf,
    /// Host mode process filter.
    pub cmdline_filter: CmdlineFilter,
    /// Address of the control API.
    pub listen_addr: String,
    /// Parent of the per-node data directory.
    pub data_root: PathBuf,
    /// Troubleshooting targets registered regardless of discovery.
    pub global_native_pid: Option<u32>,
    pub global_managed_pid: Option<u32>,
    pub debug: bool,
    pub node_name: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `TRACER_CMDLINE_REGEX` does not compile
    /// and [`Error::InvalidPid`] if a global target pid is not a number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let pattern = get("TRACER_CMDLINE_REGEX")
            .map(|pattern| Regex::new(&pattern))
            .transpose()
            .map_err(|source| Error::InvalidPattern {
                var: "TRACER_CMDLINE_REGEX",
                source,
            })?;

        let pid = |var: &'static str| -> Result<Option<u32>> {
            get(var)
                .map(|value| {
                    value.trim().parse::<u32>().map_err(|source| Error::InvalidPid {
                        var,
                        value: value.clone(),
                        source,
                    })
                })
                .transpose()
        };

        Ok(Self {
            procfs: get("TRACER_PROCFS").map_or_else(|| PathBuf::from(DEFAULT_PROCFS), PathBuf::from),
            rootfs: get("ROOTFS_MOUNT_PATH").map_or_else(|| PathBuf::from(DEFAULT_ROOTFS), PathBuf::from),
            cmdline_filter: CmdlineFilter::new(pattern),
            listen_addr: get("TRACER_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned()),
            data_root: get("TRACER_DATA_ROOT")
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT), PathBuf::from),
            global_native_pid: pid("TRACER_GLOBAL_NATIVE_PID")?,
            global_managed_pid: pid("TRACER_GLOBAL_MANAGED_PID")?,
            debug: get("TRACER_DEBUG").is_some_and(|value| is_truthy(&value)),
            node_name: get("NODE_NAME").map(|name| name.trim().to_owned()),
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
