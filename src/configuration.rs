//! Config for the bench behaviors
//!
//! This module provides configuration options for controlling how problems are run.
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional, an unusable value is an error. Flags are `"true"` or `"false"`,
//! case-insensitive.
//!
//! - `MAPF_VERBOSE`: Print progress on stdout (default: `true`)
//! - `MAPF_LOG`: Enable logging to a file (default: `false`)
//! - `MAPF_CORES`: `1` runs on the calling thread, `-1` uses every CPU, `n > 1` uses `n`
//!   workers (default: `-1`)
//! - `MAPF_TIMEOUT_MS`: Per-problem timeout in milliseconds, `0` disables it (default: none)

use std::env::VarError;
use std::fmt::Display;
use std::time::Duration;

use anyhow::{bail, Context};

/// How many workers solve problems concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cores {
    /// Solve problems one after the other on the calling thread.
    Single,
    /// One worker per logical CPU.
    #[default]
    All,
    /// Exactly this many workers (more than one).
    Exactly(usize),
}

impl Cores {
    /// Number of workers this setting stands for on this machine.
    pub fn workers(self) -> usize {
        match self {
            Cores::Single => 1,
            Cores::All => num_cpus::get().max(1),
            Cores::Exactly(n) => n,
        }
    }
}

impl TryFrom<i32> for Cores {
    type Error = anyhow::Error;

    /// `1` → [`Cores::Single`], `-1` → [`Cores::All`], `n > 1` → [`Cores::Exactly`].
    fn try_from(value: i32) -> anyhow::Result<Self> {
        match value {
            1 => Ok(Cores::Single),
            -1 => Ok(Cores::All),
            n if n > 1 => Ok(Cores::Exactly(n as usize)),
            n => bail!("invalid core count {n}: use 1, -1 (all cores) or a number above 1"),
        }
    }
}

impl Display for Cores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cores::Single => write!(f, "1"),
            Cores::All => write!(f, "all ({})", self.workers()),
            Cores::Exactly(n) => write!(f, "{n}"),
        }
    }
}

/// Configuration for bench behaviors.
#[derive(Debug, Clone, Copy)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) cores: Cores,
    pub(crate) timeout: Option<Duration>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Progress is printed to stdout.
    /// - Logging to file is disabled.
    /// - Every CPU is used.
    /// - There is no timeout: solver errors abort the bench.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            cores: Cores::All,
            timeout: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// The following environment variables are recognized:
    /// - `MAPF_VERBOSE`: `"true"` or `"false"`, progress output (default: `true`)
    /// - `MAPF_LOG`: `"true"` or `"false"`, logging to file (default: `false`)
    /// - `MAPF_CORES`: core count as accepted by [`Cores::try_from`] (default: `-1`)
    /// - `MAPF_TIMEOUT_MS`: per-problem timeout in milliseconds (default: none)
    ///
    /// Unset variables take their default value.
    ///
    /// # Errors
    /// Returned when a variable is set to a value that cannot be used.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("invalid {var}")),
        })
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> anyhow::Result<Option<String>>,
    ) -> anyhow::Result<Self> {
        let flag = |var: &str, default: bool| -> anyhow::Result<bool> {
            let Some(val) = lookup(var)? else {
                return Ok(default);
            };
            match val.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => bail!("invalid {var} '{val}': expected true or false"),
            }
        };

        let mut config = Self::new()
            .with_verbose(flag("MAPF_VERBOSE", true)?)
            .with_log(flag("MAPF_LOG", false)?);
        if let Some(val) = lookup("MAPF_CORES")? {
            let cores = val
                .trim()
                .parse::<i32>()
                .map_err(anyhow::Error::from)
                .and_then(Cores::try_from)
                .with_context(|| format!("invalid MAPF_CORES '{val}'"))?;
            config = config.with_cores(cores);
        }
        if let Some(val) = lookup("MAPF_TIMEOUT_MS")? {
            let ms = val
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid MAPF_TIMEOUT_MS '{val}'"))?;
            config = config.with_timeout(Some(Duration::from_millis(ms)));
        }
        Ok(config)
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Set the number of workers.
    pub fn with_cores(mut self, cores: Cores) -> Self {
        self.cores = cores;
        self
    }

    /// Set the per-problem timeout. `None` or a zero duration disables it.
    ///
    /// With a timeout, failing or slow problems get no answer and the bench goes on.
    /// Without one, the solver is trusted: its errors are returned to the caller.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Per-problem timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Configured parallelism.
    pub fn cores(&self) -> Cores {
        self.cores
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cores_from_int() {
        assert_eq!(Cores::try_from(1).unwrap(), Cores::Single);
        assert_eq!(Cores::try_from(-1).unwrap(), Cores::All);
        assert_eq!(Cores::try_from(4).unwrap(), Cores::Exactly(4));
        assert!(Cores::try_from(0).is_err());
        assert!(Cores::try_from(-2).is_err());
    }

    #[test]
    fn workers() {
        assert_eq!(Cores::Single.workers(), 1);
        assert_eq!(Cores::Exactly(3).workers(), 3);
        assert!(Cores::All.workers() >= 1);
    }

    #[test]
    fn zero_timeout_disables() {
        let config = Configuration::new().with_timeout(Some(Duration::ZERO));
        assert_eq!(config.timeout(), None);
        let config = config.with_timeout(Some(Duration::from_millis(10)));
        assert_eq!(config.timeout(), Some(Duration::from_millis(10)));
    }

    fn lookup<'a>(
        vars: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> anyhow::Result<Option<String>> + 'a {
        move |var: &str| {
            Ok(vars
                .iter()
                .find(|(name, _)| *name == var)
                .map(|(_, val)| val.to_string()))
        }
    }

    #[test]
    fn env_values() {
        let config = Configuration::from_lookup(lookup(&[
            ("MAPF_VERBOSE", "False"),
            ("MAPF_LOG", "true"),
            ("MAPF_CORES", " 3 "),
            ("MAPF_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert!(!config.verbose);
        assert!(config.log);
        assert_eq!(config.cores(), Cores::Exactly(3));
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unset_env_uses_defaults() {
        let config = Configuration::from_lookup(lookup(&[])).unwrap();
        assert!(config.verbose);
        assert!(!config.log);
        assert_eq!(config.cores(), Cores::All);
        assert_eq!(config.timeout(), None);

        let config = Configuration::from_lookup(lookup(&[("MAPF_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn malformed_env_is_an_error() {
        for (var, val) in [
            ("MAPF_CORES", "0"),
            ("MAPF_CORES", "many"),
            ("MAPF_TIMEOUT_MS", "abc"),
            ("MAPF_TIMEOUT_MS", "-5"),
            ("MAPF_VERBOSE", "yes"),
        ] {
            let err = Configuration::from_lookup(lookup(&[(var, val)])).unwrap_err();
            assert!(format!("{err:#}").contains(var), "{var}={val}: {err:#}");
        }
    }

    #[test]
    fn defaults() {
        let config = Configuration::default();
        assert!(config.verbose);
        assert!(!config.log);
        assert_eq!(config.cores(), Cores::All);
        assert_eq!(config.timeout(), None);
    }
}
