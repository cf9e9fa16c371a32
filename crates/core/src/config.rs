//! Configuration for the scan planner.
//!
//! All configuration is parsed from String -> String mappings, the form in
//! which it arrives from session variables and catalog properties. Pieces of
//! configuration implement [`TryUpdateKey`], which defines how to update
//! internal fields from key-value pairs.
use std::collections::HashMap;
use std::time::Duration;

use crate::{PlanError, PlanResult, PlanStage};

/// Target split size in bytes. Also read from table properties.
pub const SPLIT_TARGET_SIZE: &str = "read.split.target-size";
/// Maximum number of candidate hosts attached to a scan range.
pub const MAX_CANDIDATE_HOSTS: &str = "scan.max-candidate-hosts";
/// Upper bound on the duration of one planning pass.
pub const PLANNING_TIMEOUT: &str = "scan.planning-timeout";

const ENV_SPLIT_TARGET_SIZE: &str = "LAKESCAN_SPLIT_TARGET_SIZE";
const ENV_MAX_CANDIDATE_HOSTS: &str = "LAKESCAN_MAX_CANDIDATE_HOSTS";
const ENV_PLANNING_TIMEOUT: &str = "LAKESCAN_PLANNING_TIMEOUT";

/// Default cap on candidate hosts per scan range
pub const DEFAULT_MAX_CANDIDATE_HOSTS: usize = 3;

/// Configuration that can be updated one string key at a time.
pub trait TryUpdateKey: Default {
    /// Update an internal field in the configuration.
    ///
    /// ## Returns
    /// - `Ok(Some(()))` if the key was updated.
    /// - `Ok(None)` if the key was not found and no internal field was updated.
    /// - `Err(_)` if the update failed. Failed updates may include finding a known key,
    ///   but failing to parse the value into the expected type.
    fn try_update_key(&mut self, key: &str, value: &str) -> PlanResult<Option<()>>;

    /// Load configuration values from environment variables
    ///
    /// For Option<T> fields, this will only set values that are None
    /// For non-optional fields, environment variables will update the
    /// value if the current value corresponds to the default value.
    fn load_from_environment(&mut self) -> PlanResult<()>;
}

#[derive(Debug)]
/// Generic container for parsing configuration
pub struct ParseResult<T: std::fmt::Debug> {
    /// Parsed configuration
    pub config: T,
    /// Unrecognized key value pairs.
    pub unparsed: HashMap<String, String>,
    /// Errors encountered during parsing
    pub errors: Vec<(String, String)>,
    /// Whether the configuration is defaults only - i.e. no custom values were provided
    pub is_default: bool,
}

impl<T: std::fmt::Debug> ParseResult<T> {
    /// Fail with one [`PlanError::InvalidConfiguration`] naming every key
    /// that could not be parsed, sorted by key.
    pub fn raise_errors(&self) -> PlanResult<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let mut errors = self.errors.clone();
        errors.sort();
        let (keys, messages): (Vec<_>, Vec<_>) = errors.into_iter().unzip();
        Err(PlanError::InvalidConfiguration {
            table: None,
            snapshot_id: None,
            stage: PlanStage::Configure,
            key: keys.join(", "),
            message: messages.join("; "),
        })
    }
}

impl<T: std::fmt::Debug, K, V> FromIterator<(K, V)> for ParseResult<T>
where
    T: TryUpdateKey,
    K: AsRef<str> + Into<String>,
    V: AsRef<str> + Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = T::default();
        let mut unparsed = HashMap::new();
        let mut errors = Vec::new();
        let mut is_default = true;
        for (k, v) in iter {
            match config.try_update_key(k.as_ref(), v.as_ref()) {
                Ok(None) => {
                    unparsed.insert(k.into(), v.into());
                }
                Ok(Some(_)) => is_default = false,
                Err(e) => errors.push((k.into(), e.to_string())),
            }
        }
        ParseResult {
            config,
            unparsed,
            errors,
            is_default,
        }
    }
}

/// Scan planner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Split size override in bytes.
    ///
    /// When unset, the table property of the same key applies, then the
    /// catalog default.
    pub target_split_size: Option<u64>,

    /// Maximum number of candidate hosts attached to each scan range.
    pub max_candidate_hosts: usize,

    /// Upper bound on planning one table. Unbounded when unset.
    pub planning_timeout: Option<Duration>,

    /// Properties that are not recognized by the planner configuration.
    pub unknown_properties: HashMap<String, String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            target_split_size: None,
            max_candidate_hosts: DEFAULT_MAX_CANDIDATE_HOSTS,
            planning_timeout: None,
            unknown_properties: HashMap::new(),
        }
    }
}

impl TryUpdateKey for PlannerConfig {
    fn try_update_key(&mut self, key: &str, value: &str) -> PlanResult<Option<()>> {
        match key {
            SPLIT_TARGET_SIZE => self.target_split_size = Some(parse_split_size(key, value)?),
            MAX_CANDIDATE_HOSTS => self.max_candidate_hosts = parse_usize(key, value)?,
            PLANNING_TIMEOUT => self.planning_timeout = Some(parse_duration(key, value)?),
            _ => return Ok(None),
        }
        Ok(Some(()))
    }

    fn load_from_environment(&mut self) -> PlanResult<()> {
        if self.target_split_size.is_none() {
            if let Ok(value) = std::env::var(ENV_SPLIT_TARGET_SIZE) {
                self.target_split_size = Some(parse_split_size(ENV_SPLIT_TARGET_SIZE, &value)?);
            }
        }
        if self.max_candidate_hosts == DEFAULT_MAX_CANDIDATE_HOSTS {
            if let Ok(value) = std::env::var(ENV_MAX_CANDIDATE_HOSTS) {
                self.max_candidate_hosts = parse_usize(ENV_MAX_CANDIDATE_HOSTS, &value)?;
            }
        }
        if self.planning_timeout.is_none() {
            if let Ok(value) = std::env::var(ENV_PLANNING_TIMEOUT) {
                self.planning_timeout = Some(parse_duration(ENV_PLANNING_TIMEOUT, &value)?);
            }
        }
        Ok(())
    }
}

impl PlannerConfig {
    /// Parse options into a [`PlannerConfig`].
    ///
    /// # Raises
    ///
    /// Raises [`PlanError::InvalidConfiguration`] if any recognized option
    /// cannot be parsed. Unrecognized options end up in `unknown_properties`.
    pub fn parse_options<K, V, I>(options: I) -> PlanResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str> + Into<String>,
        V: AsRef<str> + Into<String>,
    {
        let result = ParseResult::<PlannerConfig>::from_iter(options);
        result.raise_errors()?;
        let mut config = result.config;
        config.unknown_properties = result.unparsed;
        Ok(config)
    }

    /// Set the split size override
    pub fn with_target_split_size(mut self, split_size: u64) -> Self {
        self.target_split_size = Some(split_size);
        self
    }

    /// Set the candidate host cap
    pub fn with_max_candidate_hosts(mut self, max_hosts: usize) -> Self {
        self.max_candidate_hosts = max_hosts;
        self
    }

    /// Set the planning timeout
    pub fn with_planning_timeout(mut self, timeout: Duration) -> Self {
        self.planning_timeout = Some(timeout);
        self
    }
}

fn invalid(key: &str, message: String) -> PlanError {
    PlanError::InvalidConfiguration {
        table: None,
        snapshot_id: None,
        stage: PlanStage::Configure,
        key: key.to_string(),
        message,
    }
}

/// Parse an unsigned integer option
pub fn parse_u64(key: &str, value: &str) -> PlanResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(key, format!("failed to parse \"{value}\" as u64")))
}

/// Parse an unsigned integer option sized for counts
pub fn parse_usize(key: &str, value: &str) -> PlanResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid(key, format!("failed to parse \"{value}\" as usize")))
}

/// Parse a split size, which must be a positive number of bytes.
pub fn parse_split_size(key: &str, value: &str) -> PlanResult<u64> {
    match parse_u64(key, value)? {
        0 => Err(invalid(key, "split size must be positive".to_string())),
        size => Ok(size),
    }
}

/// Parse a duration in humantime notation, e.g. `30s` or `1m 30s`
pub fn parse_duration(key: &str, value: &str) -> PlanResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|_| invalid(key, format!("failed to parse \"{value}\" as Duration")))
}
