//! Layered configuration: compiled-in defaults, then an optional TOML file,
//! then environment variable overrides, merged by `figment` into one typed,
//! validated structure. Once loaded the configuration is treated as
//! immutable for the remainder of the process.
//!
//! Every default lives in a named `default_*` function rather than an inline
//! literal, so that [`Configuration::default`] documents and tests the same
//! values a hand-written TOML file would need to repeat.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::panic::Location;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Error;

const ENV_PREFIX: &str = "TORRUST_TRACKER_UDP_CONFIG_OVERRIDE_";
const ENV_SEPARATOR: &str = "__";

/// Opaque, core-unvalidated identifier for the registry storage backend.
/// `InMemory` is the only driver this crate ships an implementation for;
/// any other value is accepted by the loader and simply ignored by the core,
/// matching §6's "`database.*` is opaque to the core" contract.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseDriver {
    #[default]
    InMemory,
    Sqlite3,
    MySQL,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Database {
    #[serde(default = "Database::default_driver")]
    pub driver: DatabaseDriver,
}

impl Database {
    fn default_driver() -> DatabaseDriver {
        DatabaseDriver::InMemory
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            driver: Self::default_driver(),
        }
    }
}

/// The `[tracker]` section: the admission policy and protocol timings that
/// §6 lists as the recognized configuration keys for the core.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Tracker {
    #[serde(default = "Tracker::default_allow_remotes")]
    pub allow_remotes: bool,

    #[serde(default = "Tracker::default_allow_iana_ips")]
    pub allow_iana_ips: bool,

    #[serde(default = "Tracker::default_is_dynamic")]
    pub is_dynamic: bool,

    #[serde(default = "Tracker::default_announce_interval")]
    pub announce_interval: u32,

    #[serde(default = "Tracker::default_cleanup_interval")]
    pub cleanup_interval: u32,

    #[serde(default = "Tracker::default_port")]
    pub port: u16,

    #[serde(default = "Tracker::default_threads")]
    pub threads: i64,

    #[serde(default = "Tracker::default_bind")]
    pub bind: Vec<String>,
}

impl Tracker {
    fn default_allow_remotes() -> bool {
        true
    }

    fn default_allow_iana_ips() -> bool {
        false
    }

    fn default_is_dynamic() -> bool {
        true
    }

    fn default_announce_interval() -> u32 {
        1800
    }

    fn default_cleanup_interval() -> u32 {
        120
    }

    fn default_port() -> u16 {
        6969
    }

    fn default_threads() -> i64 {
        5
    }

    fn default_bind() -> Vec<String> {
        vec![]
    }

    /// Number of receiver workers, `threads` with its sign dropped. The
    /// maintenance worker is not counted here; the launcher adds one.
    #[must_use]
    pub fn receiver_worker_count(&self) -> usize {
        self.threads.unsigned_abs() as usize
    }

    /// The address the socket is bound to: the first configured `bind`
    /// entry (or `0.0.0.0` when the list is empty) combined with `port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBindAddress`] when the configured address
    /// cannot be parsed as an IPv4/IPv6 address.
    pub fn bind_address(&self) -> Result<SocketAddr, Error> {
        let Some(host) = self.bind.first() else {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port));
        };

        let ip: IpAddr = host.parse().map_err(|_: std::net::AddrParseError| Error::InvalidBindAddress {
            address: host.clone(),
            location: Location::caller(),
        })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            allow_remotes: Self::default_allow_remotes(),
            allow_iana_ips: Self::default_allow_iana_ips(),
            is_dynamic: Self::default_is_dynamic(),
            announce_interval: Self::default_announce_interval(),
            cleanup_interval: Self::default_cleanup_interval(),
            port: Self::default_port(),
            threads: Self::default_threads(),
            bind: Self::default_bind(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Configuration {
    #[serde(default = "Configuration::default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tracker: Tracker,

    #[serde(default)]
    pub database: Database,
}

impl Configuration {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Loads configuration layered as defaults -> optional TOML file ->
    /// environment variables, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the merged document does not
    /// deserialize into a [`Configuration`], and any error the loaded
    /// configuration's own validation step raises (e.g. an unparseable
    /// bind address).
    pub fn load(config_toml_path: Option<&str>) -> Result<Self, Error> {
        let mut figment = Figment::from(Serialized::defaults(Configuration::default()));

        if let Some(path) = config_toml_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));

        let config: Configuration = figment
            .extract()
            .map_err(|e| Error::Configuration { source: wrap(e) })?;

        config.validate()?;

        Ok(config)
    }

    /// Fails fast on configuration that would otherwise surface as a
    /// confusing runtime error later (see §4.7 and §7: this is a fatal
    /// startup error, never silently corrected).
    pub fn validate(&self) -> Result<(), Error> {
        if self.tracker.receiver_worker_count() == 0 {
            return Err(Error::InvalidBindAddress {
                address: "tracker.threads resolves to 0 receiver workers".to_string(),
                location: Location::caller(),
            });
        }

        self.tracker.bind_address()?;

        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            tracker: Tracker::default(),
            database: Database::default(),
        }
    }
}

fn wrap(e: figment::Error) -> torrust_tracker_located_error::LocatedError<'static, dyn std::error::Error + Send + Sync> {
    torrust_tracker_located_error::Located(e).into()
}
