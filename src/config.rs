//! Runtime configuration: defaults, then an optional JSON file named by
//! `PIN_ORACLE_CONFIG`, then environment variables.
//!
//! | variable              | JSON key             |
//! |-----------------------|----------------------|
//! | `LOCAL_LOOKUP_FOLDER` | `local_lookup_folder`|
//! | `LOOKUP_GATEWAY`      | `gateway`            |
//! | `LOOKUP_CIDS`         | `cids` (array)       |
//! | `LOOKUP_TIMEOUT_SECS` | `timeout_secs`       |
//! | `PIN_SEEDING`         | `seeding`            |
//! | `PIN_SLOT_SECS`       | `slot_secs`          |
//! | `PIN_GRACE_SECS`      | `grace_secs`         |
//! | `PIN_SERVER_ADDR`     | `listen`             |
//! | `LEADERBOARD_SIZE`    | `leaderboard_size`   |
//! | `PIN_LOG_LEVEL`       | `log_level`          |

use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serialize::json::Json;
use tracing::Level;

use crate::error::ConfigError;
use crate::ledger::DEFAULT_LEADERBOARD_SIZE;
use crate::mt19937::Seeding;
use crate::table::{LocalTable, RemoteTable, TableSource, DEFAULT_FETCH_TIMEOUT};
use crate::window::Schedule;

pub const CONFIG_PATH_VAR: &str = "PIN_ORACLE_CONFIG";
pub const DEFAULT_GATEWAY: &str = "http://127.0.0.1:8080/ipfs/{cid}/";
pub const DEFAULT_LISTEN: &str = "localhost:5000";

impl FromStr for Seeding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Seeding, ConfigError> {
        match s {
            "by_array" => Ok(Seeding::ByArray),
            "genrand" => Ok(Seeding::Genrand),
            other => Err(ConfigError::UnknownSeeding(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// When set, buckets are read from disk and the gateway is unused.
    pub local_root: Option<PathBuf>,
    pub gateway: String,
    pub cids: Vec<String>,
    pub fetch_timeout: Duration,
    pub seeding: Seeding,
    pub schedule: Schedule,
    pub listen: String,
    pub leaderboard_size: usize,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            local_root: None,
            gateway: DEFAULT_GATEWAY.to_string(),
            cids: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            seeding: Seeding::default(),
            schedule: Schedule::default(),
            listen: DEFAULT_LISTEN.to_string(),
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            log_level: Level::INFO,
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

// Interim slot/grace pair, validated together once every layer is applied.
struct Timing {
    slot: u64,
    grace: u64,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::load(|key| env::var(key).ok())
    }

    pub fn load<F>(lookup: F) -> Result<Config, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Config::default();
        let mut timing = Timing {
            slot: config.schedule.slot().as_secs(),
            grace: config.schedule.grace().as_secs(),
        };

        if let Some(path) = lookup(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path);
            let mut text = String::new();
            File::open(&path)
                .and_then(|mut f| f.read_to_string(&mut text))
                .map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;
            let json = Json::from_str(&text)
                .map_err(|e| ConfigError::Json { path: path.clone(), message: format!("{:?}", e) })?;
            config.apply_json(&json, &mut timing)?;
        }

        config.apply_env(&lookup, &mut timing)?;

        config.schedule = Schedule::new(Duration::from_secs(timing.slot),
                                        Duration::from_secs(timing.grace))
            .ok_or_else(|| invalid("slot/grace", &format!("{}/{}", timing.slot, timing.grace)))?;
        Ok(config)
    }

    /// Parses a JSON document on top of the defaults.
    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        let json = Json::from_str(text)
            .map_err(|e| ConfigError::Json { path: PathBuf::from("<inline>"), message: format!("{:?}", e) })?;
        let mut config = Config::default();
        let mut timing = Timing {
            slot: config.schedule.slot().as_secs(),
            grace: config.schedule.grace().as_secs(),
        };
        config.apply_json(&json, &mut timing)?;
        config.schedule = Schedule::new(Duration::from_secs(timing.slot),
                                        Duration::from_secs(timing.grace))
            .ok_or_else(|| invalid("slot/grace", &format!("{}/{}", timing.slot, timing.grace)))?;
        Ok(config)
    }

    fn apply_json(&mut self, json: &Json, timing: &mut Timing) -> Result<(), ConfigError> {
        let obj = json.as_object().ok_or_else(|| invalid("<root>", &json.to_string()))?;

        let string = |key: &str| -> Result<Option<String>, ConfigError> {
            match obj.get(key) {
                None | Some(&Json::Null) => Ok(None),
                Some(v) => v.as_string()
                    .map(|s| Some(s.to_string()))
                    .ok_or_else(|| invalid(key, &v.to_string())),
            }
        };
        let number = |key: &str| -> Result<Option<u64>, ConfigError> {
            match obj.get(key) {
                None | Some(&Json::Null) => Ok(None),
                Some(v) => v.as_u64()
                    .map(Some)
                    .ok_or_else(|| invalid(key, &v.to_string())),
            }
        };

        if let Some(root) = string("local_lookup_folder")? {
            self.local_root = Some(PathBuf::from(root));
        }
        if let Some(gateway) = string("gateway")? {
            self.gateway = gateway;
        }
        if let Some(v) = obj.get("cids") {
            let items = v.as_array().ok_or_else(|| invalid("cids", &v.to_string()))?;
            self.cids = items.iter()
                .map(|c| c.as_string().map(|s| s.to_string()).ok_or_else(|| invalid("cids", &c.to_string())))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(secs) = number("timeout_secs")? {
            self.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(seeding) = string("seeding")? {
            self.seeding = seeding.parse()?;
        }
        if let Some(slot) = number("slot_secs")? {
            timing.slot = slot;
        }
        if let Some(grace) = number("grace_secs")? {
            timing.grace = grace;
        }
        if let Some(listen) = string("listen")? {
            self.listen = listen;
        }
        if let Some(size) = number("leaderboard_size")? {
            self.leaderboard_size = size as usize;
        }
        if let Some(level) = string("log_level")? {
            self.log_level = parse("log_level", &level)?;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: &F, timing: &mut Timing) -> Result<(), ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        if let Some(root) = lookup("LOCAL_LOOKUP_FOLDER") {
            self.local_root = Some(PathBuf::from(root));
        }
        if let Some(gateway) = lookup("LOOKUP_GATEWAY") {
            self.gateway = gateway;
        }
        if let Some(cids) = lookup("LOOKUP_CIDS") {
            self.cids = cids.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(v) = lookup("LOOKUP_TIMEOUT_SECS") {
            self.fetch_timeout = Duration::from_secs(parse("LOOKUP_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("PIN_SEEDING") {
            self.seeding = v.trim().parse()?;
        }
        if let Some(v) = lookup("PIN_SLOT_SECS") {
            timing.slot = parse("PIN_SLOT_SECS", &v)?;
        }
        if let Some(v) = lookup("PIN_GRACE_SECS") {
            timing.grace = parse("PIN_GRACE_SECS", &v)?;
        }
        if let Some(v) = lookup("PIN_SERVER_ADDR") {
            self.listen = v;
        }
        if let Some(v) = lookup("LEADERBOARD_SIZE") {
            self.leaderboard_size = parse("LEADERBOARD_SIZE", &v)?;
        }
        if let Some(v) = lookup("PIN_LOG_LEVEL") {
            self.log_level = parse("PIN_LOG_LEVEL", &v)?;
        }
        Ok(())
    }

    /// The bucket provider this configuration selects.
    pub fn table_source(&self) -> Result<Box<dyn TableSource + Send + Sync>, ConfigError> {
        match self.local_root {
            Some(ref root) => Ok(Box::new(LocalTable::new(root.clone()))),
            None => {
                if self.cids.is_empty() {
                    return Err(invalid("LOOKUP_CIDS", ""));
                }
                if !self.gateway.contains("{cid}") {
                    return Err(invalid("LOOKUP_GATEWAY", &self.gateway));
                }
                Ok(Box::new(RemoteTable::new(&self.gateway, self.cids.clone(), self.fetch_timeout)))
            }
        }
    }
}

#[cfg(test)]
fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = pairs.iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect::<std::collections::HashMap<_, _>>();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = Config::load(vars(&[])).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.schedule.slot(), Duration::from_secs(40));
    assert_eq!(config.fetch_timeout, Duration::from_secs(120));
    assert_eq!(config.seeding, Seeding::ByArray);
    assert!(config.table_source().is_err());
}

#[test]
fn test_env_overrides() {
    let config = Config::load(vars(&[
        ("LOCAL_LOOKUP_FOLDER", "/srv/lookup"),
        ("PIN_SEEDING", "genrand"),
        ("PIN_SLOT_SECS", "30"),
        ("PIN_GRACE_SECS", "600"),
        ("LEADERBOARD_SIZE", "5"),
        ("PIN_LOG_LEVEL", "debug"),
    ])).unwrap();
    assert_eq!(config.local_root, Some(PathBuf::from("/srv/lookup")));
    assert_eq!(config.seeding, Seeding::Genrand);
    assert_eq!(config.schedule.grace(), Duration::from_secs(600));
    assert_eq!(config.leaderboard_size, 5);
    assert_eq!(config.log_level, Level::DEBUG);
    assert!(config.table_source().is_ok());
}

#[test]
fn test_env_rejects_bad_values() {
    match Config::load(vars(&[("PIN_SEEDING", "xorshift")])) {
        Err(ConfigError::UnknownSeeding(s)) => assert_eq!(s, "xorshift"),
        other => panic!("unexpected {:?}", other),
    }
    match Config::load(vars(&[("LOOKUP_TIMEOUT_SECS", "soon")])) {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "LOOKUP_TIMEOUT_SECS"),
        other => panic!("unexpected {:?}", other),
    }
    match Config::load(vars(&[("PIN_SLOT_SECS", "0")])) {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "slot/grace"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_json_layer() {
    let config = Config::from_json(r#"{
        "gateway": "http://{cid}.gateway.test/",
        "cids": ["a", "b", "c"],
        "timeout_secs": 30,
        "seeding": "genrand",
        "listen": "0.0.0.0:8000"
    }"#).unwrap();
    assert_eq!(config.cids, vec!["a", "b", "c"]);
    assert_eq!(config.fetch_timeout, Duration::from_secs(30));
    assert_eq!(config.listen, "0.0.0.0:8000");
    assert!(config.table_source().is_ok());

    assert!(Config::from_json(r#"{"cids": [1, 2]}"#).is_err());
    assert!(Config::from_json("[1]").is_err());
    assert!(Config::from_json("{").is_err());
}

#[test]
fn test_file_then_env() {
    let mut path = env::temp_dir();
    path.push(format!("pin_oracle_config_{}.json", std::process::id()));
    std::fs::write(&path, r#"{"cids": ["x"], "leaderboard_size": 7, "seeding": "genrand"}"#).unwrap();

    let path_str = path.to_string_lossy().into_owned();
    let config = Config::load(vars(&[
        (CONFIG_PATH_VAR, path_str.as_str()),
        ("PIN_SEEDING", "by_array"),
    ])).unwrap();
    assert_eq!(config.cids, vec!["x"]);
    assert_eq!(config.leaderboard_size, 7);
    assert_eq!(config.seeding, Seeding::ByArray);

    std::fs::remove_file(&path).unwrap();
}
