//! Runtime settings, read from `INNKEEP_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::limits::{MAX_ROOM_NAME_LEN, MAX_ROOMS};
use crate::model::{NO_ROOM, Room};

pub const DEFAULT_ROOMS: &str = "1:General's Quarters,2:Major's Suite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Upper bound on every repository call.
    pub repo_timeout: Duration,
    /// Drafts untouched for longer than this are dropped.
    pub draft_ttl: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Seeded into the store at startup.
    pub rooms: Vec<Room>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            repo_timeout: Duration::from_millis(2000),
            draft_ttl: Duration::from_secs(86_400),
            compact_threshold: 1000,
            metrics_port: None,
            rooms: vec![
                Room { id: 1, name: "General's Quarters".into() },
                Room { id: 2, name: "Major's Suite".into() },
            ],
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError(format!("{name}: cannot parse {s:?}"))),
    }
}

/// `id:name` pairs separated by commas.
pub fn parse_rooms(raw: &str) -> Result<Vec<Room>, ConfigError> {
    let mut rooms: Vec<Room> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, name) = part
            .split_once(':')
            .ok_or_else(|| ConfigError(format!("room {part:?} is not id:name")))?;
        let id: u32 = id
            .trim()
            .parse()
            .map_err(|_| ConfigError(format!("room id {id:?} is not a number")))?;
        let name = name.trim();
        if id == NO_ROOM {
            return Err(ConfigError("room id 0 is reserved".into()));
        }
        if name.is_empty() || name.len() > MAX_ROOM_NAME_LEN {
            return Err(ConfigError(format!("room {id} has a bad name")));
        }
        if rooms.iter().any(|r| r.id == id) {
            return Err(ConfigError(format!("room {id} listed twice")));
        }
        rooms.push(Room { id, name: name.to_string() });
    }
    if rooms.is_empty() {
        return Err(ConfigError("no rooms configured".into()));
    }
    if rooms.len() > MAX_ROOMS {
        return Err(ConfigError("too many rooms".into()));
    }
    rooms.sort_by_key(|r| r.id);
    Ok(rooms)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let data_dir = lookup("INNKEEP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let repo_timeout = parse_var::<u64>("INNKEEP_REPO_TIMEOUT_MS", lookup("INNKEEP_REPO_TIMEOUT_MS"))?
            .map(Duration::from_millis)
            .unwrap_or(defaults.repo_timeout);
        let draft_ttl = parse_var::<u64>("INNKEEP_DRAFT_TTL_SECS", lookup("INNKEEP_DRAFT_TTL_SECS"))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.draft_ttl);
        let compact_threshold = parse_var("INNKEEP_COMPACT_THRESHOLD", lookup("INNKEEP_COMPACT_THRESHOLD"))?
            .unwrap_or(defaults.compact_threshold);
        let metrics_port = parse_var("INNKEEP_METRICS_PORT", lookup("INNKEEP_METRICS_PORT"))?;
        let rooms = match lookup("INNKEEP_ROOMS") {
            Some(raw) => parse_rooms(&raw)?,
            None => defaults.rooms,
        };

        if repo_timeout.is_zero() {
            return Err(ConfigError("INNKEEP_REPO_TIMEOUT_MS must be positive".into()));
        }
        Ok(Self {
            data_dir,
            repo_timeout,
            draft_ttl,
            compact_threshold,
            metrics_port,
            rooms,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}
