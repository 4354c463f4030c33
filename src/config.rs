//! Runtime configuration
//!
//! Everything the gateway consumes at boot: the mixer host, the fixed channel
//! and aux-bus universes, the API port, and the layout file locations. Values
//! come from CLI flags or environment variables (via clap's env support);
//! `.env` files are honored by the binary before parsing.

use crate::api::DEFAULT_API_PORT;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Mixer GW - bridge a hardware digital mixer to web UI clients
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Mixer host to connect to
    #[arg(long, env = "MIXER_HOST", default_value = "192.168.1.123")]
    pub host: String,

    /// Channel id universe, as ranges and/or a comma-separated list (e.g. "1-24")
    #[arg(long, env = "MIXER_CHANNELS", default_value = "1-24")]
    pub channels: String,

    /// Aux bus id universe
    #[arg(long, env = "MIXER_AUX_BUSES", default_value = "1-6")]
    pub aux_buses: String,

    /// HTTP/WebSocket listen port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Layout file path (defaults to the platform data directory)
    #[arg(long, env = "LAYOUT_PATH")]
    pub layout: Option<PathBuf>,

    /// Seed layout adopted when the primary file is missing or corrupt
    #[arg(long, env = "LAYOUT_SEED")]
    pub layout_seed: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("mixer host cannot be empty")]
    EmptyHost,
    #[error("invalid id spec '{0}': expected ranges like '1-24' or a comma-separated list")]
    InvalidIdSpec(String),
    #[error("id universe '{0}' is empty")]
    EmptyIdSpec(String),
}

/// Validated configuration consumed by the stores at construction
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    /// Sorted, deduplicated channel id universe
    pub channel_ids: Vec<u16>,
    /// Sorted, deduplicated aux bus id universe
    pub aux_ids: Vec<u16>,
    pub port: u16,
    pub layout_path: PathBuf,
    pub layout_seed: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if args.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(Self {
            host: args.host.clone(),
            channel_ids: parse_id_set(&args.channels)?,
            aux_ids: parse_id_set(&args.aux_buses)?,
            port: args.port,
            layout_path: args
                .layout
                .clone()
                .unwrap_or_else(crate::paths::default_layout_path),
            layout_seed: args.layout_seed.clone(),
        })
    }
}

/// Parse an id universe spec: comma-separated positive ids and `a-b` ranges
pub fn parse_id_set(spec: &str) -> Result<Vec<u16>, ConfigError> {
    let mut ids = BTreeSet::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((lo, hi)) => {
                let lo = parse_positive(lo, spec)?;
                let hi = parse_positive(hi, spec)?;
                if lo > hi {
                    return Err(ConfigError::InvalidIdSpec(spec.to_string()));
                }
                ids.extend(lo..=hi);
            }
            None => {
                ids.insert(parse_positive(token, spec)?);
            }
        }
    }
    if ids.is_empty() {
        return Err(ConfigError::EmptyIdSpec(spec.to_string()));
    }
    Ok(ids.into_iter().collect())
}

fn parse_positive(token: &str, spec: &str) -> Result<u16, ConfigError> {
    token
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ConfigError::InvalidIdSpec(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_id_set("1-4").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_list_and_mixed() {
        assert_eq!(parse_id_set("3, 1, 3").unwrap(), vec![1, 3]);
        assert_eq!(parse_id_set("1-3, 8, 5-6").unwrap(), vec![1, 2, 3, 5, 6, 8]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_id_set("abc"), Err(ConfigError::InvalidIdSpec(_))));
        assert!(matches!(parse_id_set("4-1"), Err(ConfigError::InvalidIdSpec(_))));
        assert!(matches!(parse_id_set("0"), Err(ConfigError::InvalidIdSpec(_))));
        assert!(matches!(parse_id_set(""), Err(ConfigError::EmptyIdSpec(_))));
    }

    #[test]
    fn test_from_args_defaults() {
        let args = Args::parse_from(["mixer-gw"]);
        let config = GatewayConfig::from_args(&args).unwrap();
        assert_eq!(config.channel_ids.len(), 24);
        assert_eq!(config.aux_ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(config.port, DEFAULT_API_PORT);
    }

    #[test]
    fn test_from_args_rejects_empty_host() {
        let args = Args::parse_from(["mixer-gw", "--host", "  "]);
        assert_eq!(GatewayConfig::from_args(&args), Err(ConfigError::EmptyHost));
    }
}
