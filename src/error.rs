use thiserror::Error;

use crate::server::ServerId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("servers must not be empty")]
    EmptyServers,
    #[error("servers must not contain empty entries")]
    EmptyServerEntry,
    #[error("invalid capacity in '{0}'")]
    InvalidCapacity(String),
    #[error("capacity must be > 0 in '{0}'")]
    InvalidCapacityValue(String),
    #[error("ticks must be greater than 0")]
    TicksZero,
    #[error("tick length must be > 0 (got {0}s)")]
    InvalidTickSeconds(f64),
    #[error("{name} must be within [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("invalid pattern parameter: {0}")]
    InvalidPatternParameter(String),
    #[error("random load amount must be > 0")]
    RandomLoadZero,
    #[error("server #{0} not found")]
    ServerNotFound(ServerId),
    #[error("server #{0} is offline")]
    ServerOffline(ServerId),
    #[error("no servers to remove")]
    NoServers,
    #[error("unknown command '{0}'")]
    UnknownCommand(char),
    #[error("{0}")]
    ConfigIo(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("unsupported config format '{0}'")]
    UnsupportedConfigFormat(String),
    #[error("{0}")]
    Cli(String),
}

pub type Result<T> = std::result::Result<T, Error>;
