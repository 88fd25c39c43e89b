use thiserror::Error;

// ─── Configuration ───────────────────────────────────────────────

/// Raised while building or replacing an emitter. Always fatal for the
/// caller doing the configuring; nothing here is ever defaulted silently.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("property \"{0}\" has not been set")]
    Missing(&'static str),

    #[error("property \"{name}\" has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot resolve collector address {host}:{port}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open UDP socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ─── Wire decoding ───────────────────────────────────────────────

/// A line that does not follow `<key>:<value>|<tag>[|@<rate>]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing ':' between key and value in {0:?}")]
    MissingValue(String),

    #[error("missing '|' before type tag in {0:?}")]
    MissingType(String),

    #[error("value is not an integer in {0:?}")]
    BadValue(String),

    #[error("unknown type tag {0:?}")]
    UnknownType(String),

    #[error("malformed sample rate in {0:?}")]
    BadRate(String),
}

// ─── Pool hook ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HookError {
    #[error("interceptor used before configure()")]
    NotConfigured,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
