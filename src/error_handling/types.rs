use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NodeIdEmpty,
    BadAddress(String),
    ZeroCapacity,
    BadIntervals(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NodeIdEmpty => write!(f, "Node id must not be empty"),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::ZeroCapacity => write!(f, "Attack store capacity must be at least 1"),
            ConfigError::BadIntervals(e) => write!(f, "Interval error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum RelayError {
    BindError(std::io::Error),
    StreamError(std::io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::BindError(e) => write!(f, "Relay bind error: {}", e),
            RelayError::StreamError(e) => write!(f, "Relay stream error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug)]
pub enum IngressError {
    SubscribeFailed(rumqttc::ClientError),
}

impl fmt::Display for IngressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngressError::SubscribeFailed(e) => write!(f, "Bus subscription failed: {}", e),
        }
    }
}

impl std::error::Error for IngressError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    RelayError(RelayError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::RelayError(e) => write!(f, "Relay error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<RelayError> for ControllerError {
    fn from(err: RelayError) -> Self {
        ControllerError::RelayError(err)
    }
}
