use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "./scanner.yaml";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
pub const DEFAULT_GRPC_PORT: u16 = 8081;

/// Targets the scanner cycles through. Built once at startup and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Server {
    pub host: String,
    #[serde(default)]
    pub ports: Vec<Port>,
}

/// `protocol` is kept as written in the file. Unknown values are not an
/// error, the scanner simply never probes them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Port {
    pub number: u16,
    #[serde(default)]
    pub protocol: String,
}

impl Port {
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol.parse().ok()
    }
}

impl Server {
    pub fn address(&self, port: &Port) -> String {
        format!("{}:{}", self.host, port.number)
    }
}

impl ScannerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ScannerConfig =
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.servers.iter().position(|s| s.host.trim().is_empty()) {
            Some(index) => Err(ConfigError::EmptyHost { index }),
            None => Ok(()),
        }
    }
}

/// The protocols a probe exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
    Grpc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProtocol(pub String);

impl fmt::Display for UnknownProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown protocol: {:?}", self.0)
    }
}

impl std::error::Error for UnknownProtocol {}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("http") {
            Ok(Protocol::Http)
        } else if s.eq_ignore_ascii_case("https") {
            Ok(Protocol::Https)
        } else if s.eq_ignore_ascii_case("grpc") {
            Ok(Protocol::Grpc)
        } else {
            Err(UnknownProtocol(s.to_string()))
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Grpc => "GRPC",
        })
    }
}

/// Ports the server role listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeConfig {
    pub http_port: u16,
    pub https_port: u16,
    pub grpc_port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            grpc_port: DEFAULT_GRPC_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
servers:
  - host: transponder-server.default
    ports:
      - number: 8080
        protocol: HTTP
      - number: 8443
        protocol: https
      - number: 8081
        protocol: gRPC
  - host: 10.0.0.7
    ports:
      - number: 22
        protocol: ssh
"#;

    #[test]
    fn parses_servers_and_ports_in_order() {
        let config: ScannerConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].host, "transponder-server.default");
        let numbers: Vec<u16> = config.servers[0].ports.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![8080, 8443, 8081]);
        assert_eq!(config.servers[1].ports[0].protocol, "ssh");
    }

    #[test]
    fn protocol_parse_ignores_case() {
        for (raw, expected) in [
            ("http", Protocol::Http),
            ("HTTP", Protocol::Http),
            ("hTtP", Protocol::Http),
            ("https", Protocol::Https),
            ("HTTPS", Protocol::Https),
            ("grpc", Protocol::Grpc),
            ("gRPC", Protocol::Grpc),
        ] {
            assert_eq!(raw.parse::<Protocol>(), Ok(expected), "{raw}");
        }
        assert!("ssh".parse::<Protocol>().is_err());
        assert!("".parse::<Protocol>().is_err());
        assert!(" http".parse::<Protocol>().is_err());
    }

    #[test]
    fn duplicate_targets_are_kept() {
        let yaml = "servers:\n  - host: a\n    ports: [{number: 80, protocol: http}, {number: 80, protocol: http}]\n  - host: a\n    ports: []\n";
        let config: ScannerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].ports.len(), 2);
    }

    #[test]
    fn from_file_loads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ScannerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.servers[1].address(&config.servers[1].ports[0]), "10.0.0.7:22");
    }

    #[test]
    fn from_file_rejects_missing_and_malformed_files() {
        let err = ScannerConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"servers: [host: ").unwrap();
        let err = ScannerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn empty_host_is_rejected() {
        let config = ScannerConfig {
            servers: vec![Server { host: "  ".into(), ports: vec![] }],
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyHost { index: 0 })));
    }
}
