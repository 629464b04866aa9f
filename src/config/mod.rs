use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub evaluator: EvaluatorConfig,
    pub realtime: RealtimeConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct EvaluatorConfig {
    /// Name of the docker container running the sandbox
    pub container: String,
    /// Host-side directory mapped into the container for scratch scripts
    pub scratch_dir: String,
    /// Directory as seen from inside the container
    pub container_scratch_dir: String,
    /// Hard wall-clock bound per execution
    pub timeout_secs: u64,
}

pub struct RealtimeConfig {
    /// When enabled, a disconnecting connection that identified a player
    /// triggers a Leave for each room it subscribed to. Off by default:
    /// membership cleanup is normally driven by explicit leave actions only.
    pub disconnect_cleanup: bool,
}

impl EvaluatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            evaluator: EvaluatorConfig {
                container: env::var("RUNNER_CONTAINER")
                    .unwrap_or_else(|_| "duel-code-runner".to_string()),
                scratch_dir: env::var("RUNNER_SCRATCH_DIR")
                    .unwrap_or_else(|_| "./temp-execution".to_string()),
                container_scratch_dir: env::var("RUNNER_CONTAINER_SCRATCH_DIR")
                    .unwrap_or_else(|_| "/app/temp-execution".to_string()),
                timeout_secs: env::var("RUNNER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            realtime: RealtimeConfig {
                disconnect_cleanup: env::var("REALTIME_DISCONNECT_CLEANUP")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_evaluator_config() -> EvaluatorConfig {
        EvaluatorConfig {
            container: "duel-code-runner".to_string(),
            scratch_dir: "./temp-execution".to_string(),
            container_scratch_dir: "/app/temp-execution".to_string(),
            timeout_secs: 10,
        }
    }

    fn config_with_host(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            evaluator: default_evaluator_config(),
            realtime: RealtimeConfig {
                disconnect_cleanup: false,
            },
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = config_with_host("localhost", 8080);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 8080));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = config_with_host("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_all_interfaces() {
        let config = config_with_host("0.0.0.0", 8080);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = config_with_host("", 8080);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = config_with_host("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_evaluator_timeout() {
        let config = default_evaluator_config();
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }
}
