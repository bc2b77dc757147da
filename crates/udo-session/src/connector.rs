use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use udo_transport::{
    IpConfig, IpTransport, Result, SerialConfig, SerialTransport, Transport, UdoError,
    DEFAULT_MAX_TRIES,
};

use crate::session::Session;

/// Link settings applied to transports built by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Serial: per-byte stall limit. UDP: wait for each reply datagram.
    pub timeout: Duration,
    pub max_tries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_tries: DEFAULT_MAX_TRIES,
        }
    }
}

/// Where a device lives: `serial:<device[:baud]>` or `ip:<host[:port]>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Serial(String),
    Ip(String),
}

impl FromStr for Target {
    type Err = UdoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("serial", rest)) if !rest.is_empty() => Ok(Self::Serial(rest.to_string())),
            Some(("ip", rest)) if !rest.is_empty() => Ok(Self::Ip(rest.to_string())),
            _ => Err(UdoError::Connection {
                op: "Open".to_string(),
                reason: format!("invalid target '{s}', expected serial:<device> or ip:<host>"),
            }),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(dev) => write!(f, "serial:{dev}"),
            Self::Ip(host) => write!(f, "ip:{host}"),
        }
    }
}

impl Target {
    /// Build the (unopened) transport this target names.
    pub fn transport(&self, config: &SessionConfig) -> Result<Box<dyn Transport>> {
        Ok(match self {
            Self::Serial(dev) => {
                let serial = SerialConfig {
                    timeout: config.timeout,
                    max_tries: config.max_tries,
                    ..SerialConfig::from_target(dev)?
                };
                Box::new(SerialTransport::new(serial))
            }
            Self::Ip(host) => {
                let ip = IpConfig {
                    timeout: config.timeout,
                    max_tries: config.max_tries,
                    ..IpConfig::from_target(host)?
                };
                Box::new(IpTransport::new(ip))
            }
        })
    }
}

/// Open a session to `target` with default settings.
pub fn connect(target: &Target) -> Result<Session> {
    connect_with_config(target, &SessionConfig::default())
}

/// Open a session to `target` and run the handshake.
pub fn connect_with_config(target: &Target, config: &SessionConfig) -> Result<Session> {
    let mut session = Session::new(target.transport(config)?);
    let result = session.open()?;
    tracing::info!(%target, max_payload = result.max_payload_size, "session open");
    Ok(session)
}

/// Connect over a serial port given as `device[:baud]`.
pub fn connect_serial(device: &str, config: &SessionConfig) -> Result<Session> {
    connect_with_config(&Target::Serial(device.to_string()), config)
}

/// Connect over UDP given as `host[:port]`.
pub fn connect_ip(host: &str, config: &SessionConfig) -> Result<Session> {
    connect_with_config(&Target::Ip(host.to_string()), config)
}

#[cfg(test)]
mod tests {
    use udo_transport::Protocol;

    use super::*;

    #[test]
    fn parses_targets() {
        assert_eq!(
            "serial:ttyACM0:115200".parse::<Target>().unwrap(),
            Target::Serial("ttyACM0:115200".to_string())
        );
        assert_eq!(
            "ip:192.168.1.10".parse::<Target>().unwrap(),
            Target::Ip("192.168.1.10".to_string())
        );
        assert!("tcp:host".parse::<Target>().is_err());
        assert!("serial:".parse::<Target>().is_err());
        assert!("ttyUSB0".parse::<Target>().is_err());
    }

    #[test]
    fn target_display_round_trips() {
        let target = Target::Ip("10.0.0.2:1221".to_string());
        assert_eq!(target.to_string(), "ip:10.0.0.2:1221");
        assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
    }

    #[test]
    fn builds_unopened_transports() {
        let config = SessionConfig::default();
        let serial = Target::Serial("ttyUSB0".to_string())
            .transport(&config)
            .unwrap();
        assert_eq!(serial.protocol(), Protocol::Serial);
        assert!(!serial.is_open());

        let ip = Target::Ip("127.0.0.1".to_string())
            .transport(&config)
            .unwrap();
        assert_eq!(ip.protocol(), Protocol::Ip);
        assert!(!ip.is_open());

        assert!(Target::Ip("127.0.0.1:notaport".to_string())
            .transport(&config)
            .is_err());
    }
}
