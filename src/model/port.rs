//! Port specification parsing and canonicalization.

use serde::Deserialize;
use std::fmt;

/// Transport protocol for a port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(PortParseError::UnknownProtocol(other.to_string())),
        }
    }
}

/// A normalized port mapping: `(name, exposed, external, bind_addr)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub exposed_port: u16,
    pub exposed_proto: Protocol,
    pub external_port: u16,
    pub external_proto: Protocol,
    pub bind_addr: String,
}

impl PortSpec {
    /// Canonical long-form string, e.g. `"6379:6379/tcp"`.
    pub fn serialize(&self) -> String {
        if self.bind_addr == "0.0.0.0" {
            format!(
                "{}:{}/{}",
                self.exposed_port, self.external_port, self.external_proto
            )
        } else {
            format!(
                "{}:{}:{}/{}",
                self.bind_addr, self.exposed_port, self.external_port, self.external_proto
            )
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortParseError {
    #[error("unknown protocol '{0}', expected tcp or udp")]
    UnknownProtocol(String),
    #[error("invalid port number in '{0}'")]
    InvalidPort(String),
    #[error("exposed and external protocols disagree in '{0}'")]
    ProtocolMismatch(String),
    #[error("malformed port specification '{0}'")]
    Malformed(String),
}

/// Raw shape of a port entry as it can appear in YAML: a bare integer,
/// a string (`"N"`, `"N/udp"`, `"A:B"`), or a dict form with an
/// `external` side that may itself carry a bind address.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPort {
    Number(u16),
    Str(String),
    Dict {
        exposed: RawPortSide,
        external: RawExternal,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPortSide {
    Number(u16),
    Str(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawExternal {
    Plain(RawPortSide),
    /// `[bind_addr, port-spec]`
    WithBind(Vec<serde_yaml::Value>),
}

fn parse_side(raw: &RawPortSide) -> Result<(u16, Option<Protocol>), PortParseError> {
    match raw {
        RawPortSide::Number(n) => Ok((*n, None)),
        RawPortSide::Str(s) => parse_port_proto_str(s),
    }
}

fn parse_port_proto_str(s: &str) -> Result<(u16, Option<Protocol>), PortParseError> {
    if let Some((port, proto)) = s.split_once('/') {
        let port: u16 = port
            .parse()
            .map_err(|_| PortParseError::InvalidPort(s.to_string()))?;
        let proto: Protocol = proto.parse()?;
        Ok((port, Some(proto)))
    } else {
        let port: u16 = s
            .parse()
            .map_err(|_| PortParseError::InvalidPort(s.to_string()))?;
        Ok((port, None))
    }
}

/// Parse a raw port entry (keyed by its YAML-map name) into a canonical
/// `PortSpec`.
pub fn parse_port(name: &str, raw: &RawPort) -> Result<PortSpec, PortParseError> {
    match raw {
        RawPort::Number(n) => Ok(PortSpec {
            name: name.to_string(),
            exposed_port: *n,
            exposed_proto: Protocol::Tcp,
            external_port: *n,
            external_proto: Protocol::Tcp,
            bind_addr: "0.0.0.0".to_string(),
        }),
        RawPort::Str(s) => parse_port_str(name, s),
        RawPort::Dict { exposed, external } => {
            let (exposed_port, exposed_proto) = parse_side(exposed)?;
            let exposed_proto = exposed_proto.unwrap_or(Protocol::Tcp);

            let (external_port, external_proto, bind_addr) = match external {
                RawExternal::Plain(side) => {
                    let (port, proto) = parse_side(side)?;
                    (port, proto.unwrap_or(exposed_proto), "0.0.0.0".to_string())
                }
                RawExternal::WithBind(items) => {
                    if items.len() != 2 {
                        return Err(PortParseError::Malformed(format!(
                            "port '{name}' external binding must be [addr, port-spec]"
                        )));
                    }
                    let addr = items[0]
                        .as_str()
                        .ok_or_else(|| PortParseError::Malformed(name.to_string()))?
                        .to_string();
                    let port_spec = match &items[1] {
                        serde_yaml::Value::Number(n) => RawPortSide::Number(
                            n.as_u64()
                                .ok_or_else(|| PortParseError::Malformed(name.to_string()))?
                                as u16,
                        ),
                        serde_yaml::Value::String(s) => RawPortSide::Str(s.clone()),
                        _ => return Err(PortParseError::Malformed(name.to_string())),
                    };
                    let (port, proto) = parse_side(&port_spec)?;
                    (port, proto.unwrap_or(exposed_proto), addr)
                }
            };

            if exposed_proto != external_proto {
                return Err(PortParseError::ProtocolMismatch(name.to_string()));
            }

            Ok(PortSpec {
                name: name.to_string(),
                exposed_port,
                exposed_proto,
                external_port,
                external_proto,
                bind_addr,
            })
        }
    }
}

fn parse_port_str(name: &str, s: &str) -> Result<PortSpec, PortParseError> {
    // "A:B" possibly with a trailing "/proto"
    let (body, proto) = match s.split_once('/') {
        Some((b, p)) => (b, Some(p.parse::<Protocol>()?)),
        None => (s, None),
    };

    if let Some((a, b)) = body.split_once(':') {
        let exposed_port: u16 = a
            .parse()
            .map_err(|_| PortParseError::InvalidPort(s.to_string()))?;
        let external_port: u16 = b
            .parse()
            .map_err(|_| PortParseError::InvalidPort(s.to_string()))?;
        let proto = proto.unwrap_or(Protocol::Tcp);
        Ok(PortSpec {
            name: name.to_string(),
            exposed_port,
            exposed_proto: proto,
            external_port,
            external_proto: proto,
            bind_addr: "0.0.0.0".to_string(),
        })
    } else {
        let port: u16 = body
            .parse()
            .map_err(|_| PortParseError::InvalidPort(s.to_string()))?;
        let proto = proto.unwrap_or(Protocol::Tcp);
        Ok(PortSpec {
            name: name.to_string(),
            exposed_port: port,
            exposed_proto: proto,
            external_port: port,
            external_proto: proto,
            bind_addr: "0.0.0.0".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_defaults_to_tcp_both_sides() {
        let spec = parse_port("web", &RawPort::Number(8080)).unwrap();
        assert_eq!(spec.exposed_port, 8080);
        assert_eq!(spec.external_port, 8080);
        assert_eq!(spec.exposed_proto, Protocol::Tcp);
        assert_eq!(spec.bind_addr, "0.0.0.0");
    }

    #[test]
    fn udp_suffix_applies_to_both_sides() {
        let spec = parse_port("dns", &RawPort::Str("53/udp".to_string())).unwrap();
        assert_eq!(spec.exposed_proto, Protocol::Udp);
        assert_eq!(spec.external_proto, Protocol::Udp);
    }

    #[test]
    fn colon_form_splits_exposed_and_external() {
        let spec = parse_port("redis", &RawPort::Str("6379:16379".to_string())).unwrap();
        assert_eq!(spec.exposed_port, 6379);
        assert_eq!(spec.external_port, 16379);
    }

    #[test]
    fn mismatched_protocol_rejected() {
        let raw = RawPort::Dict {
            exposed: RawPortSide::Str("80/tcp".to_string()),
            external: RawExternal::Plain(RawPortSide::Str("80/udp".to_string())),
        };
        assert!(matches!(
            parse_port("web", &raw),
            Err(PortParseError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn round_trip_canonicalize_serialize() {
        let spec = parse_port("redis", &RawPort::Str("6379:6379".to_string())).unwrap();
        let serialized = spec.serialize();
        assert_eq!(serialized, "6379:6379/tcp");

        let reparsed = parse_port("redis", &RawPort::Str(serialized)).unwrap();
        assert_eq!(reparsed, spec);
    }
}
