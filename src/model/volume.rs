//! Volume and restart-policy specifications, both of which support a
//! short string form alongside a long dict form.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    Ro,
    Rw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub target: String,
    pub mode: MountMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawVolume {
    /// `"host: container"` (mode defaults to rw).
    Short(String),
    Long {
        target: String,
        #[serde(default = "default_rw")]
        mode: String,
    },
}

fn default_rw() -> String {
    "rw".to_string()
}

impl RawVolume {
    pub fn into_binding(self) -> Result<(String, VolumeBinding), String> {
        match self {
            RawVolume::Short(s) => {
                let (host, container) = s
                    .split_once(':')
                    .ok_or_else(|| format!("malformed volume short-form '{s}', expected 'host: container'"))?;
                Ok((
                    host.trim().to_string(),
                    VolumeBinding {
                        target: container.trim().to_string(),
                        mode: MountMode::Rw,
                    },
                ))
            }
            RawVolume::Long { .. } => {
                unreachable!("long form volumes are keyed by host path in the surrounding map")
            }
        }
    }

    pub fn mode(&self) -> Result<MountMode, String> {
        match self {
            RawVolume::Short(_) => Ok(MountMode::Rw),
            RawVolume::Long { mode, .. } => match mode.as_str() {
                "ro" => Ok(MountMode::Ro),
                "rw" => Ok(MountMode::Rw),
                other => Err(format!("invalid volume mode '{other}', expected ro or rw")),
            },
        }
    }

    pub fn target(&self) -> Result<String, String> {
        match self {
            RawVolume::Short(s) => {
                let (_, container) = s
                    .split_once(':')
                    .ok_or_else(|| format!("malformed volume short-form '{s}'"))?;
                Ok(container.trim().to_string())
            }
            RawVolume::Long { target, .. } => Ok(target.clone()),
        }
    }
}

/// Restart policy, supporting `"name[:N]"` short form and the long dict
/// form `{name, maximum_retry_count}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub name: String,
    pub maximum_retry_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRestartPolicy {
    Short(String),
    Long {
        name: String,
        maximum_retry_count: Option<u32>,
    },
}

impl RawRestartPolicy {
    pub fn into_policy(self) -> RestartPolicy {
        match self {
            RawRestartPolicy::Short(s) => {
                if let Some((name, n)) = s.split_once(':') {
                    RestartPolicy {
                        name: name.to_string(),
                        maximum_retry_count: n.parse().ok(),
                    }
                } else {
                    RestartPolicy {
                        name: s,
                        maximum_retry_count: None,
                    }
                }
            }
            RawRestartPolicy::Long {
                name,
                maximum_retry_count,
            } => RestartPolicy {
                name,
                maximum_retry_count,
            },
        }
    }

    pub fn serialize(policy: &RestartPolicy) -> String {
        match policy.maximum_retry_count {
            Some(n) => format!("{}:{}", policy.name, n),
            None => policy.name.clone(),
        }
    }
}

/// Parse a byte-size string with an optional `k`/`m`/`g` suffix
/// (case-insensitive) into a byte count. Bare integers are bytes.
pub fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty byte size".to_string());
    }

    let (number_part, multiplier) = match s.chars().last().unwrap().to_ascii_lowercase() {
        'k' => (&s[..s.len() - 1], 1024u64),
        'm' => (&s[..s.len() - 1], 1024 * 1024),
        'g' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };

    let number: f64 = number_part
        .trim()
        .parse()
        .map_err(|_| format!("malformed byte size '{s}'"))?;

    if number < 0.0 {
        return Err(format!("negative byte size '{s}'"));
    }

    Ok((number * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_suffixes_are_case_insensitive() {
        assert_eq!(parse_byte_size("1g").unwrap(), parse_byte_size("1G").unwrap());
        assert_eq!(parse_byte_size("1g").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_byte_size("500m").unwrap(), 524_288_000);
    }

    #[test]
    fn byte_size_bare_number_is_bytes() {
        assert_eq!(parse_byte_size("2048").unwrap(), 2048);
    }

    #[test]
    fn byte_size_malformed_is_an_error() {
        assert!(parse_byte_size("lots").is_err());
        assert!(parse_byte_size("").is_err());
    }

    #[test]
    fn restart_policy_round_trips_short_form() {
        let raw = RawRestartPolicy::Short("on-failure:5".to_string());
        let policy = raw.into_policy();
        assert_eq!(policy.name, "on-failure");
        assert_eq!(policy.maximum_retry_count, Some(5));
        assert_eq!(RawRestartPolicy::serialize(&policy), "on-failure:5");
    }

    #[test]
    fn volume_short_form_parses_host_and_target() {
        let raw = RawVolume::Short("/data: /srv/data".to_string());
        let (host, binding) = raw.into_binding().unwrap();
        assert_eq!(host, "/data");
        assert_eq!(binding.target, "/srv/data");
        assert_eq!(binding.mode, MountMode::Rw);
    }
}
