//! Duration serialization helpers for configuration files

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Helper for deserializing Duration from seconds
///
/// TOML configs specify timeouts in seconds, so we need
/// custom serde to convert from u64 seconds to Duration
pub mod duration_serde {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "duration_serde")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_from_seconds() {
        let holder: Holder = toml::from_str("timeout = 45").unwrap();
        assert_eq!(holder.timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_duration_to_seconds() {
        let holder = Holder {
            timeout: Duration::from_millis(12_900),
        };
        let text = toml::to_string(&holder).unwrap();
        assert_eq!(text.trim(), "timeout = 12");
    }
}
