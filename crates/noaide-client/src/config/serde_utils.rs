//! Shared serde helpers for configuration types

/// `Duration` as whole milliseconds.
///
/// Written as an integer; read from either an integer number of
/// milliseconds or a string with an `ms` or `s` suffix (`"500ms"`, `"30s"`).
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "noaide_client::config::serde_utils::duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(MillisVisitor)
    }

    struct MillisVisitor;

    impl<'de> Visitor<'de> for MillisVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("milliseconds as an integer, or a string like \"500ms\" or \"30s\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_millis(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_millis)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            let v = v.trim();
            let parsed = if let Some(ms) = v.strip_suffix("ms") {
                ms.trim().parse::<u64>().ok().map(Duration::from_millis)
            } else if let Some(secs) = v.strip_suffix('s') {
                secs.trim().parse::<u64>().ok().map(Duration::from_secs)
            } else {
                None
            };
            parsed.ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}
