use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

const NANOS_PER_HOUR: u128 = 3_600_000_000_000;
const NANOS_PER_MINUTE: u128 = 60_000_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_MICRO: u128 = 1_000;

/// Duration that persists as a compact human-readable string ("5m", "1h30m",
/// "50ms") and reads back either that form or a plain nanosecond count.
/// A JSON/YAML null reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub const ZERO: HumanDuration = HumanDuration(Duration::ZERO);

    pub fn new(inner: Duration) -> Self {
        Self(inner)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn encode(self) -> String {
        let mut nanos = self.0.as_nanos();
        if nanos == 0 {
            return "0s".to_string();
        }

        let mut out = String::new();
        for (unit_nanos, suffix) in [
            (NANOS_PER_HOUR, "h"),
            (NANOS_PER_MINUTE, "m"),
            (NANOS_PER_SECOND, "s"),
            (NANOS_PER_MILLI, "ms"),
            (NANOS_PER_MICRO, "us"),
            (1, "ns"),
        ] {
            let count = nanos / unit_nanos;
            if count > 0 {
                out.push_str(&count.to_string());
                out.push_str(suffix);
                nanos %= unit_nanos;
            }
        }
        out
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("duration is empty".to_string());
        }

        let bytes = trimmed.as_bytes();
        let mut index = 0;
        let mut total_nanos: u128 = 0;

        while index < bytes.len() {
            let digits_start = index;
            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }
            if index == digits_start {
                return Err(format!("invalid duration `{trimmed}`: expected a number"));
            }
            let whole: u128 = trimmed[digits_start..index]
                .parse()
                .map_err(|_| format!("invalid duration `{trimmed}`: number out of range"))?;

            let mut frac_digits = "";
            if index < bytes.len() && bytes[index] == b'.' {
                index += 1;
                let frac_start = index;
                while index < bytes.len() && bytes[index].is_ascii_digit() {
                    index += 1;
                }
                if index == frac_start {
                    return Err(format!("invalid duration `{trimmed}`: dangling decimal point"));
                }
                frac_digits = &trimmed[frac_start..index];
            }

            let unit_start = index;
            while index < bytes.len() && bytes[index].is_ascii_alphabetic() {
                index += 1;
            }
            let unit_nanos = match &trimmed[unit_start..index] {
                "h" => NANOS_PER_HOUR,
                "m" => NANOS_PER_MINUTE,
                "s" => NANOS_PER_SECOND,
                "ms" => NANOS_PER_MILLI,
                "us" => NANOS_PER_MICRO,
                "ns" => 1,
                other => {
                    return Err(format!("invalid duration `{trimmed}`: unknown unit `{other}`"));
                }
            };

            total_nanos = total_nanos
                .checked_add(whole.checked_mul(unit_nanos).ok_or("duration overflow")?)
                .ok_or("duration overflow")?;

            if !frac_digits.is_empty() {
                let mut frac_nanos: u128 = 0;
                let mut scale = unit_nanos;
                for digit in frac_digits.bytes() {
                    scale /= 10;
                    frac_nanos += u128::from(digit - b'0') * scale;
                }
                total_nanos = total_nanos.checked_add(frac_nanos).ok_or("duration overflow")?;
            }
        }

        Ok(Self(nanos_to_duration(total_nanos)?))
    }
}

fn nanos_to_duration(nanos: u128) -> Result<Duration, String> {
    let secs = u64::try_from(nanos / NANOS_PER_SECOND).map_err(|_| "duration overflow")?;
    let subsec = (nanos % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, subsec))
}

impl From<Duration> for HumanDuration {
    fn from(inner: Duration) -> Self {
        Self(inner)
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.encode())
    }
}

struct HumanDurationVisitor;

impl<'de> Visitor<'de> for HumanDurationVisitor {
    type Value = HumanDuration;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a duration string, a nanosecond count, or null")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        HumanDuration::parse(value).map_err(E::custom)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        nanos_to_duration(u128::from(value))
            .map(HumanDuration)
            .map_err(E::custom)
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if value < 0 {
            return Err(E::custom("duration must not be negative"));
        }
        self.visit_u64(value as u64)
    }

    fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if value < 0.0 || !value.is_finite() {
            return Err(E::custom("duration must be a non-negative nanosecond count"));
        }
        nanos_to_duration(value as u128)
            .map(HumanDuration)
            .map_err(E::custom)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(HumanDuration::ZERO)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(HumanDuration::ZERO)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanDurationVisitor)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(HumanDurationVisitor)
    }
}
