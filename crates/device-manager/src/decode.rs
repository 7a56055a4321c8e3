//! Request decoding: JSON bodies to key/value pairs, and single-letter line commands.

use crate::enumerate::HardwareQuery;
use crate::error::{DeviceError, Result};
use crate::listing::DisplayQuery;
use crate::update::DeviceUpdate;
use serde_json::Value;
use tracing::debug;

/// Flatten a JSON object body into string key/value pairs. Numbers, strings and
/// booleans (as `1`/`0`) are kept; nulls and nested values are dropped.
pub fn request_pairs(body: &str) -> Result<Vec<(String, String)>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let Value::Object(map) = serde_json::from_str::<Value>(body)? else {
        return Err(DeviceError::Request(format!("expected a JSON object, got {body}")));
    };
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => u8::from(b).to_string(),
            other => {
                debug!(key = %key, "ignoring non-scalar request value {other}");
                continue;
            }
        };
        pairs.push((key, text));
    }
    Ok(pairs)
}

/// A decoded protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `U{...}`: update a device definition.
    Update(DeviceUpdate),
    /// `d{...}`: list device slots.
    List(DisplayQuery),
    /// `h{...}`: enumerate attached hardware.
    Enumerate(HardwareQuery),
}

/// Parse one protocol line. Blank lines decode to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let mut chars = line.chars();
    let Some(letter) = chars.next() else {
        return Ok(None);
    };
    let pairs = request_pairs(chars.as_str())?;
    let command = match letter {
        'U' => Command::Update(DeviceUpdate::from_pairs(pairs)),
        'd' => Command::List(DisplayQuery::from_pairs(pairs)),
        'h' => Command::Enumerate(HardwareQuery::from_pairs(pairs)),
        other => return Err(DeviceError::Request(format!("unknown command '{other}'"))),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceHardware;

    #[test]
    fn numbers_strings_and_booleans_flatten() -> anyhow::Result<()> {
        let mut pairs = request_pairs(r#"{"i":0,"a":"28AABBCCDDEEFF00","x":true,"j":-0.25,"z":[1]}"#)?;
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "28AABBCCDDEEFF00".to_string()),
                ("i".to_string(), "0".to_string()),
                ("j".to_string(), "-0.25".to_string()),
                ("x".to_string(), "1".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn commands_dispatch_on_first_letter() -> anyhow::Result<()> {
        let Some(Command::Update(update)) = parse_command(r#"U{"i":3,"f":2,"p":"5"}"#)? else {
            anyhow::bail!("expected an update");
        };
        assert_eq!((update.slot, update.function, update.pin), (Some(3), Some(2), Some(5)));

        assert_eq!(
            parse_command("d")?,
            Some(Command::List(DisplayQuery::default()))
        );
        let Some(Command::Enumerate(query)) = parse_command(r#"h{"h":2,"v":1}"#)? else {
            anyhow::bail!("expected an enumeration");
        };
        assert_eq!(query.hardware, Some(DeviceHardware::OneWireTemp));
        assert!(query.values);
        assert_eq!(parse_command("   ")?, None);
        Ok(())
    }

    #[test]
    fn malformed_requests_are_errors() {
        assert!(matches!(parse_command("Q{}"), Err(DeviceError::Request(_))));
        assert!(matches!(parse_command("U{i:0"), Err(DeviceError::Json(_))));
        assert!(matches!(parse_command("d[1]"), Err(DeviceError::Request(_))));
    }
}
