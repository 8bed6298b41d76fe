//! `cachesync settings get|set`.

use anyhow::{bail, Result};
use cachesync_core::settings::SettingsStore;
use serde_json::Value;

use crate::cli::SettingsAction;

pub fn run_settings(action: SettingsAction) -> Result<()> {
    let store = SettingsStore::open_default()?;
    match action {
        SettingsAction::Get { key } => match store.get_raw(&key) {
            Some(value) => println!("{}", value),
            None => bail!("setting {:?} is not set ({})", key, store.path().display()),
        },
        SettingsAction::Set { key, value } => {
            let parsed = parse_value(&value);
            println!("{} = {}", key, parsed);
            store.set(&key, parsed);
        }
    }
    Ok(())
}

/// JSON when it parses (`true`, `4`, `"x"`), otherwise the raw text as a string.
pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_as_json_first() {
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("4"), serde_json::json!(4));
        assert_eq!(parse_value("\"quoted\""), Value::String("quoted".into()));
        assert_eq!(parse_value("plain text"), Value::String("plain text".into()));
    }
}
