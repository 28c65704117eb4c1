use std::{env, fmt::Display, str::FromStr};

use log::*;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads and parses the environment variable `name`. Missing or unparseable values fall back to `default`, with a log
/// entry saying so.
pub fn parse_env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value '{s}' for {name}. {e}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("Yes".into()), false));
        assert!(!parse_boolean_flag(Some(" off ".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn env_parsing_falls_back() {
        env::set_var("FMP_COMMON_TEST_NUMBER", "42");
        env::set_var("FMP_COMMON_TEST_GARBAGE", "forty-two");
        assert_eq!(parse_env_or_default("FMP_COMMON_TEST_NUMBER", 7u32), 42);
        assert_eq!(parse_env_or_default("FMP_COMMON_TEST_GARBAGE", 7u32), 7);
        assert_eq!(parse_env_or_default("FMP_COMMON_TEST_MISSING", 7u32), 7);
    }
}
