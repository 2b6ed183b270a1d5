//! Configuration validation.
//!
//! Validates config fields before any file is read or written.

use crate::domain::error::SigstatsError;
use crate::domain::filter;
use crate::domain::ranking::SortDirection;
use crate::ports::config_port::{parse_bool, ConfigPort};
use chrono::DateTime;

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    validate_input_path(config)?;
    validate_analysis_options(config)
}

/// Every `[analysis]` check except the input path, for runs that take the
/// input from the command line.
pub fn validate_analysis_options(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    validate_prune(config)?;
    bool_value(config, "analysis", "pretty")?;
    validate_field_names(config)?;
    validate_sort_direction(config)?;
    validate_filter(config)?;
    Ok(())
}

pub fn validate_store_config(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    require(config, "store", "path")?;
    if int_value(config, "store", "pool_size", 4)? < 1 {
        return Err(invalid("store", "pool_size", "pool_size must be at least 1"));
    }
    if let Some(collection) = config.get_string("store", "collection") {
        if !is_collection_name(&collection) {
            return Err(invalid(
                "store",
                "collection",
                "collection must start with a letter and contain only ASCII letters, digits, or underscores",
            ));
        }
    }
    Ok(())
}

pub fn validate_seed_config(config: &dyn ConfigPort, from_cache: bool) -> Result<(), SigstatsError> {
    if from_cache {
        require(config, "seed", "price_cache_path")?;
    } else {
        require(config, "seed", "symbols_path")?;
    }
    if let Some(stamp) = config.get_string("seed", "last_updated") {
        if DateTime::parse_from_rfc3339(&stamp).is_err() {
            return Err(invalid(
                "seed",
                "last_updated",
                "invalid timestamp (expected RFC 3339, e.g. 1990-01-01T00:00:00.000Z)",
            ));
        }
    }
    Ok(())
}

pub fn validate_classifier_config(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    let test_size = float_value(config, "classifier", "test_size", 0.3)?;
    if test_size <= 0.0 || test_size >= 1.0 {
        return Err(invalid(
            "classifier",
            "test_size",
            "test_size must be between 0 and 1",
        ));
    }
    for key in ["hidden_units", "epochs", "batch_size"] {
        if int_value(config, "classifier", key, 1)? < 1 {
            return Err(invalid("classifier", key, &format!("{} must be at least 1", key)));
        }
    }
    if int_value(config, "classifier", "seed", 42)? < 0 {
        return Err(invalid("classifier", "seed", "seed must be non-negative"));
    }
    if float_value(config, "classifier", "learning_rate", 0.001)? <= 0.0 {
        return Err(invalid(
            "classifier",
            "learning_rate",
            "learning_rate must be positive",
        ));
    }
    Ok(())
}

fn validate_input_path(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    let path = require(config, "analysis", "input_path")?;
    if path.trim().is_empty() {
        return Err(invalid("analysis", "input_path", "input_path must not be empty"));
    }
    Ok(())
}

fn validate_prune(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    if int_value(config, "analysis", "prune", 0)? < 0 {
        return Err(invalid(
            "analysis",
            "prune",
            "prune must be non-negative (0 keeps everything)",
        ));
    }
    Ok(())
}

fn validate_field_names(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    for key in ["profit_field", "sort_field"] {
        if let Some(name) = config.get_string("analysis", key) {
            if !is_identifier(&name) {
                return Err(invalid(
                    "analysis",
                    key,
                    &format!("'{}' is not a valid field name", name),
                ));
            }
        }
    }
    for key in ["describe_fields", "strategy_keys"] {
        if let Some(names) = config.get_list("analysis", key) {
            if let Some(bad) = names.iter().find(|n| !is_identifier(n)) {
                return Err(invalid(
                    "analysis",
                    key,
                    &format!("'{}' is not a valid field name", bad),
                ));
            }
        }
    }
    Ok(())
}

fn validate_sort_direction(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    if let Some(dir) = config.get_string("analysis", "sort_direction") {
        dir.parse::<SortDirection>()
            .map_err(|reason| invalid("analysis", "sort_direction", &reason))?;
    }
    Ok(())
}

fn validate_filter(config: &dyn ConfigPort) -> Result<(), SigstatsError> {
    if let Some(expr) = config
        .get_string("analysis", "filter")
        .filter(|s| !s.trim().is_empty())
    {
        filter::parse(&expr)?;
    }
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SigstatsError> {
    config
        .get_string(section, key)
        .ok_or_else(|| SigstatsError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// The key's integer value, `default` when absent. A present value that
/// does not parse is invalid rather than silently replaced.
fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, SigstatsError> {
    match config.get_string(section, key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{}' is not an integer", raw))),
        None => Ok(default),
    }
}

fn float_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, SigstatsError> {
    match config.get_string(section, key) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, &format!("'{}' is not a number", raw))),
        None => Ok(default),
    }
}

fn bool_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SigstatsError> {
    match config.get_string(section, key) {
        Some(raw) if parse_bool(&raw).is_none() => Err(invalid(
            section,
            key,
            &format!("'{}' is not a boolean (true/false, yes/no, 1/0)", raw),
        )),
        _ => Ok(()),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SigstatsError {
    SigstatsError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// A usable SQLite table name: ASCII, starts with a letter, and stays out of
/// the reserved `sqlite_` namespace.
pub fn is_collection_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.to_ascii_lowercase().starts_with("sqlite_")
}
