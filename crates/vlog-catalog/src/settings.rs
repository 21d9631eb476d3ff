//! Settings service: typed, constrained, cached configuration (§4.8).
//!
//! Reads are cached with a TTL; writes invalidate the cache. A read miss
//! falls back to the env var named by [`vlog_models::setting::Setting::env_var_name`],
//! parsed with the setting's declared type; a parse failure yields the
//! caller-supplied default rather than an error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use vlog_models::setting::{Setting, SettingConstraints, SettingValue};

use crate::error::{CatalogError, CatalogResult};

pub struct SettingsService {
    pool: PgPool,
    cache: Mutex<HashMap<String, (Setting, Instant)>>,
    cache_ttl: StdDuration,
}

#[derive(FromRow)]
struct SettingRow {
    key: String,
    category: String,
    value: Value,
    constraints: Value,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

impl SettingRow {
    fn into_setting(self) -> CatalogResult<Setting> {
        Ok(Setting {
            key: self.key,
            value: serde_json::from_value(self.value)?,
            category: self.category,
            constraints: serde_json::from_value(self.constraints)?,
            updated_at: self.updated_at,
            updated_by: self.updated_by,
        })
    }
}

/// Validates `value` against `constraints`. Returns a descriptive
/// [`CatalogError::Validation`] on the first violated rule.
pub fn validate_constraints(value: &SettingValue, constraints: &SettingConstraints) -> CatalogResult<()> {
    match value {
        SettingValue::Int(n) => {
            let n = *n as f64;
            if let Some(min) = constraints.min {
                if n < min {
                    return Err(CatalogError::validation(format!("value {n} below minimum {min}")));
                }
            }
            if let Some(max) = constraints.max {
                if n > max {
                    return Err(CatalogError::validation(format!("value {n} above maximum {max}")));
                }
            }
        }
        SettingValue::Float(n) => {
            if let Some(min) = constraints.min {
                if *n < min {
                    return Err(CatalogError::validation(format!("value {n} below minimum {min}")));
                }
            }
            if let Some(max) = constraints.max {
                if *n > max {
                    return Err(CatalogError::validation(format!("value {n} above maximum {max}")));
                }
            }
        }
        SettingValue::String(s) | SettingValue::Enum(s) => {
            if let Some(min_len) = constraints.min_length {
                if s.len() < min_len {
                    return Err(CatalogError::validation("value shorter than min_length"));
                }
            }
            if let Some(max_len) = constraints.max_length {
                if s.len() > max_len {
                    return Err(CatalogError::validation("value longer than max_length"));
                }
            }
            if let Some(enum_values) = &constraints.enum_values {
                if matches!(value, SettingValue::Enum(_)) && !enum_values.iter().any(|v| v == s) {
                    return Err(CatalogError::validation(format!("{s} is not one of {enum_values:?}")));
                }
            }
            if let Some(pattern) = &constraints.pattern {
                let re = regex::Regex::new(pattern)
                    .map_err(|e| CatalogError::config_error(format!("invalid constraint pattern: {e}")))?;
                if !re.is_match(s) {
                    return Err(CatalogError::validation(format!("{s} does not match pattern {pattern}")));
                }
            }
        }
        SettingValue::Bool(_) | SettingValue::Json(_) => {}
    }
    Ok(())
}

impl SettingsService {
    pub fn new(pool: PgPool, cache_ttl: StdDuration) -> Self {
        Self { pool, cache: Mutex::new(HashMap::new()), cache_ttl }
    }

    pub async fn get(&self, key: &str) -> CatalogResult<Setting> {
        if let Some((setting, fetched_at)) = self.cache.lock().unwrap().get(key) {
            if fetched_at.elapsed() < self.cache_ttl {
                return Ok(setting.clone());
            }
        }

        let row: Option<SettingRow> = sqlx::query_as(
            "SELECT key, category, value, constraints, updated_at, updated_by FROM settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let setting = match row {
            Some(row) => row.into_setting()?,
            None => return Err(CatalogError::not_found(format!("setting {key}"))),
        };

        self.cache.lock().unwrap().insert(key.to_string(), (setting.clone(), Instant::now()));
        Ok(setting)
    }

    /// Reads `key`'s typed value via `extract`, falling back to
    /// `env_var_name` when the store has no row for it. `parse` converts
    /// the raw env string into the declared type; on a missing var or
    /// parse failure, `default` is returned instead of an error.
    pub async fn get_or_env<T>(
        &self,
        key: &str,
        env_var_name: &str,
        extract: impl Fn(&SettingValue) -> Option<T>,
        parse: impl Fn(&str) -> Option<T>,
        default: T,
    ) -> T {
        if let Ok(setting) = self.get(key).await {
            if let Some(value) = extract(&setting.value) {
                return value;
            }
        }
        std::env::var(env_var_name)
            .ok()
            .and_then(|raw| parse(&raw))
            .unwrap_or(default)
    }

    pub async fn set(&self, key: &str, value: SettingValue, updated_by: &str) -> CatalogResult<()> {
        let existing = self.get(key).await?;
        validate_constraints(&value, &existing.constraints)?;

        sqlx::query("UPDATE settings SET value = $1, updated_at = now(), updated_by = $2 WHERE key = $3")
            .bind(serde_json::to_value(&value)?)
            .bind(updated_by)
            .bind(key)
            .execute(&self.pool)
            .await?;

        self.cache.lock().unwrap().remove(key);
        Ok(())
    }

    pub async fn list_by_category(&self, category: &str) -> CatalogResult<Vec<Setting>> {
        let rows: Vec<SettingRow> = sqlx::query_as(
            "SELECT key, category, value, constraints, updated_at, updated_by FROM settings WHERE category = $1",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SettingRow::into_setting).collect()
    }

    /// Seeds a setting row if absent, used by `settings migrate-from-env`.
    pub async fn define_if_absent(
        &self,
        key: &str,
        category: &str,
        value: SettingValue,
        constraints: SettingConstraints,
    ) -> CatalogResult<()> {
        sqlx::query(
            "INSERT INTO settings (key, category, value, constraints) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(category)
        .bind(serde_json::to_value(&value)?)
        .bind(serde_json::to_value(&constraints)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_below_minimum_rejected() {
        let constraints = SettingConstraints { min: Some(1.0), ..Default::default() };
        assert!(validate_constraints(&SettingValue::Int(0), &constraints).is_err());
    }

    #[test]
    fn int_within_bounds_accepted() {
        let constraints = SettingConstraints { min: Some(1.0), max: Some(10.0), ..Default::default() };
        assert!(validate_constraints(&SettingValue::Int(5), &constraints).is_ok());
    }

    #[test]
    fn enum_value_must_be_in_allowed_set() {
        let constraints = SettingConstraints {
            enum_values: Some(vec!["480p".into(), "720p".into()]),
            ..Default::default()
        };
        assert!(validate_constraints(&SettingValue::Enum("1080p".into()), &constraints).is_err());
        assert!(validate_constraints(&SettingValue::Enum("720p".into()), &constraints).is_ok());
    }

    #[test]
    fn string_pattern_constraint() {
        let constraints = SettingConstraints { pattern: Some("^[a-z]+$".into()), ..Default::default() };
        assert!(validate_constraints(&SettingValue::String("abc".into()), &constraints).is_ok());
        assert!(validate_constraints(&SettingValue::String("ABC".into()), &constraints).is_err());
    }
}
