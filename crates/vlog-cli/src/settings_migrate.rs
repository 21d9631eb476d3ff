//! `settings migrate-from-env`: reads the known setting keys' env-var
//! fallbacks and persists any that are set, so a deployment can move from
//! pure env-var configuration to the Catalog-backed settings table without
//! downtime. Runs against the Catalog directly — there is no Admin-API
//! equivalent because it is meant to run before the Coordinator is trusted
//! to be up.

use vlog_catalog::SettingsService;
use vlog_models::setting::{SettingConstraints, SettingValue};

struct KnownSetting {
    key: &'static str,
    category: &'static str,
    env_var: &'static str,
    default: SettingValue,
    constraints: SettingConstraints,
    parse: fn(&str) -> Option<SettingValue>,
}

fn known_settings() -> Vec<KnownSetting> {
    vec![
        KnownSetting {
            key: "transcode.min_ready_quality",
            category: "transcode",
            env_var: "MIN_READY_QUALITY",
            default: SettingValue::Enum("480p".to_string()),
            constraints: SettingConstraints {
                enum_values: Some(vec![
                    "360p".into(),
                    "480p".into(),
                    "720p".into(),
                    "1080p".into(),
                    "1440p".into(),
                    "2160p".into(),
                    "original".into(),
                ]),
                ..Default::default()
            },
            parse: |s| Some(SettingValue::Enum(s.to_string())),
        },
        KnownSetting {
            key: "transcoding.hls_segment_duration",
            category: "transcoding",
            env_var: "HLS_SEGMENT_DURATION",
            default: SettingValue::Int(6),
            constraints: SettingConstraints { min: Some(1.0), max: Some(30.0), ..Default::default() },
            parse: |s| s.parse::<i64>().ok().map(SettingValue::Int),
        },
    ]
}

/// Returns the number of settings migrated from an env var that was
/// actually set (settings already present are left untouched).
pub async fn migrate_from_env(settings: &SettingsService) -> Result<u32, crate::error::CliError> {
    let mut migrated = 0;
    for known in known_settings() {
        settings.define_if_absent(known.key, known.category, known.default.clone(), known.constraints.clone()).await?;

        if let Ok(raw) = std::env::var(known.env_var) {
            if let Some(value) = (known.parse)(&raw) {
                settings.set(known.key, value, "cli-migration").await?;
                migrated += 1;
            }
        }
    }
    Ok(migrated)
}
