//! Replication settings vocabulary.
//!
//! The admin REST surface and the internal pipeline layer name the same
//! settings differently; the tables here are the single mapping between the
//! two. Defaults are applied to a create-replication request before the
//! pipeline is assembled, so every replication runs with a fully populated
//! settings map.

use crate::settings::{SettingDefinitions, SettingKind, SettingsMap};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Internal settings keys, as stored in replication specifications and
/// consumed by pipeline parts.
pub mod keys {
    pub const REPLICATION_TYPE: &str = "replication_type";
    pub const FILTER_EXPRESSION: &str = "filter_expression";
    pub const ACTIVE: &str = "active";
    pub const CHECKPOINT_INTERVAL: &str = "checkpoint_interval";
    pub const WORKER_BATCH_SIZE: &str = "worker_batch_size";
    pub const DOC_BATCH_SIZE_KB: &str = "doc_batch_size_kb";
    pub const FAILURE_RESTART_INTERVAL: &str = "failure_restart_interval";
    pub const OPTIMISTIC_REPLICATION_THRESHOLD: &str = "optimistic_replication_threshold";
    pub const HTTP_CONNECTIONS: &str = "http_connections";
    pub const SOURCE_NOZZLE_PER_NODE: &str = "source_nozzle_per_node";
    pub const TARGET_NOZZLE_PER_NODE: &str = "target_nozzle_per_node";
    pub const MAX_EXPECTED_REPLICATION_LAG: &str = "max_expected_replication_lag";
    pub const TIMEOUT_PERCENTAGE_CAP: &str = "timeout_percentage_cap";
    pub const LOG_LEVEL: &str = "log_level";
}

/// Settings keys as they appear on the admin REST surface.
pub mod rest_keys {
    pub const REPLICATION_TYPE: &str = "replicationType";
    pub const FILTER_EXPRESSION: &str = "filterExpression";
    pub const ACTIVE: &str = "active";
    pub const CHECKPOINT_INTERVAL: &str = "checkpointInterval";
    pub const WORKER_BATCH_SIZE: &str = "workerBatchSize";
    pub const DOC_BATCH_SIZE_KB: &str = "docBatchSizeKb";
    pub const FAILURE_RESTART_INTERVAL: &str = "failureRestartInterval";
    pub const OPTIMISTIC_REPLICATION_THRESHOLD: &str = "optimisticReplicationThreshold";
    pub const HTTP_CONNECTIONS: &str = "httpConnections";
    pub const SOURCE_NOZZLE_PER_NODE: &str = "sourceNozzlePerNode";
    pub const TARGET_NOZZLE_PER_NODE: &str = "targetNozzlePerNode";
    pub const MAX_EXPECTED_REPLICATION_LAG: &str = "maxExpectedReplicationLag";
    pub const TIMEOUT_PERCENTAGE_CAP: &str = "timeoutPercentageCap";
    pub const LOG_LEVEL: &str = "logLevel";
}

/// REST settings key -> internal settings key.
static REST_TO_INTERNAL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (rest_keys::REPLICATION_TYPE, keys::REPLICATION_TYPE),
        (rest_keys::FILTER_EXPRESSION, keys::FILTER_EXPRESSION),
        (rest_keys::ACTIVE, keys::ACTIVE),
        (rest_keys::CHECKPOINT_INTERVAL, keys::CHECKPOINT_INTERVAL),
        (rest_keys::WORKER_BATCH_SIZE, keys::WORKER_BATCH_SIZE),
        (rest_keys::DOC_BATCH_SIZE_KB, keys::DOC_BATCH_SIZE_KB),
        (rest_keys::FAILURE_RESTART_INTERVAL, keys::FAILURE_RESTART_INTERVAL),
        (
            rest_keys::OPTIMISTIC_REPLICATION_THRESHOLD,
            keys::OPTIMISTIC_REPLICATION_THRESHOLD,
        ),
        (rest_keys::HTTP_CONNECTIONS, keys::HTTP_CONNECTIONS),
        (rest_keys::SOURCE_NOZZLE_PER_NODE, keys::SOURCE_NOZZLE_PER_NODE),
        (rest_keys::TARGET_NOZZLE_PER_NODE, keys::TARGET_NOZZLE_PER_NODE),
        (
            rest_keys::MAX_EXPECTED_REPLICATION_LAG,
            keys::MAX_EXPECTED_REPLICATION_LAG,
        ),
        (rest_keys::TIMEOUT_PERCENTAGE_CAP, keys::TIMEOUT_PERCENTAGE_CAP),
        (rest_keys::LOG_LEVEL, keys::LOG_LEVEL),
    ])
});

/// Internal settings key -> REST settings key.
static INTERNAL_TO_REST: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| REST_TO_INTERNAL.iter().map(|(rest, internal)| (*internal, *rest)).collect());

pub fn rest_to_internal(rest_key: &str) -> Option<&'static str> {
    REST_TO_INTERNAL.get(rest_key).copied()
}

pub fn internal_to_rest(internal_key: &str) -> Option<&'static str> {
    INTERNAL_TO_REST.get(internal_key).copied()
}

/// True when the REST key carries an integer-valued setting.
pub fn is_int_setting(rest_key: &str) -> bool {
    matches!(
        rest_key,
        rest_keys::CHECKPOINT_INTERVAL
            | rest_keys::WORKER_BATCH_SIZE
            | rest_keys::DOC_BATCH_SIZE_KB
            | rest_keys::FAILURE_RESTART_INTERVAL
            | rest_keys::OPTIMISTIC_REPLICATION_THRESHOLD
            | rest_keys::HTTP_CONNECTIONS
            | rest_keys::SOURCE_NOZZLE_PER_NODE
            | rest_keys::TARGET_NOZZLE_PER_NODE
            | rest_keys::MAX_EXPECTED_REPLICATION_LAG
            | rest_keys::TIMEOUT_PERCENTAGE_CAP
    )
}

/// Definitions a replication settings map is validated against.
pub fn definitions() -> SettingDefinitions {
    SettingDefinitions::new()
        .define(keys::REPLICATION_TYPE, SettingKind::Str, false)
        .define(keys::FILTER_EXPRESSION, SettingKind::Str, false)
        .define(keys::ACTIVE, SettingKind::Bool, false)
        .define(keys::CHECKPOINT_INTERVAL, SettingKind::Int, false)
        .define(keys::WORKER_BATCH_SIZE, SettingKind::Int, false)
        .define(keys::DOC_BATCH_SIZE_KB, SettingKind::Int, false)
        .define(keys::FAILURE_RESTART_INTERVAL, SettingKind::Int, false)
        .define(keys::OPTIMISTIC_REPLICATION_THRESHOLD, SettingKind::Int, false)
        .define(keys::HTTP_CONNECTIONS, SettingKind::Int, false)
        .define(keys::SOURCE_NOZZLE_PER_NODE, SettingKind::Int, false)
        .define(keys::TARGET_NOZZLE_PER_NODE, SettingKind::Int, false)
        .define(keys::MAX_EXPECTED_REPLICATION_LAG, SettingKind::Int, false)
        .define(keys::TIMEOUT_PERCENTAGE_CAP, SettingKind::Int, false)
        .define(keys::LOG_LEVEL, SettingKind::Str, false)
}

/// Default settings for a newly created replication.
pub fn default_settings() -> SettingsMap {
    let mut settings = SettingsMap::new();
    settings.insert(keys::REPLICATION_TYPE.to_string(), "continuous".into());
    settings.insert(keys::ACTIVE.to_string(), true.into());
    settings.insert(keys::CHECKPOINT_INTERVAL.to_string(), 1800.into());
    settings.insert(keys::WORKER_BATCH_SIZE.to_string(), 500.into());
    settings.insert(keys::DOC_BATCH_SIZE_KB.to_string(), 2048.into());
    settings.insert(keys::FAILURE_RESTART_INTERVAL.to_string(), 30.into());
    settings.insert(keys::OPTIMISTIC_REPLICATION_THRESHOLD.to_string(), 256.into());
    settings.insert(keys::HTTP_CONNECTIONS.to_string(), 20.into());
    settings.insert(keys::SOURCE_NOZZLE_PER_NODE.to_string(), 2.into());
    settings.insert(keys::TARGET_NOZZLE_PER_NODE.to_string(), 2.into());
    settings.insert(keys::MAX_EXPECTED_REPLICATION_LAG.to_string(), 1000.into());
    settings.insert(keys::TIMEOUT_PERCENTAGE_CAP.to_string(), 80.into());
    settings.insert(keys::LOG_LEVEL.to_string(), "info".into());
    settings
}

/// Fill in defaults for any setting the request did not specify explicitly.
pub fn apply_default_settings(settings: &mut SettingsMap) {
    for (key, val) in default_settings() {
        settings.entry(key).or_insert(val);
    }
}

/// A filter expression must compile as a regular expression.
pub fn verify_filter_expression(expression: &str) -> Result<(), regex::Error> {
    regex::Regex::new(expression).map(|_| ())
}
