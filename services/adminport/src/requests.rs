//! Form-encoded request and response bodies.
//!
//! The admin surface speaks `application/x-www-form-urlencoded` both ways,
//! except for statistics which leave as JSON. Settings keys are translated
//! between their REST spelling and the internal spelling here, and values
//! are coerced to their declared types.

use crate::error::{AdminError, AdminResult};
use config::replication::{self, rest_keys};
use config::{SettingValue, SettingsMap};
use url::form_urlencoded;

// Parameters of a create-replication request that are not settings.
pub const FROM_BUCKET: &str = "fromBucket";
pub const TO_CLUSTER_UUID: &str = "uuid";
pub const TO_BUCKET: &str = "toBucket";
pub const FILTER_NAME: &str = "filterName";
pub const FORWARD: &str = "forward";

/// Key of the create-replication response body.
pub const REPLICATION_ID: &str = "id";

/// Decoded create-replication request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateReplicationRequest {
    pub from_bucket: String,
    pub to_cluster_uuid: String,
    pub to_bucket: String,
    pub filter_name: Option<String>,
    pub forward: bool,
    pub settings: SettingsMap,
}

/// Parse a form-encoded body into key/value pairs.
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body).into_owned().collect()
}

/// Decode the parameters of a create-replication request.
pub fn decode_create_replication(body: &[u8]) -> AdminResult<CreateReplicationRequest> {
    let form = parse_form(body);

    let mut from_bucket = String::new();
    let mut to_cluster_uuid = String::new();
    let mut to_bucket = String::new();
    let mut filter_name = None;
    // forward defaults to true if not specified
    let mut forward = true;

    for (key, value) in &form {
        match key.as_str() {
            FROM_BUCKET => from_bucket = value.clone(),
            TO_CLUSTER_UUID => to_cluster_uuid = value.clone(),
            TO_BUCKET => to_bucket = value.clone(),
            FILTER_NAME => filter_name = Some(value.clone()),
            FORWARD => forward = parse_bool(key, value)?,
            other => {
                // other keys must be replication settings
                if replication::rest_to_internal(other).is_none() {
                    return Err(AdminError::invalid_parameter(other));
                }
            }
        }
    }

    let mut missing = Vec::new();
    if from_bucket.is_empty() {
        missing.push(FROM_BUCKET.to_string());
    }
    if to_cluster_uuid.is_empty() {
        missing.push(TO_CLUSTER_UUID.to_string());
    }
    if to_bucket.is_empty() {
        missing.push(TO_BUCKET.to_string());
    }
    if !missing.is_empty() {
        return Err(AdminError::MissingParameters { params: missing });
    }

    let settings = decode_settings(&form, false)?;

    Ok(CreateReplicationRequest {
        from_bucket,
        to_cluster_uuid,
        to_bucket,
        filter_name,
        forward,
        settings,
    })
}

/// Decode the forward flag from an id-scoped request body (delete, pause,
/// resume). Any other parameter is rejected.
pub fn decode_forward_flag(body: &[u8]) -> AdminResult<bool> {
    // forward defaults to true if not specified
    let mut forward = true;
    for (key, value) in parse_form(body) {
        match key.as_str() {
            FORWARD => forward = parse_bool(&key, &value)?,
            other => return Err(AdminError::invalid_parameter(other)),
        }
    }
    Ok(forward)
}

/// Decode replication settings from a parsed form.
///
/// With `strict` set, unknown keys are rejected and an empty settings set is
/// an error; create-replication decoding is lenient because non-setting
/// parameters share the form.
pub fn decode_settings(form: &[(String, String)], strict: bool) -> AdminResult<SettingsMap> {
    let mut settings = SettingsMap::new();

    for (key, value) in form {
        let (key, value) = (key.as_str(), value.as_str());
        let Some(internal_key) = replication::rest_to_internal(key) else {
            if strict {
                return Err(AdminError::invalid_parameter(key));
            }
            continue;
        };

        let decoded = if key == rest_keys::FILTER_EXPRESSION {
            replication::verify_filter_expression(value).map_err(|err| {
                AdminError::InvalidFilterExpression {
                    reason: format!("{value}: {err}"),
                }
            })?;
            SettingValue::Str(value.to_string())
        } else if key == rest_keys::ACTIVE {
            SettingValue::Bool(parse_bool(key, value)?)
        } else if replication::is_int_setting(key) {
            let parsed: i64 = value
                .parse()
                .map_err(|_| AdminError::invalid_value(key, value))?;
            SettingValue::Int(parsed)
        } else {
            SettingValue::Str(value.to_string())
        };

        settings.insert(internal_key.to_string(), decoded);
    }

    if settings.is_empty() && strict {
        return Err(AdminError::MissingSettings);
    }

    tracing::debug!(num_settings = settings.len(), "settings decoded from request");
    Ok(settings)
}

/// Encode key/value data as a form body; the success body of most admin
/// responses.
pub fn encode_form(pairs: &[(String, String)]) -> Vec<u8> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish().into_bytes()
}

/// Body of a successful create-replication response.
pub fn encode_create_replication_response(replication_id: &str) -> Vec<u8> {
    encode_form(&[(REPLICATION_ID.to_string(), replication_id.to_string())])
}

/// Render a settings map with REST key spellings for a view response.
pub fn settings_to_rest_pairs(settings: &SettingsMap) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = settings
        .iter()
        .filter_map(|(key, value)| {
            replication::internal_to_rest(key).map(|rest| (rest.to_string(), value.to_string()))
        })
        .collect();
    pairs.sort();
    pairs
}

fn parse_bool(key: &str, value: &str) -> AdminResult<bool> {
    value
        .parse()
        .map_err(|_| AdminError::invalid_value(key, value))
}
