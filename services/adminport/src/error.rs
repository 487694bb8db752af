//! Admin-port error taxonomy.

use pipeline_actors::ActorError;
use thiserror::Error;

pub type AdminResult<T> = Result<T, AdminError>;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid path, {path}, in http request.")]
    InvalidPath { path: String },

    #[error("Invalid parameter, {key}, in http request.")]
    InvalidParameter { key: String },

    #[error("Invalid value, {value}, for parameter, {key}, in http request.")]
    InvalidValue { key: String, value: String },

    #[error("Parameters, {}, are missing in http request.", params.join(", "))]
    MissingParameters { params: Vec<String> },

    #[error("Replication id is missing from request url, {path}.")]
    MissingReplicationId { path: String },

    #[error("Invalid http request. No replication setting parameters have been supplied.")]
    MissingSettings,

    #[error("Replication {id} does not exist")]
    UnknownReplication { id: String },

    #[error("Replication {id} already exists")]
    DuplicateReplication { id: String },

    #[error("Invalid filter expression: {reason}")]
    InvalidFilterExpression { reason: String },

    #[error(transparent)]
    Settings(#[from] config::SettingsError),

    #[error(transparent)]
    Pipeline(#[from] ActorError),

    #[error("Error forwarding request after max retry")]
    ForwardingFailed,
}

impl AdminError {
    pub fn invalid_parameter(key: impl Into<String>) -> Self {
        AdminError::InvalidParameter { key: key.into() }
    }

    pub fn invalid_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        AdminError::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Client errors map to 400; everything else is the node's fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AdminError::Pipeline(_) | AdminError::ForwardingFailed
        )
    }
}
