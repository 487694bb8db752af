//! Request routing: url paths to admin commands.
//!
//! Some url paths are static; others carry a replication id suffix
//! (e.g. `settings/replications/<replication_id>`). A request resolves to a
//! [`RequestKey`] from the path shape plus the http method.

use crate::error::{AdminError, AdminResult};
use hyper::Method;

/// Admin url prefix every request path starts with.
pub const URL_PREFIX: &str = "/";

// Static paths
pub const CREATE_REPLICATION_PATH: &str = "controller/createReplication";
pub const STATISTICS_PATH: &str = "stats";

// Dynamic path prefixes, followed by "/<replication_id>"
pub const DELETE_REPLICATION_PREFIX: &str = "controller/cancelReplication";
pub const PAUSE_REPLICATION_PREFIX: &str = "controller/pauseReplication";
pub const RESUME_REPLICATION_PREFIX: &str = "controller/resumeReplication";
pub const SETTINGS_REPLICATIONS_PATH: &str = "settings/replications";

/// A decoded admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKey {
    CreateReplication,
    DeleteReplication { id: String },
    PauseReplication { id: String },
    ResumeReplication { id: String },
    ViewReplicationSettings { id: String },
    ChangeReplicationSettings { id: String },
    Statistics,
}

/// Resolve a request path + method to its command.
pub fn route(path: &str, method: &Method) -> AdminResult<RequestKey> {
    let invalid = || AdminError::InvalidPath {
        path: path.to_string(),
    };

    let stripped = path.strip_prefix(URL_PREFIX).ok_or_else(invalid)?;
    // Tolerate a trailing "/" on otherwise well-formed paths.
    let stripped = stripped.strip_suffix('/').unwrap_or(stripped);

    if stripped == CREATE_REPLICATION_PATH && *method == Method::POST {
        return Ok(RequestKey::CreateReplication);
    }
    if stripped == STATISTICS_PATH && *method == Method::GET {
        return Ok(RequestKey::Statistics);
    }

    if let Some(id) = dynamic_suffix(stripped, DELETE_REPLICATION_PREFIX) {
        // historically, delete could use the POST method as well
        if *method == Method::DELETE || *method == Method::POST {
            return Ok(RequestKey::DeleteReplication { id });
        }
        return Err(invalid());
    }
    if let Some(id) = dynamic_suffix(stripped, PAUSE_REPLICATION_PREFIX) {
        if *method == Method::POST {
            return Ok(RequestKey::PauseReplication { id });
        }
        return Err(invalid());
    }
    if let Some(id) = dynamic_suffix(stripped, RESUME_REPLICATION_PREFIX) {
        if *method == Method::POST {
            return Ok(RequestKey::ResumeReplication { id });
        }
        return Err(invalid());
    }
    if let Some(id) = dynamic_suffix(stripped, SETTINGS_REPLICATIONS_PATH) {
        if *method == Method::GET {
            return Ok(RequestKey::ViewReplicationSettings { id });
        }
        if *method == Method::POST {
            return Ok(RequestKey::ChangeReplicationSettings { id });
        }
        return Err(invalid());
    }

    // A dynamic path without its id is a distinct mistake worth naming.
    for prefix in [
        DELETE_REPLICATION_PREFIX,
        PAUSE_REPLICATION_PREFIX,
        RESUME_REPLICATION_PREFIX,
        SETTINGS_REPLICATIONS_PATH,
    ] {
        if stripped == prefix {
            return Err(AdminError::MissingReplicationId {
                path: path.to_string(),
            });
        }
    }

    Err(invalid())
}

/// Extract the replication id behind a dynamic path prefix.
fn dynamic_suffix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    let id = rest.strip_prefix('/')?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
