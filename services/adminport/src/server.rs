//! HTTP admin server.
//!
//! Thin translation layer: decode the request, call the replication
//! manager, encode the result. Accepted mutating commands are forwarded to
//! peer nodes when the request asks for it.

use crate::error::{AdminError, AdminResult};
use crate::forward::PeerForwarder;
use crate::keys::{self, RequestKey};
use crate::manager::ReplicationManager;
use crate::requests;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// The admin port: HTTP surface over the replication manager.
pub struct AdminPort {
    manager: Arc<ReplicationManager>,
    forwarder: Arc<PeerForwarder>,
}

impl AdminPort {
    pub fn new(manager: Arc<ReplicationManager>, forwarder: Arc<PeerForwarder>) -> Arc<Self> {
        Arc::new(Self { manager, forwarder })
    }

    /// Bind and serve. Returns the bound address (useful with port 0) and
    /// the server task handle.
    pub fn spawn(self: &Arc<Self>, addr: SocketAddr) -> hyper::Result<(SocketAddr, JoinHandle<()>)> {
        let admin = Arc::clone(self);
        let make_svc = make_service_fn(move |_conn| {
            let admin = Arc::clone(&admin);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(Arc::clone(&admin), req)
                }))
            }
        });

        let server = Server::try_bind(&addr)?.serve(make_svc);
        let local_addr = server.local_addr();
        info!("Admin port listening on http://{}", local_addr);

        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                error!(error = %err, "Admin port server error");
            }
        });
        Ok((local_addr, handle))
    }
}

async fn handle_request(
    admin: Arc<AdminPort>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(method = %method, path = %path, "Admin request");

    let key = match keys::route(&path, &method) {
        Ok(key) => key,
        Err(err) => return Ok(error_response(&err)),
    };

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(err) => {
            return Ok(error_response(&AdminError::InvalidValue {
                key: "body".to_string(),
                value: err.to_string(),
            }))
        }
    };

    let response = dispatch(&admin, key, &path, &body).await;
    Ok(response.unwrap_or_else(|err| error_response(&err)))
}

async fn dispatch(
    admin: &AdminPort,
    key: RequestKey,
    path: &str,
    body: &[u8],
) -> AdminResult<Response<Body>> {
    match key {
        RequestKey::CreateReplication => {
            let req = requests::decode_create_replication(body)?;
            let id = admin
                .manager
                .create_replication(
                    &req.from_bucket,
                    &req.to_cluster_uuid,
                    &req.to_bucket,
                    req.filter_name.clone(),
                    req.settings.clone(),
                )
                .await?;
            if req.forward {
                admin
                    .forwarder
                    .forward_request(path, requests::parse_form(body));
            }
            form_response(requests::encode_create_replication_response(&id))
        }
        RequestKey::DeleteReplication { id } => {
            let forward = requests::decode_forward_flag(body)?;
            admin.manager.delete_replication(&id).await?;
            if forward {
                admin
                    .forwarder
                    .forward_request(path, requests::parse_form(body));
            }
            empty_response()
        }
        RequestKey::PauseReplication { id } => {
            let forward = requests::decode_forward_flag(body)?;
            admin.manager.pause_replication(&id).await?;
            if forward {
                admin
                    .forwarder
                    .forward_request(path, requests::parse_form(body));
            }
            empty_response()
        }
        RequestKey::ResumeReplication { id } => {
            let forward = requests::decode_forward_flag(body)?;
            admin.manager.resume_replication(&id).await?;
            if forward {
                admin
                    .forwarder
                    .forward_request(path, requests::parse_form(body));
            }
            empty_response()
        }
        RequestKey::ViewReplicationSettings { id } => {
            let settings = admin.manager.replication_settings(&id).await?;
            form_response(requests::encode_form(&requests::settings_to_rest_pairs(
                &settings,
            )))
        }
        RequestKey::ChangeReplicationSettings { id } => {
            let form = requests::parse_form(body);
            let updates = requests::decode_settings(&form, true)?;
            admin.manager.change_replication_settings(&id, updates).await?;
            empty_response()
        }
        RequestKey::Statistics => json_response(&admin.manager.statistics().await),
    }
}

fn form_response(body: Vec<u8>) -> AdminResult<Response<Body>> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap_or_default())
}

fn json_response(value: &serde_json::Value) -> AdminResult<Response<Body>> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .unwrap_or_default())
}

fn empty_response() -> AdminResult<Response<Body>> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::empty())
        .unwrap_or_default())
}

fn error_response(err: &AdminError) -> Response<Body> {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "error": err.to_string() }).to_string(),
        ))
        .unwrap_or_default()
}
