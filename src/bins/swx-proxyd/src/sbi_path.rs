//! SWx proxy RPC front end
//!
//! HTTP/2 JSON server exposing `Authenticate` at
//! `POST /swx_proxy/v1/authenticate`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http2;
use hyper::service::Service;
use hyper::{Method, Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::auth::AuthProxy;
use crate::error::{StatusCode, SwxError, SwxResult};
use crate::types::{AuthenticationAnswer, AuthenticationRequest};

pub const AUTHENTICATE_PATH: &str = "/swx_proxy/v1/authenticate";

/// JSON body of every RPC response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub status: StatusCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<AuthenticationAnswer>,
}

impl AuthenticateResponse {
    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            answer: None,
        }
    }
}

/// Route one request. Returns the HTTP status and the JSON body.
pub async fn handle_request(
    proxy: &AuthProxy,
    method: &Method,
    path: &str,
    body: &[u8],
) -> (u16, AuthenticateResponse) {
    if path != AUTHENTICATE_PATH {
        return (404, AuthenticateResponse::error(StatusCode::InvalidArgument, format!("Not found: {path}")));
    }
    if *method != Method::POST {
        return (
            405,
            AuthenticateResponse::error(
                StatusCode::InvalidArgument,
                format!("Method {method} not allowed on {path}"),
            ),
        );
    }

    let request: AuthenticationRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            log::warn!("Malformed Authenticate request: {}", e);
            let status = StatusCode::InvalidArgument;
            return (
                status.http_status(),
                AuthenticateResponse::error(status, format!("malformed request: {e}")),
            );
        }
    };

    match proxy.authenticate(&request).await {
        Ok(answer) => (
            StatusCode::Ok.http_status(),
            AuthenticateResponse {
                status: StatusCode::Ok,
                message: String::new(),
                answer: Some(answer),
            },
        ),
        Err(rejection) => {
            let status = rejection.status();
            log::info!("[{}] Authenticate failed: {}", request.user_name, rejection);
            (
                status.http_status(),
                AuthenticateResponse {
                    status,
                    message: rejection.to_string(),
                    answer: rejection.answer,
                },
            )
        }
    }
}

fn json_response(status: u16, body: &AuthenticateResponse) -> Response<Full<Bytes>> {
    let content = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(content)))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *response.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

#[derive(Clone)]
struct AuthService {
    proxy: AuthProxy,
}

impl Service<Request<Incoming>> for AuthService {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let proxy = self.proxy.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let body = match req.into_body().collect().await {
                Ok(body) => body.to_bytes(),
                Err(e) => {
                    let status = StatusCode::InvalidArgument;
                    let body = AuthenticateResponse::error(status, format!("cannot read body: {e}"));
                    return Ok(json_response(status.http_status(), &body));
                }
            };

            let (status, body) = handle_request(&proxy, &method, &path, &body).await;
            Ok(json_response(status, &body))
        })
    }
}

enum ServerState {
    Stopped,
    Running(oneshot::Sender<()>),
}

/// HTTP/2 server for the `Authenticate` RPC
pub struct SwxSbiServer {
    addr: SocketAddr,
    state: Mutex<ServerState>,
}

impl SwxSbiServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: Mutex::new(ServerState::Stopped),
        }
    }

    /// Bind and start serving; returns the bound address
    pub async fn start(&self, proxy: AuthProxy) -> SwxResult<SocketAddr> {
        let mut state = self.state.lock().await;
        if matches!(*state, ServerState::Running(_)) {
            return Err(SwxError::Internal("SBI server already running".into()));
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| SwxError::Internal(format!("failed to bind {}: {e}", self.addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SwxError::Internal(e.to_string()))?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        *state = ServerState::Running(shutdown_tx);
        drop(state);

        let service = AuthService { proxy };
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                log::debug!("SBI connection from {}", peer);
                                let service = service.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = http2::Builder::new(TokioExecutor::new())
                                        .serve_connection(TokioIo::new(stream), service)
                                        .await
                                    {
                                        log::debug!("HTTP/2 connection from {} ended: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => log::error!("SBI accept error: {}", e),
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            log::debug!("SBI server on {} stopped", local_addr);
        });

        log::info!("SBI server listening on {}", local_addr);
        Ok(local_addr)
    }

    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let ServerState::Running(shutdown_tx) = std::mem::replace(&mut *state, ServerState::Stopped) {
            let _ = shutdown_tx.send(());
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, ServerState::Running(_))
    }
}
