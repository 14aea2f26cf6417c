// rpc/src/server.rs
use crate::{RpcError, RpcErrorResponse, RpcMethods, RpcRequest, RpcResponse, RpcResult};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RpcConfig {
    pub listen_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8545)),
            cors_origins: vec!["*".to_string()],
        }
    }
}

pub struct RpcServer {
    config: RpcConfig,
    methods: RpcMethods,
}

impl RpcServer {
    pub fn new(config: RpcConfig, methods: RpcMethods) -> Self {
        Self { config, methods }
    }

    /// Serve until the process exits
    pub async fn start(self: Arc<Self>) -> RpcResult<()> {
        let (addr, handle) = self.spawn()?;
        tracing::info!("RPC server listening on http://{}", addr);
        handle
            .await
            .map_err(|e| RpcError::ServerError(e.to_string()))?
    }

    /// Bind and serve in the background. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    pub fn spawn(self: Arc<Self>) -> RpcResult<(SocketAddr, JoinHandle<RpcResult<()>>)> {
        tracing::info!("Starting RPC server on {}", self.config.listen_addr);

        let value = self.clone();
        let make_svc = make_service_fn(move |_| {
            let server = value.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                }))
            }
        });

        let server = Server::try_bind(&self.config.listen_addr)
            .map_err(|e| RpcError::ServerError(e.to_string()))?
            .serve(make_svc);
        let addr = server.local_addr();

        let handle = tokio::spawn(async move {
            server
                .await
                .map_err(|e| RpcError::ServerError(e.to_string()))
        });
        Ok((addr, handle))
    }

    fn allowed_origin(&self) -> String {
        if self.config.cors_origins.is_empty() {
            "*".to_string()
        } else {
            self.config.cors_origins.join(", ")
        }
    }

    async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
        // CORS headers
        let response_builder = Response::builder()
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", self.allowed_origin())
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type");

        // Handle OPTIONS
        if req.method() == Method::OPTIONS {
            return Ok(respond(response_builder, StatusCode::OK, Body::empty()));
        }

        // Only accept POST
        if req.method() != Method::POST {
            return Ok(respond(
                response_builder,
                StatusCode::METHOD_NOT_ALLOWED,
                Body::from("Method not allowed"),
            ));
        }

        // Read body
        let body_bytes = hyper::body::to_bytes(req.into_body()).await?;

        let response = match serde_json::from_slice::<RpcRequest>(&body_bytes) {
            Ok(request) => self.process_request(request).await,
            Err(_) => error_response(serde_json::Value::Null, &RpcError::ParseError),
        };

        let body = match serde_json::to_string(&response) {
            Ok(json) => Body::from(json),
            Err(e) => {
                tracing::error!("Failed to encode RPC response: {}", e);
                return Ok(respond(
                    response_builder,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Body::empty(),
                ));
            }
        };
        Ok(respond(response_builder, StatusCode::OK, body))
    }

    async fn process_request(&self, request: RpcRequest) -> RpcResponse {
        if request.jsonrpc != "2.0" {
            return error_response(request.id, &RpcError::InvalidRequest);
        }
        tracing::debug!(method = %request.method, "RPC request");

        match self.methods.handle(&request.method, request.params).await {
            Ok(result) => RpcResponse {
                jsonrpc: "2.0".to_string(),
                result: Some(result),
                error: None,
                id: request.id,
            },
            Err(error) => {
                tracing::debug!(method = %request.method, %error, "RPC request failed");
                error_response(request.id, &error)
            }
        }
    }
}

fn error_response(id: serde_json::Value, error: &RpcError) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcErrorResponse {
            code: error.code(),
            message: error.to_string(),
            data: error.data(),
        }),
        id,
    }
}

fn respond(builder: hyper::http::response::Builder, status: StatusCode, body: Body) -> Response<Body> {
    builder.status(status).body(body).unwrap_or_else(|e| {
        tracing::error!("Failed to build HTTP response: {}", e);
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
