use std::net::TcpListener;
use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;
use tonic::metadata::MetadataValue;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};
use tracing::{debug, info};

use crate::errors::ListenerError;
use crate::proto::{Greeter, GreeterServer, HelloReply, HelloRequest};
use crate::server::bind;

#[derive(Debug, Clone)]
pub struct GreeterService {
    hostname: Arc<str>,
}

impl GreeterService {
    pub fn new(hostname: Arc<str>) -> Self {
        GreeterService { hostname }
    }
}

#[tonic::async_trait]
impl Greeter for GreeterService {
    async fn say_hello(
        &self,
        _request: Request<HelloRequest>,
    ) -> Result<Response<HelloReply>, Status> {
        let hostname = MetadataValue::try_from(self.hostname.as_ref())
            .map_err(|_| Status::internal("hostname is not a valid header value"))?;
        let mut response = Response::new(HelloReply {
            message: format!("Hello from {}", self.hostname),
        });
        response.metadata_mut().insert("hostname", hostname);
        Ok(response)
    }
}

/// Always reports SERVING; there is no liveness logic behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthService;

#[tonic::async_trait]
impl Health for HealthService {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        debug!(service = %request.get_ref().service, "Handling Check request");
        Ok(Response::new(HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }

    type WatchStream =
        Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send + 'static>>;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("Watch is not implemented"))
    }
}

pub async fn serve_grpc(port: u16, hostname: Arc<str>) -> Result<(), ListenerError> {
    let listener = bind(port)?;
    info!("Serving gRPC on port {}.", port);
    serve_on(listener, hostname).await
}

pub async fn serve_on(listener: TcpListener, hostname: Arc<str>) -> Result<(), ListenerError> {
    let listener = tokio::net::TcpListener::from_std(listener).map_err(ListenerError::Serve)?;
    Server::builder()
        .add_service(GreeterServer::new(GreeterService::new(hostname)))
        .add_service(HealthServer::new(HealthService))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;
    Ok(())
}
