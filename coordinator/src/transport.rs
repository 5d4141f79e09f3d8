//! RPC seam between the dispatcher and the endpoints

use async_trait::async_trait;
use shutter_agent::server::auth::attach_bearer;
use shutter_agent::server::grpc::proto::{
    self, profiler_control_client::ProfilerControlClient, StateReply, StateRequest,
};
use shutter_shared::{Endpoint, ToggleError, ToggleRequest};
use std::time::Duration;
use tonic::transport::Channel;

/// Delivers one toggle request to one endpoint.
///
/// `Ok` means the endpoint acknowledged; implementations must not retry.
#[async_trait]
pub trait ToggleClient: Send + Sync + 'static {
    async fn toggle(&self, endpoint: &Endpoint, request: ToggleRequest) -> Result<(), ToggleError>;
}

/// gRPC client for the agent's ProfilerControl service.
#[derive(Debug, Clone)]
pub struct GrpcToggleClient {
    connect_timeout: Duration,
    auth_token: Option<String>,
}

impl GrpcToggleClient {
    pub fn new(connect_timeout: Duration, auth_token: Option<String>) -> Self {
        Self {
            connect_timeout,
            auth_token,
        }
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<ProfilerControlClient<Channel>, ToggleError> {
        let unreachable = |reason: String| ToggleError::EndpointUnreachable {
            endpoint: *endpoint,
            reason,
        };

        let channel = Channel::from_shared(endpoint.uri())
            .map_err(|e| unreachable(e.to_string()))?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| unreachable(format!("connect failed: {}", e)))?;
        Ok(ProfilerControlClient::new(channel))
    }

    fn request<T>(&self, endpoint: &Endpoint, message: T) -> Result<tonic::Request<T>, ToggleError> {
        let mut req = tonic::Request::new(message);
        if let Some(token) = &self.auth_token {
            attach_bearer(&mut req, token).map_err(|status| ToggleError::EndpointUnreachable {
                endpoint: *endpoint,
                reason: status.message().to_string(),
            })?;
        }
        Ok(req)
    }

    /// Read an endpoint's current profiler state.
    pub async fn state(&self, endpoint: &Endpoint) -> Result<StateReply, ToggleError> {
        let mut client = self.connect(endpoint).await?;
        let req = self.request(endpoint, StateRequest {})?;
        client
            .state(req)
            .await
            .map(tonic::Response::into_inner)
            .map_err(|status| ToggleError::EndpointUnreachable {
                endpoint: *endpoint,
                reason: format!("{:?}: {}", status.code(), status.message()),
            })
    }
}

#[async_trait]
impl ToggleClient for GrpcToggleClient {
    async fn toggle(&self, endpoint: &Endpoint, request: ToggleRequest) -> Result<(), ToggleError> {
        let mut client = self.connect(endpoint).await?;
        let req = self.request(
            endpoint,
            proto::ToggleRequest {
                enabled: request.enabled,
                output_path: request.output_path,
            },
        )?;

        let reply = client
            .toggle(req)
            .await
            .map_err(|status| ToggleError::EndpointUnreachable {
                endpoint: *endpoint,
                reason: format!("{:?}: {}", status.code(), status.message()),
            })?
            .into_inner();

        if reply.ok {
            Ok(())
        } else {
            Err(ToggleError::ToggleRejected {
                endpoint: *endpoint,
                reason: reply.error,
            })
        }
    }
}
