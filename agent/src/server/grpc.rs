//! ProfilerControl gRPC service

use crate::config::AgentConfig;
use crate::profiler::LocalProfiler;
use crate::{audit, metrics};
use std::sync::Arc;
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};

pub mod proto {
    tonic::include_proto!("shutter.profiler.v1");
}

use proto::{
    profiler_control_server::{ProfilerControl, ProfilerControlServer},
    StateReply, StateRequest, ToggleReply, ToggleRequest,
};

/// gRPC server state
pub struct ProfilerControlService {
    profiler: Arc<dyn LocalProfiler>,
    config: AgentConfig,
}

impl ProfilerControlService {
    pub fn new(profiler: Arc<dyn LocalProfiler>, config: AgentConfig) -> Self {
        Self { profiler, config }
    }

    /// Wrap the service with the bearer-token interceptor from the config.
    pub fn into_server(
        self,
    ) -> InterceptedService<ProfilerControlServer<Self>, impl Interceptor + Clone> {
        let interceptor = super::auth::make_auth_interceptor(self.config.auth_token.clone());
        ProfilerControlServer::with_interceptor(self, interceptor)
    }

    fn reject(enabled: bool, output_path: &str, reason: &str) -> Response<ToggleReply> {
        audit::profiler_toggled(enabled, output_path, false);
        metrics::record_toggle(enabled, false);
        Response::new(ToggleReply {
            ok: false,
            error: reason.to_string(),
        })
    }
}

#[tonic::async_trait]
impl ProfilerControl for ProfilerControlService {
    async fn toggle(
        &self,
        request: Request<ToggleRequest>,
    ) -> Result<Response<ToggleReply>, Status> {
        let req = request.into_inner();

        if req.output_path.trim().is_empty() {
            return Ok(Self::reject(req.enabled, &req.output_path, "output path is empty"));
        }

        let output_path = self.config.resolve_output(&req.output_path);
        self.profiler.set_profiler_state(req.enabled, &output_path);

        audit::profiler_toggled(req.enabled, &output_path, true);
        metrics::record_toggle(req.enabled, true);

        Ok(Response::new(ToggleReply {
            ok: true,
            error: String::new(),
        }))
    }

    async fn state(&self, _request: Request<StateRequest>) -> Result<Response<StateReply>, Status> {
        let state = self.profiler.state().map_err(Status::internal)?;
        Ok(Response::new(StateReply {
            enabled: state.enabled,
            output_path: state.output_path.unwrap_or_default(),
            sessions: state.sessions,
        }))
    }
}
