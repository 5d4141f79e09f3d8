//! Network surfaces of the agent

pub mod auth;
pub mod grpc;
pub mod http;
