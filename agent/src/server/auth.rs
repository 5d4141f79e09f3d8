//! Bearer token authentication for the ProfilerControl service

use crate::audit;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tonic::{Request, Status};

const AUTHORIZATION: &str = "authorization";

/// Why a call was refused.
fn check_bearer(metadata: &MetadataMap, expected: &str) -> Result<(), &'static str> {
    let value = metadata
        .get(AUTHORIZATION)
        .ok_or("missing authorization header")?;
    let value = value
        .to_str()
        .map_err(|_| "invalid authorization header encoding")?;
    let token = value.strip_prefix("Bearer ").ok_or("missing Bearer prefix")?;
    if token == expected {
        Ok(())
    } else {
        Err("invalid token")
    }
}

/// Create a tonic interceptor that validates bearer tokens.
///
/// With `expected_token` unset every call passes; otherwise calls must carry
/// `authorization: Bearer <token>` metadata.
pub fn make_auth_interceptor(
    expected_token: Option<String>,
) -> impl Fn(Request<()>) -> Result<Request<()>, Status> + Clone {
    move |req: Request<()>| {
        let Some(ref expected) = expected_token else {
            audit::grpc_auth_success();
            return Ok(req);
        };

        match check_bearer(req.metadata(), expected) {
            Ok(()) => {
                audit::grpc_auth_success();
                Ok(req)
            }
            Err(reason) => {
                audit::grpc_auth_failure(reason);
                Err(Status::unauthenticated(reason))
            }
        }
    }
}

/// Attach `authorization: Bearer <token>` to an outgoing request.
pub fn attach_bearer<T>(req: &mut Request<T>, token: &str) -> Result<(), Status> {
    let value: MetadataValue<Ascii> = format!("Bearer {}", token)
        .parse()
        .map_err(|_| Status::invalid_argument("auth token is not valid header text"))?;
    req.metadata_mut().insert(AUTHORIZATION, value);
    Ok(())
}
