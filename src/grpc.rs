use crate::proto::{self, state_manager_service_server::StateManagerService};
use crate::service::fenced::FencedStateManager;
use crate::service::interface::{self, StateManager};
use crate::types::{Error, Etag, KeyValue};
use log::{error, info};
use std::fmt::Display;
use tonic::{Request, Response, Status};

#[derive(Debug)]
pub struct GrpcService<M> {
  state: FencedStateManager<M>,
}

impl<M: StateManager> GrpcService<M> {
  pub fn new(manager: M) -> GrpcService<M> {
    GrpcService {
      state: FencedStateManager::new(manager),
    }
  }
}

#[tonic::async_trait]
impl<M: StateManager + 'static> StateManagerService for GrpcService<M> {
  async fn init_app(
    &self,
    request: Request<proto::InitAppRequest>,
  ) -> Result<Response<proto::InitAppResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .init_app(&request.app_id)
      .map(|etag| {
        Response::new(proto::InitAppResponse {
          etag: etag.into(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn get(
    &self,
    request: Request<proto::GetRequest>,
  ) -> Result<Response<proto::GetResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .get(&request.app_id, &request.keys)
      .map(|(etag, parts)| {
        Response::new(proto::GetResponse {
          etag: etag.into(),
          parts: parts.into_iter().map(From::from).collect(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn set(
    &self,
    request: Request<proto::SetRequest>,
  ) -> Result<Response<proto::SetResponse>, Status> {
    let request = request.into_inner();
    let parts = request
      .parts
      .iter()
      .map(|part| KeyValue {
        key: part.key.clone(),
        value: part.value.clone(),
      })
      .collect();
    let result = self
      .state
      .set(&request.app_id, &Etag::from(request.etag.clone()), parts)
      .map(|etag| {
        Response::new(proto::SetResponse {
          etag: etag.into(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn checkpoints(
    &self,
    request: Request<proto::CheckpointsRequest>,
  ) -> Result<Response<proto::CheckpointsResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .checkpoints(&request.app_id)
      .map(|(etag, checkpoints)| {
        Response::new(proto::CheckpointsResponse {
          etag: etag.into(),
          checkpoints: checkpoints.into_iter().map(From::from).collect(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn create_checkpoint(
    &self,
    request: Request<proto::CreateCheckpointRequest>,
  ) -> Result<Response<proto::CreateCheckpointResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .create_checkpoint(
        &request.app_id,
        &Etag::from(request.etag.clone()),
        &request.payload,
      )
      .map(|(etag, id)| {
        Response::new(proto::CreateCheckpointResponse {
          etag: etag.into(),
          id,
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn revert(
    &self,
    request: Request<proto::RevertRequest>,
  ) -> Result<Response<proto::RevertResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .revert(
        &request.app_id,
        &Etag::from(request.etag.clone()),
        &request.checkpoint_id,
      )
      .map(|etag| {
        Response::new(proto::RevertResponse {
          etag: etag.into(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn cleanup(
    &self,
    request: Request<proto::CleanupRequest>,
  ) -> Result<Response<proto::CleanupResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .cleanup(
        &request.app_id,
        &Etag::from(request.etag.clone()),
        &request.until_checkpoint,
      )
      .map(|etag| {
        Response::new(proto::CleanupResponse {
          etag: etag.into(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }

  async fn reset(
    &self,
    request: Request<proto::ResetRequest>,
  ) -> Result<Response<proto::ResetResponse>, Status> {
    let request = request.into_inner();
    let result = self
      .state
      .reset(&request.app_id, &Etag::from(request.etag.clone()))
      .map(|etag| {
        Response::new(proto::ResetResponse {
          etag: etag.into(),
        })
      })
      .map_err(Status::from);
    log(&request, &result);
    result
  }
}

fn log<T>(request: &impl Display, result: &Result<Response<T>, Status>) {
  match result {
    Ok(_response) => {
      info!("{} => OK", request);
    }
    Err(status) => {
      error!("{} => {}: {:?}", request, status.code(), status.message());
    }
  }
}

impl From<KeyValue> for proto::Part {
  fn from(part: KeyValue) -> Self {
    Self {
      key: part.key,
      value: part.value,
    }
  }
}

impl From<interface::Checkpoint> for proto::Checkpoint {
  fn from(checkpoint: interface::Checkpoint) -> Self {
    Self {
      id: checkpoint.id,
      payload: checkpoint.payload,
    }
  }
}

impl From<Error> for Status {
  fn from(err: Error) -> Self {
    match err {
      Error::NotFound(message) => Self::not_found(message),
      conflict @ Error::Conflict { .. } => Self::failed_precondition(conflict.to_string()),
    }
  }
}

impl Display for proto::InitAppRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: InitApp()", self.app_id)
  }
}

impl Display for proto::GetRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: Get({:?})", self.app_id, self.keys)
  }
}

impl Display for proto::SetRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "[{}]: Set({:?})",
      self.app_id,
      self.parts.iter().map(|part| &part.key).collect::<Vec<_>>()
    )
  }
}

impl Display for proto::CheckpointsRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: Checkpoints()", self.app_id)
  }
}

impl Display for proto::CreateCheckpointRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "[{}]: CreateCheckpoint(payload: {:?})",
      self.app_id, self.payload
    )
  }
}

impl Display for proto::RevertRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: Revert({:?})", self.app_id, self.checkpoint_id)
  }
}

impl Display for proto::CleanupRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: Cleanup({:?})", self.app_id, self.until_checkpoint)
  }
}

impl Display for proto::ResetRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}]: Reset()", self.app_id)
  }
}
