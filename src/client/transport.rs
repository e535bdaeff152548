use super::ClientError;
use crate::proto::{self, state_manager_service_client::StateManagerServiceClient};
use crate::service::interface::Checkpoint;
use crate::types::{Etag, KeyValue};
use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::{Code, Status};

/// One logical remote exchange per method, with the wire format hidden behind
/// this seam so protocol logic never touches the codec.
#[async_trait]
pub trait StateTransport: Send + Sync {
  async fn init_app(&self, app_id: &str) -> Result<Etag, ClientError>;
  async fn get(&self, app_id: &str, keys: &[String]) -> Result<(Etag, Vec<KeyValue>), ClientError>;
  async fn set(&self, app_id: &str, etag: &Etag, parts: Vec<KeyValue>)
    -> Result<Etag, ClientError>;
  async fn checkpoints(&self, app_id: &str) -> Result<(Etag, Vec<Checkpoint>), ClientError>;
  async fn create_checkpoint(
    &self,
    app_id: &str,
    etag: &Etag,
    payload: &str,
  ) -> Result<(Etag, String), ClientError>;
  async fn revert(
    &self,
    app_id: &str,
    etag: &Etag,
    checkpoint_id: &str,
  ) -> Result<Etag, ClientError>;
  async fn cleanup(
    &self,
    app_id: &str,
    etag: &Etag,
    until_checkpoint: &str,
  ) -> Result<Etag, ClientError>;
  async fn reset(&self, app_id: &str, etag: &Etag) -> Result<Etag, ClientError>;
}

#[derive(Debug, Clone)]
pub struct GrpcTransport {
  client: StateManagerServiceClient<Channel>,
}

impl GrpcTransport {
  pub async fn connect(endpoint: String) -> Result<Self, ClientError> {
    let client = StateManagerServiceClient::connect(endpoint)
      .await
      .map_err(|err| ClientError::Transport(err.to_string()))?;
    Ok(Self { client })
  }
}

fn status_to_error(status: Status) -> ClientError {
  match status.code() {
    Code::FailedPrecondition => ClientError::Conflict(status.message().to_owned()),
    Code::NotFound => ClientError::NotFound(status.message().to_owned()),
    _ => ClientError::Transport(status.message().to_owned()),
  }
}

#[async_trait]
impl StateTransport for GrpcTransport {
  async fn init_app(&self, app_id: &str) -> Result<Etag, ClientError> {
    let request = proto::InitAppRequest {
      app_id: app_id.to_owned(),
    };
    let response = self
      .client
      .clone()
      .init_app(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok(Etag::from(response.etag))
  }

  async fn get(&self, app_id: &str, keys: &[String]) -> Result<(Etag, Vec<KeyValue>), ClientError> {
    let request = proto::GetRequest {
      app_id: app_id.to_owned(),
      keys: keys.to_vec(),
    };
    let response = self
      .client
      .clone()
      .get(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    let parts = response.parts.into_iter().map(From::from).collect();
    Ok((Etag::from(response.etag), parts))
  }

  async fn set(
    &self,
    app_id: &str,
    etag: &Etag,
    parts: Vec<KeyValue>,
  ) -> Result<Etag, ClientError> {
    let request = proto::SetRequest {
      app_id: app_id.to_owned(),
      etag: etag.as_str().to_owned(),
      parts: parts.into_iter().map(From::from).collect(),
    };
    let response = self
      .client
      .clone()
      .set(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok(Etag::from(response.etag))
  }

  async fn checkpoints(&self, app_id: &str) -> Result<(Etag, Vec<Checkpoint>), ClientError> {
    let request = proto::CheckpointsRequest {
      app_id: app_id.to_owned(),
    };
    let response = self
      .client
      .clone()
      .checkpoints(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    let checkpoints = response.checkpoints.into_iter().map(From::from).collect();
    Ok((Etag::from(response.etag), checkpoints))
  }

  async fn create_checkpoint(
    &self,
    app_id: &str,
    etag: &Etag,
    payload: &str,
  ) -> Result<(Etag, String), ClientError> {
    let request = proto::CreateCheckpointRequest {
      app_id: app_id.to_owned(),
      etag: etag.as_str().to_owned(),
      payload: payload.to_owned(),
    };
    let response = self
      .client
      .clone()
      .create_checkpoint(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok((Etag::from(response.etag), response.id))
  }

  async fn revert(
    &self,
    app_id: &str,
    etag: &Etag,
    checkpoint_id: &str,
  ) -> Result<Etag, ClientError> {
    let request = proto::RevertRequest {
      app_id: app_id.to_owned(),
      etag: etag.as_str().to_owned(),
      checkpoint_id: checkpoint_id.to_owned(),
    };
    let response = self
      .client
      .clone()
      .revert(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok(Etag::from(response.etag))
  }

  async fn cleanup(
    &self,
    app_id: &str,
    etag: &Etag,
    until_checkpoint: &str,
  ) -> Result<Etag, ClientError> {
    let request = proto::CleanupRequest {
      app_id: app_id.to_owned(),
      etag: etag.as_str().to_owned(),
      until_checkpoint: until_checkpoint.to_owned(),
    };
    let response = self
      .client
      .clone()
      .cleanup(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok(Etag::from(response.etag))
  }

  async fn reset(&self, app_id: &str, etag: &Etag) -> Result<Etag, ClientError> {
    let request = proto::ResetRequest {
      app_id: app_id.to_owned(),
      etag: etag.as_str().to_owned(),
    };
    let response = self
      .client
      .clone()
      .reset(request)
      .await
      .map_err(status_to_error)?
      .into_inner();
    Ok(Etag::from(response.etag))
  }
}

impl From<proto::Part> for KeyValue {
  fn from(part: proto::Part) -> Self {
    Self {
      key: part.key,
      value: part.value,
    }
  }
}

impl From<proto::Checkpoint> for Checkpoint {
  fn from(checkpoint: proto::Checkpoint) -> Self {
    Self {
      id: checkpoint.id,
      payload: checkpoint.payload,
    }
  }
}
