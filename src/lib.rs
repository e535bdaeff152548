pub mod client;
pub mod grpc;
pub mod service;
pub mod types;

pub mod proto {
  tonic::include_proto!("state_manager");
}
