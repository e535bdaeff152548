use clap::Parser;
use log::info;
use state_store::grpc::GrpcService;
use state_store::proto::state_manager_service_server::StateManagerServiceServer;
use state_store::service::in_memory::InMemoryStateManager;
use tonic::transport::Server;

#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
  #[clap(long, env, default_value_t = 50051)]
  port: u16,

  #[clap(long, env, default_value_t = log::LevelFilter::Info)]
  log_level: log::LevelFilter,
}

fn setup_logger(args: &Args) -> Result<(), fern::InitError> {
  fern::Dispatch::new()
    .format(|out, message, record| out.finish(format_args!("{:5} {}", record.level(), message)))
    .level(args.log_level)
    .chain(std::io::stderr())
    .apply()?;
  Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let args = Args::parse();
  setup_logger(&args)?;

  let addr = format!("0.0.0.0:{}", &args.port).parse()?;
  let service = GrpcService::new(InMemoryStateManager::default());

  let on_finish = Server::builder()
    .add_service(StateManagerServiceServer::new(service))
    .serve(addr);
  info!("Listening on {}", addr);

  on_finish.await?;
  Ok(())
}
