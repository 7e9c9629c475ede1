use clap::{ArgGroup, Parser};
use ems_rs::{
    init_logger, log_info, BusTransport, CommandServer, EmsDecoder, EmsError, EmsGateway, Router,
    SerialBusTransport, TcpBusTransport,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ems-collector")]
#[command(about = "Collector and control gateway for the EMS heating bus")]
#[command(group(ArgGroup::new("bus").required(true).args(["bus_serial", "bus_tcp"])))]
struct Cli {
    /// Serial device of the bus interface
    #[arg(long)]
    bus_serial: Option<String>,

    /// host:port of a serial-to-TCP bridge carrying the bus
    #[arg(long)]
    bus_tcp: Option<String>,

    /// Endpoint of the line-based command interface
    #[arg(long, default_value = "127.0.0.1:7777")]
    listen: String,

    /// Deadline for correlated bus replies, in milliseconds
    #[arg(long, default_value = "2000")]
    response_timeout_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), EmsError> {
    init_logger();

    let cli = Cli::parse();
    let mut decoder = EmsDecoder::new();
    decoder.set_handler(|value| log_info(&format!("{value:?}")));

    match (cli.bus_tcp.clone(), cli.bus_serial.clone()) {
        (Some(addr), _) => {
            let transport = TcpBusTransport::connect(&addr).await?;
            log_info(&format!("Connected to bus bridge at {addr}"));
            serve(transport, decoder, &cli).await
        }
        (None, Some(device)) => {
            let transport = SerialBusTransport::open(&device)?;
            log_info(&format!("Opened bus interface at {device}"));
            serve(transport, decoder, &cli).await
        }
        (None, None) => unreachable!("clap requires one bus transport"),
    }
}

async fn serve<T: BusTransport>(
    transport: T,
    decoder: EmsDecoder,
    cli: &Cli,
) -> Result<(), EmsError> {
    let router = Router::new();
    let (gateway, bus) = EmsGateway::new(transport, decoder, Arc::clone(&router));

    let mut server = CommandServer::bind(&cli.listen, bus, router).await?;
    server.set_response_timeout(Duration::from_millis(cli.response_timeout_ms));
    log_info(&format!("Command interface on {}", server.local_addr()?));

    tokio::select! {
        result = gateway.run() => result,
        result = server.run() => result,
    }
}
