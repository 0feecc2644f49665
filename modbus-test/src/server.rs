use std::error::Error;

use modbus_tcp::{consts::DEFAULT_PORT, BankSizes, ModbusTCPServer, ServerConfig};
use tokio::signal;

use super::args::{Cli, ServerArgs};

pub async fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let config = server_config(args.port, &args.server);

    let server = ModbusTCPServer::bind(&config).await?;
    let handle = server.spawn()?;

    tracing::info!(
        "Server listening on {} ({} coils, {} discrete inputs, {} holding registers, {} input registers). Press Ctrl-C to stop.",
        handle.local_addr(),
        config.bank_sizes.coils,
        config.bank_sizes.discrete_inputs,
        config.bank_sizes.holding_registers,
        config.bank_sizes.input_registers,
    );

    signal::ctrl_c().await?;

    tracing::info!("Stopping, {} session(s) active", handle.active_sessions());
    handle.shutdown().await;

    Ok(())
}

fn server_config(port: Option<u16>, args: &ServerArgs) -> ServerConfig {
    ServerConfig {
        bind_address: args.bind_address.clone(),
        port: port.unwrap_or(DEFAULT_PORT),
        bank_sizes: BankSizes {
            coils: args.coils,
            discrete_inputs: args.discrete_inputs,
            holding_registers: args.holding_registers,
            input_registers: args.input_registers,
        },
        max_connections: args.max_connections,
        idle_timeout: args.idle_timeout,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let cli = Cli::parse_from(["modbus-test", "server"]);
        assert_eq!(server_config(cli.port, &cli.server), ServerConfig::default());
    }

    #[test]
    fn flags_are_applied() {
        let cli = Cli::parse_from(["modbus-test", "server", "1600", "--bind", "127.0.0.1", "--coils", "8", "--max-connections", "4"]);
        let config = server_config(cli.port, &cli.server);
        assert_eq!(config.port, 1600);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.bank_sizes.coils, 8);
        assert_eq!(config.bank_sizes.holding_registers, 125);
        assert_eq!(config.max_connections, Some(4));
    }
}
