//! Reads the first five holding registers from a server on `127.0.0.1:1502`.
//!
//! Start one with `cargo run -p modbus-test -- server` first.

use std::error::Error;

use modbus_tcp::{consts::DEFAULT_PORT, ModbusTCPClient, DEFAULT_TIMEOUT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let (client, _) = ModbusTCPClient::connect(("127.0.0.1", DEFAULT_PORT), DEFAULT_TIMEOUT).await?;

    let values = client.read_holding_registers(1, 0, 5).await?;
    for (address, value) in values.iter().enumerate() {
        println!("4{:05}: {}", address + 1, value);
    }

    println!("Finished executing");

    Ok(())
}
