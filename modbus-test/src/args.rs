use std::{fmt::Display, num::ParseIntError, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Hostname or ip address. (or "server" to run a server).
    pub host: String,

    /// TCP port number [default: 502, or 1502 when running a server]
    pub port: Option<u16>,

    /// Network timeout in ms
    #[arg(short, long, default_value = "2000", value_parser = parse_duration)]
    pub timeout: Duration,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Server options")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long = "bind", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Number of coils
    #[arg(long, default_value = "2000")]
    pub coils: usize,

    /// Number of discrete inputs
    #[arg(long, default_value = "1968")]
    pub discrete_inputs: usize,

    /// Number of holding registers
    #[arg(long, default_value = "125")]
    pub holding_registers: usize,

    /// Number of input registers
    #[arg(long, default_value = "121")]
    pub input_registers: usize,

    /// Close new connections once this many sessions are active
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Close sessions idle for this many ms
    #[arg(long, value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,
}

#[derive(Parser, Debug)]
#[command()]
pub struct Interactive {
    #[command(subcommand)]
    pub command: InteractiveCommands,
}

#[derive(Subcommand, Debug)]
pub enum InteractiveCommands {
    /// Read values from device
    Read(ReadArgs),

    /// Write values to device
    Write(WriteArgs),

    /// Export the previously printed table
    Export(ExportArgs),

    /// Set configuration
    Set(SetArgs),

    /// Exit the program
    Exit,
}

impl Display for InteractiveCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractiveCommands::Read(_) => write!(f, "Read"),
            InteractiveCommands::Write(_) => write!(f, "Write"),
            InteractiveCommands::Export(_) => write!(f, "Export"),
            InteractiveCommands::Set(_) => write!(f, "Set"),
            InteractiveCommands::Exit => write!(f, "Exit"),
        }
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Address to start reading from
    pub address: String,

    /// Number of addresses to read
    #[arg(default_value = "1")]
    pub length: u16,
}

#[derive(Args, Debug)]
#[command(allow_negative_numbers = true)]
pub struct WriteArgs {
    /// Address to start writing to
    pub address: String,

    /// Values to write
    #[arg(required = true)]
    pub values: Vec<String>,

    /// Datatype of the values
    #[arg(long = "type", value_enum, default_value = "I16")]
    pub datatype: WriteDatatype,
}

#[derive(Debug, PartialEq, Clone, Copy, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum WriteDatatype {
    U16,
    I16,
    Hex,
    Bin,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// The file to write to
    pub filename: PathBuf,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(subcommand)]
    pub command: SetCommands,
}

#[derive(Subcommand, Debug)]
pub enum SetCommands {
    /// Set the unit-id
    UnitId { unit_id: u8 },

    /// Set timeout
    Timeout {
        #[arg(value_parser = parse_duration)]
        timeout: Duration,
    },

    /// Set address offset
    #[command(allow_negative_numbers = true)]
    Offset { offset: i32 },
}

fn parse_duration(input: &str) -> Result<Duration, ParseIntError> {
    let ms = input.parse()?;
    Ok(Duration::from_millis(ms))
}
