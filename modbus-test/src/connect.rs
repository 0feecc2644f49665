use std::{error::Error, io::Write, sync::Arc, time::Duration};

use clap::Parser;
use comfy_table::{presets, CellAlignment, Table};
use modbus_tcp::{consts::MODBUS_TCP_PORT, ModbusTCPClient};
use rustyline::{completion::Completer, history::MemHistory, Editor, Helper, Highlighter, Hinter, Validator};
use tokio::{sync::Mutex, time::Instant};

use crate::{
    address::{Address, AddressKind},
    args::*,
    util::{cancel_on_ctrl_c, parse_coil},
};

pub async fn run(args: Cli) -> Result<(), Box<dyn Error>> {
    let host_port = format!("{}:{}", args.host, args.port.unwrap_or(MODBUS_TCP_PORT));

    let mut client = ClientImpl::new(args.timeout, host_port);

    client.command_loop().await?;

    Ok(())
}

struct ClientImpl {
    timeout: Duration,
    host_port: String,
    client: Arc<Mutex<Option<Arc<ModbusTCPClient>>>>,
    last_table: Option<Table>,
    unit_id: u8,
    offset: i32,
}

impl ClientImpl {
    pub fn new(timeout: Duration, addr: String) -> Self {
        Self {
            timeout,
            host_port: addr,
            client: Arc::new(Mutex::new(None)),
            last_table: None,
            unit_id: 1,
            offset: -1,
        }
    }

    async fn command_loop(&mut self) -> Result<(), Box<dyn Error>> {
        self.connect_if_needed().await?;

        println!("unit-id = {}", self.unit_id);
        println!("offset = {}", self.offset);
        println!();

        let config = rustyline::Config::builder().build();

        let mut rl = Editor::<InteractiveHelper, MemHistory>::with_history(config, MemHistory::new())?;
        rl.set_helper(Some(InteractiveHelper {}));
        let rl = Arc::new(Mutex::new(rl));

        loop {
            let _rl = rl.clone();
            let readline = tokio::spawn(async move { _rl.lock().await.readline("modbus-test> ") }).await?;

            let Ok(line) = readline else {
                break;
            };

            _ = rl.lock().await.add_history_entry(line.as_str());

            println!();

            match self.handle_command(line).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) => println!("{err}"),
            }

            println!();
        }

        Ok(())
    }

    async fn handle_command(&mut self, line: String) -> Result<bool, Box<dyn Error>> {
        let words = shellwords::split(&format!("modbus-test> {}", line))?;

        let cmd = Interactive::try_parse_from(words)?;

        let start = Instant::now();

        let result = match &cmd.command {
            InteractiveCommands::Read(args) => self.read(args).await,
            InteractiveCommands::Write(args) => self.write(args).await,
            InteractiveCommands::Export(args) => self.export_csv(args),
            InteractiveCommands::Set(args) => {
                self.set(&args.command).await;
                return Ok(false);
            }
            InteractiveCommands::Exit => return Ok(true),
        };

        let dur = Instant::now() - start;

        println!();
        println!("{}: {}ms", cmd.command, dur.as_millis());

        result.map(|_| false)
    }

    async fn set(&mut self, command: &SetCommands) {
        match *command {
            SetCommands::UnitId { unit_id } => {
                self.unit_id = unit_id;
                println!("unit-id = {unit_id}");
            }
            SetCommands::Offset { offset } => {
                self.offset = offset;
                println!("offset = {offset}");
            }
            SetCommands::Timeout { timeout } => {
                self.timeout = timeout;
                // the client keeps the timeout it was connected with
                let mut client = self.client.lock().await;
                if client.as_ref().is_some_and(|c| c.timeout() != timeout) {
                    _ = client.take();
                    println!("reconnecting on next command");
                }
                println!("timeout = {}ms", timeout.as_millis());
            }
        }
    }

    async fn read(&mut self, args: &ReadArgs) -> Result<(), Box<dyn Error>> {
        let address = Address::parse(&args.address, self.offset)?;

        let client = self.connect_if_needed().await?;

        match address.kind {
            AddressKind::Coil => {
                let values = cancel_on_ctrl_c(client.read_coils(self.unit_id, address.index, args.length)).await??;
                self.print_coils(address, &values);
            }
            AddressKind::DiscreteInput => {
                let values = cancel_on_ctrl_c(client.read_discrete_inputs(self.unit_id, address.index, args.length)).await??;
                self.print_coils(address, &values);
            }
            AddressKind::InputRegister => {
                let values = cancel_on_ctrl_c(client.read_input_registers(self.unit_id, address.index, args.length)).await??;
                self.print_registers(address, &values);
            }
            AddressKind::HoldingRegister => {
                let values = cancel_on_ctrl_c(client.read_holding_registers(self.unit_id, address.index, args.length)).await??;
                self.print_registers(address, &values);
            }
        }

        Ok(())
    }

    async fn write(&self, args: &WriteArgs) -> Result<(), Box<dyn Error>> {
        let address = Address::parse(&args.address, self.offset)?;

        if !address.kind.is_writable() {
            return Err("Address must start with 0 or 4.".into());
        }

        match address.kind {
            AddressKind::Coil => {
                let values = args.values.iter().map(|v| parse_coil(v)).collect::<Result<Vec<bool>, String>>()?;

                let client = self.connect_if_needed().await?;

                match values.as_slice() {
                    [value] => cancel_on_ctrl_c(client.write_single_coil(self.unit_id, address.index, *value)).await??,
                    _ => cancel_on_ctrl_c(client.write_multiple_coils(self.unit_id, address.index, &values)).await??,
                }
            }
            AddressKind::HoldingRegister => {
                let mut values: Vec<u16> = Vec::with_capacity(args.values.len());

                for value in args.values.iter() {
                    values.push(match args.datatype {
                        WriteDatatype::U16 => value.parse::<u16>()?,
                        WriteDatatype::I16 => value.parse::<i16>()? as u16,
                        WriteDatatype::Hex => u16::from_str_radix(value.trim_start_matches("0x"), 16)?,
                        WriteDatatype::Bin => u16::from_str_radix(&value.replace(['_', ' '], ""), 2)?,
                    });
                }

                let client = self.connect_if_needed().await?;

                match values.as_slice() {
                    [value] => cancel_on_ctrl_c(client.write_single_holding_register(self.unit_id, address.index, *value)).await??,
                    _ => cancel_on_ctrl_c(client.write_multiple_holding_registers(self.unit_id, address.index, &values)).await??,
                }
            }
            AddressKind::DiscreteInput | AddressKind::InputRegister => {}
        }

        println!("Wrote {} value(s)", args.values.len());

        Ok(())
    }

    fn print_coils(&mut self, address: Address, values: &[bool]) {
        let mut table = Table::new();
        table.load_preset(presets::NOTHING);
        table.set_header(["Address", "Value"]);

        for (offset, value) in values.iter().enumerate() {
            table.add_row([address.label(offset, self.offset), value.to_string().to_uppercase()]);
        }

        println!("{table}");

        self.last_table = Some(table);
    }

    fn print_registers(&mut self, address: Address, values: &[u16]) {
        let mut table = Table::new();
        table.load_preset(presets::NOTHING);
        table.set_header(["Address", "U16", "I16", "Hex", "Bin"]);

        table.column_iter_mut().skip(1).take(2).for_each(|c| c.set_cell_alignment(CellAlignment::Right));

        for (offset, value) in values.iter().enumerate() {
            table.add_row([
                address.label(offset, self.offset),
                value.to_string(),
                (*value as i16).to_string(),
                format!("{:04X}", value),
                format!("{:04b} {:04b} {:04b} {:04b}", value >> 12 & 0xF, value >> 8 & 0xF, value >> 4 & 0xF, value & 0xF),
            ]);
        }

        println!("{table}");

        self.last_table = Some(table);
    }

    fn export_csv(&self, args: &ExportArgs) -> Result<(), Box<dyn Error>> {
        let Some(table) = &self.last_table else {
            println!("Nothing to export");
            return Ok(());
        };

        let mut writer = csv::Writer::from_path(&args.filename)?;

        if let Some(header) = table.header() {
            writer.write_record(header.cell_iter().map(|c| c.content()))?;
        }

        for row in table.row_iter() {
            writer.write_record(row.cell_iter().map(|c| c.content()))?;
        }
        writer.flush()?;

        println!("Exported {}", args.filename.display());

        Ok(())
    }

    async fn connect_if_needed(&self) -> Result<Arc<ModbusTCPClient>, Box<dyn Error>> {
        if let Some(client) = self.client.lock().await.as_ref() {
            return Ok(client.clone());
        }

        print!("Connecting to {}...", self.host_port);
        std::io::stdout().flush()?;

        let (client, handle) = cancel_on_ctrl_c(ModbusTCPClient::connect(&self.host_port, self.timeout)).await??;

        println!(" Connected");
        println!();

        let client = Arc::new(client);

        _ = self.client.lock().await.insert(client.clone());

        let client_ = self.client.clone();
        let connected = Arc::downgrade(&client);

        tokio::spawn(async move {
            let result = handle.await.unwrap_or(Ok(()));
            let mut current = client_.lock().await;
            // a newer connection may already have replaced this one
            if current.as_ref().is_some_and(|c| std::ptr::eq(Arc::as_ptr(c), connected.as_ptr())) {
                _ = current.take();
                println!();
                println!();
                match result {
                    Ok(_) => println!("Connection closed"),
                    Err(err) => println!("{err}"),
                }
                println!();
            }
        });

        Ok(client)
    }
}

#[derive(Helper, Hinter, Validator, Highlighter)]
struct InteractiveHelper {}
const COMPLETIONS: [&str; 8] = [
    "read ",
    "write ",
    "set offset ",
    "set timeout ",
    "set unit-id ",
    "export ",
    "help",
    "exit",
];

impl Completer for InteractiveHelper {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let matches = COMPLETIONS
            .iter()
            .filter(|cmd| cmd.starts_with(line) && cmd.len() >= pos)
            .map(|cmd| String::from(&cmd[pos..]))
            .collect();

        Ok((pos, matches))
    }
}
