use std::{net::SocketAddr, sync::Arc, time::Duration};

use modbus_tcp::{
    BankSizes, BitBank, Decoder, Encodable, FunctionCode, Message, ModbusError, ModbusException, ModbusTCPClient, ModbusTCPServer, RegisterBank,
    RegisterStore, ServerHandle,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};

async fn start_server(sizes: BankSizes, max_connections: Option<usize>, idle_timeout: Option<Duration>) -> (ServerHandle, Arc<RegisterStore>) {
    let store = Arc::new(RegisterStore::new(sizes));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let handle = ModbusTCPServer::new(listener, store.clone())
        .with_max_connections(max_connections)
        .with_idle_timeout(idle_timeout)
        .spawn()
        .unwrap();
    (handle, store)
}

async fn connect(addr: SocketAddr) -> ModbusTCPClient {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (client, _) = ModbusTCPClient::new(stream);
    client.with_timeout(Duration::from_secs(2))
}

fn frame(transaction_id: u16, function_code: u8, body: Vec<u8>) -> Vec<u8> {
    Message {
        transaction_id,
        protocol_id: 0,
        unit_id: 1,
        function_code: FunctionCode::from(function_code),
        body,
    }
    .encode_to_bytes()
    .unwrap()
}

/// Reads until the peer closes, failing if it does not within a second.
async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let result = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf)).await;
    assert!(matches!(result, Ok(Ok(0)) | Ok(Err(_))), "connection still open: {result:?}");
}

async fn wait_for_sessions(handle: &ServerHandle, count: usize) {
    for _ in 0..100 {
        if handle.active_sessions() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} active session(s), found {}", handle.active_sessions());
}

#[tokio::test]
pub async fn read_write_holding_register() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let client = connect(server.local_addr()).await;

    assert_eq!(client.read_holding_registers(1, 0, 1).await.unwrap(), vec![0]);
    client.write_single_holding_register(1, 0, 42).await.unwrap();
    assert_eq!(client.read_holding_registers(1, 0, 1).await.unwrap(), vec![42]);
}

#[tokio::test]
pub async fn all_banks_are_reachable() {
    let (server, store) = start_server(BankSizes::uniform(32), None, None).await;
    store.write_bits(BitBank::DiscreteInputs, 3, &[true, false, true]).await.unwrap();
    store.write_registers(RegisterBank::InputRegisters, 30, &[7, 8]).await.unwrap();

    let client = connect(server.local_addr()).await;

    assert_eq!(client.read_discrete_inputs(1, 2, 5).await.unwrap(), vec![false, true, false, true, false]);
    assert_eq!(client.read_input_registers(1, 30, 2).await.unwrap(), vec![7, 8]);

    client.write_single_coil(1, 0, true).await.unwrap();
    client.write_multiple_coils(1, 8, &[true, true, false, true]).await.unwrap();
    assert_eq!(
        client.read_coils(1, 0, 12).await.unwrap(),
        vec![true, false, false, false, false, false, false, false, true, true, false, true]
    );

    client.write_multiple_holding_registers(1, 29, &[1, 2, 3]).await.unwrap();
    assert_eq!(store.read_registers(RegisterBank::HoldingRegisters, 29, 3).await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
pub async fn out_of_range_is_an_exception_not_a_disconnect() {
    let (server, store) = start_server(BankSizes::uniform(10), None, None).await;
    let client = connect(server.local_addr()).await;

    assert_eq!(client.read_holding_registers(1, 9, 1).await.unwrap(), vec![0]);
    assert!(matches!(
        client.read_holding_registers(1, 10, 1).await,
        Err(ModbusError::ModbusException(ModbusException::IllegalDataAddress))
    ));
    assert!(matches!(
        client.write_multiple_holding_registers(1, 8, &[1, 2, 3]).await,
        Err(ModbusError::ModbusException(ModbusException::IllegalDataAddress))
    ));
    assert_eq!(store.read_registers(RegisterBank::HoldingRegisters, 8, 2).await.unwrap(), vec![0, 0]);

    client.write_single_holding_register(1, 9, 5).await.unwrap();
    assert_eq!(client.read_holding_registers(1, 9, 1).await.unwrap(), vec![5]);
}

#[tokio::test]
pub async fn unsupported_function_gets_illegal_function() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    stream.write_all(&frame(0x1234, 0x2B, vec![0x0E, 0x01, 0x00])).await.unwrap();

    let mut reply = [0u8; 9];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x12, 0x34, 0x00, 0x00, 0x00, 0x03, 0x01, 0xAB, 0x01]);
}

#[tokio::test]
pub async fn invalid_quantity_gets_illegal_data_value() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    // 126 registers is one more than a single read may return
    stream.write_all(&frame(5, 0x03, vec![0x00, 0x00, 0x00, 126])).await.unwrap();

    let mut reply = [0u8; 9];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, [0x00, 0x05, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x03]);
}

#[tokio::test]
pub async fn back_to_back_frames_are_answered_in_order() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    let mut bytes = frame(1, 0x06, vec![0x00, 0x02, 0x00, 0x2A]);
    bytes.extend(frame(2, 0x03, vec![0x00, 0x02, 0x00, 0x01]));
    stream.write_all(&bytes).await.unwrap();

    let mut reply = [0u8; 12 + 11];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..12], &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x02, 0x00, 0x2A]);
    assert_eq!(&reply[12..], &[0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A]);
}

#[tokio::test]
pub async fn framing_error_closes_only_that_connection() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let client = connect(server.local_addr()).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    // protocol id 7
    stream.write_all(&[0x00, 0x01, 0x00, 0x07, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01]).await.unwrap();
    expect_closed(&mut stream).await;

    assert_eq!(client.read_holding_registers(1, 0, 1).await.unwrap(), vec![0]);
}

#[tokio::test]
pub async fn disconnect_does_not_affect_other_sessions() {
    let (server, store) = start_server(BankSizes::default(), None, None).await;

    let client_b = connect(server.local_addr()).await;
    client_b.write_single_holding_register(1, 3, 99).await.unwrap();

    let mut stream_a = TcpStream::connect(server.local_addr()).await.unwrap();
    // half a write request, then gone
    let request = frame(9, 0x06, vec![0x00, 0x03, 0x00, 0x01]);
    stream_a.write_all(&request[..8]).await.unwrap();
    drop(stream_a);

    wait_for_sessions(&server, 1).await;

    assert_eq!(client_b.read_holding_registers(1, 3, 1).await.unwrap(), vec![99]);
    client_b.write_single_holding_register(1, 4, 100).await.unwrap();
    assert_eq!(store.read_registers(RegisterBank::HoldingRegisters, 3, 2).await.unwrap(), vec![99, 100]);
}

#[tokio::test]
pub async fn multi_register_writes_are_never_seen_half_done() {
    let (server, _) = start_server(BankSizes::uniform(100), None, None).await;
    let writer = connect(server.local_addr()).await;
    let reader = connect(server.local_addr()).await;

    let write = async {
        for value in 1..=200u16 {
            writer.write_multiple_holding_registers(1, 10, &[value; 10]).await.unwrap();
        }
    };

    let read = async {
        for _ in 0..200 {
            let values = reader.read_holding_registers(1, 5, 10).await.unwrap();
            assert_eq!(&values[..5], &[0; 5]);
            assert!(values[5..].iter().all(|v| *v == values[5]), "torn write observed: {values:?}");
        }
    };

    tokio::join!(write, read);
}

#[tokio::test]
pub async fn concurrent_calls_share_one_client() {
    let (server, store) = start_server(BankSizes::default(), None, None).await;
    store.write_registers(RegisterBank::InputRegisters, 0, &[1, 2, 3]).await.unwrap();
    let client = connect(server.local_addr()).await;

    let (a, b, c) = tokio::join!(
        client.read_input_registers(1, 0, 1),
        client.read_input_registers(1, 1, 1),
        client.read_input_registers(1, 2, 1)
    );
    assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (vec![1], vec![2], vec![3]));
}

#[tokio::test]
pub async fn client_validates_before_sending() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let client = connect(server.local_addr()).await;

    assert!(matches!(client.read_coils(1, 0, 0).await, Err(ModbusError::ArgumentsOutOfRange(_))));
    assert!(matches!(client.read_holding_registers(1, 0, 126).await, Err(ModbusError::ArgumentsOutOfRange(_))));
    assert!(matches!(
        client.write_multiple_holding_registers(1, 0xFFFF, &[1, 2]).await,
        Err(ModbusError::ArgumentsOutOfRange(_))
    ));
}

#[tokio::test]
pub async fn client_times_out_on_a_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap() });

    let client = connect(addr).await.with_timeout(Duration::from_millis(100));
    assert_eq!(client.timeout(), Duration::from_millis(100));
    let _silent = accept.await.unwrap();

    assert!(matches!(
        client.read_holding_registers(1, 0, 1).await,
        Err(ModbusError::Timeout(timeout)) if timeout == Duration::from_millis(100)
    ));
}

#[tokio::test]
pub async fn connections_over_the_limit_are_closed() {
    let (server, _) = start_server(BankSizes::default(), Some(1), None).await;

    let first = connect(server.local_addr()).await;
    first.read_coils(1, 0, 1).await.unwrap();

    let mut second = TcpStream::connect(server.local_addr()).await.unwrap();
    expect_closed(&mut second).await;

    drop(first);
    wait_for_sessions(&server, 0).await;

    let third = connect(server.local_addr()).await;
    assert_eq!(third.read_coils(1, 0, 1).await.unwrap(), vec![false]);
}

#[tokio::test]
pub async fn idle_sessions_are_closed() {
    let (server, _) = start_server(BankSizes::default(), None, Some(Duration::from_millis(50))).await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    expect_closed(&mut stream).await;
    wait_for_sessions(&server, 0).await;
}

#[tokio::test]
pub async fn shutdown_closes_every_session() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;
    let addr = server.local_addr();

    let stream = TcpStream::connect(addr).await.unwrap();
    let (client, closed) = ModbusTCPClient::new(stream);
    client.read_coils(1, 0, 1).await.unwrap();

    tokio::time::timeout(Duration::from_secs(1), server.shutdown()).await.unwrap();

    assert!(tokio::time::timeout(Duration::from_secs(1), closed).await.is_ok());
    assert!(client.read_coils(1, 0, 1).await.is_err());
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
pub async fn timed_out_writes_leave_the_stream_framed() {
    const CALLS: u16 = 20_000;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // stall long enough for the client's writes to back up, then record the whole stream
    let recorder = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        bytes
    });

    let client = Arc::new(connect(addr).await.with_timeout(Duration::from_millis(300)));

    let mut calls = JoinSet::new();
    for value in 0..CALLS {
        let client = client.clone();
        calls.spawn(async move { client.write_multiple_holding_registers(1, 0, &[value; 123]).await });
    }
    while let Some(result) = calls.join_next().await {
        assert!(matches!(result.unwrap(), Err(ModbusError::Timeout(_))));
    }
    drop(client);

    let bytes = recorder.await.unwrap();
    let mut decoder = Decoder::new(&bytes);
    let mut frames = 0;
    while decoder.remaining() > 0 {
        let msg: Message = decoder
            .read_type()
            .unwrap_or_else(|err| panic!("stream corrupted after {frames} frames: {err}"));
        assert_eq!(msg.function_code, FunctionCode::WriteMultipleHoldingRegisters);
        frames += 1;
    }
    assert_eq!(frames, CALLS as usize);
}

#[tokio::test]
pub async fn shutdown_does_not_wait_for_a_peer_that_never_reads() {
    let (server, _) = start_server(BankSizes::default(), None, None).await;

    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let (_reader, mut writer) = stream.into_split();

    // replies to these pile up until the session blocks writing
    let request = frame(1, 0x03, vec![0x00, 0x00, 0x00, 125]);
    let flood = tokio::spawn(async move {
        for _ in 0..100_000 {
            if writer.write_all(&request).await.is_err() {
                break;
            }
        }
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(server.active_sessions(), 1);

    assert!(tokio::time::timeout(Duration::from_secs(3), server.shutdown()).await.is_ok());
    flood.abort();
}
