//! In-process Modbus TCP server simulator
//!
//! Serves FC03/FC16 against a holding-register table for integration tests.
//! Faults can be injected per address: an exception response, or closing
//! the connection without answering. Unset addresses answer with
//! Illegal Data Address.

use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::constants::{
    FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS, MBAP_HEADER_LEN,
};

const ILLEGAL_FUNCTION: u8 = 0x01;
const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
const ILLEGAL_DATA_VALUE: u8 = 0x03;

#[derive(Default)]
struct SimulatorState {
    registers: Mutex<HashMap<u16, u16>>,
    exceptions: Mutex<HashMap<u16, u8>>,
    drop_on: Mutex<HashSet<u16>>,
    writes: Mutex<Vec<(u16, Vec<u16>)>>,
    response_delay: Mutex<Duration>,
    requests: AtomicUsize,
    connections: AtomicUsize,
    in_flight: AtomicUsize,
    overlap_detected: AtomicBool,
}

enum Reply {
    Frame(Vec<u8>),
    Hangup,
}

/// Modbus TCP server bound to an ephemeral localhost port
pub struct ModbusTcpSimulator {
    addr: SocketAddr,
    unit_id: u8,
    state: Arc<SimulatorState>,
    generation: watch::Sender<u64>,
    accept_task: JoinHandle<()>,
}

impl ModbusTcpSimulator {
    /// Start listening; requests for other unit ids get no reply
    pub async fn start(unit_id: u8) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(SimulatorState::default());
        let (generation, _) = watch::channel(0u64);

        let accept_state = Arc::clone(&state);
        let accept_kill = generation.subscribe();
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        debug!("Simulator accept error: {}", e);
                        continue;
                    },
                };
                debug!("Simulator connection from {}", peer);
                accept_state.connections.fetch_add(1, Ordering::SeqCst);

                let client_state = Arc::clone(&accept_state);
                let kill = accept_kill.clone();
                tokio::spawn(async move {
                    handle_client(stream, unit_id, client_state, kill).await;
                });
            }
        });

        info!("Modbus TCP simulator listening on {}", addr);
        Ok(Self {
            addr,
            unit_id,
            state,
            generation,
            accept_task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.state.registers.lock().insert(address, value);
    }

    pub fn set_registers(&self, values: &[(u16, u16)]) {
        let mut registers = self.state.registers.lock();
        for (address, value) in values {
            registers.insert(*address, *value);
        }
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.state.registers.lock().get(&address).copied()
    }

    /// Answer any request touching `address` with exception `code`
    pub fn inject_exception(&self, address: u16, code: u8) {
        self.state.exceptions.lock().insert(address, code);
    }

    pub fn clear_exception(&self, address: u16) {
        self.state.exceptions.lock().remove(&address);
    }

    /// Close the connection instead of answering requests touching `address`
    pub fn drop_connection_on(&self, address: u16) {
        self.state.drop_on.lock().insert(address);
    }

    pub fn clear_drop_connection(&self, address: u16) {
        self.state.drop_on.lock().remove(&address);
    }

    /// Delay every response, widening the window for overlap detection
    pub fn set_response_delay(&self, delay: Duration) {
        *self.state.response_delay.lock() = delay;
    }

    /// Close every open client connection; the listener keeps accepting
    pub fn disconnect_clients(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    /// FC16 requests applied so far, in arrival order
    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        self.state.writes.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// True if a request arrived while another was still unanswered
    pub fn overlap_detected(&self) -> bool {
        self.state.overlap_detected.load(Ordering::SeqCst)
    }

    /// Stop accepting and close every client connection
    pub fn stop(&self) {
        self.accept_task.abort();
        self.disconnect_clients();
    }
}

impl Drop for ModbusTcpSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_client(
    mut stream: TcpStream,
    unit_id: u8,
    state: Arc<SimulatorState>,
    mut kill: watch::Receiver<u64>,
) {
    let mut buffer = BytesMut::with_capacity(512);

    loop {
        let read = tokio::select! {
            _ = kill.changed() => return,
            read = stream.read_buf(&mut buffer) => read,
        };
        match read {
            Ok(0) | Err(_) => return,
            Ok(_) => {},
        }

        while buffer.len() >= MBAP_HEADER_LEN + 1 {
            let length = u16::from_be_bytes([buffer[4], buffer[5]]) as usize;
            let frame_length = MBAP_HEADER_LEN + length;
            if buffer.len() < frame_length {
                break;
            }
            let frame = buffer.split_to(frame_length);

            if state.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                state.overlap_detected.store(true, Ordering::SeqCst);
            }
            state.requests.fetch_add(1, Ordering::SeqCst);

            let delay = *state.response_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            // Pipelined request on this connection before our response went out
            if !buffer.is_empty() || matches!(stream.try_read_buf(&mut buffer), Ok(n) if n > 0) {
                state.overlap_detected.store(true, Ordering::SeqCst);
            }

            let reply = process_request(&frame, unit_id, &state);
            state.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                Some(Reply::Frame(response)) => {
                    if stream.write_all(&response).await.is_err() {
                        return;
                    }
                },
                Some(Reply::Hangup) => return,
                None => {},
            }
        }
    }
}

fn process_request(frame: &[u8], unit_id: u8, state: &SimulatorState) -> Option<Reply> {
    let mut header = &frame[..MBAP_HEADER_LEN];
    let transaction_id = header.get_u16();
    let protocol_id = header.get_u16();
    let request_unit = frame[MBAP_HEADER_LEN];
    let pdu = &frame[MBAP_HEADER_LEN + 1..];

    if protocol_id != 0 || request_unit != unit_id || pdu.is_empty() {
        return None;
    }

    let function_code = pdu[0];
    debug!(
        "Simulator request: tid={:04X}, unit={}, FC={:02X}",
        transaction_id, request_unit, function_code
    );

    let response_pdu = match function_code {
        FC_READ_HOLDING_REGISTERS => read_holding_registers(pdu, state),
        FC_WRITE_MULTIPLE_REGISTERS => write_multiple_registers(pdu, state),
        _ => Err(ILLEGAL_FUNCTION),
    };

    let response_pdu = match response_pdu {
        Ok(Some(pdu)) => pdu,
        Ok(None) => return Some(Reply::Hangup),
        Err(code) => vec![function_code | 0x80, code],
    };

    let mut response = Vec::with_capacity(MBAP_HEADER_LEN + 1 + response_pdu.len());
    response.extend_from_slice(&transaction_id.to_be_bytes());
    response.extend_from_slice(&0u16.to_be_bytes());
    response.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
    response.push(request_unit);
    response.extend_from_slice(&response_pdu);
    Some(Reply::Frame(response))
}

/// Fault checks shared by both function codes; `Ok(None)` means hang up
fn check_faults(
    start: u16,
    count: u16,
    state: &SimulatorState,
) -> std::result::Result<Option<()>, u8> {
    let addresses = (0..count).map(|offset| start.wrapping_add(offset));
    {
        let drop_on = state.drop_on.lock();
        if addresses.clone().any(|a| drop_on.contains(&a)) {
            return Ok(None);
        }
    }
    let exceptions = state.exceptions.lock();
    if let Some(code) = addresses.filter_map(|a| exceptions.get(&a)).next() {
        return Err(*code);
    }
    Ok(Some(()))
}

fn read_holding_registers(
    pdu: &[u8],
    state: &SimulatorState,
) -> std::result::Result<Option<Vec<u8>>, u8> {
    if pdu.len() != 5 {
        return Err(ILLEGAL_DATA_VALUE);
    }
    let mut body = &pdu[1..];
    let start = body.get_u16();
    let count = body.get_u16();
    if count == 0 || count > 125 {
        return Err(ILLEGAL_DATA_VALUE);
    }
    if check_faults(start, count, state)?.is_none() {
        return Ok(None);
    }

    let registers = state.registers.lock();
    let mut response = vec![FC_READ_HOLDING_REGISTERS, (count * 2) as u8];
    for offset in 0..count {
        let value = registers
            .get(&start.wrapping_add(offset))
            .ok_or(ILLEGAL_DATA_ADDRESS)?;
        response.extend_from_slice(&value.to_be_bytes());
    }
    Ok(Some(response))
}

fn write_multiple_registers(
    pdu: &[u8],
    state: &SimulatorState,
) -> std::result::Result<Option<Vec<u8>>, u8> {
    if pdu.len() < 6 {
        return Err(ILLEGAL_DATA_VALUE);
    }
    let mut body = &pdu[1..];
    let start = body.get_u16();
    let count = body.get_u16();
    let byte_count = body.get_u8() as usize;
    if count == 0 || byte_count != count as usize * 2 || body.len() != byte_count {
        return Err(ILLEGAL_DATA_VALUE);
    }
    if check_faults(start, count, state)?.is_none() {
        return Ok(None);
    }

    let values: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    {
        let mut registers = state.registers.lock();
        for (offset, value) in values.iter().enumerate() {
            registers.insert(start.wrapping_add(offset as u16), *value);
        }
    }
    state.writes.lock().push((start, values));

    let mut response = vec![FC_WRITE_MULTIPLE_REGISTERS];
    response.extend_from_slice(&start.to_be_bytes());
    response.extend_from_slice(&count.to_be_bytes());
    Ok(Some(response))
}
