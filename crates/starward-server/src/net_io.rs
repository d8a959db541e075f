//! The IO thread: one mio event loop owning both listener sockets.
//!
//! All socket IO is non-blocking. Inbound bytes become [`IoEvent`]s on a
//! bounded channel; the rest of the server talks back through
//! [`IoCommand`]s and a waker. Game threads never touch a socket.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token, Waker};
use starward_net::prelude::FrameAssembler;

const LISTENER: Token = Token(0);
const UDP: Token = Token(1);
const WAKER: Token = Token(2);
const FIRST_CONN: usize = 3;

const EVENT_QUEUE_DEPTH: usize = 1024;
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Inbound traffic and connection lifecycle, as seen by the session layer.
#[derive(Debug)]
pub enum IoEvent {
    TcpConnected { conn_id: usize, addr: SocketAddr },
    /// One complete `[header][payload]` frame off a TCP stream.
    TcpFrame { conn_id: usize, frame: Vec<u8> },
    TcpClosed { conn_id: usize },
    UdpPacket { addr: SocketAddr, bytes: Vec<u8> },
}

/// Requests into the IO thread.
#[derive(Debug)]
pub enum IoCommand {
    SendTcp { conn_id: usize, bytes: Vec<u8> },
    SendUdp { addr: SocketAddr, bytes: Vec<u8> },
    CloseTcp { conn_id: usize },
    Shutdown,
}

/// Handle to the running IO thread.
pub struct IoHandle {
    pub events: Receiver<IoEvent>,
    commands: Sender<IoCommand>,
    waker: Arc<Waker>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl IoHandle {
    /// Queue a command and wake the poll loop.
    pub fn send(&self, command: IoCommand) {
        if self.commands.send(command).is_ok() {
            let _ = self.waker.wake();
        }
    }

    /// Cheap clone of the command side for match threads.
    pub fn sender(&self) -> IoSender {
        IoSender {
            commands: self.commands.clone(),
            waker: self.waker.clone(),
        }
    }

    pub fn shutdown(mut self) {
        self.send(IoCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Clonable command-side handle.
#[derive(Clone)]
pub struct IoSender {
    commands: Sender<IoCommand>,
    waker: Arc<Waker>,
}

impl IoSender {
    pub fn send(&self, command: IoCommand) {
        if self.commands.send(command).is_ok() {
            let _ = self.waker.wake();
        }
    }
}

/// Anything that can carry [`IoCommand`]s out of the session and match
/// threads. Production uses [`IoSender`]; tests swap in a plain channel.
pub trait Outbound: Clone {
    fn send(&self, command: IoCommand);
}

impl Outbound for IoSender {
    fn send(&self, command: IoCommand) {
        IoSender::send(self, command);
    }
}

impl Outbound for Sender<IoCommand> {
    fn send(&self, command: IoCommand) {
        let _ = Sender::send(self, command);
    }
}

struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    assembler: FrameAssembler,
    outbuf: Vec<u8>,
}

/// Bind both sockets and spawn the event loop thread.
pub fn spawn(bind_host: &str, tcp_port: u16, udp_port: u16) -> io::Result<IoHandle> {
    let tcp_addr: SocketAddr = format!("{bind_host}:{tcp_port}")
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad bind address"))?;
    let udp_addr: SocketAddr = format!("{bind_host}:{udp_port}")
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad bind address"))?;

    let mut listener = TcpListener::bind(tcp_addr)?;
    let mut udp = UdpSocket::bind(udp_addr)?;

    let mut poll = Poll::new()?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)?;
    poll.registry().register(&mut udp, UDP, Interest::READABLE)?;
    let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

    let (event_tx, event_rx) = bounded(EVENT_QUEUE_DEPTH);
    let (cmd_tx, cmd_rx) = bounded::<IoCommand>(EVENT_QUEUE_DEPTH);

    tracing::info!(%tcp_addr, %udp_addr, "io thread listening");

    let join = std::thread::Builder::new()
        .name("starward-io".into())
        .spawn(move || {
            event_loop(poll, listener, udp, event_tx, cmd_rx);
        })?;

    Ok(IoHandle {
        events: event_rx,
        commands: cmd_tx,
        waker,
        join: Some(join),
    })
}

fn post(event_tx: &Sender<IoEvent>, event: IoEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            tracing::warn!(?event, "io event queue full, dropping");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

fn event_loop(
    mut poll: Poll,
    mut listener: TcpListener,
    udp: UdpSocket,
    event_tx: Sender<IoEvent>,
    cmd_rx: Receiver<IoCommand>,
) {
    let mut events = Events::with_capacity(256);
    let mut connections: HashMap<usize, Connection> = HashMap::new();
    let mut next_conn = FIRST_CONN;
    let mut running = true;

    while running {
        if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(%err, "poll failed, io thread exiting");
            break;
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => accept_all(&mut poll, &mut listener, &mut connections, &mut next_conn, &event_tx),
                UDP => read_udp(&udp, &event_tx),
                WAKER => {}
                Token(conn_id) => {
                    if event.is_writable() {
                        flush_connection(&mut poll, &mut connections, conn_id);
                    }
                    if event.is_readable() {
                        read_connection(&mut poll, &mut connections, conn_id, &event_tx);
                    }
                }
            }
        }

        // Drain commands regardless of what woke us.
        while let Ok(command) = cmd_rx.try_recv() {
            match command {
                IoCommand::SendTcp { conn_id, bytes } => {
                    queue_tcp(&mut poll, &mut connections, conn_id, bytes);
                }
                IoCommand::SendUdp { addr, bytes } => match udp.send_to(&bytes, addr) {
                    Ok(_) => {}
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        tracing::debug!(%addr, "udp send would block, dropping datagram");
                    }
                    Err(err) => tracing::warn!(%addr, %err, "udp send failed"),
                },
                IoCommand::CloseTcp { conn_id } => {
                    drop_connection(&mut poll, &mut connections, conn_id);
                }
                IoCommand::Shutdown => {
                    running = false;
                }
            }
        }
    }
    tracing::info!("io thread stopped");
}

fn accept_all(
    poll: &mut Poll,
    listener: &mut TcpListener,
    connections: &mut HashMap<usize, Connection>,
    next_conn: &mut usize,
    event_tx: &Sender<IoEvent>,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                let conn_id = *next_conn;
                *next_conn += 1;
                if let Err(err) =
                    poll.registry()
                        .register(&mut stream, Token(conn_id), Interest::READABLE)
                {
                    tracing::warn!(%addr, %err, "failed to register connection");
                    continue;
                }
                tracing::info!(conn_id, %addr, "tcp connection accepted");
                connections.insert(
                    conn_id,
                    Connection {
                        stream,
                        addr,
                        assembler: FrameAssembler::new(),
                        outbuf: Vec::new(),
                    },
                );
                post(event_tx, IoEvent::TcpConnected { conn_id, addr });
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                break;
            }
        }
    }
}

fn read_udp(udp: &UdpSocket, event_tx: &Sender<IoEvent>) {
    let mut buf = [0u8; 2048];
    loop {
        match udp.recv_from(&mut buf) {
            Ok((len, addr)) => {
                post(
                    event_tx,
                    IoEvent::UdpPacket {
                        addr,
                        bytes: buf[..len].to_vec(),
                    },
                );
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => {
                tracing::warn!(%err, "udp recv failed");
                break;
            }
        }
    }
}

fn read_connection(
    poll: &mut Poll,
    connections: &mut HashMap<usize, Connection>,
    conn_id: usize,
    event_tx: &Sender<IoEvent>,
) {
    let mut closed = false;
    if let Some(conn) = connections.get_mut(&conn_id) {
        let mut buf = [0u8; 4096];
        loop {
            match conn.stream.read(&mut buf) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(len) => conn.assembler.push_bytes(&buf[..len]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(conn_id, %err, "tcp read failed");
                    closed = true;
                    break;
                }
            }
        }

        // Surface complete frames; a framing error poisons the stream.
        loop {
            match conn.assembler.next_frame() {
                Ok(Some(frame)) => post(event_tx, IoEvent::TcpFrame { conn_id, frame }),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(conn_id, %err, "protocol error, closing connection");
                    closed = true;
                    break;
                }
            }
        }
    }

    if closed {
        drop_connection(poll, connections, conn_id);
        post(event_tx, IoEvent::TcpClosed { conn_id });
    }
}

fn queue_tcp(
    poll: &mut Poll,
    connections: &mut HashMap<usize, Connection>,
    conn_id: usize,
    bytes: Vec<u8>,
) {
    let Some(conn) = connections.get_mut(&conn_id) else {
        return;
    };
    conn.outbuf.extend_from_slice(&bytes);
    flush_connection(poll, connections, conn_id);
}

fn flush_connection(
    poll: &mut Poll,
    connections: &mut HashMap<usize, Connection>,
    conn_id: usize,
) {
    let Some(conn) = connections.get_mut(&conn_id) else {
        return;
    };
    while !conn.outbuf.is_empty() {
        match conn.stream.write(&conn.outbuf) {
            Ok(written) => {
                conn.outbuf.drain(..written);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                // Wait for writability to drain the rest.
                let _ = poll.registry().reregister(
                    &mut conn.stream,
                    Token(conn_id),
                    Interest::READABLE | Interest::WRITABLE,
                );
                return;
            }
            Err(err) => {
                tracing::warn!(conn_id, %err, "tcp write failed");
                return;
            }
        }
    }
    let _ = poll
        .registry()
        .reregister(&mut conn.stream, Token(conn_id), Interest::READABLE);
}

fn drop_connection(
    poll: &mut Poll,
    connections: &mut HashMap<usize, Connection>,
    conn_id: usize,
) {
    if let Some(mut conn) = connections.remove(&conn_id) {
        let _ = poll.registry().deregister(&mut conn.stream);
        tracing::info!(conn_id, addr = %conn.addr, "tcp connection closed");
    }
}
