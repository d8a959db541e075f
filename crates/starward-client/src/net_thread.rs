//! The client network thread.
//!
//! One background thread owns both sockets (non-blocking) and runs the
//! symmetric reliable-transport loop: TCP frames for lobby control, UDP
//! for game traffic with sequence/ack bookkeeping, duplicate suppression
//! and retransmission. The game loop talks to it through a single shared
//! state behind one mutex: a decoded-event queue to poll and an action
//! queue to send.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use starward_net::message::{self, Message};
use starward_net::prelude::*;
use starward_net::reliable::Delivery;

use crate::ClientError;

const QUEUE_DEPTH: usize = 256;
const LOOP_NAP: Duration = Duration::from_millis(1);

/// State shared between the game loop and the network thread, guarded by
/// one mutex held briefly on both sides.
struct Shared {
    /// Decoded inbound messages, oldest first.
    events: RingBuffer<(Message, Header)>,
    /// Outbound messages awaiting the thread.
    actions: RingBuffer<Message>,
    /// Sequenced-UDP state (history and ack window).
    endpoint: ReliableEndpoint,
    player_id: Option<u16>,
    udp_port: Option<u16>,
    tcp_connected: bool,
    udp_connected: bool,
}

/// Handle owned by the game loop.
pub struct ClientNetwork {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ClientNetwork {
    /// Connect to a server and start the network thread. The TCP connect
    /// itself happens on the thread; failures surface as reconnect
    /// attempts, not errors here.
    pub fn connect(host: &str, tcp_port: u16) -> Result<Self, ClientError> {
        let shared = Arc::new(Mutex::new(Shared {
            events: RingBuffer::new(QUEUE_DEPTH),
            actions: RingBuffer::new(QUEUE_DEPTH),
            endpoint: ReliableEndpoint::new(),
            player_id: None,
            udp_port: None,
            tcp_connected: false,
            udp_connected: false,
        }));
        let running = Arc::new(AtomicBool::new(true));

        let thread_shared = shared.clone();
        let thread_running = running.clone();
        let host = host.to_owned();
        let join = std::thread::Builder::new()
            .name("starward-net".into())
            .spawn(move || net_loop(&host, tcp_port, thread_shared, thread_running))?;

        Ok(Self {
            shared,
            running,
            join: Some(join),
        })
    }

    /// Queue a message; the thread picks the channel from the type table.
    pub fn send(&self, msg: Message) {
        self.shared
            .lock()
            .expect("net shared poisoned")
            .actions
            .push(msg);
    }

    /// Pop the next decoded event, if any. Called once per frame in a
    /// drain loop.
    pub fn poll_event(&self) -> Option<(Message, Header)> {
        self.shared.lock().expect("net shared poisoned").events.pop()
    }

    pub fn player_id(&self) -> Option<u16> {
        self.shared.lock().expect("net shared poisoned").player_id
    }

    pub fn is_connected(&self) -> bool {
        let shared = self.shared.lock().expect("net shared poisoned");
        shared.tcp_connected
    }

    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ClientNetwork {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// ---------------------------------------------------------------------------
// The thread
// ---------------------------------------------------------------------------

struct Sockets {
    tcp: Option<TcpStream>,
    udp: Option<UdpSocket>,
    assembler: FrameAssembler,
    server_host: String,
}

fn net_loop(host: &str, tcp_port: u16, shared: Arc<Mutex<Shared>>, running: Arc<AtomicBool>) {
    let encoder = Encoder::with_standard_messages();
    let decoder = Decoder::with_standard_messages();
    let mut sockets = Sockets {
        tcp: None,
        udp: None,
        assembler: FrameAssembler::new(),
        server_host: host.to_owned(),
    };
    let mut last_tcp_attempt: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        // (Re)connect TCP with a backoff.
        if sockets.tcp.is_none() {
            let due = last_tcp_attempt
                .map(|at| at.elapsed() >= Duration::from_secs(10))
                .unwrap_or(true);
            if due {
                last_tcp_attempt = Some(Instant::now());
                match connect_tcp(&sockets.server_host, tcp_port) {
                    Ok(stream) => {
                        tracing::info!("tcp connected");
                        sockets.tcp = Some(stream);
                        sockets.assembler = FrameAssembler::new();
                        shared.lock().expect("net shared poisoned").tcp_connected = true;
                    }
                    Err(err) => {
                        tracing::warn!(%err, "tcp connect failed, retrying in 10 s");
                    }
                }
            }
        }

        // Open UDP once the login response told us the port.
        if sockets.udp.is_none() {
            let (udp_port, player_id) = {
                let state = shared.lock().expect("net shared poisoned");
                (state.udp_port, state.player_id)
            };
            if let (Some(port), Some(player_id)) = (udp_port, player_id) {
                match connect_udp(&sockets.server_host, port) {
                    Ok(socket) => {
                        tracing::info!(port, "udp connected");
                        sockets.udp = Some(socket);
                        shared.lock().expect("net shared poisoned").udp_connected = true;
                        // Associate our return address with the player id.
                        send_udp(
                            &encoder,
                            &shared,
                            &mut sockets,
                            &Message::AuthUdp(message::AuthUdp { player_id }),
                        );
                    }
                    Err(err) => tracing::warn!(%err, "udp connect failed"),
                }
            }
        }

        read_tcp(&decoder, &shared, &mut sockets);
        read_udp(&decoder, &shared, &mut sockets);
        retransmit(&shared, &mut sockets);
        flush_actions(&encoder, &shared, &mut sockets);

        std::thread::sleep(LOOP_NAP);
    }
}

fn connect_tcp(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad address"))?;
    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(5))?;
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn connect_udp(host: &str, port: u16) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(format!("{host}:{port}"))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

fn read_tcp(decoder: &Decoder, shared: &Arc<Mutex<Shared>>, sockets: &mut Sockets) {
    let Some(stream) = sockets.tcp.as_mut() else {
        return;
    };
    let mut buf = [0u8; 4096];
    let mut closed = false;
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                closed = true;
                break;
            }
            Ok(len) => sockets.assembler.push_bytes(&buf[..len]),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(%err, "tcp read failed");
                closed = true;
                break;
            }
        }
    }

    loop {
        match sockets.assembler.next_frame() {
            Ok(Some(frame)) => match decoder.decode(&frame) {
                Ok((msg, header)) => {
                    let mut state = shared.lock().expect("net shared poisoned");
                    // Login response carries what UDP needs.
                    if let Message::LoginResponse(resp) = &msg {
                        if resp.success {
                            state.player_id = Some(resp.player_id);
                            state.udp_port = Some(resp.udp_port);
                        }
                    }
                    state.events.push((msg, header));
                }
                Err(err) => tracing::warn!(%err, "undecodable tcp frame"),
            },
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "tcp framing error, dropping connection");
                closed = true;
                break;
            }
        }
    }

    if closed {
        tracing::info!("tcp disconnected");
        sockets.tcp = None;
        let mut state = shared.lock().expect("net shared poisoned");
        state.tcp_connected = false;
    }
}

fn read_udp(decoder: &Decoder, shared: &Arc<Mutex<Shared>>, sockets: &mut Sockets) {
    let Some(socket) = sockets.udp.as_ref() else {
        return;
    };
    let mut buf = [0u8; 2048];
    loop {
        match socket.recv(&mut buf) {
            Ok(len) => match decoder.decode(&buf[..len]) {
                Ok((msg, header)) => {
                    let mut state = shared.lock().expect("net shared poisoned");
                    state.endpoint.on_ack(header.ack, header.ack_bits);
                    if state.endpoint.on_receive_seq(header.seq) == Delivery::Accept {
                        state.events.push((msg, header));
                    }
                }
                Err(err) => tracing::debug!(%err, "undecodable datagram"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) => {
                tracing::warn!(%err, "udp recv failed");
                break;
            }
        }
    }
}

fn retransmit(shared: &Arc<Mutex<Shared>>, sockets: &mut Sockets) {
    let Some(socket) = sockets.udp.as_ref() else {
        return;
    };
    let sweep = {
        let mut state = shared.lock().expect("net shared poisoned");
        state.endpoint.due_for_retransmit(Instant::now())
    };
    for (_, bytes) in sweep.send {
        let _ = socket.send(&bytes);
    }
    if !sweep.exhausted.is_empty() {
        tracing::warn!(
            count = sweep.exhausted.len(),
            "reliable retries exhausted, server unreachable"
        );
        sockets.udp = None;
        shared.lock().expect("net shared poisoned").udp_connected = false;
    }
}

fn send_udp(
    encoder: &Encoder,
    shared: &Arc<Mutex<Shared>>,
    sockets: &mut Sockets,
    msg: &Message,
) {
    let Some(socket) = sockets.udp.as_ref() else {
        return;
    };
    let channel = msg.default_channel();
    let packet = {
        let mut state = shared.lock().expect("net shared poisoned");
        let seq = state.endpoint.next_seq();
        let (ack, ack_bits) = state.endpoint.ack_fields();
        match encoder.encode(msg, channel, seq, ack, ack_bits) {
            Ok(packet) => {
                if channel == Channel::UdpReliable {
                    state.endpoint.track(seq, packet.clone(), Instant::now());
                }
                packet
            }
            Err(err) => {
                tracing::error!(%err, "failed to encode udp message");
                return;
            }
        }
    };
    let _ = socket.send(&packet);
}

fn flush_actions(encoder: &Encoder, shared: &Arc<Mutex<Shared>>, sockets: &mut Sockets) {
    loop {
        // Take one action while holding the lock, send it without.
        let msg = {
            let mut state = shared.lock().expect("net shared poisoned");
            match state.actions.peek() {
                Some(msg) => {
                    let channel = msg.default_channel();
                    let can_send = match channel {
                        Channel::Tcp => state.tcp_connected && sockets.tcp.is_some(),
                        _ => state.udp_connected && sockets.udp.is_some(),
                    };
                    if !can_send {
                        return;
                    }
                    state.actions.pop().expect("peeked action present")
                }
                None => return,
            }
        };

        match msg.default_channel() {
            Channel::Tcp => {
                let packet = match encoder.encode(&msg, Channel::Tcp, 0, 0, 0) {
                    Ok(packet) => packet,
                    Err(err) => {
                        tracing::error!(%err, "failed to encode tcp message");
                        continue;
                    }
                };
                if let Some(stream) = sockets.tcp.as_mut() {
                    if let Err(err) = write_all_nonblocking(stream, &packet) {
                        tracing::warn!(%err, "tcp send failed");
                        sockets.tcp = None;
                        shared.lock().expect("net shared poisoned").tcp_connected = false;
                    }
                }
            }
            _ => send_udp(encoder, shared, sockets, &msg),
        }
    }
}

fn write_all_nonblocking(stream: &mut TcpStream, mut bytes: &[u8]) -> std::io::Result<()> {
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(written) => bytes = &bytes[written..],
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// End-to-end against a scripted fake server on loopback: login over
    /// TCP, AUTH over UDP, then one reliable event delivered exactly once.
    #[test]
    fn login_auth_and_duplicate_suppression() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let tcp_port = listener.local_addr().unwrap().port();
        let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let udp_port = udp.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let encoder = Encoder::with_standard_messages();
            let decoder = Decoder::with_standard_messages();

            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();

            // Read the login request frame.
            let mut assembler = FrameAssembler::new();
            let mut buf = [0u8; 1024];
            let login = loop {
                let len = stream.read(&mut buf).unwrap();
                assembler.push_bytes(&buf[..len]);
                if let Some(frame) = assembler.next_frame().unwrap() {
                    break decoder.decode(&frame).unwrap().0;
                }
            };
            let Message::LoginRequest(req) = login else {
                panic!("expected login request, got {login:?}");
            };
            assert_eq!(req.username, "alice");

            let response = encoder
                .encode(
                    &Message::LoginResponse(message::LoginResponse {
                        success: true,
                        player_id: 1,
                        udp_port,
                        ..Default::default()
                    }),
                    Channel::Tcp,
                    0,
                    0,
                    0,
                )
                .unwrap();
            stream.write_all(&response).unwrap();

            // Expect AUTH_UDP, learning the client's address.
            udp.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut dgram = [0u8; 256];
            let (len, client_addr) = udp.recv_from(&mut dgram).unwrap();
            let (auth, _) = decoder.decode(&dgram[..len]).unwrap();
            assert_eq!(
                auth,
                Message::AuthUdp(message::AuthUdp { player_id: 1 })
            );

            // Send the same reliable BOSS_SPAWN twice (seq 7 duplicated).
            let packet = encoder
                .encode(
                    &Message::BossSpawn(message::BossSpawn {
                        boss_id: 40,
                        kind: 0,
                        max_hp: 300,
                        phase: 1,
                    }),
                    Channel::UdpReliable,
                    7,
                    0,
                    0,
                )
                .unwrap();
            udp.send_to(&packet, client_addr).unwrap();
            udp.send_to(&packet, client_addr).unwrap();
        });

        let client = ClientNetwork::connect("127.0.0.1", tcp_port).unwrap();
        client.send(Message::LoginRequest(message::LoginRequest {
            username: "alice".into(),
            password: "pw".into(),
        }));

        // Collect events until the boss spawn arrives (bounded wait).
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut boss_spawns = 0;
        let mut saw_login = false;
        while Instant::now() < deadline {
            while let Some((msg, _)) = client.poll_event() {
                match msg {
                    Message::LoginResponse(resp) => {
                        assert!(resp.success);
                        saw_login = true;
                    }
                    Message::BossSpawn(spawn) => {
                        assert_eq!(spawn.boss_id, 40);
                        boss_spawns += 1;
                    }
                    other => panic!("unexpected message {other:?}"),
                }
            }
            if boss_spawns > 0 && saw_login {
                // Allow a beat for the duplicate to (not) arrive.
                std::thread::sleep(Duration::from_millis(100));
                while let Some((msg, _)) = client.poll_event() {
                    if matches!(msg, Message::BossSpawn(_)) {
                        boss_spawns += 1;
                    }
                }
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(saw_login, "login response received");
        assert_eq!(boss_spawns, 1, "duplicate reliable packet suppressed");
        assert_eq!(client.player_id(), Some(1));

        client.shutdown();
        server.join().unwrap();
    }
}
