//! The session director: authentication, lobbies, countdowns, chat, and
//! the handoff into running matches.
//!
//! Runs on the main thread. Inbound [`IoEvent`]s are decoded here; UDP
//! reliability state is advanced here; `PLAYER_INPUT` is routed to the
//! owning match's inbox. Matches report back through [`MatchEvent`]s.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use starward_core::config::LOBBY_COUNTDOWN_SECONDS;
use starward_net::message::{self, Message};
use starward_net::prelude::*;
use starward_net::reliable::Delivery;

use crate::clients::ClientManager;
use crate::match_runner::{self, MatchCommand, MatchEvent, MatchHandle};
use crate::net_io::{IoCommand, IoEvent, Outbound};
use crate::persist::{LoginOutcome, Store};

/// Domain error codes carried by ERROR / failing responses.
pub mod err_code {
    pub const FULL_LOBBY: u16 = 1;
    pub const WRONG_PASSWORD: u16 = 2;
    pub const ALREADY_IN_LOBBY: u16 = 3;
    pub const LOBBY_NOT_FOUND: u16 = 4;
    pub const LOBBY_STARTED: u16 = 5;
    pub const BAD_LOGIN: u16 = 6;
    pub const NOT_AUTHENTICATED: u16 = 7;
}

/// Seconds of UDP silence before a peer is dropped.
const PEER_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout sweep cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Lobby {
    id: u16,
    name: String,
    password: String,
    max_players: u8,
    difficulty: u8,
    host: u16,
    /// Join order; the oldest member inherits the host seat.
    members: Vec<u16>,
    ready: BTreeMap<u16, bool>,
    started: bool,
    countdown_deadline: Option<Instant>,
}

impl Lobby {
    fn all_ready(&self) -> bool {
        self.members.len() >= 2 && self.members.iter().all(|id| self.ready.get(id) == Some(&true))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Authenticated,
    InLobby(u16),
    InGame(u16),
}

// ---------------------------------------------------------------------------
// SessionDirector
// ---------------------------------------------------------------------------

pub struct SessionConfig {
    pub udp_port: u16,
    pub default_difficulty: u8,
}

pub struct SessionDirector<O: Outbound> {
    clients: Arc<ClientManager>,
    io: O,
    encoder: Encoder,
    decoder: Decoder,
    lobbies: HashMap<u16, Lobby>,
    next_lobby_id: u16,
    phases: HashMap<u16, Phase>,
    matches: HashMap<u16, MatchHandle>,
    match_events_tx: Sender<MatchEvent>,
    match_events_rx: Receiver<MatchEvent>,
    store: Option<Store>,
    config: SessionConfig,
    last_sweep: Instant,
}

impl<O: Outbound + Send + 'static> SessionDirector<O> {
    pub fn new(clients: Arc<ClientManager>, io: O, store: Option<Store>, config: SessionConfig) -> Self {
        let (match_events_tx, match_events_rx) = unbounded();
        Self {
            clients,
            io,
            encoder: Encoder::with_standard_messages(),
            decoder: Decoder::with_standard_messages(),
            lobbies: HashMap::new(),
            next_lobby_id: 0,
            phases: HashMap::new(),
            matches: HashMap::new(),
            match_events_tx,
            match_events_rx,
            store,
            config,
            last_sweep: Instant::now(),
        }
    }

    // -- outbound helpers ---------------------------------------------------

    fn send_tcp(&self, player_id: u16, msg: &Message) {
        let Some(shared) = self.clients.get(player_id) else {
            return;
        };
        let conn_id = shared.lock().expect("client entry poisoned").conn_id;
        self.send_tcp_conn(conn_id, msg);
    }

    fn send_tcp_conn(&self, conn_id: usize, msg: &Message) {
        match self.encoder.encode(msg, Channel::Tcp, 0, 0, 0) {
            Ok(bytes) => self.io.send(IoCommand::SendTcp { conn_id, bytes }),
            Err(err) => tracing::error!(%err, "failed to encode tcp message"),
        }
    }

    fn send_error(&self, conn_id: usize, code: u16, text: &str) {
        self.send_tcp_conn(
            conn_id,
            &Message::Error(message::ErrorMsg {
                code,
                message: text.to_owned(),
            }),
        );
    }

    fn lobby_update_message(&self, lobby: &Lobby) -> Message {
        let players = lobby
            .members
            .iter()
            .filter_map(|&id| {
                self.clients.get(id).map(|shared| {
                    let entry = shared.lock().expect("client entry poisoned");
                    message::LobbyPlayer {
                        player_id: id,
                        ready: lobby.ready.get(&id).copied().unwrap_or(false),
                        username: entry.username.clone(),
                    }
                })
            })
            .collect();
        Message::LobbyUpdate(message::LobbyUpdate {
            name: lobby.name.clone(),
            host_id: lobby.host,
            started: lobby.started,
            max_players: lobby.max_players,
            difficulty: lobby.difficulty,
            players,
        })
    }

    fn broadcast_lobby_update(&self, lobby_id: u16) {
        let Some(lobby) = self.lobbies.get(&lobby_id) else {
            return;
        };
        let msg = self.lobby_update_message(lobby);
        for &member in &lobby.members {
            self.send_tcp(member, &msg);
        }
    }

    // -- event entry points -------------------------------------------------

    pub fn handle_event(&mut self, event: IoEvent) {
        match event {
            IoEvent::TcpConnected { conn_id, addr } => {
                tracing::debug!(conn_id, %addr, "awaiting login");
            }
            IoEvent::TcpFrame { conn_id, frame } => self.handle_tcp_frame(conn_id, &frame),
            IoEvent::TcpClosed { conn_id } => self.handle_tcp_closed(conn_id),
            IoEvent::UdpPacket { addr, bytes } => self.handle_udp_packet(addr, &bytes),
        }
    }

    /// Periodic work: countdowns, match notifications, timeout sweeps.
    /// Call this a few times per second.
    pub fn pump(&mut self) {
        self.pump_countdowns();
        self.pump_match_events();
        if self.last_sweep.elapsed() >= SWEEP_INTERVAL {
            self.last_sweep = Instant::now();
            self.sweep_timeouts();
        }
    }

    // -- TCP ----------------------------------------------------------------

    fn handle_tcp_frame(&mut self, conn_id: usize, frame: &[u8]) {
        let msg = match self.decoder.decode(frame) {
            Ok((msg, _)) => msg,
            Err(err) => {
                tracing::warn!(conn_id, %err, "undecodable control frame, closing");
                self.io.send(IoCommand::CloseTcp { conn_id });
                return;
            }
        };

        // Login is the only message an unknown connection may send.
        let Some(shared) = self.clients.by_conn(conn_id) else {
            if let Message::LoginRequest(login) = msg {
                self.handle_login(conn_id, login);
            } else {
                self.send_error(conn_id, err_code::NOT_AUTHENTICATED, "login first");
                self.io.send(IoCommand::CloseTcp { conn_id });
            }
            return;
        };
        let player_id = shared.lock().expect("client entry poisoned").id;

        match msg {
            Message::LoginRequest(_) => {
                // Already logged in; ignore.
            }
            Message::LobbyCreate(create) => self.handle_lobby_create(player_id, create),
            Message::LobbyJoinRequest(join) => self.handle_lobby_join(player_id, join),
            Message::LobbyListRequest(_) => self.handle_lobby_list(player_id),
            Message::PlayerReady(ready) => self.handle_player_ready(player_id, ready.ready),
            Message::Chat(chat) => self.handle_chat(player_id, chat),
            Message::LobbyLeave(_) => self.leave_lobby(player_id, true),
            Message::LobbyKick(kick) => self.handle_kick(player_id, kick.player_id),
            Message::ClientLeave(_) => self.disconnect_player(player_id, "client left"),
            other => {
                tracing::debug!(player_id, msg = ?other.msg_type(), "unexpected control message");
            }
        }
    }

    fn handle_login(&mut self, conn_id: usize, login: message::LoginRequest) {
        if login.username.is_empty() {
            self.send_tcp_conn(
                conn_id,
                &Message::LoginResponse(message::LoginResponse {
                    success: false,
                    error_code: err_code::BAD_LOGIN,
                    message: "empty username".into(),
                    ..Default::default()
                }),
            );
            return;
        }

        if let Some(store) = &self.store {
            match store.login(&login.username, &login.password) {
                Ok(LoginOutcome::Ok) | Ok(LoginOutcome::Created) => {}
                Ok(LoginOutcome::WrongPassword) => {
                    self.send_tcp_conn(
                        conn_id,
                        &Message::LoginResponse(message::LoginResponse {
                            success: false,
                            error_code: err_code::BAD_LOGIN,
                            message: "bad credentials".into(),
                            ..Default::default()
                        }),
                    );
                    return;
                }
                Err(err) => {
                    // Persistence failure never locks players out.
                    tracing::error!(%err, "login store failed, accepting without check");
                }
            }
        }

        let (player_id, _) = self.clients.add_from_tcp(conn_id, login.username.clone());
        self.phases.insert(player_id, Phase::Authenticated);
        tracing::info!(player_id, username = %login.username, "player authenticated");
        self.send_tcp_conn(
            conn_id,
            &Message::LoginResponse(message::LoginResponse {
                success: true,
                player_id,
                udp_port: self.config.udp_port,
                ..Default::default()
            }),
        );
    }

    fn handle_lobby_create(&mut self, player_id: u16, create: message::LobbyCreate) {
        if !matches!(self.phases.get(&player_id), Some(Phase::Authenticated)) {
            self.send_error_to(player_id, err_code::ALREADY_IN_LOBBY, "already in a lobby");
            return;
        }
        self.next_lobby_id += 1;
        let lobby_id = self.next_lobby_id;
        let difficulty = if (1..=5).contains(&create.difficulty) {
            create.difficulty
        } else {
            self.config.default_difficulty
        };
        let lobby = Lobby {
            id: lobby_id,
            name: create.lobby_name,
            password: create.password,
            max_players: create.max_players.clamp(2, 8),
            difficulty,
            host: player_id,
            members: vec![player_id],
            ready: BTreeMap::from([(player_id, false)]),
            started: false,
            countdown_deadline: None,
        };
        tracing::info!(lobby_id, name = %lobby.name, host = player_id, "lobby created");
        self.lobbies.insert(lobby_id, lobby);
        self.phases.insert(player_id, Phase::InLobby(lobby_id));
        self.broadcast_lobby_update(lobby_id);
    }

    fn handle_lobby_join(&mut self, player_id: u16, join: message::LobbyJoinRequest) {
        let fail = |code: u16, text: &str| {
            Message::LobbyJoinResponse(message::LobbyJoinResponse {
                success: false,
                error_code: code,
                error_message: text.into(),
                ..Default::default()
            })
        };

        if !matches!(self.phases.get(&player_id), Some(Phase::Authenticated)) {
            self.send_tcp(player_id, &fail(err_code::ALREADY_IN_LOBBY, "already in a lobby"));
            return;
        }
        let Some(lobby) = self.lobbies.get_mut(&join.lobby_id) else {
            self.send_tcp(player_id, &fail(err_code::LOBBY_NOT_FOUND, "no such lobby"));
            return;
        };
        if lobby.started {
            self.send_tcp(player_id, &fail(err_code::LOBBY_STARTED, "game in progress"));
            return;
        }
        if lobby.members.len() >= lobby.max_players as usize {
            self.send_tcp(player_id, &fail(err_code::FULL_LOBBY, "lobby is full"));
            return;
        }
        if !lobby.password.is_empty() && lobby.password != join.password {
            self.send_tcp(player_id, &fail(err_code::WRONG_PASSWORD, "wrong password"));
            return;
        }

        lobby.members.push(player_id);
        lobby.ready.insert(player_id, false);
        let lobby_id = lobby.id;
        self.phases.insert(player_id, Phase::InLobby(lobby_id));

        // Respond to the joiner, then refresh everyone.
        let lobby = &self.lobbies[&lobby_id];
        let players = match self.lobby_update_message(lobby) {
            Message::LobbyUpdate(update) => update.players,
            _ => Vec::new(),
        };
        self.send_tcp(
            player_id,
            &Message::LobbyJoinResponse(message::LobbyJoinResponse {
                success: true,
                lobby_id,
                player_id,
                players,
                ..Default::default()
            }),
        );
        self.broadcast_lobby_update(lobby_id);
        tracing::info!(player_id, lobby_id, "player joined lobby");
    }

    fn handle_lobby_list(&self, player_id: u16) {
        let lobbies = self
            .lobbies
            .values()
            .map(|lobby| message::LobbyInfo {
                lobby_id: lobby.id,
                name: lobby.name.clone(),
                player_count: lobby.members.len() as u8,
                max_players: lobby.max_players,
                difficulty: lobby.difficulty,
                started: lobby.started,
                has_password: !lobby.password.is_empty(),
            })
            .collect();
        self.send_tcp(
            player_id,
            &Message::LobbyListResponse(message::LobbyListResponse { lobbies }),
        );
    }

    fn handle_player_ready(&mut self, player_id: u16, ready: bool) {
        let Some(Phase::InLobby(lobby_id)) = self.phases.get(&player_id).copied() else {
            return;
        };
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            return;
        };
        lobby.ready.insert(player_id, ready);

        if lobby.all_ready() && !lobby.started && lobby.countdown_deadline.is_none() {
            lobby.countdown_deadline =
                Some(Instant::now() + Duration::from_secs(LOBBY_COUNTDOWN_SECONDS as u64));
            let start = Message::LobbyStart(message::LobbyStart {
                countdown: LOBBY_COUNTDOWN_SECONDS,
            });
            for &member in lobby.members.clone().iter() {
                self.send_tcp(member, &start);
            }
            tracing::info!(lobby_id, "all ready, countdown started");
        } else if !ready {
            // Backing out cancels a pending countdown.
            lobby.countdown_deadline = None;
        }
        self.broadcast_lobby_update(lobby_id);
    }

    fn handle_chat(&mut self, player_id: u16, chat: message::Chat) {
        let lobby_id = match self.phases.get(&player_id) {
            Some(Phase::InLobby(id)) | Some(Phase::InGame(id)) => *id,
            _ => return,
        };
        let Some(lobby) = self.lobbies.get(&lobby_id) else {
            return;
        };
        let username = self
            .clients
            .get(player_id)
            .map(|shared| shared.lock().expect("client entry poisoned").username.clone())
            .unwrap_or_default();
        let relay = Message::Chat(message::Chat {
            lobby_id,
            player_name: username,
            text: chat.text,
        });
        for &member in &lobby.members {
            self.send_tcp(member, &relay);
        }
    }

    fn handle_kick(&mut self, player_id: u16, target_id: u16) {
        let Some(Phase::InLobby(lobby_id)) = self.phases.get(&player_id).copied() else {
            return;
        };
        let Some(lobby) = self.lobbies.get(&lobby_id) else {
            return;
        };
        if lobby.host != player_id || !lobby.members.contains(&target_id) {
            return;
        }
        self.send_tcp(
            target_id,
            &Message::LobbyKick(message::LobbyKick {
                player_id: target_id,
            }),
        );
        self.leave_lobby(target_id, true);
    }

    fn send_error_to(&self, player_id: u16, code: u16, text: &str) {
        if let Some(shared) = self.clients.get(player_id) {
            let conn_id = shared.lock().expect("client entry poisoned").conn_id;
            self.send_error(conn_id, code, text);
        }
    }

    fn handle_tcp_closed(&mut self, conn_id: usize) {
        if let Some(shared) = self.clients.by_conn(conn_id) {
            let player_id = shared.lock().expect("client entry poisoned").id;
            self.disconnect_player(player_id, "tcp closed");
        }
    }

    // -- UDP ----------------------------------------------------------------

    fn handle_udp_packet(&mut self, addr: std::net::SocketAddr, bytes: &[u8]) {
        let (msg, header) = match self.decoder.decode(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(%addr, %err, "dropping undecodable datagram");
                return;
            }
        };
        if !header.channel.has_reliability_header() {
            tracing::debug!(%addr, "tcp-flagged datagram, dropping");
            return;
        }

        // First contact: AUTH_UDP binds the return address.
        if let Message::AuthUdp(auth) = &msg {
            if self.clients.associate_udp(auth.player_id, addr) {
                self.clients.touch(auth.player_id);
                tracing::info!(player_id = auth.player_id, %addr, "udp endpoint associated");
            } else {
                tracing::warn!(%addr, "auth from unknown player id");
            }
            return;
        }

        let Some(shared) = self.clients.by_addr(&addr) else {
            tracing::debug!(%addr, "datagram from unauthenticated peer");
            return;
        };

        let (player_id, delivery) = {
            let mut entry = shared.lock().expect("client entry poisoned");
            entry.last_seen = Instant::now();
            // Acks release reliable packets and advance the delta baseline
            // even when the payload is a duplicate.
            entry.endpoint.on_ack(header.ack, header.ack_bits);
            entry.delta.on_ack(header.ack, header.ack_bits);
            (entry.id, entry.endpoint.on_receive_seq(header.seq))
        };
        if delivery == Delivery::Duplicate {
            return;
        }

        match msg {
            Message::PlayerInput(input) => {
                if let Some(Phase::InGame(lobby_id)) = self.phases.get(&player_id) {
                    if let Some(handle) = self.matches.get(lobby_id) {
                        let _ = handle
                            .inbox
                            .try_send(MatchCommand::Input { player_id, input });
                    }
                }
            }
            other => {
                tracing::debug!(player_id, msg = ?other.msg_type(), "unexpected udp message");
            }
        }
    }

    // -- periodic work ------------------------------------------------------

    fn pump_countdowns(&mut self) {
        let due: Vec<u16> = self
            .lobbies
            .values()
            .filter(|lobby| {
                !lobby.started
                    && lobby
                        .countdown_deadline
                        .is_some_and(|deadline| Instant::now() >= deadline)
            })
            .map(|lobby| lobby.id)
            .collect();
        for lobby_id in due {
            self.start_game(lobby_id);
        }
    }

    fn start_game(&mut self, lobby_id: u16) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            return;
        };
        lobby.started = true;
        lobby.countdown_deadline = None;
        let members = lobby.members.clone();
        let difficulty = lobby.difficulty;

        let peers: Vec<_> = members
            .iter()
            .filter_map(|&id| self.clients.get(id).map(|shared| (id, shared)))
            .collect();
        let seed: u64 = rand::random();

        let handle = match_runner::start(
            lobby_id,
            seed,
            difficulty,
            peers,
            self.io.clone(),
            self.match_events_tx.clone(),
        );
        self.matches.insert(lobby_id, handle);

        let start = Message::GameStart(message::GameStart {
            spawn_x: starward_core::config::PLAYER_SPAWN.x,
            spawn_y: starward_core::config::PLAYER_SPAWN.y,
            scroll_speed: 50.0,
        });
        for &member in &members {
            self.phases.insert(member, Phase::InGame(lobby_id));
            self.send_tcp(member, &start);
        }
        tracing::info!(lobby_id, seed, "match launched");
    }

    fn pump_match_events(&mut self) {
        while let Ok(event) = self.match_events_rx.try_recv() {
            match event {
                MatchEvent::PeerUnreachable { player_id, .. } => {
                    self.disconnect_player(player_id, "reliable retries exhausted");
                }
                MatchEvent::Ended {
                    lobby_id,
                    victory,
                    scores,
                } => self.finish_match(lobby_id, victory, scores),
            }
        }
    }

    fn finish_match(&mut self, lobby_id: u16, victory: bool, scores: Vec<message::ScoreEntry>) {
        tracing::info!(lobby_id, victory, "match ended");
        if let Some(handle) = self.matches.remove(&lobby_id) {
            handle.stop();
        }

        // Persist best scores.
        if let Some(store) = &self.store {
            for entry in &scores {
                if let Some(shared) = self.clients.get(entry.player_id) {
                    let username = shared.lock().expect("client entry poisoned").username.clone();
                    if let Err(err) = store.record_score(&username, entry.score) {
                        tracing::error!(%err, username, "failed to persist score");
                    }
                }
            }
        }

        let end = Message::GameEnd(message::GameEnd { victory, scores });
        if let Some(lobby) = self.lobbies.get_mut(&lobby_id) {
            lobby.started = false;
            for ready in lobby.ready.values_mut() {
                *ready = false;
            }
            for &member in lobby.members.clone().iter() {
                self.phases.insert(member, Phase::InLobby(lobby_id));
                self.send_tcp(member, &end);
            }
            self.broadcast_lobby_update(lobby_id);
        }
    }

    fn sweep_timeouts(&mut self) {
        for player_id in self.clients.timed_out(PEER_TIMEOUT) {
            self.disconnect_player(player_id, "udp silence");
        }
    }

    // -- departure ----------------------------------------------------------

    /// Remove a player from their lobby, migrating the host seat or
    /// destroying the lobby when it empties.
    fn leave_lobby(&mut self, player_id: u16, broadcast: bool) {
        let lobby_id = match self.phases.get(&player_id) {
            Some(Phase::InLobby(id)) | Some(Phase::InGame(id)) => *id,
            _ => return,
        };
        self.phases.insert(player_id, Phase::Authenticated);

        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            return;
        };
        lobby.members.retain(|&id| id != player_id);
        lobby.ready.remove(&player_id);
        lobby.countdown_deadline = None;

        if lobby.members.is_empty() {
            tracing::info!(lobby_id, "lobby emptied, destroyed");
            self.lobbies.remove(&lobby_id);
            if let Some(handle) = self.matches.remove(&lobby_id) {
                handle.stop();
            }
            return;
        }
        if lobby.host == player_id {
            lobby.host = lobby.members[0];
            tracing::info!(lobby_id, new_host = lobby.host, "host migrated");
        }
        if broadcast {
            self.broadcast_lobby_update(lobby_id);
        }
    }

    /// Full disconnect: lobby removal, match notification, TCP close, and
    /// client-table cleanup. An in-game slot stays reserved only for the
    /// remainder of the match state the kernel keeps.
    pub fn disconnect_player(&mut self, player_id: u16, reason: &str) {
        tracing::info!(player_id, reason, "disconnecting player");
        if let Some(Phase::InGame(lobby_id)) = self.phases.get(&player_id).copied() {
            if let Some(handle) = self.matches.get(&lobby_id) {
                let _ = handle.inbox.send(MatchCommand::RemovePlayer(player_id));
            }
        }
        self.leave_lobby(player_id, true);
        if let Some(shared) = self.clients.get(player_id) {
            let conn_id = shared.lock().expect("client entry poisoned").conn_id;
            self.io.send(IoCommand::CloseTcp { conn_id });
        }
        self.clients.remove(player_id);
        self.phases.remove(&player_id);
    }

    /// Number of active lobbies (diagnostics).
    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    struct Harness {
        director: SessionDirector<Sender<IoCommand>>,
        out: Receiver<IoCommand>,
    }

    fn harness() -> Harness {
        let (tx, rx) = bounded(1024);
        let director = SessionDirector::new(
            Arc::new(ClientManager::new()),
            tx,
            None,
            SessionConfig {
                udp_port: 4243,
                default_difficulty: 1,
            },
        );
        Harness { director, out: rx }
    }

    fn tcp_frame(msg: &Message) -> Vec<u8> {
        Encoder::with_standard_messages()
            .encode(msg, Channel::Tcp, 0, 0, 0)
            .unwrap()
    }

    /// Decode every TCP message sent to `conn_id` since the last drain.
    fn sent_to(out: &Receiver<IoCommand>, conn_id: usize) -> Vec<Message> {
        let decoder = Decoder::with_standard_messages();
        let mut messages = Vec::new();
        while let Ok(cmd) = out.try_recv() {
            if let IoCommand::SendTcp {
                conn_id: to,
                bytes,
            } = cmd
            {
                if to == conn_id {
                    messages.push(decoder.decode(&bytes).unwrap().0);
                }
            }
        }
        messages
    }

    fn drain(out: &Receiver<IoCommand>) {
        while out.try_recv().is_ok() {}
    }

    fn login(h: &mut Harness, conn_id: usize, username: &str) -> u16 {
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id,
            frame: tcp_frame(&Message::LoginRequest(message::LoginRequest {
                username: username.into(),
                password: "pw".into(),
            })),
        });
        let responses = sent_to(&h.out, conn_id);
        match responses.last() {
            Some(Message::LoginResponse(resp)) if resp.success => resp.player_id,
            other => panic!("expected successful login, got {other:?}"),
        }
    }

    #[test]
    fn login_assigns_player_id_and_udp_port() {
        let mut h = harness();
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::LoginRequest(message::LoginRequest {
                username: "alice".into(),
                password: "pw".into(),
            })),
        });
        let responses = sent_to(&h.out, 3);
        let Some(Message::LoginResponse(resp)) = responses.last() else {
            panic!("no login response");
        };
        assert!(resp.success);
        assert_eq!(resp.player_id, 1);
        assert_eq!(resp.udp_port, 4243);
    }

    #[test]
    fn pre_login_messages_are_rejected() {
        let mut h = harness();
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::PlayerReady(message::PlayerReady { ready: true })),
        });
        let responses = sent_to(&h.out, 3);
        assert!(matches!(
            responses.first(),
            Some(Message::Error(err)) if err.code == err_code::NOT_AUTHENTICATED
        ));
    }

    #[test]
    fn lobby_create_broadcasts_single_member_update() {
        let mut h = harness();
        let alice = login(&mut h, 3, "alice");
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::LobbyCreate(message::LobbyCreate {
                lobby_name: "room".into(),
                player_name: "alice".into(),
                password: String::new(),
                max_players: 2,
                difficulty: 1,
            })),
        });
        let responses = sent_to(&h.out, 3);
        let Some(Message::LobbyUpdate(update)) = responses.last() else {
            panic!("expected lobby update");
        };
        assert_eq!(update.players.len(), 1);
        assert_eq!(update.players[0].player_id, alice);
        assert_eq!(update.host_id, alice);
        assert!(!update.players[0].ready);
    }

    fn create_lobby(h: &mut Harness, conn_id: usize, password: &str, max_players: u8) {
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id,
            frame: tcp_frame(&Message::LobbyCreate(message::LobbyCreate {
                lobby_name: "room".into(),
                player_name: String::new(),
                password: password.into(),
                max_players,
                difficulty: 1,
            })),
        });
    }

    fn join_lobby(h: &mut Harness, conn_id: usize, lobby_id: u16, password: &str) {
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id,
            frame: tcp_frame(&Message::LobbyJoinRequest(message::LobbyJoinRequest {
                lobby_id,
                player_name: String::new(),
                password: password.into(),
            })),
        });
    }

    #[test]
    fn join_flow_reaches_both_members() {
        let mut h = harness();
        let _alice = login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        let bob = login(&mut h, 4, "bob");
        drain(&h.out);

        join_lobby(&mut h, 4, 1, "");

        let to_bob = sent_to(&h.out, 4);
        let Some(Message::LobbyJoinResponse(resp)) = to_bob.first() else {
            panic!("expected join response");
        };
        assert!(resp.success);
        assert_eq!(resp.player_id, bob);
        assert_eq!(resp.players.len(), 2);
    }

    #[test]
    fn wrong_password_fails_join() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "secret", 2);
        login(&mut h, 4, "bob");
        drain(&h.out);

        join_lobby(&mut h, 4, 1, "nope");
        let to_bob = sent_to(&h.out, 4);
        assert!(matches!(
            to_bob.first(),
            Some(Message::LobbyJoinResponse(resp))
                if !resp.success && resp.error_code == err_code::WRONG_PASSWORD
        ));
    }

    #[test]
    fn full_lobby_rejects_third_member() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        login(&mut h, 4, "bob");
        join_lobby(&mut h, 4, 1, "");
        login(&mut h, 5, "carol");
        drain(&h.out);

        join_lobby(&mut h, 5, 1, "");
        let to_carol = sent_to(&h.out, 5);
        assert!(matches!(
            to_carol.first(),
            Some(Message::LobbyJoinResponse(resp))
                if !resp.success && resp.error_code == err_code::FULL_LOBBY
        ));
    }

    #[test]
    fn unknown_lobby_reports_not_found() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        drain(&h.out);
        join_lobby(&mut h, 3, 99, "");
        let responses = sent_to(&h.out, 3);
        assert!(matches!(
            responses.first(),
            Some(Message::LobbyJoinResponse(resp))
                if !resp.success && resp.error_code == err_code::LOBBY_NOT_FOUND
        ));
    }

    #[test]
    fn all_ready_starts_countdown_then_game() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        login(&mut h, 4, "bob");
        join_lobby(&mut h, 4, 1, "");
        drain(&h.out);

        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::PlayerReady(message::PlayerReady { ready: true })),
        });
        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 4,
            frame: tcp_frame(&Message::PlayerReady(message::PlayerReady { ready: true })),
        });

        let to_alice = sent_to(&h.out, 3);
        assert!(
            to_alice
                .iter()
                .any(|m| matches!(m, Message::LobbyStart(start) if start.countdown == 3)),
            "countdown should be announced"
        );

        // Force the deadline and pump.
        if let Some(lobby) = h.director.lobbies.get_mut(&1) {
            lobby.countdown_deadline = Some(Instant::now() - Duration::from_millis(1));
        }
        h.director.pump();

        let to_alice = sent_to(&h.out, 3);
        let start = to_alice.iter().find_map(|m| match m {
            Message::GameStart(start) => Some(*start),
            _ => None,
        });
        let start = start.expect("game start sent");
        assert_eq!((start.spawn_x, start.spawn_y), (200.0, 300.0));
        assert_eq!(start.scroll_speed, 50.0);
        assert!(h.director.matches.contains_key(&1));

        // Stop the spawned match thread.
        if let Some(handle) = h.director.matches.remove(&1) {
            handle.stop();
        }
    }

    #[test]
    fn chat_relays_to_lobby_members() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        login(&mut h, 4, "bob");
        join_lobby(&mut h, 4, 1, "");
        drain(&h.out);

        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::Chat(message::Chat {
                lobby_id: 1,
                player_name: String::new(),
                text: "hello".into(),
            })),
        });

        let to_bob = sent_to(&h.out, 4);
        assert!(matches!(
            to_bob.first(),
            Some(Message::Chat(chat)) if chat.text == "hello" && chat.player_name == "alice"
        ));
    }

    #[test]
    fn host_leaving_migrates_host() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 4);
        let bob = login(&mut h, 4, "bob");
        join_lobby(&mut h, 4, 1, "");
        drain(&h.out);

        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::LobbyLeave(message::LobbyLeave { player_id: 0 })),
        });

        let to_bob = sent_to(&h.out, 4);
        let Some(Message::LobbyUpdate(update)) = to_bob.last() else {
            panic!("expected update after leave");
        };
        assert_eq!(update.host_id, bob);
        assert_eq!(update.players.len(), 1);
    }

    #[test]
    fn empty_lobby_is_destroyed() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        assert_eq!(h.director.lobby_count(), 1);

        h.director.handle_event(IoEvent::TcpFrame {
            conn_id: 3,
            frame: tcp_frame(&Message::LobbyLeave(message::LobbyLeave { player_id: 0 })),
        });
        assert_eq!(h.director.lobby_count(), 0);
    }

    #[test]
    fn tcp_close_removes_member_and_updates_lobby() {
        let mut h = harness();
        login(&mut h, 3, "alice");
        create_lobby(&mut h, 3, "", 2);
        login(&mut h, 4, "bob");
        join_lobby(&mut h, 4, 1, "");
        drain(&h.out);

        h.director.handle_event(IoEvent::TcpClosed { conn_id: 4 });

        let to_alice = sent_to(&h.out, 3);
        let Some(Message::LobbyUpdate(update)) = to_alice.last() else {
            panic!("expected update after disconnect");
        };
        assert_eq!(update.players.len(), 1);
    }
}
