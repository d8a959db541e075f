//! Symmetric encoder/decoder tables.
//!
//! Both directions are tables indexed by the 1-byte message type;
//! registering a message means providing a (serialize, deserialize) pair
//! keyed by that byte. [`Encoder::with_standard_messages`] and
//! [`Decoder::with_standard_messages`] install the full protocol table.

use crate::frame::{Channel, Header};
use crate::message::{mask::*, *};
use crate::wire::{self, Reader};
use crate::NetError;

/// Serializes one message's payload (header excluded).
pub type EncodeFn = fn(&Message, &mut Vec<u8>) -> Result<(), NetError>;
/// Deserializes one message's payload (header already consumed).
pub type DecodeFn = fn(&mut Reader<'_>) -> Result<Message, NetError>;

fn wrong_variant(msg_type: u8) -> NetError {
    NetError::Malformed {
        msg_type,
        detail: "message variant does not match registered type",
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub struct Encoder {
    handlers: [Option<EncodeFn>; 256],
}

impl Encoder {
    /// An empty table; use [`register`](Self::register) to fill it.
    pub fn new() -> Self {
        Self {
            handlers: [None; 256],
        }
    }

    /// The full protocol table.
    pub fn with_standard_messages() -> Self {
        let mut encoder = Self::new();
        encoder.register(MsgType::LoginRequest, enc_login_request);
        encoder.register(MsgType::LoginResponse, enc_login_response);
        encoder.register(MsgType::LobbyCreate, enc_lobby_create);
        encoder.register(MsgType::LobbyJoinRequest, enc_lobby_join_request);
        encoder.register(MsgType::LobbyJoinResponse, enc_lobby_join_response);
        encoder.register(MsgType::LobbyListRequest, enc_lobby_list_request);
        encoder.register(MsgType::LobbyListResponse, enc_lobby_list_response);
        encoder.register(MsgType::PlayerReady, enc_player_ready);
        encoder.register(MsgType::LobbyUpdate, enc_lobby_update);
        encoder.register(MsgType::LobbyLeave, enc_lobby_leave);
        encoder.register(MsgType::LobbyStart, enc_lobby_start);
        encoder.register(MsgType::Chat, enc_chat);
        encoder.register(MsgType::LobbyKick, enc_lobby_kick);
        encoder.register(MsgType::GameStart, enc_game_start);
        encoder.register(MsgType::GameEnd, enc_game_end);
        encoder.register(MsgType::ClientLeave, enc_client_leave);
        encoder.register(MsgType::Error, enc_error);
        encoder.register(MsgType::PlayerInput, enc_player_input);
        encoder.register(MsgType::GameState, enc_game_state);
        encoder.register(MsgType::AuthUdp, enc_auth_udp);
        encoder.register(MsgType::BossSpawn, enc_boss_spawn);
        encoder.register(MsgType::BossUpdate, enc_boss_update);
        encoder.register(MsgType::EnemyHit, enc_enemy_hit);
        encoder.register(MsgType::ForceState, enc_force_state);
        encoder
    }

    pub fn register(&mut self, msg_type: MsgType, handler: EncodeFn) {
        self.handlers[msg_type as usize] = Some(handler);
    }

    /// Serialize `msg` into a framed packet for `channel`, stamping the
    /// reliability fields when the channel carries them.
    pub fn encode(
        &self,
        msg: &Message,
        channel: Channel,
        seq: u16,
        ack: u16,
        ack_bits: u32,
    ) -> Result<Vec<u8>, NetError> {
        let msg_type = msg.msg_type() as u8;
        let handler = self.handlers[msg_type as usize].ok_or(NetError::UnknownType(msg_type))?;

        let mut payload = Vec::with_capacity(64);
        handler(msg, &mut payload)?;

        let header = Header {
            msg_type,
            channel,
            payload_len: payload.len() as u32,
            seq,
            ack,
            ack_bits,
        };
        Ok(header.frame(&payload))
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::with_standard_messages()
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

pub struct Decoder {
    handlers: [Option<DecodeFn>; 256],
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            handlers: [None; 256],
        }
    }

    pub fn with_standard_messages() -> Self {
        let mut decoder = Self::new();
        decoder.register(MsgType::LoginRequest, dec_login_request);
        decoder.register(MsgType::LoginResponse, dec_login_response);
        decoder.register(MsgType::LobbyCreate, dec_lobby_create);
        decoder.register(MsgType::LobbyJoinRequest, dec_lobby_join_request);
        decoder.register(MsgType::LobbyJoinResponse, dec_lobby_join_response);
        decoder.register(MsgType::LobbyListRequest, dec_lobby_list_request);
        decoder.register(MsgType::LobbyListResponse, dec_lobby_list_response);
        decoder.register(MsgType::PlayerReady, dec_player_ready);
        decoder.register(MsgType::LobbyUpdate, dec_lobby_update);
        decoder.register(MsgType::LobbyLeave, dec_lobby_leave);
        decoder.register(MsgType::LobbyStart, dec_lobby_start);
        decoder.register(MsgType::Chat, dec_chat);
        decoder.register(MsgType::LobbyKick, dec_lobby_kick);
        decoder.register(MsgType::GameStart, dec_game_start);
        decoder.register(MsgType::GameEnd, dec_game_end);
        decoder.register(MsgType::ClientLeave, dec_client_leave);
        decoder.register(MsgType::Error, dec_error);
        decoder.register(MsgType::PlayerInput, dec_player_input);
        decoder.register(MsgType::GameState, dec_game_state);
        decoder.register(MsgType::AuthUdp, dec_auth_udp);
        decoder.register(MsgType::BossSpawn, dec_boss_spawn);
        decoder.register(MsgType::BossUpdate, dec_boss_update);
        decoder.register(MsgType::EnemyHit, dec_enemy_hit);
        decoder.register(MsgType::ForceState, dec_force_state);
        decoder
    }

    pub fn register(&mut self, msg_type: MsgType, handler: DecodeFn) {
        self.handlers[msg_type as usize] = Some(handler);
    }

    /// Parse a complete framed packet into the message and its header.
    pub fn decode(&self, packet: &[u8]) -> Result<(Message, Header), NetError> {
        let (header, offset) = Header::parse(packet)?;
        let handler = self.handlers[header.msg_type as usize]
            .ok_or(NetError::UnknownType(header.msg_type))?;
        let payload = &packet[offset..offset + header.payload_len as usize];
        let mut reader = Reader::new(payload);
        let msg = handler(&mut reader)?;
        Ok((msg, header))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::with_standard_messages()
    }
}

// ---------------------------------------------------------------------------
// Payload serializers -- TCP control messages
// ---------------------------------------------------------------------------

const T_LOGIN_REQUEST: u8 = MsgType::LoginRequest as u8;
const T_LOGIN_RESPONSE: u8 = MsgType::LoginResponse as u8;
const T_LOBBY_CREATE: u8 = MsgType::LobbyCreate as u8;
const T_LOBBY_JOIN_REQUEST: u8 = MsgType::LobbyJoinRequest as u8;
const T_LOBBY_JOIN_RESPONSE: u8 = MsgType::LobbyJoinResponse as u8;
const T_LOBBY_LIST_REQUEST: u8 = MsgType::LobbyListRequest as u8;
const T_LOBBY_LIST_RESPONSE: u8 = MsgType::LobbyListResponse as u8;
const T_PLAYER_READY: u8 = MsgType::PlayerReady as u8;
const T_LOBBY_UPDATE: u8 = MsgType::LobbyUpdate as u8;
const T_LOBBY_LEAVE: u8 = MsgType::LobbyLeave as u8;
const T_LOBBY_START: u8 = MsgType::LobbyStart as u8;
const T_CHAT: u8 = MsgType::Chat as u8;
const T_LOBBY_KICK: u8 = MsgType::LobbyKick as u8;
const T_GAME_START: u8 = MsgType::GameStart as u8;
const T_GAME_END: u8 = MsgType::GameEnd as u8;
const T_CLIENT_LEAVE: u8 = MsgType::ClientLeave as u8;
const T_ERROR: u8 = MsgType::Error as u8;
const T_PLAYER_INPUT: u8 = MsgType::PlayerInput as u8;
const T_GAME_STATE: u8 = MsgType::GameState as u8;
const T_AUTH_UDP: u8 = MsgType::AuthUdp as u8;
const T_BOSS_SPAWN: u8 = MsgType::BossSpawn as u8;
const T_BOSS_UPDATE: u8 = MsgType::BossUpdate as u8;
const T_ENEMY_HIT: u8 = MsgType::EnemyHit as u8;
const T_FORCE_STATE: u8 = MsgType::ForceState as u8;

fn enc_login_request(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LoginRequest(m) = msg else {
        return Err(wrong_variant(T_LOGIN_REQUEST));
    };
    wire::write_str(out, &m.username);
    wire::write_str(out, &m.password);
    Ok(())
}

fn dec_login_request(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LoginRequest(LoginRequest {
        username: wire::read_str(r, T_LOGIN_REQUEST)?,
        password: wire::read_str(r, T_LOGIN_REQUEST)?,
    }))
}

fn enc_login_response(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LoginResponse(m) = msg else {
        return Err(wrong_variant(T_LOGIN_RESPONSE));
    };
    wire::write_bool(out, m.success);
    if m.success {
        wire::write_u16(out, m.player_id);
        wire::write_u16(out, m.udp_port);
    } else {
        wire::write_u16(out, m.error_code);
        wire::write_str(out, &m.message);
    }
    Ok(())
}

fn dec_login_response(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let success = wire::read_bool(r, T_LOGIN_RESPONSE)?;
    let mut m = LoginResponse {
        success,
        ..Default::default()
    };
    if success {
        m.player_id = wire::read_u16(r, T_LOGIN_RESPONSE)?;
        m.udp_port = wire::read_u16(r, T_LOGIN_RESPONSE)?;
    } else {
        m.error_code = wire::read_u16(r, T_LOGIN_RESPONSE)?;
        m.message = wire::read_str(r, T_LOGIN_RESPONSE)?;
    }
    Ok(Message::LoginResponse(m))
}

fn enc_lobby_create(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyCreate(m) = msg else {
        return Err(wrong_variant(T_LOBBY_CREATE));
    };
    wire::write_str(out, &m.lobby_name);
    wire::write_str(out, &m.player_name);
    wire::write_str(out, &m.password);
    wire::write_u8(out, m.max_players);
    wire::write_u8(out, m.difficulty);
    Ok(())
}

fn dec_lobby_create(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyCreate(LobbyCreate {
        lobby_name: wire::read_str(r, T_LOBBY_CREATE)?,
        player_name: wire::read_str(r, T_LOBBY_CREATE)?,
        password: wire::read_str(r, T_LOBBY_CREATE)?,
        max_players: wire::read_u8(r, T_LOBBY_CREATE)?,
        difficulty: wire::read_u8(r, T_LOBBY_CREATE)?,
    }))
}

fn enc_lobby_join_request(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyJoinRequest(m) = msg else {
        return Err(wrong_variant(T_LOBBY_JOIN_REQUEST));
    };
    wire::write_u16(out, m.lobby_id);
    wire::write_str(out, &m.player_name);
    wire::write_str(out, &m.password);
    Ok(())
}

fn dec_lobby_join_request(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyJoinRequest(LobbyJoinRequest {
        lobby_id: wire::read_u16(r, T_LOBBY_JOIN_REQUEST)?,
        player_name: wire::read_str(r, T_LOBBY_JOIN_REQUEST)?,
        password: wire::read_str(r, T_LOBBY_JOIN_REQUEST)?,
    }))
}

fn write_lobby_player(out: &mut Vec<u8>, player: &LobbyPlayer) {
    wire::write_u16(out, player.player_id);
    wire::write_bool(out, player.ready);
    wire::write_str(out, &player.username);
}

fn read_lobby_player(r: &mut Reader<'_>, msg_type: u8) -> Result<LobbyPlayer, NetError> {
    Ok(LobbyPlayer {
        player_id: wire::read_u16(r, msg_type)?,
        ready: wire::read_bool(r, msg_type)?,
        username: wire::read_str(r, msg_type)?,
    })
}

fn enc_lobby_join_response(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyJoinResponse(m) = msg else {
        return Err(wrong_variant(T_LOBBY_JOIN_RESPONSE));
    };
    wire::write_bool(out, m.success);
    if m.success {
        wire::write_u16(out, m.lobby_id);
        wire::write_u16(out, m.player_id);
        wire::write_u8(out, m.players.len() as u8);
        for player in &m.players {
            write_lobby_player(out, player);
        }
    } else {
        wire::write_u16(out, m.error_code);
        wire::write_str(out, &m.error_message);
    }
    Ok(())
}

fn dec_lobby_join_response(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let success = wire::read_bool(r, T_LOBBY_JOIN_RESPONSE)?;
    let mut m = LobbyJoinResponse {
        success,
        ..Default::default()
    };
    if success {
        m.lobby_id = wire::read_u16(r, T_LOBBY_JOIN_RESPONSE)?;
        m.player_id = wire::read_u16(r, T_LOBBY_JOIN_RESPONSE)?;
        let count = wire::read_u8(r, T_LOBBY_JOIN_RESPONSE)?;
        for _ in 0..count {
            m.players.push(read_lobby_player(r, T_LOBBY_JOIN_RESPONSE)?);
        }
    } else {
        m.error_code = wire::read_u16(r, T_LOBBY_JOIN_RESPONSE)?;
        m.error_message = wire::read_str(r, T_LOBBY_JOIN_RESPONSE)?;
    }
    Ok(Message::LobbyJoinResponse(m))
}

fn enc_lobby_list_request(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyListRequest(m) = msg else {
        return Err(wrong_variant(T_LOBBY_LIST_REQUEST));
    };
    wire::write_u16(out, m.player_id);
    Ok(())
}

fn dec_lobby_list_request(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyListRequest(LobbyListRequest {
        player_id: wire::read_u16(r, T_LOBBY_LIST_REQUEST)?,
    }))
}

fn enc_lobby_list_response(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyListResponse(m) = msg else {
        return Err(wrong_variant(T_LOBBY_LIST_RESPONSE));
    };
    wire::write_u8(out, m.lobbies.len() as u8);
    for lobby in &m.lobbies {
        wire::write_u16(out, lobby.lobby_id);
        wire::write_str(out, &lobby.name);
        wire::write_u8(out, lobby.player_count);
        wire::write_u8(out, lobby.max_players);
        wire::write_u8(out, lobby.difficulty);
        wire::write_bool(out, lobby.started);
        wire::write_bool(out, lobby.has_password);
    }
    Ok(())
}

fn dec_lobby_list_response(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let count = wire::read_u8(r, T_LOBBY_LIST_RESPONSE)?;
    let mut m = LobbyListResponse::default();
    for _ in 0..count {
        m.lobbies.push(LobbyInfo {
            lobby_id: wire::read_u16(r, T_LOBBY_LIST_RESPONSE)?,
            name: wire::read_str(r, T_LOBBY_LIST_RESPONSE)?,
            player_count: wire::read_u8(r, T_LOBBY_LIST_RESPONSE)?,
            max_players: wire::read_u8(r, T_LOBBY_LIST_RESPONSE)?,
            difficulty: wire::read_u8(r, T_LOBBY_LIST_RESPONSE)?,
            started: wire::read_bool(r, T_LOBBY_LIST_RESPONSE)?,
            has_password: wire::read_bool(r, T_LOBBY_LIST_RESPONSE)?,
        });
    }
    Ok(Message::LobbyListResponse(m))
}

fn enc_player_ready(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::PlayerReady(m) = msg else {
        return Err(wrong_variant(T_PLAYER_READY));
    };
    wire::write_bool(out, m.ready);
    Ok(())
}

fn dec_player_ready(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::PlayerReady(PlayerReady {
        ready: wire::read_bool(r, T_PLAYER_READY)?,
    }))
}

fn enc_lobby_update(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyUpdate(m) = msg else {
        return Err(wrong_variant(T_LOBBY_UPDATE));
    };
    wire::write_str(out, &m.name);
    wire::write_u16(out, m.host_id);
    wire::write_bool(out, m.started);
    wire::write_u8(out, m.max_players);
    wire::write_u8(out, m.difficulty);
    wire::write_u8(out, m.players.len() as u8);
    for player in &m.players {
        write_lobby_player(out, player);
    }
    Ok(())
}

fn dec_lobby_update(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let mut m = LobbyUpdate {
        name: wire::read_str(r, T_LOBBY_UPDATE)?,
        host_id: wire::read_u16(r, T_LOBBY_UPDATE)?,
        started: wire::read_bool(r, T_LOBBY_UPDATE)?,
        max_players: wire::read_u8(r, T_LOBBY_UPDATE)?,
        difficulty: wire::read_u8(r, T_LOBBY_UPDATE)?,
        players: Vec::new(),
    };
    let count = wire::read_u8(r, T_LOBBY_UPDATE)?;
    for _ in 0..count {
        m.players.push(read_lobby_player(r, T_LOBBY_UPDATE)?);
    }
    Ok(Message::LobbyUpdate(m))
}

fn enc_lobby_leave(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyLeave(m) = msg else {
        return Err(wrong_variant(T_LOBBY_LEAVE));
    };
    wire::write_u16(out, m.player_id);
    Ok(())
}

fn dec_lobby_leave(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyLeave(LobbyLeave {
        player_id: wire::read_u16(r, T_LOBBY_LEAVE)?,
    }))
}

fn enc_lobby_start(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyStart(m) = msg else {
        return Err(wrong_variant(T_LOBBY_START));
    };
    wire::write_u8(out, m.countdown);
    Ok(())
}

fn dec_lobby_start(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyStart(LobbyStart {
        countdown: wire::read_u8(r, T_LOBBY_START)?,
    }))
}

fn enc_chat(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::Chat(m) = msg else {
        return Err(wrong_variant(T_CHAT));
    };
    wire::write_u16(out, m.lobby_id);
    wire::write_str(out, &m.player_name);
    wire::write_str(out, &m.text);
    Ok(())
}

fn dec_chat(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::Chat(Chat {
        lobby_id: wire::read_u16(r, T_CHAT)?,
        player_name: wire::read_str(r, T_CHAT)?,
        text: wire::read_str(r, T_CHAT)?,
    }))
}

fn enc_lobby_kick(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::LobbyKick(m) = msg else {
        return Err(wrong_variant(T_LOBBY_KICK));
    };
    wire::write_u16(out, m.player_id);
    Ok(())
}

fn dec_lobby_kick(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::LobbyKick(LobbyKick {
        player_id: wire::read_u16(r, T_LOBBY_KICK)?,
    }))
}

fn enc_game_start(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::GameStart(m) = msg else {
        return Err(wrong_variant(T_GAME_START));
    };
    wire::write_f32(out, m.spawn_x);
    wire::write_f32(out, m.spawn_y);
    wire::write_f32(out, m.scroll_speed);
    Ok(())
}

fn dec_game_start(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::GameStart(GameStart {
        spawn_x: wire::read_f32(r, T_GAME_START)?,
        spawn_y: wire::read_f32(r, T_GAME_START)?,
        scroll_speed: wire::read_f32(r, T_GAME_START)?,
    }))
}

fn enc_game_end(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::GameEnd(m) = msg else {
        return Err(wrong_variant(T_GAME_END));
    };
    wire::write_bool(out, m.victory);
    wire::write_u8(out, m.scores.len() as u8);
    for score in &m.scores {
        wire::write_u16(out, score.player_id);
        wire::write_u32(out, score.score);
        wire::write_u8(out, score.rank);
    }
    Ok(())
}

fn dec_game_end(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let victory = wire::read_bool(r, T_GAME_END)?;
    let count = wire::read_u8(r, T_GAME_END)?;
    let mut scores = Vec::with_capacity(count as usize);
    for _ in 0..count {
        scores.push(ScoreEntry {
            player_id: wire::read_u16(r, T_GAME_END)?,
            score: wire::read_u32(r, T_GAME_END)?,
            rank: wire::read_u8(r, T_GAME_END)?,
        });
    }
    Ok(Message::GameEnd(GameEnd { victory, scores }))
}

fn enc_client_leave(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::ClientLeave(m) = msg else {
        return Err(wrong_variant(T_CLIENT_LEAVE));
    };
    wire::write_u16(out, m.player_id);
    Ok(())
}

fn dec_client_leave(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::ClientLeave(ClientLeave {
        player_id: wire::read_u16(r, T_CLIENT_LEAVE)?,
    }))
}

fn enc_error(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::Error(m) = msg else {
        return Err(wrong_variant(T_ERROR));
    };
    wire::write_u16(out, m.code);
    wire::write_str(out, &m.message);
    Ok(())
}

fn dec_error(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::Error(ErrorMsg {
        code: wire::read_u16(r, T_ERROR)?,
        message: wire::read_str(r, T_ERROR)?,
    }))
}

// ---------------------------------------------------------------------------
// Payload serializers -- UDP game messages
// ---------------------------------------------------------------------------

fn enc_player_input(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::PlayerInput(m) = msg else {
        return Err(wrong_variant(T_PLAYER_INPUT));
    };
    wire::write_bool(out, m.up);
    wire::write_bool(out, m.down);
    wire::write_bool(out, m.left);
    wire::write_bool(out, m.right);
    wire::write_u8(out, m.fire);
    Ok(())
}

fn dec_player_input(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::PlayerInput(PlayerInput {
        up: wire::read_bool(r, T_PLAYER_INPUT)?,
        down: wire::read_bool(r, T_PLAYER_INPUT)?,
        left: wire::read_bool(r, T_PLAYER_INPUT)?,
        right: wire::read_bool(r, T_PLAYER_INPUT)?,
        fire: wire::read_u8(r, T_PLAYER_INPUT)?,
    }))
}

fn enc_game_state(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::GameState(m) = msg else {
        return Err(wrong_variant(T_GAME_STATE));
    };

    wire::write_u8(out, m.players.len() as u8);
    for p in &m.players {
        wire::write_u16(out, p.player_id);
        wire::write_u16(out, p.mask);
        if p.mask & M_POS_X != 0 {
            wire::write_f32(out, p.pos_x);
        }
        if p.mask & M_POS_Y != 0 {
            wire::write_f32(out, p.pos_y);
        }
        if p.mask & M_HP != 0 {
            wire::write_u8(out, p.hp);
        }
        if p.mask & M_STATE != 0 {
            wire::write_u8(out, p.state);
        }
        if p.mask & M_SCORE != 0 {
            wire::write_u32(out, p.score);
        }
    }

    wire::write_u8(out, m.enemies.len() as u8);
    for e in &m.enemies {
        wire::write_u16(out, e.enemy_id);
        wire::write_u16(out, e.mask);
        if e.mask & M_POS_X != 0 {
            wire::write_f32(out, e.pos_x);
        }
        if e.mask & M_POS_Y != 0 {
            wire::write_f32(out, e.pos_y);
        }
        if e.mask & M_HP != 0 {
            wire::write_u8(out, e.hp);
        }
        if e.mask & M_STATE != 0 {
            wire::write_u8(out, e.state);
        }
        if e.mask & M_TYPE != 0 {
            wire::write_u8(out, e.kind);
        }
        if e.mask & M_DIR != 0 {
            wire::write_i8(out, e.direction);
        }
    }

    wire::write_u8(out, m.projectiles.len() as u8);
    for pr in &m.projectiles {
        wire::write_u16(out, pr.projectile_id);
        wire::write_u16(out, pr.mask);
        if pr.mask & M_POS_X != 0 {
            wire::write_f32(out, pr.pos_x);
        }
        if pr.mask & M_POS_Y != 0 {
            wire::write_f32(out, pr.pos_y);
        }
        if pr.mask & M_VELOCITY != 0 {
            wire::write_f32(out, pr.vel_x);
            wire::write_f32(out, pr.vel_y);
        }
        if pr.mask & M_TYPE != 0 {
            wire::write_u8(out, pr.kind);
        }
        if pr.mask & M_OWNER != 0 {
            wire::write_u16(out, pr.owner_id);
        }
        if pr.mask & M_DAMAGE != 0 {
            wire::write_u8(out, pr.damage);
        }
    }
    Ok(())
}

fn dec_game_state(r: &mut Reader<'_>) -> Result<Message, NetError> {
    let mut m = GameState::default();

    let player_count = wire::read_u8(r, T_GAME_STATE)?;
    for _ in 0..player_count {
        let mut p = PlayerState {
            player_id: wire::read_u16(r, T_GAME_STATE)?,
            mask: wire::read_u16(r, T_GAME_STATE)?,
            ..Default::default()
        };
        if p.mask & M_POS_X != 0 {
            p.pos_x = wire::read_f32(r, T_GAME_STATE)?;
        }
        if p.mask & M_POS_Y != 0 {
            p.pos_y = wire::read_f32(r, T_GAME_STATE)?;
        }
        if p.mask & M_HP != 0 {
            p.hp = wire::read_u8(r, T_GAME_STATE)?;
        }
        if p.mask & M_STATE != 0 {
            p.state = wire::read_u8(r, T_GAME_STATE)?;
        }
        if p.mask & M_SCORE != 0 {
            p.score = wire::read_u32(r, T_GAME_STATE)?;
        }
        m.players.push(p);
    }

    let enemy_count = wire::read_u8(r, T_GAME_STATE)?;
    for _ in 0..enemy_count {
        let mut e = EnemyState {
            enemy_id: wire::read_u16(r, T_GAME_STATE)?,
            mask: wire::read_u16(r, T_GAME_STATE)?,
            ..Default::default()
        };
        if e.mask & M_POS_X != 0 {
            e.pos_x = wire::read_f32(r, T_GAME_STATE)?;
        }
        if e.mask & M_POS_Y != 0 {
            e.pos_y = wire::read_f32(r, T_GAME_STATE)?;
        }
        if e.mask & M_HP != 0 {
            e.hp = wire::read_u8(r, T_GAME_STATE)?;
        }
        if e.mask & M_STATE != 0 {
            e.state = wire::read_u8(r, T_GAME_STATE)?;
        }
        if e.mask & M_TYPE != 0 {
            e.kind = wire::read_u8(r, T_GAME_STATE)?;
        }
        if e.mask & M_DIR != 0 {
            e.direction = wire::read_i8(r, T_GAME_STATE)?;
        }
        m.enemies.push(e);
    }

    let projectile_count = wire::read_u8(r, T_GAME_STATE)?;
    for _ in 0..projectile_count {
        let mut pr = ProjectileState {
            projectile_id: wire::read_u16(r, T_GAME_STATE)?,
            mask: wire::read_u16(r, T_GAME_STATE)?,
            ..Default::default()
        };
        if pr.mask & M_POS_X != 0 {
            pr.pos_x = wire::read_f32(r, T_GAME_STATE)?;
        }
        if pr.mask & M_POS_Y != 0 {
            pr.pos_y = wire::read_f32(r, T_GAME_STATE)?;
        }
        if pr.mask & M_VELOCITY != 0 {
            pr.vel_x = wire::read_f32(r, T_GAME_STATE)?;
            pr.vel_y = wire::read_f32(r, T_GAME_STATE)?;
        }
        if pr.mask & M_TYPE != 0 {
            pr.kind = wire::read_u8(r, T_GAME_STATE)?;
        }
        if pr.mask & M_OWNER != 0 {
            pr.owner_id = wire::read_u16(r, T_GAME_STATE)?;
        }
        if pr.mask & M_DAMAGE != 0 {
            pr.damage = wire::read_u8(r, T_GAME_STATE)?;
        }
        m.projectiles.push(pr);
    }

    Ok(Message::GameState(m))
}

fn enc_auth_udp(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::AuthUdp(m) = msg else {
        return Err(wrong_variant(T_AUTH_UDP));
    };
    wire::write_u16(out, m.player_id);
    Ok(())
}

fn dec_auth_udp(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::AuthUdp(AuthUdp {
        player_id: wire::read_u16(r, T_AUTH_UDP)?,
    }))
}

fn enc_boss_spawn(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::BossSpawn(m) = msg else {
        return Err(wrong_variant(T_BOSS_SPAWN));
    };
    wire::write_u16(out, m.boss_id);
    wire::write_u8(out, m.kind);
    wire::write_u16(out, m.max_hp);
    wire::write_u8(out, m.phase);
    Ok(())
}

fn dec_boss_spawn(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::BossSpawn(BossSpawn {
        boss_id: wire::read_u16(r, T_BOSS_SPAWN)?,
        kind: wire::read_u8(r, T_BOSS_SPAWN)?,
        max_hp: wire::read_u16(r, T_BOSS_SPAWN)?,
        phase: wire::read_u8(r, T_BOSS_SPAWN)?,
    }))
}

fn enc_boss_update(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::BossUpdate(m) = msg else {
        return Err(wrong_variant(T_BOSS_UPDATE));
    };
    wire::write_u16(out, m.boss_id);
    wire::write_f32(out, m.pos_x);
    wire::write_f32(out, m.pos_y);
    wire::write_u16(out, m.hp);
    wire::write_u8(out, m.phase);
    wire::write_u8(out, m.action);
    Ok(())
}

fn dec_boss_update(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::BossUpdate(BossUpdate {
        boss_id: wire::read_u16(r, T_BOSS_UPDATE)?,
        pos_x: wire::read_f32(r, T_BOSS_UPDATE)?,
        pos_y: wire::read_f32(r, T_BOSS_UPDATE)?,
        hp: wire::read_u16(r, T_BOSS_UPDATE)?,
        phase: wire::read_u8(r, T_BOSS_UPDATE)?,
        action: wire::read_u8(r, T_BOSS_UPDATE)?,
    }))
}

fn enc_enemy_hit(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::EnemyHit(m) = msg else {
        return Err(wrong_variant(T_ENEMY_HIT));
    };
    wire::write_u16(out, m.enemy_id);
    wire::write_u8(out, m.damage);
    wire::write_u16(out, m.hp_remaining);
    Ok(())
}

fn dec_enemy_hit(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::EnemyHit(EnemyHit {
        enemy_id: wire::read_u16(r, T_ENEMY_HIT)?,
        damage: wire::read_u8(r, T_ENEMY_HIT)?,
        hp_remaining: wire::read_u16(r, T_ENEMY_HIT)?,
    }))
}

fn enc_force_state(msg: &Message, out: &mut Vec<u8>) -> Result<(), NetError> {
    let Message::ForceState(m) = msg else {
        return Err(wrong_variant(T_FORCE_STATE));
    };
    wire::write_u16(out, m.force_id);
    wire::write_u16(out, m.owner_id);
    wire::write_f32(out, m.pos_x);
    wire::write_f32(out, m.pos_y);
    wire::write_u8(out, m.state);
    Ok(())
}

fn dec_force_state(r: &mut Reader<'_>) -> Result<Message, NetError> {
    Ok(Message::ForceState(ForceState {
        force_id: wire::read_u16(r, T_FORCE_STATE)?,
        owner_id: wire::read_u16(r, T_FORCE_STATE)?,
        pos_x: wire::read_f32(r, T_FORCE_STATE)?,
        pos_y: wire::read_f32(r, T_FORCE_STATE)?,
        state: wire::read_u8(r, T_FORCE_STATE)?,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
