//! Message types and payload structs.
//!
//! One variant per entry of the protocol's type table. The structs mirror
//! the wire layout; the [`codec`](crate::codec) module owns the actual
//! byte-level serializers.

use crate::NetError;

// ---------------------------------------------------------------------------
// Type table
// ---------------------------------------------------------------------------

/// The 1-byte message type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MsgType {
    // TCP control channel.
    LoginRequest = 0x01,
    LoginResponse = 0x02,
    LobbyCreate = 0x03,
    LobbyJoinRequest = 0x04,
    LobbyJoinResponse = 0x05,
    LobbyListRequest = 0x06,
    LobbyListResponse = 0x07,
    PlayerReady = 0x08,
    LobbyUpdate = 0x09,
    LobbyLeave = 0x0A,
    LobbyStart = 0x0B,
    Chat = 0x0C,
    LobbyKick = 0x0D,
    GameStart = 0x0F,
    GameEnd = 0x10,
    ClientLeave = 0x11,
    Error = 0x12,

    // UDP game channel.
    PlayerInput = 0x20,
    GameState = 0x21,
    AuthUdp = 0x22,
    BossSpawn = 0x23,
    BossUpdate = 0x24,
    EnemyHit = 0x25,
    ForceState = 0x26,
}

impl TryFrom<u8> for MsgType {
    type Error = NetError;

    fn try_from(byte: u8) -> Result<Self, NetError> {
        use MsgType::*;
        Ok(match byte {
            0x01 => LoginRequest,
            0x02 => LoginResponse,
            0x03 => LobbyCreate,
            0x04 => LobbyJoinRequest,
            0x05 => LobbyJoinResponse,
            0x06 => LobbyListRequest,
            0x07 => LobbyListResponse,
            0x08 => PlayerReady,
            0x09 => LobbyUpdate,
            0x0A => LobbyLeave,
            0x0B => LobbyStart,
            0x0C => Chat,
            0x0D => LobbyKick,
            0x0F => GameStart,
            0x10 => GameEnd,
            0x11 => ClientLeave,
            0x12 => Error,
            0x20 => PlayerInput,
            0x21 => GameState,
            0x22 => AuthUdp,
            0x23 => BossSpawn,
            0x24 => BossUpdate,
            0x25 => EnemyHit,
            0x26 => ForceState,
            other => return Err(NetError::UnknownType(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Delta field masks
// ---------------------------------------------------------------------------

/// Bit positions of the 16-bit per-record field mask in `GAME_STATE`.
pub mod mask {
    pub const M_NONE: u16 = 0;
    pub const M_POS_X: u16 = 1 << 0;
    pub const M_POS_Y: u16 = 1 << 1;
    pub const M_HP: u16 = 1 << 2;
    pub const M_STATE: u16 = 1 << 3;
    pub const M_TYPE: u16 = 1 << 7;
    pub const M_DIR: u16 = 1 << 8;
    pub const M_VELOCITY: u16 = 1 << 9;
    pub const M_OWNER: u16 = 1 << 10;
    pub const M_DAMAGE: u16 = 1 << 11;
    pub const M_SCORE: u16 = 1 << 12;
    /// Destroy the record's entity on the client.
    pub const M_DELETE: u16 = 1 << 15;
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoginResponse {
    pub success: bool,
    pub player_id: u16,
    pub udp_port: u16,
    pub error_code: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyCreate {
    pub lobby_name: String,
    pub player_name: String,
    pub password: String,
    pub max_players: u8,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyJoinRequest {
    pub lobby_id: u16,
    pub player_name: String,
    pub password: String,
}

/// One member row inside join responses and lobby updates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyPlayer {
    pub player_id: u16,
    pub ready: bool,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyJoinResponse {
    pub success: bool,
    pub lobby_id: u16,
    pub player_id: u16,
    pub players: Vec<LobbyPlayer>,
    pub error_code: u16,
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyListRequest {
    pub player_id: u16,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyInfo {
    pub lobby_id: u16,
    pub name: String,
    pub player_count: u8,
    pub max_players: u8,
    pub difficulty: u8,
    pub started: bool,
    pub has_password: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyListResponse {
    pub lobbies: Vec<LobbyInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerReady {
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobbyUpdate {
    pub name: String,
    pub host_id: u16,
    pub started: bool,
    pub max_players: u8,
    pub difficulty: u8,
    pub players: Vec<LobbyPlayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbyLeave {
    pub player_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbyStart {
    pub countdown: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chat {
    pub lobby_id: u16,
    pub player_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LobbyKick {
    pub player_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameStart {
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub scroll_speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreEntry {
    pub player_id: u16,
    pub score: u32,
    pub rank: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameEnd {
    pub victory: bool,
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientLeave {
    pub player_id: u16,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorMsg {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// 0 = none, 1 = normal fire, 2 = charge held.
    pub fire: u8,
}

/// Per-player delta record. Fields are written on the wire only when the
/// corresponding mask bit is set, in this declared order:
/// pos_x, pos_y, hp, state, score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerState {
    pub player_id: u16,
    pub mask: u16,
    pub pos_x: f32,
    pub pos_y: f32,
    pub hp: u8,
    /// 1 while alive, 0 after death.
    pub state: u8,
    pub score: u32,
}

/// Per-enemy delta record; field order: pos_x, pos_y, hp, state, kind,
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnemyState {
    pub enemy_id: u16,
    pub mask: u16,
    pub pos_x: f32,
    pub pos_y: f32,
    pub hp: u8,
    pub state: u8,
    pub kind: u8,
    pub direction: i8,
}

/// Per-projectile delta record; field order: pos_x, pos_y, vel_x, vel_y,
/// kind, owner, damage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProjectileState {
    pub projectile_id: u16,
    pub mask: u16,
    pub pos_x: f32,
    pub pos_y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub kind: u8,
    pub owner_id: u16,
    pub damage: u8,
}

/// The authoritative per-tick snapshot delta.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub players: Vec<PlayerState>,
    pub enemies: Vec<EnemyState>,
    pub projectiles: Vec<ProjectileState>,
}

impl GameState {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.enemies.is_empty() && self.projectiles.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthUdp {
    pub player_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BossSpawn {
    pub boss_id: u16,
    pub kind: u8,
    pub max_hp: u16,
    pub phase: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BossUpdate {
    pub boss_id: u16,
    pub pos_x: f32,
    pub pos_y: f32,
    pub hp: u16,
    pub phase: u8,
    pub action: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnemyHit {
    pub enemy_id: u16,
    pub damage: u8,
    pub hp_remaining: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceState {
    pub force_id: u16,
    pub owner_id: u16,
    pub pos_x: f32,
    pub pos_y: f32,
    /// 0 = AttachedFront, 1 = AttachedBack, 2 = Detached.
    pub state: u8,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A decoded message, one variant per type-table entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    LoginRequest(LoginRequest),
    LoginResponse(LoginResponse),
    LobbyCreate(LobbyCreate),
    LobbyJoinRequest(LobbyJoinRequest),
    LobbyJoinResponse(LobbyJoinResponse),
    LobbyListRequest(LobbyListRequest),
    LobbyListResponse(LobbyListResponse),
    PlayerReady(PlayerReady),
    LobbyUpdate(LobbyUpdate),
    LobbyLeave(LobbyLeave),
    LobbyStart(LobbyStart),
    Chat(Chat),
    LobbyKick(LobbyKick),
    GameStart(GameStart),
    GameEnd(GameEnd),
    ClientLeave(ClientLeave),
    Error(ErrorMsg),
    PlayerInput(PlayerInput),
    GameState(GameState),
    AuthUdp(AuthUdp),
    BossSpawn(BossSpawn),
    BossUpdate(BossUpdate),
    EnemyHit(EnemyHit),
    ForceState(ForceState),
}

impl Message {
    /// The wire type byte for this message.
    pub fn msg_type(&self) -> MsgType {
        match self {
            Message::LoginRequest(_) => MsgType::LoginRequest,
            Message::LoginResponse(_) => MsgType::LoginResponse,
            Message::LobbyCreate(_) => MsgType::LobbyCreate,
            Message::LobbyJoinRequest(_) => MsgType::LobbyJoinRequest,
            Message::LobbyJoinResponse(_) => MsgType::LobbyJoinResponse,
            Message::LobbyListRequest(_) => MsgType::LobbyListRequest,
            Message::LobbyListResponse(_) => MsgType::LobbyListResponse,
            Message::PlayerReady(_) => MsgType::PlayerReady,
            Message::LobbyUpdate(_) => MsgType::LobbyUpdate,
            Message::LobbyLeave(_) => MsgType::LobbyLeave,
            Message::LobbyStart(_) => MsgType::LobbyStart,
            Message::Chat(_) => MsgType::Chat,
            Message::LobbyKick(_) => MsgType::LobbyKick,
            Message::GameStart(_) => MsgType::GameStart,
            Message::GameEnd(_) => MsgType::GameEnd,
            Message::ClientLeave(_) => MsgType::ClientLeave,
            Message::Error(_) => MsgType::Error,
            Message::PlayerInput(_) => MsgType::PlayerInput,
            Message::GameState(_) => MsgType::GameState,
            Message::AuthUdp(_) => MsgType::AuthUdp,
            Message::BossSpawn(_) => MsgType::BossSpawn,
            Message::BossUpdate(_) => MsgType::BossUpdate,
            Message::EnemyHit(_) => MsgType::EnemyHit,
            Message::ForceState(_) => MsgType::ForceState,
        }
    }

    /// Which channel this message type travels on by default.
    pub fn default_channel(&self) -> crate::frame::Channel {
        use crate::frame::Channel;
        match self.msg_type() {
            MsgType::PlayerInput | MsgType::GameState | MsgType::AuthUdp => Channel::Udp,
            MsgType::BossSpawn
            | MsgType::BossUpdate
            | MsgType::EnemyHit
            | MsgType::ForceState => Channel::UdpReliable,
            _ => Channel::Tcp,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bytes_match_the_table() {
        assert_eq!(MsgType::LoginRequest as u8, 0x01);
        assert_eq!(MsgType::Error as u8, 0x12);
        assert_eq!(MsgType::PlayerInput as u8, 0x20);
        assert_eq!(MsgType::ForceState as u8, 0x26);
    }

    #[test]
    fn unknown_and_undefined_bytes_rejected() {
        assert!(MsgType::try_from(0xFF).is_err());
        // 0x0E sat between kick and game-start historically; it is not in
        // the table and must not decode.
        assert!(MsgType::try_from(0x0E).is_err());
        assert!(MsgType::try_from(0x27).is_err());
    }

    #[test]
    fn every_type_round_trips_through_u8() {
        for byte in 0x01..=0x26u8 {
            if let Ok(t) = MsgType::try_from(byte) {
                assert_eq!(t as u8, byte);
            }
        }
    }

    #[test]
    fn channels_follow_the_table() {
        use crate::frame::Channel;
        assert_eq!(
            Message::Chat(Chat::default()).default_channel(),
            Channel::Tcp
        );
        assert_eq!(
            Message::GameState(GameState::default()).default_channel(),
            Channel::Udp
        );
        assert_eq!(
            Message::BossSpawn(BossSpawn::default()).default_channel(),
            Channel::UdpReliable
        );
    }
}
