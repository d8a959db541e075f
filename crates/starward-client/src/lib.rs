//! Starward client core -- the thin side of the wire.
//!
//! A dedicated [`net_thread`] runs the symmetric reliable transport; the
//! main game loop polls its decoded-event queue once per frame, feeds
//! snapshots into the [`mirror`] registry, and hands the [`frontend`]
//! adapters to the (out-of-scope) renderer and input layer.

#![deny(unsafe_code)]

pub mod frontend;
pub mod mirror;
pub mod net_thread;

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Net(#[from] starward_net::NetError),

    #[error(transparent)]
    Core(#[from] starward_core::CoreError),

    #[error(transparent)]
    Ecs(#[from] starward_ecs::EcsError),

    #[error("not connected")]
    NotConnected,
}

pub mod prelude {
    pub use crate::frontend::InputTracker;
    pub use crate::mirror::ClientWorld;
    pub use crate::net_thread::ClientNetwork;
    pub use crate::ClientError;
}
