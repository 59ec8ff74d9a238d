//! ISO/IEC 7816-4 APDU channel stack
//!
//! This crate layers APDU semantics on top of a raw, half-duplex card
//! transport.
//!
//! ## Overview
//!
//! - [`ApduCommand`] and [`ApduResponse`] with bit-exact short and extended
//!   encodings, and logical channel packing in the class byte
//! - [`ApduChannel`], an engine that resolves T=0 continuations (`61 XX`
//!   GET RESPONSE chaining, `6C XX` Le correction) and publishes connection
//!   and selection events to weakly held listeners
//! - [`ApduService`] pipeline stages that observe or rewrite every command
//!   and response
//! - [`CommandSet`], a per-application dispatcher that tracks whether its
//!   application is selected
//!
//! Transports implement [`CardChannel`]. A scripted
//! [`MockChannel`](transport::mock::MockChannel) is provided for tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod aid;
pub mod atr;
pub mod channel;
pub mod command;
pub mod command_set;
pub mod constants;
pub mod error;
pub mod response;
pub mod service;
pub mod transport;

pub use aid::Aid;
pub use atr::Atr;
pub use channel::{
    ApduChannel, ApduEvent, ApduEventKind, ChannelConfig, ChannelEvent, GetResponseClass,
    SharedChannel, StateListener,
};
pub use command::{ApduCase, ApduCommand};
pub use command_set::{CommandSet, SelectionTracker};
pub use error::{Error, ErrorKind, Result};
pub use response::ApduResponse;
pub use response::status::StatusWord;
pub use service::{ApduService, LoggingService, LogicalChannelService, ServicePipeline, ServiceType};
pub use transport::{CardChannel, ResetMode, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error, Result};

    // Codec
    pub use crate::aid::Aid;
    pub use crate::atr::Atr;
    pub use crate::command::{ApduCase, ApduCommand};
    pub use crate::response::ApduResponse;
    pub use crate::response::status::{StatusWord, common as status};

    // Engine
    pub use crate::channel::{
        ApduChannel, ChannelConfig, ChannelEvent, SharedChannel, StateListener,
    };

    // Dispatch
    pub use crate::command_set::CommandSet;
    pub use crate::service::{ApduService, ServiceType};

    // Transport
    pub use crate::transport::{CardChannel, ResetMode, TransportError};
}
