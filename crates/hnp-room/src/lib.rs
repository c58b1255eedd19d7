//! Room partitioning for HOP 'N POP 16.
//!
//! Every room runs as an isolated Tokio task (actor model) owning its
//! members and game state. A single manager actor decides where each
//! connection lands, keeps empty rooms alive for a grace period, and
//! tears rooms down on request.
//!
//! # Key types
//!
//! - [`RoomManager`]: admits connections, lists and shuts down rooms
//! - [`Admission`]: a granted membership, released when dropped
//! - [`RoomLogic`]: the trait server-side game rules implement
//! - [`RoomHandle`]: sends frames to a running room actor
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomLimits`]: room count, capacity and grace period

mod config;
mod error;
mod logic;
mod manager;
mod registry;
mod room;

pub use config::{RoomLimits, RoomState};
pub use error::{AdmissionError, RoomError};
pub use logic::{Outbound, RelayLogic, RoomContext, RoomFault, RoomLogic};
pub use manager::{Admission, AdmissionRequest, RoomManager};
pub use registry::RoomSnapshot;
pub use room::{member_channel, MemberReceiver, MemberSender, RoomHandle, RoomOutbound};
