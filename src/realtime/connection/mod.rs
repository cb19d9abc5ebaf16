pub mod frames;
pub mod session;
pub mod state;

pub use frames::{ControlFrame, OutboundFrame};
pub use session::{run_session, websocket_config};
pub use state::{CloseReason, ConnectionHandle, ConnectionId, ConnectionState, DeliveryError};

#[cfg(test)]
mod session_test;
#[cfg(test)]
mod state_test;
