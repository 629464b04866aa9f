mod events;
mod gateway;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::{ConnId, DisconnectReport, RealtimeGateway};
