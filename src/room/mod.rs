pub mod model;
mod service;
pub mod store;
pub mod transitions;

pub use model::{Player, Room};
pub use service::RoomService;
pub use store::{InMemoryRoomStore, RoomStore};
