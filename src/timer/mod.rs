pub mod commands;
pub mod controller;
pub mod events;

pub use controller::PlaybackController;
pub use events::EngineEvent;
