pub mod ai_provider;
pub mod cli;
pub mod config;
pub mod core;
pub mod memory;
pub mod persona;
pub mod reply;
pub mod sentiment;
pub mod status;
pub mod transmission;

pub use persona::Companion;
pub use reply::AvatarSignal;
