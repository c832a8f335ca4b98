pub mod cache;
pub mod entities;
pub mod events;
pub mod styles;
