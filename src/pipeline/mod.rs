pub mod config;
pub mod cursor;
pub mod pitch;
pub mod source;
pub mod voice_pool;
