pub mod codec;
pub mod lever;
pub mod models;
pub mod settings;
