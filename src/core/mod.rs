pub mod chat_stream;
pub mod language;
pub mod message;
pub mod model;
pub mod session;
pub mod transcript;
