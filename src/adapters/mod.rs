pub mod email;
pub mod http;
pub mod messaging;
pub mod persistence;
