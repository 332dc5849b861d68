pub mod common;
pub mod server;
pub mod share;
pub mod transport;
pub mod ui;
pub mod utils;
