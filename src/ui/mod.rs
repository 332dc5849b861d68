pub mod output;
pub mod web;

pub use output::{spinner, spinner_error, spinner_success};
