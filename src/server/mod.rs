pub mod handlers;
pub mod routes;
pub mod runtime;

pub use routes::create_router;
pub use runtime::{run_server, run_share, start_server, RunningServer};
