//! Single-file share lifecycle and its collaborators.

pub mod gateway;
pub mod link;
mod manager;
mod session;
pub mod timeout;

pub use gateway::{FileGateway, FileStream, LocalFileGateway};
pub use link::{terminal_qr, LinkEncoder, QrLinkEncoder};
pub use manager::{ManagerSettings, SessionManager};
pub use session::{
    ConfirmOutcome, Download, SessionSnapshot, SessionState, StartedShare, StopReason,
};
pub use timeout::{TimeoutScheduler, TimeoutTicket};
