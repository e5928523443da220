//! # gatehouse-daemon
//!
//! Long-running scheduler: periodic roster and avatar sync jobs, plus a unix
//! control socket the CLI talks to for status, on-demand runs, authorization
//! checks, and shutdown.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod service;

pub use error::DaemonError;
pub use protocol::{
    request_resolve, request_set_avatar, request_status, request_stop, request_sync_avatars,
    request_sync_roster, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking, JobHistory, JobRecord, JobReport};
pub use service::{generate_plist, install as install_service, uninstall as uninstall_service};
