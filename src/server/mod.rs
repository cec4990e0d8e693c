// Local inference server bootstrap
//
// Finds a running completion server or starts one, so the REPL always has an
// endpoint to talk to.

pub mod lifecycle;

pub use lifecycle::{ensure_server, terminate_pid, ServerHandle, ServerPid};
