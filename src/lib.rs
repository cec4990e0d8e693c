// Simmer - time-boxed multi-phase query refinement
// Library exports

pub mod cli;
pub mod completion;
pub mod config;
pub mod context;
pub mod logging;
pub mod refine;
pub mod server;
