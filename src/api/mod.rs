//! HTTP transport for the query-time routes of spec.md §6: `server`
//! builds the router and runs it behind the shared `Supervisor`; `handlers`
//! holds the per-route request/response translation.

mod handlers;
pub mod server;

pub use server::{ApiState, build_api_router, run_api};
