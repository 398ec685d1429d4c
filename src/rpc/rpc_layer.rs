// RPC layer - JSON requests in, JSON responses out.
//
// Nothing in here holds business rules; it parses arguments, calls a core
// service and shapes the reply.

#[path = "protocol.rs"]
pub mod protocol;

#[path = "handlers/handler_catalog.rs"]
pub mod handlers;

#[path = "router.rs"]
pub mod router;

#[path = "stdio_server.rs"]
pub mod server;

pub use router::Router;
