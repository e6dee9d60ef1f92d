//! HTTP protocol implementation.
//!
//! A restricted HTTP/1.0-1.1 engine, hand-rolled over TCP byte streams,
//! supporting GET and PUT with keep-alive connections.
//!
//! # Architecture
//!
//! - **`connection`**: the per-connection handler implementing the
//!   request-response state machine and the GET/PUT responders
//! - **`parser`**: frames header blocks out of the byte stream and parses
//!   request lines, status lines, and header fields
//! - **`request`**: parsed request representation and field policies
//! - **`response`**: status codes and the fixed response header set
//! - **`writer`**: serializes and writes responses to the client
//! - **`mime`**: Content-Type lookup from filename extension
//!
//! # Connection state machine
//!
//! ```text
//!   Receiving ──request framed──▶ Responding
//!       ▲                            │
//!       └──────keep-alive────────────┤
//!                                    └─close──▶ Closed
//! ```
//!
//! One request is fully answered before the next is read; the connection
//! either loops on the same stream (`Connection: keep-alive`) or closes.

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
