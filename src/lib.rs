//! Courier - point-to-point HTTP file transfer
//!
//! A minimal HTTP/1.0-1.1 server and client pair over raw TCP byte
//! streams: GET retrieves files under a server root, PUT uploads into its
//! saving directory. All framing is implemented here, byte by byte.

pub mod client;
pub mod config;
pub mod http;
pub mod server;
