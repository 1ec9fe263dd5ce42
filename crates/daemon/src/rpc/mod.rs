// JSON-RPC server: method dispatch plus newline-delimited stream framing.

pub mod methods;
pub mod stdio;
