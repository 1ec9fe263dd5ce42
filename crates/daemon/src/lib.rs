// folio-daemon: the document editor, its SQLite store, and the JSON-RPC
// surface served by `foliod`.

pub mod config;
pub mod editor;
pub mod rpc;
pub mod store;
