// folio-common: document fingerprinting, patch parsing and application, and
// the wire types shared by the editor daemon and its clients.

pub mod hash;
pub mod patch;
pub mod protocol;
pub mod types;
