// quire-common: shared types, wire protocol, and client sync rules

pub mod path;
pub mod protocol;
pub mod sync;
pub mod types;
