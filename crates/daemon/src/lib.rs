// quire-daemon: file storage, workspace, change watcher, and the HTTP server.

pub mod config;
pub mod documents;
pub mod error;
pub mod hash;
pub mod http;
pub mod hub;
pub mod images;
pub mod runtime;
pub mod store;
pub mod watcher;
pub mod workspace;
