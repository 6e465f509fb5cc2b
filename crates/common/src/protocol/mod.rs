// Wire protocol: HTTP request/response payloads and live-channel messages.

pub mod api;
pub mod ws;
