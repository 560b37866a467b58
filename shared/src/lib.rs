//! Types shared between the vidshelf server and its browser pages.
//!
//! Everything here crosses the wire as JSON with camelCase field names.

pub mod api;
pub mod apps;
pub mod cookies;
pub mod videos;
pub mod youtube;
