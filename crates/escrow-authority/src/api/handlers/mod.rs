//! API request handlers

pub mod nodes;
pub mod payload;

pub use nodes::{get_key, init_key, register_node, AppState};
pub use payload::fetch_payload;
