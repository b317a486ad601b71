pub mod api;
pub mod updates;
