// GPU bootstrap: physical device selection, logical device creation and the
// on-screen presentation chain, ready for a renderer to consume.

pub mod backend;
pub mod config;
