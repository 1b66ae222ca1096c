pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
