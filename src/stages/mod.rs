// src/stages/mod.rs
pub mod discover;
pub mod download;
pub mod extract;
pub mod filter;
pub mod resolve;

#[cfg(test)]
pub(crate) mod fakes;
