//! Compute `StackMapTable` attributes for JVM methods
//!
//! Frames describe the types of locals and stack entries at points in a method body. This crate
//! merges the frames flowing into the same offset, picks the most compact encoding for every
//! frame relative to the one before it, and serializes the result. See [`jvm::verifier`].

pub mod jvm;
pub mod listing;
pub mod util;
