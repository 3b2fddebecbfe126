//! Transaction builder
//!
//! Split into focused modules:
//! - **errors**: build-failure taxonomy
//! - **instructions**: wire-format encoding and instruction ordering
//! - **builder**: quote, resolve, derive, assemble, sign

pub mod builder;
pub mod errors;
pub mod instructions;

pub use builder::{BuilderSettings, BuiltTransaction, TradeTxBuilder};
pub use errors::BuildError;
