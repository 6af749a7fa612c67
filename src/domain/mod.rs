//! Domain modules organized as vertical slices.
//!
//! - `wave`: message records, the store and the reconciliation engine
//!   (`mod.rs` types, `wire.rs` node shapes, `convert.rs`, `state.rs`,
//!   `reconcile.rs`)
//! - `transaction`: the submission state machine

pub mod transaction;
pub mod wave;
