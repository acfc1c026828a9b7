//! Progressive result cells: the value a remote call returns.
//!
//! See [`ResultCell`] for the state machine and its two views.

mod cell;

pub use cell::{ResultCell, Update};
