// This module is the hub for the infrastructure shared by every pass: the crate-wide error
// type, the growable bit vector used for per-node marks (visited, defined, used), and the
// arena-backed compilation session that carries scratch allocation and statistics.

//! Core infrastructure shared by the reducer and the instruction selector.
//!
//! - [`error`]: `CompileError` / `CompileResult`
//! - [`bit_vector`]: dense per-id mark sets that grow on demand
//! - [`session`]: arena ownership and compilation statistics

pub mod bit_vector;
pub mod error;
pub mod session;

pub use bit_vector::BitVector;
pub use error::{CompileError, CompileResult};
pub use session::{CompilationSession, SessionStats};
