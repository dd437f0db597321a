//! x86-64 target.
//!
//! - [`opcodes`]: the target opcode set
//! - [`registers`]: register codes and names
//! - [`calling_convention`]: System V and managed-code call descriptors
//! - `selector`: lowering rules plugged into the instruction selector

pub mod calling_convention;
pub mod opcodes;
pub mod registers;
mod selector;

pub use calling_convention::{
    c_call_descriptor, c_linkage, code_stub_call_descriptor, js_call_descriptor, js_linkage,
    JsAssigner, SysVAssigner,
};
pub use opcodes::X64Opcode;
