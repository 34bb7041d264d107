//! Low-level pickle opcode decoding.
//!
//! Only the instruction stream is decoded: opcodes and their inline
//! arguments. Nothing is evaluated, no object is built and no import is
//! resolved, so walking an untrusted pickle here is safe.

mod genops;
mod opcode;

pub use genops::{genops, Arg, Genops, Instruction, Instructions, OpcodeDecoder, PickleDecoder};
pub use opcode::{ArgKind, Opcode};
