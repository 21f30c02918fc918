//! ABC Emitter
//!
//! Bytecode and constant pool emission for AVM2 modules.
//!
//! ## Architecture
//!
//! - **Encoding**: constants are interned into byte-encoded pools, and
//!   records (methods, bodies, traits, classes, scripts, metadata) are
//!   encoded into identity-mapped tables
//! - **Emission**: the code generator drives an [`AbcEmitter`] through
//!   each method, which tracks stack, scope and register usage, resolves
//!   branches and writes the method's records when it finishes
//!
//! ## Modules
//!
//! - [`bytecode`]: Binary primitives, opcodes, constant pools, records and
//!   the module container
//! - [`emit`]: The instruction emitter, control flow, names, numbers,
//!   operators, traits and the native header

pub mod bytecode;
pub mod emit;

pub use bytecode::{AbcModule, ConstantPools, OpCode};
pub use emit::{
    AbcEmitter, BinaryOp, BranchKind, ClassDecl, FrameLayout, MemberDecl, MethodDecl, MethodKind,
    MethodSignature, NativeCounts, NumberLiteral, PropertyFlags, PropertyName, SlotDecl,
    SlotValue, TraitOwner, UnaryOp,
};
