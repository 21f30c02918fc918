//! Bytecode layer of the ABC emitter.
//!
//! This module contains the binary side of emission:
//!
//! - [`AbcWrite`] - Binary primitives (varints, branch offsets, doubles)
//! - [`OpCode`] - The AVM2 instruction set
//! - [`ConstantPool`] and [`ConstantPools`] - Interned constants
//! - Record encoders ([`TraitInfo`], [`MethodInfo`], [`MethodBody`], ...)
//! - [`AbcModule`] - Record tables, identity maps and serialization
//! - [`disassemble`] - A reader over emitted method code

mod constant;
mod disasm;
mod module;
mod opcode;
mod records;
mod writer;

pub use constant::{ConstantKind, ConstantPool, ConstantPools};
pub use disasm::{
    Instruction, Operand, assert_contains_opcodes, assert_opcodes, disassemble, opcodes,
};
pub use module::{AbcModule, add_to_table};
pub use opcode::{OpCode, Operands};
pub use records::{
    ClassFlags, ClassInfo, ExceptionInfo, InstanceInfo, MetadataInfo, MethodBody, MethodFlags,
    MethodInfo, Multiname, ScriptInfo, TraitAttributes, TraitData, TraitInfo, TraitKind, ValueRef,
};
pub use writer::{AbcWrite, patch_s24, read_s24, read_u30, u30_len};
