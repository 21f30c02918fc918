//! ABC bytecode emission for an ActionScript compiler backend.
//!
//! This crate re-exports the two layers of the emitter:
//!
//! - [`abc_core`] - names, values, configuration and errors
//! - [`abc_compiler`] - the bytecode encoders and the [`AbcEmitter`]
//!
//! # Example
//!
//! ```
//! use abc_emit::prelude::*;
//!
//! let mut emitter = AbcEmitter::new(EmitterConfig::new());
//! emitter.start_method("$init", FrameLayout::default()).unwrap();
//! emitter.load_this();
//! emitter.push_scope();
//! emitter.return_void();
//! let init = emitter.finish_method("$init", &MethodSignature::default()).unwrap();
//! emitter.finish_program("", init, &TraitOwner::default()).unwrap();
//!
//! let bytes = emitter.finish().unwrap();
//! assert_eq!(&bytes[..4], &[16, 0, 46, 0]);
//! ```

pub use abc_compiler;
pub use abc_core;

pub use abc_compiler::{AbcEmitter, AbcModule};
pub use abc_core::{EmitError, EmitterConfig};

pub mod prelude {
    pub use abc_compiler::bytecode::{AbcModule, ConstantKind, OpCode, disassemble};
    pub use abc_compiler::emit::{
        AbcEmitter, BinaryOp, BranchKind, ClassDecl, FrameLayout, InterfaceRef, MemberDecl,
        MethodDecl, MethodKind, MethodSignature, NumberLiteral, Param, PropertyFlags,
        PropertyName, SlotDecl, SlotValue, TraitOwner, UnaryOp,
    };
    pub use abc_core::{
        DefaultValue, Diagnostic, EmitError, EmitterConfig, MetadataEntry, Namespace, NumberType,
        NumberUsage, QName, TypeName,
    };
}
