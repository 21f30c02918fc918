//! Instruction emitter for ABC modules.
//!
//! The [`AbcEmitter`] is driven method by method and expression by
//! expression by the code generator. It owns the [`AbcModule`] being
//! built, tracks operand stack, scope stack and register usage for the
//! current method, and resolves control flow into concrete offsets.
//!
//! # Example
//!
//! ```ignore
//! use abc_compiler::emit::{AbcEmitter, FrameLayout, MethodSignature};
//! use abc_core::EmitterConfig;
//!
//! let mut emitter = AbcEmitter::new(EmitterConfig::new());
//!
//! emitter.start_method("main", FrameLayout::default())?;
//! emitter.load_this();
//! emitter.push_scope();
//! emitter.pop_scope();
//! emitter.return_void();
//! let init = emitter.finish_method("main", &MethodSignature::default())?;
//!
//! let bytes = emitter.finish()?;
//! ```
//!
//! Plain opcode emitters return `()`. A fatal condition found inside one
//! of them poisons the emitter and is reported by the next fallible call,
//! so no module is ever serialized from an inconsistent state.

mod header;
mod instructions;
mod jumps;
mod names;
mod numbers;
mod operators;
mod trace;
mod traits;

pub use header::{NativeCounts, clean_name};
pub use jumps::BranchKind;
pub use names::{PropertyFlags, PropertyName};
pub use numbers::{NumberLiteral, parse_number_literal};
pub use operators::{BinaryOp, UnaryOp};
pub use traits::{
    ClassDecl, InterfaceRef, MemberDecl, MethodDecl, MethodKind, MethodSignature, Param, SlotDecl,
    SlotValue, TraitOwner, api_versions_of,
};

use abc_core::{Diagnostic, EmitError, EmitterConfig, Namespace};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::bytecode::{
    AbcModule, AbcWrite, ExceptionInfo, Instruction, MethodBody, MethodFlags, MethodInfo, OpCode,
    Operand,
};
use header::NativeHeader;
use jumps::FlowState;
use trace::Trace;

/// Kind of the most recent high-level instruction, for the coerce
/// folding in [`AbcEmitter::check_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastInstruction {
    Push,
    Coerce,
    Other,
}

/// Register layout of a method about to be emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLayout {
    /// Declared parameters, not counting `this`.
    pub params: u32,
    /// Local variables held in registers.
    pub locals: u32,
    /// Temporaries reserved up front.
    pub temps: u32,
    /// Locals live in an activation object instead of registers.
    pub activation: bool,
    /// The method reads `arguments`.
    pub arguments: bool,
}

impl FrameLayout {
    pub fn new(params: u32, locals: u32) -> Self {
        Self {
            params,
            locals,
            ..Self::default()
        }
    }

    /// Registers in use at method entry, including `this`.
    fn initial_registers(&self) -> u32 {
        if self.activation {
            self.params + self.temps + u32::from(self.arguments) + 1
        } else {
            self.params + self.locals + self.temps + 1
        }
    }
}

/// Per-method emission state.
#[derive(Debug)]
struct MethodState {
    name: String,
    code: Vec<u8>,

    cur_stack: i32,
    max_stack: i32,
    cur_scope: i32,
    max_scope: i32,
    cur_locals: u32,
    max_locals: u32,

    last_in: LastInstruction,
    last_ip: usize,

    exceptions: Vec<ExceptionInfo>,
    flow: FlowState,
    /// Saved (stack, scope) depths around branches.
    saved_depths: Vec<(i32, i32)>,
    /// Register holding each open scope's object, if any. Parallel to the
    /// scope stack.
    scope_registers: Vec<Option<u32>>,

    sets_dxns: bool,
    /// Constructors and static initializers emit no line markers.
    suppress_debug: bool,
}

impl MethodState {
    fn new(name: &str, layout: FrameLayout) -> Self {
        let registers = layout.initial_registers();
        Self {
            name: name.to_string(),
            code: Vec::new(),
            cur_stack: 0,
            max_stack: 0,
            cur_scope: 0,
            max_scope: 0,
            cur_locals: registers,
            max_locals: registers,
            last_in: LastInstruction::Other,
            last_ip: 0,
            exceptions: Vec::new(),
            flow: FlowState::default(),
            saved_depths: Vec::new(),
            scope_registers: Vec::new(),
            sets_dxns: false,
            suppress_debug: name.contains("$iinit") || name.contains("$cinit"),
        }
    }

    fn ip(&self) -> usize {
        self.code.len()
    }

    /// Apply an instruction's stack and scope effect.
    fn adjust(&mut self, offset: usize, stack: i32, scope: i32) -> Result<(), EmitError> {
        let mut result = Ok(());
        if self.cur_stack + stack < 0 {
            result = Err(EmitError::StackUnderflow {
                offset,
                depth: self.cur_stack,
                delta: stack,
            });
        }
        self.cur_stack = (self.cur_stack + stack).max(0);
        self.max_stack = self.max_stack.max(self.cur_stack);

        if self.cur_scope + scope < 0 && result.is_ok() {
            result = Err(EmitError::ScopeUnderflow {
                offset,
                depth: self.cur_scope,
                delta: scope,
            });
        }
        self.cur_scope = (self.cur_scope + scope).max(0);
        self.max_scope = self.max_scope.max(self.cur_scope);

        if scope > 0 {
            self.scope_registers.push(None);
        } else {
            for _ in scope..0 {
                self.scope_registers.pop();
            }
        }
        result
    }
}

/// Source position for line markers.
#[derive(Debug)]
struct DebugPosition {
    file: String,
    file_dirty: bool,
    line: i32,
    line_dirty: bool,
}

impl Default for DebugPosition {
    fn default() -> Self {
        Self {
            file: String::new(),
            file_dirty: false,
            line: -1,
            line_dirty: false,
        }
    }
}

/// Builds one ABC module.
pub struct AbcEmitter {
    config: EmitterConfig,
    module: AbcModule,

    /// The method being emitted.
    method: Option<MethodState>,
    /// Outer methods whose emission was interrupted by a nested one.
    suspended: Vec<MethodState>,

    debug: DebugPosition,
    /// Unversioned namespace to pool index.
    ns_cache: FxHashMap<Namespace, u32>,

    poisoned: Option<EmitError>,
    diagnostics: Vec<Diagnostic>,

    trace: Trace,
    header: NativeHeader,
}

impl AbcEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        let module = AbcModule::new(config.minor_version());
        let trace = Trace::new(&config);
        Self {
            config,
            module,
            method: None,
            suspended: Vec::new(),
            debug: DebugPosition::default(),
            ns_cache: FxHashMap::default(),
            poisoned: None,
            diagnostics: Vec::new(),
            trace,
            header: NativeHeader::default(),
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// The module built so far.
    pub fn module(&self) -> &AbcModule {
        &self.module
    }

    // =========================================================================
    // Errors and diagnostics
    // =========================================================================

    /// Record a fatal error. Only the first one is kept.
    fn poison(&mut self, err: EmitError) {
        warn!(error = %err, "emitter poisoned");
        if self.poisoned.is_none() {
            self.poisoned = Some(err);
        }
    }

    fn check_poisoned(&self) -> Result<(), EmitError> {
        match &self.poisoned {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// The first fatal error recorded by a plain emitter, if any.
    pub fn error(&self) -> Option<&EmitError> {
        self.poisoned.as_ref()
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        warn!(%diagnostic, "emission diagnostic");
        self.trace.event(format_args!("  {diagnostic}"));
        self.diagnostics.push(diagnostic);
    }

    /// Soft diagnostics collected since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // =========================================================================
    // Method state access
    // =========================================================================

    fn current(&mut self, operation: &'static str) -> Result<&mut MethodState, EmitError> {
        self.method
            .as_mut()
            .ok_or(EmitError::NoCurrentMethod { operation })
    }

    /// Code emitted so far for the current method.
    pub fn code(&self) -> &[u8] {
        self.method.as_ref().map_or(&[], |m| m.code.as_slice())
    }

    /// Current byte offset in the method's code.
    pub fn ip(&self) -> usize {
        self.method.as_ref().map_or(0, MethodState::ip)
    }

    pub fn stack_depth(&self) -> i32 {
        self.method.as_ref().map_or(0, |m| m.cur_stack)
    }

    pub fn max_stack_depth(&self) -> i32 {
        self.method.as_ref().map_or(0, |m| m.max_stack)
    }

    pub fn scope_depth(&self) -> i32 {
        self.method.as_ref().map_or(0, |m| m.cur_scope)
    }

    pub fn max_scope_depth(&self) -> i32 {
        self.method.as_ref().map_or(0, |m| m.max_scope)
    }

    /// Registers currently in use, including `this`.
    pub fn temp_count(&self) -> u32 {
        self.method.as_ref().map_or(0, |m| m.cur_locals)
    }

    pub fn max_locals(&self) -> u32 {
        self.method.as_ref().map_or(0, |m| m.max_locals)
    }

    // =========================================================================
    // Low-level emission
    // =========================================================================

    /// Write one instruction and apply its operand stack effect.
    fn instr(&mut self, opcode: OpCode, operands: &[Operand], stack: i32) {
        self.instr_scoped(opcode, operands, stack, 0);
    }

    /// Write one instruction and apply its operand and scope stack effects.
    fn instr_scoped(&mut self, opcode: OpCode, operands: &[Operand], stack: i32, scope: i32) {
        let Some(method) = self.method.as_mut() else {
            self.poison(EmitError::NoCurrentMethod {
                operation: opcode.name(),
            });
            return;
        };

        let offset = method.ip();
        method.code.write_u8(opcode.into());
        for operand in operands {
            match *operand {
                Operand::Byte(b) => method.code.write_u8(b),
                Operand::U30(v) => method.code.write_u30(v),
                Operand::Branch(rel) => method.code.write_s24(rel),
            }
        }
        let adjusted = method.adjust(offset, stack, scope);
        let (depth, scope_depth) = (method.cur_stack, method.cur_scope);

        tracing::trace!(offset, op = opcode.name(), stack = depth, scope = scope_depth, "emit");
        if self.trace.enabled() {
            let ins = Instruction {
                offset,
                opcode,
                operands: operands.to_vec(),
            };
            let bytes = &method.code[offset..];
            self.trace.instruction(&ins, bytes, depth, scope_depth);
        }
        if let Err(err) = adjusted {
            self.poison(err);
        }
    }

    /// Common prologue of high-level operations: flush the pending line
    /// marker and record what kind of instruction follows.
    fn prepare(&mut self, kind: LastInstruction) {
        self.flush_debug_info();
        if let Some(method) = self.method.as_mut() {
            method.last_ip = method.ip();
            method.last_in = kind;
        }
    }

    fn save_stack_depth(&mut self) {
        if let Some(method) = self.method.as_mut() {
            method.saved_depths.push((method.cur_stack, method.cur_scope));
        }
    }

    fn restore_stack_depth(&mut self) -> Result<(), EmitError> {
        let method = self.current("restore_stack_depth")?;
        let (stack, scope) = method
            .saved_depths
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "stack depth" })?;
        method.cur_stack = stack;
        method.cur_scope = scope;
        method.scope_registers.resize(scope.max(0) as usize, None);
        Ok(())
    }

    // =========================================================================
    // Debug info
    // =========================================================================

    /// Set the source file for subsequent line markers.
    pub fn set_origin(&mut self, file: &str) {
        if self.config.emit_debug_info {
            self.debug.file = file.to_string();
            self.debug.file_dirty = true;
        }
    }

    /// Note the source position of the next instructions.
    ///
    /// Synthetic nodes report position 0 and leave the line untouched.
    pub fn set_position(&mut self, line: i32, pos: i32) {
        if self.config.emit_debug_info && pos > 0 && self.debug.line != line {
            self.debug.line_dirty = true;
            self.debug.line = line;
        }
        if self.config.show_linenums && pos > 0 {
            self.trace.line(line);
        }
    }

    fn clear_position_info(&mut self) {
        if self.config.emit_debug_info {
            self.debug.line_dirty = false;
            self.debug.line = -1;
        }
    }

    /// Emit pending `debugfile`/`debugline` markers.
    fn flush_debug_info(&mut self) {
        if !self.config.emit_debug_info || !self.debug.line_dirty || self.debug.line < 0 {
            return;
        }
        match &self.method {
            Some(method) if !method.suppress_debug => {}
            _ => return,
        }
        if self.debug.file_dirty {
            let file = self.module.pools.add_utf8(&self.debug.file);
            self.instr(OpCode::DebugFile, &[Operand::U30(file)], 0);
            self.debug.file_dirty = false;
        }
        let line = self.debug.line as u32;
        self.instr(OpCode::DebugLine, &[Operand::U30(line)], 0);
        self.debug.line_dirty = false;
    }

    // =========================================================================
    // Registers
    // =========================================================================

    /// Reserve the next free register. Temps are released in reverse
    /// order with [`free_temp`](Self::free_temp).
    pub fn allocate_temp(&mut self) -> u32 {
        let Some(method) = self.method.as_mut() else {
            self.poison(EmitError::NoCurrentMethod {
                operation: "allocate_temp",
            });
            return 0;
        };
        let register = method.cur_locals;
        method.cur_locals += 1;
        method.max_locals = method.max_locals.max(method.cur_locals);
        self.trace.event(format_args!("AllocTemp {register}"));
        register
    }

    /// Release a temp register and kill it.
    ///
    /// Releasing out of order is reported as a diagnostic; the register is
    /// still killed.
    pub fn free_temp(&mut self, register: u32) {
        let live = self.temp_count();
        if register >= live {
            self.poison(EmitError::InvalidRegister { register, live });
            return;
        }
        if register != live - 1 {
            self.diagnose(Diagnostic::TempFreedOutOfOrder {
                register,
                expected: live - 1,
            });
        }
        self.trace.event(format_args!("FreeTemp {register}"));
        self.instr(OpCode::Kill, &[Operand::U30(register)], 0);
        if let Some(method) = self.method.as_mut() {
            method.cur_locals -= 1;
        }
    }

    /// Remember that the innermost open scope's object also lives in
    /// `register`, so unwinding past it kills the register.
    pub fn bind_scope_register(&mut self, register: u32) {
        if let Some(slot) = self
            .method
            .as_mut()
            .and_then(|m| m.scope_registers.last_mut())
        {
            *slot = Some(register);
        }
    }

    // =========================================================================
    // Method lifecycle
    // =========================================================================

    /// Begin emitting the method with internal name `name`.
    ///
    /// A method already in progress is suspended and resumes when this one
    /// finishes. Returns the method's info index.
    pub fn start_method(&mut self, name: &str, layout: FrameLayout) -> Result<u32, EmitError> {
        // A new script may redefine its initializer.
        if name == "$init" {
            self.module.evict_method_name(name);
        }
        let index = self.module.method_info(name)?;

        let state = MethodState::new(name, layout);
        if let Some(outer) = self.method.replace(state) {
            self.suspended.push(outer);
        }
        self.debug.file_dirty = true;
        self.debug.line_dirty = true;

        debug!(method = name, index, "start method");
        self.trace.event(format_args!("// ++StartMethod {name}"));
        Ok(index)
    }

    /// Finish the current method: write its signature and, unless it is
    /// native or abstract, its body.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish_method(&mut self, name: &str, sig: &MethodSignature) -> Result<u32, EmitError> {
        self.check_poisoned()?;
        let method_info = self.module.method_info(name)?;

        let traits = match &sig.activation {
            Some(owner) => self.build_traits(owner)?,
            None => Vec::new(),
        };

        let mut flags = sig.arguments
            & (MethodFlags::NEED_ARGUMENTS | MethodFlags::NEED_REST | MethodFlags::IGNORE_REST);
        flags.set(MethodFlags::NEED_ACTIVATION, sig.activation.is_some());
        let debug_name = if self.config.emit_code_hints {
            sig.debug_name.as_str()
        } else {
            ""
        };
        let name_index = self.module.pools.add_utf8(debug_name);
        flags.set(MethodFlags::NATIVE, sig.native);

        let state = self.method.take().ok_or(EmitError::NoCurrentMethod {
            operation: "finish_method",
        })?;
        self.method = self.suspended.pop();
        flags.set(MethodFlags::SETS_DXNS, state.sets_dxns);

        let return_type = self.add_class_name(sig.return_type.as_ref());
        let mut param_types = Vec::with_capacity(sig.params.len());
        let mut optional = Vec::new();
        for param in &sig.params {
            param_types.push(self.add_class_name(Some(&param.type_name)));
            // Once one parameter has a default, every later one needs a value.
            match &param.default {
                Some(value) => optional.push(self.value_ref(value)),
                None if !optional.is_empty() => optional.push(Default::default()),
                None => {}
            }
        }
        let param_names = if self.config.emit_code_hints {
            sig.param_names
                .iter()
                .map(|n| self.module.pools.add_utf8(n))
                .collect()
        } else {
            Vec::new()
        };

        let info = MethodInfo {
            return_type,
            param_types,
            name: name_index,
            flags,
            optional,
            param_names,
        };
        self.module.set_method(method_info, &info)?;

        if sig.native {
            self.header.native_method(&sig.debug_name, method_info);
        } else if !sig.interface {
            let body = MethodBody {
                method: method_info,
                max_stack: state.max_stack as u32,
                local_count: state.max_locals,
                init_scope_depth: sig.scope_depth,
                max_scope_depth: sig.scope_depth + state.max_scope as u32,
                code: state.code,
                exceptions: state.exceptions,
                traits,
            };
            self.module.add_body(&body);
        }

        self.clear_position_info();
        debug!(
            method = %state.name,
            index = method_info,
            max_stack = state.max_stack,
            max_scope = state.max_scope,
            locals = state.max_locals,
            "finish method"
        );
        self.trace
            .event(format_args!("// --FinishMethod {name} {}", sig.debug_name));
        Ok(method_info)
    }

    // =========================================================================
    // Module output
    // =========================================================================

    /// Serialize the module.
    ///
    /// Fails with the first recorded fatal error, or if a method is still
    /// open.
    pub fn finish(&mut self) -> Result<Vec<u8>, EmitError> {
        self.check_poisoned()?;
        if let Some(method) = &self.method {
            warn!(method = %method.name, "module finished with a method still open");
            return Err(EmitError::NoCurrentMethod { operation: "finish" });
        }
        if self.config.show_bytecode {
            self.trace.pools(&self.module.pools);
        }
        self.module.to_bytes()
    }

    /// Move the first script to the end so the main script initializes
    /// last. Script indices returned by
    /// [`finish_program`](Self::finish_program) before this call no longer
    /// name the same scripts.
    pub fn reorder_main_script(&mut self) {
        self.module.reorder_main_script();
    }

    /// The human-readable instruction trace.
    pub fn trace_text(&self) -> &str {
        self.trace.text()
    }

    /// The native header: method, class and package constants, plus pool
    /// constants when `pool_constants` is set.
    pub fn native_header(&self, pool_constants: bool) -> String {
        self.header.render(&self.module, pool_constants)
    }

    pub fn native_counts(&self) -> NativeCounts {
        self.header.counts(&self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_opcodes, disassemble};

    fn emitter() -> AbcEmitter {
        AbcEmitter::new(EmitterConfig::new())
    }

    fn in_method(config: EmitterConfig) -> AbcEmitter {
        let mut e = AbcEmitter::new(config);
        e.start_method("test", FrameLayout::default()).unwrap();
        e
    }

    #[test]
    fn frame_layout_registers() {
        assert_eq!(FrameLayout::new(2, 3).initial_registers(), 6);
        let activation = FrameLayout {
            params: 2,
            locals: 3,
            temps: 1,
            activation: true,
            arguments: true,
        };
        assert_eq!(activation.initial_registers(), 5);
    }

    #[test]
    fn emitting_without_method_poisons() {
        let mut e = emitter();
        e.push_null();
        assert!(matches!(
            e.error(),
            Some(EmitError::NoCurrentMethod { operation: "pushnull" })
        ));
        assert!(e.finish().is_err());
    }

    #[test]
    fn stack_high_water_mark() {
        let mut e = in_method(EmitterConfig::new());
        e.push_null();
        e.push_null();
        e.push_null();
        e.pop();
        e.pop();
        e.push_null();
        assert_eq!(e.stack_depth(), 2);
        assert_eq!(e.max_stack_depth(), 3);
    }

    #[test]
    fn stack_underflow_poisons() {
        let mut e = in_method(EmitterConfig::new());
        e.pop();
        assert!(matches!(
            e.error(),
            Some(EmitError::StackUnderflow { offset: 0, depth: 0, delta: -1 })
        ));
        assert!(e.finish_method("test", &MethodSignature::default()).is_err());
    }

    #[test]
    fn temps_are_a_stack() {
        let mut e = in_method(EmitterConfig::new());
        let a = e.allocate_temp();
        let b = e.allocate_temp();
        assert_eq!((a, b), (1, 2));
        e.free_temp(b);
        e.free_temp(a);
        assert_eq!(e.temp_count(), 1);
        assert_eq!(e.max_locals(), 3);
        assert!(e.take_diagnostics().is_empty());
        assert_opcodes(e.code(), &[OpCode::Kill, OpCode::Kill]);
    }

    #[test]
    fn out_of_order_free_is_soft() {
        let mut e = in_method(EmitterConfig::new());
        let a = e.allocate_temp();
        let _b = e.allocate_temp();
        e.free_temp(a);
        assert!(e.error().is_none());
        assert_eq!(
            e.take_diagnostics(),
            vec![Diagnostic::TempFreedOutOfOrder {
                register: 1,
                expected: 2
            }]
        );
    }

    #[test]
    fn freeing_unallocated_register_is_fatal() {
        let mut e = in_method(EmitterConfig::new());
        e.free_temp(5);
        assert_eq!(
            e.error(),
            Some(&EmitError::InvalidRegister {
                register: 5,
                live: 1
            })
        );
    }

    #[test]
    fn line_markers_flush_once() {
        let mut e = in_method(EmitterConfig::new().with_debug_info(true));
        e.set_origin("Main.as");
        e.set_position(3, 10);
        e.push_null();
        e.pop();
        e.set_position(4, 20);
        e.push_true();
        assert_opcodes(
            e.code(),
            &[
                OpCode::DebugFile,
                OpCode::DebugLine,
                OpCode::PushNull,
                OpCode::Pop,
                OpCode::DebugLine,
                OpCode::PushTrue,
            ],
        );
        let ins = disassemble(e.code());
        assert_eq!(ins[1].operands, vec![Operand::U30(3)]);
    }

    #[test]
    fn constructors_suppress_line_markers() {
        let mut e = AbcEmitter::new(EmitterConfig::new().with_debug_info(true));
        e.start_method("Foo$iinit", FrameLayout::default()).unwrap();
        e.set_position(3, 10);
        e.push_null();
        assert_opcodes(e.code(), &[OpCode::PushNull]);
    }

    #[test]
    fn synthetic_positions_keep_line() {
        let mut e = in_method(EmitterConfig::new().with_debug_info(true));
        e.set_position(7, 0);
        e.push_null();
        assert_opcodes(e.code(), &[OpCode::PushNull]);
    }

    #[test]
    fn method_body_records_limits() {
        let mut e = emitter();
        let index = e.start_method("f", FrameLayout::new(1, 1)).unwrap();
        e.load_this();
        e.push_scope();
        e.push_null();
        e.return_value();
        let finished = e
            .finish_method(
                "f",
                &MethodSignature {
                    scope_depth: 2,
                    ..MethodSignature::default()
                },
            )
            .unwrap();
        assert_eq!(index, finished);
        assert_eq!(e.module().body_count(), 1);
        // method 0, max_stack 1, locals 3, init scope 2, max scope 3
        let body = e.module().body(0).unwrap();
        assert_eq!(&body[..5], &[0, 1, 3, 2, 3]);
    }

    #[test]
    fn native_and_interface_methods_have_no_body() {
        let mut e = emitter();
        e.start_method("flash.utils:trace", FrameLayout::default())
            .unwrap();
        e.finish_method(
            "flash.utils:trace",
            &MethodSignature {
                native: true,
                debug_name: "flash.utils:trace".into(),
                ..MethodSignature::default()
            },
        )
        .unwrap();
        e.start_method("IFoo/bar", FrameLayout::default()).unwrap();
        e.finish_method(
            "IFoo/bar",
            &MethodSignature {
                interface: true,
                ..MethodSignature::default()
            },
        )
        .unwrap();
        assert_eq!(e.module().body_count(), 0);
        assert_eq!(e.native_counts().methods, 1);
        assert!(
            e.native_header(false)
                .contains("const int flash_utils_trace = 0;")
        );
    }

    #[test]
    fn init_is_reallocated_per_script() {
        let mut e = emitter();
        let first = e.start_method("$init", FrameLayout::default()).unwrap();
        e.return_void();
        e.finish_method("$init", &MethodSignature::default()).unwrap();
        let second = e.start_method("$init", FrameLayout::default()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn nested_methods_resume_outer() {
        let mut e = emitter();
        e.start_method("outer", FrameLayout::default()).unwrap();
        e.push_null();
        e.start_method("inner", FrameLayout::default()).unwrap();
        assert_eq!(e.stack_depth(), 0);
        e.return_void();
        e.finish_method("inner", &MethodSignature::default())
            .unwrap();
        assert_eq!(e.stack_depth(), 1);
        assert_opcodes(e.code(), &[OpCode::PushNull]);
    }

    #[test]
    fn finish_rejects_open_method() {
        let mut e = in_method(EmitterConfig::new());
        assert!(matches!(
            e.finish(),
            Err(EmitError::NoCurrentMethod { operation: "finish" })
        ));
    }

    #[test]
    fn debug_name_only_with_code_hints() {
        let mut e = emitter();
        e.start_method("f", FrameLayout::default()).unwrap();
        e.return_void();
        e.finish_method(
            "f",
            &MethodSignature {
                debug_name: "f".into(),
                ..MethodSignature::default()
            },
        )
        .unwrap();
        // the empty name is still interned
        assert_eq!(e.module().pools.utf8_at(1), Some(""));
    }
}
