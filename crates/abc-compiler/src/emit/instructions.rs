//! One emitter method per VM instruction, plus the load/store/invoke
//! operations the code generator works with.
//!
//! Every method flushes a pending line marker first, writes the opcode and
//! its operands, and applies the instruction's fixed stack effect.
//! Instructions that take a multiname expect an index from the multiname
//! pool; the name-based property helpers live in `names.rs`.

use abc_core::{Decimal128, EmitError, Namespace, NumberUsage, QName, TypeName};

use super::{AbcEmitter, LastInstruction};
use crate::bytecode::{OpCode, Operand};

/// `kind` byte of a `debug` instruction describing a local.
const DI_LOCAL: u8 = 1;

impl AbcEmitter {
    /// Flush and emit an operand-less instruction.
    fn op(&mut self, opcode: OpCode, stack: i32) {
        self.prepare(LastInstruction::Other);
        self.instr(opcode, &[], stack);
    }

    fn op_u30(&mut self, opcode: OpCode, operand: u32, stack: i32) {
        self.prepare(LastInstruction::Other);
        self.instr(opcode, &[Operand::U30(operand)], stack);
    }

    /// Flush and emit an instruction that pushes one value.
    fn push_op(&mut self, opcode: OpCode, operands: &[Operand]) {
        self.prepare(LastInstruction::Push);
        self.instr(opcode, operands, 1);
    }

    // =========================================================================
    // Misc
    // =========================================================================

    pub fn nop(&mut self) {
        self.op(OpCode::Nop, 0);
    }

    pub fn throw(&mut self) {
        self.op(OpCode::Throw, -1);
    }

    pub fn label(&mut self) {
        self.op(OpCode::Label, 0);
    }

    pub fn kill(&mut self, register: u32) {
        self.op_u30(OpCode::Kill, register, 0);
    }

    /// Set the default XML namespace for the rest of the method.
    pub fn dxns(&mut self, uri: &str) {
        let index = self.module.pools.add_utf8(uri);
        self.op_u30(OpCode::Dxns, index, 0);
        if let Some(method) = self.method.as_mut() {
            method.sets_dxns = true;
        }
    }

    pub fn dxns_late(&mut self) {
        self.op(OpCode::DxnsLate, -1);
        if let Some(method) = self.method.as_mut() {
            method.sets_dxns = true;
        }
    }

    // =========================================================================
    // Scope stack
    // =========================================================================

    pub fn push_scope(&mut self) {
        self.prepare(LastInstruction::Other);
        self.instr_scoped(OpCode::PushScope, &[], -1, 1);
    }

    pub fn push_with(&mut self) {
        self.prepare(LastInstruction::Other);
        self.instr_scoped(OpCode::PushWith, &[], -1, 1);
    }

    pub fn pop_scope(&mut self) {
        self.prepare(LastInstruction::Other);
        self.instr_scoped(OpCode::PopScope, &[], 0, -1);
    }

    pub fn get_global_scope(&mut self) {
        self.push_op(OpCode::GetGlobalScope, &[]);
    }

    /// Push the scope object at `index` on the scope stack.
    pub fn get_scope_object(&mut self, index: u8) {
        self.push_op(OpCode::GetScopeObject, &[Operand::Byte(index)]);
    }

    // =========================================================================
    // Pushes and stack shuffles
    // =========================================================================

    pub fn push_null(&mut self) {
        self.push_op(OpCode::PushNull, &[]);
    }

    pub fn push_undefined(&mut self) {
        self.push_op(OpCode::PushUndefined, &[]);
    }

    pub fn push_uninitialized(&mut self) {
        self.push_op(OpCode::PushUninitialized, &[]);
    }

    pub fn push_true(&mut self) {
        self.push_op(OpCode::PushTrue, &[]);
    }

    pub fn push_false(&mut self) {
        self.push_op(OpCode::PushFalse, &[]);
    }

    pub fn push_boolean(&mut self, value: bool) {
        if value {
            self.push_true();
        } else {
            self.push_false();
        }
    }

    pub fn push_nan(&mut self) {
        self.push_op(OpCode::PushNaN, &[]);
    }

    pub fn push_byte(&mut self, value: i8) {
        self.push_op(OpCode::PushByte, &[Operand::Byte(value as u8)]);
    }

    /// The operand is sign-extended from 16 bits by the VM.
    pub fn push_short(&mut self, value: i16) {
        self.push_op(OpCode::PushShort, &[Operand::U30(value as i32 as u32)]);
    }

    pub fn push_string(&mut self, value: &str) {
        let index = self.module.pools.add_utf8(value);
        self.push_op(OpCode::PushString, &[Operand::U30(index)]);
    }

    pub fn push_int(&mut self, value: i32) {
        let index = self.module.pools.add_int(value);
        self.push_op(OpCode::PushInt, &[Operand::U30(index)]);
    }

    pub fn push_uint(&mut self, value: u32) {
        let index = self.module.pools.add_uint(value);
        self.push_op(OpCode::PushUint, &[Operand::U30(index)]);
    }

    pub fn push_double(&mut self, value: f64) {
        let index = self.module.pools.add_double(value);
        self.push_op(OpCode::PushDouble, &[Operand::U30(index)]);
    }

    pub fn push_decimal(&mut self, value: &Decimal128) {
        let index = self.module.pools.add_decimal(value);
        self.push_op(OpCode::PushDecimal, &[Operand::U30(index)]);
    }

    pub fn push_namespace(&mut self, namespace: &Namespace) {
        let index = self.add_namespace(namespace);
        self.push_op(OpCode::PushNamespace, &[Operand::U30(index)]);
    }

    /// Push the index of a switch case.
    pub fn push_case_index(&mut self, index: i16) {
        self.push_short(index);
    }

    /// Discard the top value.
    ///
    /// A pop directly after a push is not folded away.
    pub fn pop(&mut self) {
        self.op(OpCode::Pop, -1);
    }

    pub fn dup(&mut self) {
        self.push_op(OpCode::Dup, &[]);
    }

    pub fn swap(&mut self) {
        self.op(OpCode::Swap, 0);
    }

    // =========================================================================
    // Registers, slots and globals
    // =========================================================================

    pub fn load_this(&mut self) {
        self.get_local(0);
    }

    /// Push a register, using the one-byte forms for registers 0 to 3.
    pub fn get_local(&mut self, register: u32) {
        match register {
            0 => self.push_op(OpCode::GetLocal0, &[]),
            1 => self.push_op(OpCode::GetLocal1, &[]),
            2 => self.push_op(OpCode::GetLocal2, &[]),
            3 => self.push_op(OpCode::GetLocal3, &[]),
            _ => self.push_op(OpCode::GetLocal, &[Operand::U30(register)]),
        }
    }

    pub fn set_local(&mut self, register: u32) {
        match register {
            0 => self.op(OpCode::SetLocal0, -1),
            1 => self.op(OpCode::SetLocal1, -1),
            2 => self.op(OpCode::SetLocal2, -1),
            3 => self.op(OpCode::SetLocal3, -1),
            _ => self.op_u30(OpCode::SetLocal, register, -1),
        }
    }

    /// Replace the object on top of the stack with its slot `slot`.
    pub fn get_slot(&mut self, slot: u32) {
        self.op_u30(OpCode::GetSlot, slot, 0);
    }

    pub fn set_slot(&mut self, slot: u32) {
        self.op_u30(OpCode::SetSlot, slot, -2);
    }

    /// Load global variable `index` (0-based) from the global scope.
    pub fn load_global(&mut self, index: u32) {
        self.prepare(LastInstruction::Push);
        self.instr(OpCode::GetGlobalScope, &[], 1);
        self.instr(OpCode::GetSlot, &[Operand::U30(index + 1)], 0);
    }

    /// Store the top value into global variable `index` (0-based).
    pub fn store_global(&mut self, index: u32) {
        self.prepare(LastInstruction::Other);
        self.instr(OpCode::GetGlobalScope, &[], 1);
        self.instr(OpCode::Swap, &[], 0);
        self.instr(OpCode::SetSlot, &[Operand::U30(index + 1)], -2);
    }

    /// Globals are no longer addressed by name.
    pub fn load_global_by_name(&mut self, name: &str) {
        self.trace.event(format_args!("LoadGlobal {name}"));
        self.poison(EmitError::Deprecated {
            construct: "load of a global by name",
        });
    }

    pub fn store_global_by_name(&mut self, name: &str) {
        self.trace.event(format_args!("StoreGlobal {name}"));
        self.poison(EmitError::Deprecated {
            construct: "store of a global by name",
        });
    }

    /// Load slot `index` (0-based) of the object on top of the stack.
    pub fn load_var(&mut self, index: u32) {
        self.prepare(LastInstruction::Push);
        self.instr(OpCode::GetSlot, &[Operand::U30(index + 1)], 0);
    }

    /// Store into slot `index` (0-based): object, then value, on the stack.
    pub fn store_var(&mut self, index: u32) {
        self.op_u30(OpCode::SetSlot, index + 1, -2);
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    pub fn next_name(&mut self) {
        self.op(OpCode::NextName, -1);
    }

    pub fn next_value(&mut self) {
        self.op(OpCode::NextValue, -1);
    }

    pub fn has_next(&mut self) {
        self.op(OpCode::HasNext, -1);
    }

    /// Advance the iteration over the object and index registers.
    pub fn has_next2(&mut self, object_register: u32, index_register: u32) {
        self.prepare(LastInstruction::Other);
        self.instr(
            OpCode::HasNext2,
            &[Operand::U30(object_register), Operand::U30(index_register)],
            1,
        );
    }

    // =========================================================================
    // Object creation
    // =========================================================================

    /// Build an object from `count` name/value pairs.
    pub fn new_object(&mut self, count: u32) {
        self.op_u30(OpCode::NewObject, count, 1 - 2 * count as i32);
    }

    pub fn new_array(&mut self, count: u32) {
        self.op_u30(OpCode::NewArray, count, 1 - count as i32);
    }

    pub fn new_activation(&mut self) {
        self.push_op(OpCode::NewActivation, &[]);
    }

    pub fn new_catch(&mut self, exception: u32) {
        self.push_op(OpCode::NewCatch, &[Operand::U30(exception)]);
    }

    /// Replace the base class on the stack with class `class`.
    pub fn new_class(&mut self, class: u32) {
        self.op_u30(OpCode::NewClass, class, 0);
    }

    /// `newclass` for the class named `name`.
    pub fn new_class_object(&mut self, name: &QName) {
        match self.module.class_info(&name.to_string()) {
            Ok(index) => self.new_class(index),
            Err(err) => self.poison(err),
        }
    }

    pub fn new_function(&mut self, method: u32) {
        self.push_op(OpCode::NewFunction, &[Operand::U30(method)]);
    }

    /// `newfunction` for the method with internal name `name`.
    pub fn new_function_object(&mut self, name: &str) {
        match self.module.method_info(name) {
            Ok(index) => self.new_function(index),
            Err(err) => self.poison(err),
        }
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call a closure: function, receiver, then `argc` arguments.
    pub fn call(&mut self, argc: u32) {
        self.op_u30(OpCode::Call, argc, -(argc as i32) - 1);
    }

    pub fn construct(&mut self, argc: u32) {
        self.op_u30(OpCode::Construct, argc, -(argc as i32));
    }

    fn call_u30_u30(&mut self, opcode: OpCode, a: u32, argc: u32, stack: i32) {
        self.prepare(LastInstruction::Other);
        self.instr(opcode, &[Operand::U30(a), Operand::U30(argc)], stack);
    }

    pub fn call_method(&mut self, disp_id: u32, argc: u32) {
        self.call_u30_u30(OpCode::CallMethod, disp_id, argc, -(argc as i32));
    }

    pub fn call_static(&mut self, method: u32, argc: u32) {
        self.call_u30_u30(OpCode::CallStatic, method, argc, -(argc as i32));
    }

    pub fn call_super(&mut self, multiname: u32, argc: u32) {
        self.call_u30_u30(OpCode::CallSuper, multiname, argc, -(argc as i32));
    }

    pub fn call_prop_lex(&mut self, multiname: u32, argc: u32) {
        self.call_u30_u30(OpCode::CallPropLex, multiname, argc, -(argc as i32));
    }

    pub fn construct_prop(&mut self, multiname: u32, argc: u32) {
        self.call_u30_u30(OpCode::ConstructProp, multiname, argc, -(argc as i32));
    }

    /// Call the base class constructor on the receiver.
    pub fn construct_super(&mut self, argc: u32) {
        self.op_u30(OpCode::ConstructSuper, argc, -(argc as i32) - 1);
    }

    /// Instantiate a parameterized type with `count` type arguments.
    pub fn apply_type(&mut self, count: u32) {
        self.op_u30(OpCode::ApplyType, count, -(count as i32));
    }

    /// Call a method by dispatch id, or a method info directly when the
    /// receiver's dispatch table is not known.
    pub fn invoke_method(&mut self, local_dispatch: bool, method_id: u32, argc: u32) {
        if local_dispatch {
            self.call_method(method_id, argc);
        } else {
            self.call_static(method_id, argc);
        }
    }

    /// Invoke the base class. Only construction is supported.
    pub fn invoke_super(&mut self, construct: bool, argc: u32) {
        if construct {
            self.construct_super(argc);
        } else {
            self.poison(EmitError::Unimplemented {
                construct: "non-constructing super invocation",
            });
        }
    }

    pub fn invoke_closure(&mut self, as_construct: bool, argc: u32) {
        if as_construct {
            self.construct(argc);
        } else {
            self.call(argc);
        }
    }

    pub fn return_void(&mut self) {
        self.op(OpCode::ReturnVoid, 0);
    }

    pub fn return_value(&mut self) {
        self.op(OpCode::ReturnValue, -1);
    }

    // =========================================================================
    // Multiname operands
    // =========================================================================

    pub fn get_lex(&mut self, multiname: u32) {
        self.push_op(OpCode::GetLex, &[Operand::U30(multiname)]);
    }

    pub fn find_def(&mut self, multiname: u32) {
        self.push_op(OpCode::FindDef, &[Operand::U30(multiname)]);
    }

    pub fn init_property(&mut self, multiname: u32) {
        self.op_u30(OpCode::InitProperty, multiname, -2);
    }

    // =========================================================================
    // Conversions and type tests
    // =========================================================================

    pub fn convert_s(&mut self) {
        self.op(OpCode::ConvertS, 0);
    }

    pub fn convert_i(&mut self) {
        self.op(OpCode::ConvertI, 0);
    }

    pub fn convert_u(&mut self) {
        self.op(OpCode::ConvertU, 0);
    }

    pub fn convert_d(&mut self) {
        self.op(OpCode::ConvertD, 0);
    }

    pub fn convert_b(&mut self) {
        self.op(OpCode::ConvertB, 0);
    }

    pub fn convert_o(&mut self) {
        self.op(OpCode::ConvertO, 0);
    }

    pub fn convert_m(&mut self) {
        self.op(OpCode::ConvertM, 0);
    }

    pub fn convert_m_p(&mut self, usage: &NumberUsage) {
        self.op_u30(OpCode::ConvertMP, usage.encode(), 0);
    }

    pub fn esc_xelem(&mut self) {
        self.op(OpCode::EscXElem, 0);
    }

    pub fn esc_xattr(&mut self) {
        self.op(OpCode::EscXAttr, 0);
    }

    pub fn check_filter(&mut self) {
        self.op(OpCode::CheckFilter, 0);
    }

    pub fn coerce(&mut self, multiname: u32) {
        self.op_u30(OpCode::Coerce, multiname, 0);
    }

    pub fn coerce_a(&mut self) {
        self.op(OpCode::CoerceA, 0);
    }

    pub fn coerce_b(&mut self) {
        self.op(OpCode::CoerceB, 0);
    }

    pub fn coerce_d(&mut self) {
        self.op(OpCode::CoerceD, 0);
    }

    pub fn coerce_i(&mut self) {
        self.op(OpCode::CoerceI, 0);
    }

    pub fn coerce_o(&mut self) {
        self.op(OpCode::CoerceO, 0);
    }

    pub fn coerce_s(&mut self) {
        self.op(OpCode::CoerceS, 0);
    }

    pub fn coerce_u(&mut self) {
        self.op(OpCode::CoerceU, 0);
    }

    pub fn as_type(&mut self, multiname: u32) {
        self.op_u30(OpCode::AsType, multiname, 0);
    }

    pub fn as_type_late(&mut self) {
        self.op(OpCode::AsTypeLate, -1);
    }

    pub fn is_type(&mut self, multiname: u32) {
        self.op_u30(OpCode::IsType, multiname, 0);
    }

    pub fn is_type_late(&mut self) {
        self.op(OpCode::IsTypeLate, -1);
    }

    pub fn instance_of(&mut self) {
        self.op(OpCode::InstanceOf, -1);
    }

    /// The `in` operator.
    pub fn in_operator(&mut self) {
        self.op(OpCode::In, -1);
    }

    pub fn type_of(&mut self) {
        self.op(OpCode::TypeOf, 0);
    }

    pub fn to_int(&mut self) {
        self.convert_i();
    }

    /// Converts with `convert_i`; the VM's `convert_u` is not used for
    /// this conversion.
    pub fn to_uint(&mut self) {
        self.convert_i();
    }

    pub fn to_boolean(&mut self) {
        self.convert_b();
    }

    pub fn to_double(&mut self) {
        self.convert_d();
    }

    /// Coerce the top value to `type_name`.
    ///
    /// A coercion immediately following another replaces it. The any type
    /// and the core primitive types use their dedicated opcodes.
    pub fn check_type(&mut self, type_name: &TypeName) {
        let full_name = type_name.to_string();
        if full_name.is_empty() {
            return;
        }
        if let Some(method) = self.method.as_mut() {
            if method.last_in == LastInstruction::Coerce {
                let erased = method.ip() - method.last_ip;
                method.code.truncate(method.last_ip);
                self.trace.event(format_args!("* ERASING {erased} bytes"));
            }
        }
        self.flush_debug_info();
        if let Some(method) = self.method.as_mut() {
            method.last_ip = method.ip();
            method.last_in = LastInstruction::Coerce;
        }

        let opcode = match full_name.as_str() {
            "*" => OpCode::CoerceA,
            "String" => OpCode::CoerceS,
            "Boolean" => OpCode::ConvertB,
            "Number" => OpCode::ConvertD,
            "int" => OpCode::ConvertI,
            "uint" => OpCode::ConvertU,
            _ => {
                let index = self.add_class_name(Some(type_name));
                self.instr(OpCode::Coerce, &[Operand::U30(index)], 0);
                return;
            }
        };
        self.instr(opcode, &[], 0);
    }

    // =========================================================================
    // Arithmetic, bitwise and comparison
    // =========================================================================

    pub fn negate(&mut self) {
        self.op(OpCode::Negate, 0);
    }

    pub fn negate_i(&mut self) {
        self.op(OpCode::NegateI, 0);
    }

    pub fn negate_p(&mut self, usage: &NumberUsage) {
        self.op_u30(OpCode::NegateP, usage.encode(), 0);
    }

    pub fn increment(&mut self) {
        self.op(OpCode::Increment, 0);
    }

    pub fn increment_i(&mut self) {
        self.op(OpCode::IncrementI, 0);
    }

    pub fn increment_p(&mut self, usage: &NumberUsage) {
        self.op_u30(OpCode::IncrementP, usage.encode(), 0);
    }

    pub fn decrement(&mut self) {
        self.op(OpCode::Decrement, 0);
    }

    pub fn decrement_i(&mut self) {
        self.op(OpCode::DecrementI, 0);
    }

    pub fn decrement_p(&mut self, usage: &NumberUsage) {
        self.op_u30(OpCode::DecrementP, usage.encode(), 0);
    }

    pub fn inc_local(&mut self, register: u32) {
        self.op_u30(OpCode::IncLocal, register, 0);
    }

    pub fn inc_local_i(&mut self, register: u32) {
        self.op_u30(OpCode::IncLocalI, register, 0);
    }

    pub fn inc_local_p(&mut self, usage: &NumberUsage, register: u32) {
        self.call_u30_u30(OpCode::IncLocalP, usage.encode(), register, 0);
    }

    pub fn dec_local(&mut self, register: u32) {
        self.op_u30(OpCode::DecLocal, register, 0);
    }

    pub fn dec_local_i(&mut self, register: u32) {
        self.op_u30(OpCode::DecLocalI, register, 0);
    }

    pub fn dec_local_p(&mut self, usage: &NumberUsage, register: u32) {
        self.call_u30_u30(OpCode::DecLocalP, usage.encode(), register, 0);
    }

    pub fn not(&mut self) {
        self.op(OpCode::Not, 0);
    }

    pub fn bit_not(&mut self) {
        self.op(OpCode::BitNot, 0);
    }

    /// Any two-operand instruction without inline operands.
    pub fn binary(&mut self, opcode: OpCode) {
        self.op(opcode, -1);
    }

    /// A two-operand arithmetic instruction carrying a number usage.
    pub fn binary_p(&mut self, opcode: OpCode, usage: &NumberUsage) {
        self.op_u30(opcode, usage.encode(), -1);
    }

    pub fn add(&mut self) {
        self.binary(OpCode::Add);
    }

    pub fn add_i(&mut self) {
        self.binary(OpCode::AddI);
    }

    pub fn subtract(&mut self) {
        self.binary(OpCode::Subtract);
    }

    pub fn subtract_i(&mut self) {
        self.binary(OpCode::SubtractI);
    }

    pub fn multiply(&mut self) {
        self.binary(OpCode::Multiply);
    }

    pub fn multiply_i(&mut self) {
        self.binary(OpCode::MultiplyI);
    }

    pub fn divide(&mut self) {
        self.binary(OpCode::Divide);
    }

    pub fn modulo(&mut self) {
        self.binary(OpCode::Modulo);
    }

    pub fn equals(&mut self) {
        self.binary(OpCode::Equals);
    }

    pub fn strict_equals(&mut self) {
        self.binary(OpCode::StrictEquals);
    }

    pub fn less_than(&mut self) {
        self.binary(OpCode::LessThan);
    }

    pub fn greater_than(&mut self) {
        self.binary(OpCode::GreaterThan);
    }

    // =========================================================================
    // Debug
    // =========================================================================

    /// Name register `slot` for the debugger.
    pub fn debug_slot(&mut self, name: &str, slot: u8, line: i32) {
        let name = self.module.pools.add_utf8(name);
        self.prepare(LastInstruction::Other);
        self.instr(
            OpCode::Debug,
            &[
                Operand::Byte(DI_LOCAL),
                Operand::U30(name),
                Operand::Byte(slot),
                Operand::U30(line.max(0) as u32),
            ],
            0,
        );
    }

    pub fn debug_line(&mut self, line: u32) {
        self.op_u30(OpCode::DebugLine, line, 0);
    }

    pub fn debug_file(&mut self, file: &str) {
        let index = self.module.pools.add_utf8(file);
        self.op_u30(OpCode::DebugFile, index, 0);
    }
}
