//! Unary and binary operators.
//!
//! The code generator names operators by their source form, already
//! specialized by operand type where it knows it (`_I` for int operands).
//! Under decimal numerics a non-default number usage selects the `_p`
//! instruction forms.

use abc_core::{Namespace, NumberUsage};

use super::{AbcEmitter, LastInstruction};
use crate::bytecode::{Multiname, OpCode, Operand};

/// A unary operator, or one of the runtime operations dispatched the same
/// way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `typeof` of an operand whose type is only known at runtime.
    TypeOf,
    /// `typeof` of a boolean operand.
    TypeOfBoolean,
    /// `typeof` of an int, uint, double or decimal operand.
    TypeOfNumber,
    TypeOfString,
    TypeOfUndefined,
    Increment,
    IncrementInt,
    IncrementLocal(u32),
    IncrementLocalInt(u32),
    Decrement,
    DecrementInt,
    DecrementLocal(u32),
    DecrementLocalInt(u32),
    Plus,
    /// Unary plus on an int is a no-op.
    PlusInt,
    PlusDecimal,
    Minus,
    Not,
    BitNot,
    /// `void`: the caller discards the operand.
    Void,
    /// Property read with the name on the stack.
    Get,
    /// Property write with the name on the stack.
    Put,
    /// Property delete with the name on the stack.
    Delete,
    HasMoreNames,
    NextName,
    NextValue,
    ToXmlString,
    ToXmlAttrString,
    CheckFilter,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    AddInt,
    Subtract,
    SubtractInt,
    Multiply,
    MultiplyInt,
    Divide,
    Modulo,
    LeftShift,
    RightShift,
    UnsignedRightShift,
    LessThan,
    GreaterThan,
    LessEquals,
    GreaterEquals,
    Equals,
    NotEquals,
    StrictEquals,
    StrictNotEquals,
    BitAnd,
    BitOr,
    BitXor,
    /// Lowered to branches by the caller; emits nothing.
    LogicalAnd,
    /// Lowered to branches by the caller; emits nothing.
    LogicalOr,
    InstanceOf,
    In,
    IsLate,
    AsLate,
}

impl AbcEmitter {
    /// The usage to encode in a `_p` instruction, if one applies.
    fn usage_param<'u>(&self, usage: Option<&'u NumberUsage>) -> Option<&'u NumberUsage> {
        usage.filter(|u| self.config.es4_numerics && !u.is_default())
    }

    /// Emit a unary operator.
    ///
    /// `namespaces` are the open namespaces for [`UnaryOp::Get`],
    /// [`UnaryOp::Put`] and [`UnaryOp::Delete`]. The typed `typeof` forms
    /// push the known answer.
    pub fn invoke_unary(
        &mut self,
        op: UnaryOp,
        namespaces: &[Namespace],
        usage: Option<&NumberUsage>,
    ) {
        let param = self.usage_param(usage).copied();
        self.trace.event(format_args!("InvokeUnary {op:?}"));

        match op {
            UnaryOp::TypeOf => self.type_of(),
            UnaryOp::TypeOfBoolean => self.push_string("boolean"),
            UnaryOp::TypeOfNumber => self.push_string("number"),
            UnaryOp::TypeOfString => self.push_string("string"),
            UnaryOp::TypeOfUndefined => self.push_string("undefined"),

            UnaryOp::Increment => match &param {
                Some(usage) => self.increment_p(usage),
                None => self.increment(),
            },
            UnaryOp::IncrementInt => self.increment_i(),
            UnaryOp::IncrementLocal(register) => match &param {
                Some(usage) => self.inc_local_p(usage, register),
                None => self.inc_local(register),
            },
            UnaryOp::IncrementLocalInt(register) => self.inc_local_i(register),
            UnaryOp::Decrement => match &param {
                Some(usage) => self.decrement_p(usage),
                None => self.decrement(),
            },
            UnaryOp::DecrementInt => self.decrement_i(),
            UnaryOp::DecrementLocal(register) => match &param {
                Some(usage) => self.dec_local_p(usage, register),
                None => self.dec_local(register),
            },
            UnaryOp::DecrementLocalInt(register) => self.dec_local_i(register),

            UnaryOp::Plus => self.convert_d(),
            UnaryOp::PlusInt | UnaryOp::Void => self.prepare(LastInstruction::Other),
            UnaryOp::PlusDecimal => self.convert_m(),
            UnaryOp::Minus => match &param {
                Some(usage) => self.negate_p(usage),
                None => self.negate(),
            },
            UnaryOp::Not => self.not(),
            UnaryOp::BitNot => self.bit_not(),

            UnaryOp::Get => self.late_property(OpCode::GetProperty, namespaces, -1),
            UnaryOp::Put => self.late_property(OpCode::SetProperty, namespaces, -3),
            UnaryOp::Delete => self.late_property(OpCode::DeleteProperty, namespaces, -1),

            UnaryOp::HasMoreNames => self.has_next(),
            UnaryOp::NextName => self.next_name(),
            UnaryOp::NextValue => self.next_value(),
            UnaryOp::ToXmlString => self.esc_xelem(),
            UnaryOp::ToXmlAttrString => self.esc_xattr(),
            UnaryOp::CheckFilter => self.check_filter(),
        }
    }

    /// A property operation through a runtime name looked up in the open
    /// namespaces.
    fn late_property(&mut self, opcode: OpCode, namespaces: &[Namespace], stack: i32) {
        let ns_set = self.make_namespace_set(namespaces);
        let index = self.module.pools.add_multiname(&Multiname::MultinameL {
            ns_set,
            attribute: false,
        });
        self.prepare(LastInstruction::Other);
        self.instr(opcode, &[Operand::U30(index)], stack);
    }

    /// Emit a binary operator.
    pub fn invoke_binary(&mut self, op: BinaryOp, usage: &NumberUsage) {
        let param = self.usage_param(Some(usage)).copied();
        self.trace.event(format_args!("InvokeBinary {op:?}"));

        let with_usage = |plain: OpCode, typed: OpCode| match &param {
            Some(usage) => (typed, Some(*usage)),
            None => (plain, None),
        };
        let (opcode, usage) = match op {
            BinaryOp::Add => with_usage(OpCode::Add, OpCode::AddP),
            BinaryOp::Subtract => with_usage(OpCode::Subtract, OpCode::SubtractP),
            BinaryOp::Multiply => with_usage(OpCode::Multiply, OpCode::MultiplyP),
            BinaryOp::Divide => with_usage(OpCode::Divide, OpCode::DivideP),
            BinaryOp::Modulo => with_usage(OpCode::Modulo, OpCode::ModuloP),
            BinaryOp::AddInt => (OpCode::AddI, None),
            BinaryOp::SubtractInt => (OpCode::SubtractI, None),
            BinaryOp::MultiplyInt => (OpCode::MultiplyI, None),
            BinaryOp::LeftShift => (OpCode::LShift, None),
            BinaryOp::RightShift => (OpCode::RShift, None),
            BinaryOp::UnsignedRightShift => (OpCode::URShift, None),
            BinaryOp::LessThan => (OpCode::LessThan, None),
            BinaryOp::GreaterThan => (OpCode::GreaterThan, None),
            BinaryOp::LessEquals => (OpCode::LessEquals, None),
            BinaryOp::GreaterEquals => (OpCode::GreaterEquals, None),
            BinaryOp::Equals | BinaryOp::NotEquals => (OpCode::Equals, None),
            BinaryOp::StrictEquals | BinaryOp::StrictNotEquals => (OpCode::StrictEquals, None),
            BinaryOp::BitAnd => (OpCode::BitAnd, None),
            BinaryOp::BitOr => (OpCode::BitOr, None),
            BinaryOp::BitXor => (OpCode::BitXor, None),
            BinaryOp::InstanceOf => (OpCode::InstanceOf, None),
            BinaryOp::In => (OpCode::In, None),
            BinaryOp::IsLate => (OpCode::IsTypeLate, None),
            BinaryOp::AsLate => (OpCode::AsTypeLate, None),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                self.prepare(LastInstruction::Other);
                return;
            }
        };

        match usage {
            Some(usage) => self.binary_p(opcode, &usage),
            None => self.binary(opcode),
        }
        if matches!(op, BinaryOp::NotEquals | BinaryOp::StrictNotEquals) {
            self.not();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_opcodes, disassemble};
    use crate::emit::FrameLayout;
    use abc_core::{EmitterConfig, NumberType};

    fn emitter(es4: bool) -> AbcEmitter {
        let mut e = AbcEmitter::new(EmitterConfig::new().with_es4_numerics(es4));
        e.start_method("test", FrameLayout::new(0, 2)).unwrap();
        e
    }

    #[test]
    fn not_equals_negates() {
        let mut e = emitter(false);
        e.push_byte(1);
        e.push_byte(2);
        e.invoke_binary(BinaryOp::StrictNotEquals, &NumberUsage::default());
        assert_opcodes(
            e.code(),
            &[OpCode::PushByte, OpCode::PushByte, OpCode::StrictEquals, OpCode::Not],
        );
        assert_eq!(e.stack_depth(), 1);
    }

    #[test]
    fn usage_selects_p_forms_under_es4() {
        let decimal = NumberUsage::new(NumberType::Decimal);

        let mut plain = emitter(false);
        plain.push_byte(1);
        plain.push_byte(2);
        plain.invoke_binary(BinaryOp::Add, &decimal);
        assert_eq!(disassemble(plain.code())[2].opcode, OpCode::Add);

        let mut es4 = emitter(true);
        es4.push_byte(1);
        es4.push_byte(2);
        es4.invoke_binary(BinaryOp::Add, &decimal);
        let add = &disassemble(es4.code())[2];
        assert_eq!(add.opcode, OpCode::AddP);
        assert_eq!(add.operands, [Operand::U30(decimal.encode())]);
        assert_eq!(es4.stack_depth(), 1);
    }

    #[test]
    fn default_usage_keeps_plain_forms() {
        let mut e = emitter(true);
        e.push_byte(1);
        e.invoke_unary(UnaryOp::Minus, &[], Some(&NumberUsage::default()));
        e.invoke_unary(UnaryOp::IncrementLocal(1), &[], None);
        assert_opcodes(e.code(), &[OpCode::PushByte, OpCode::Negate, OpCode::IncLocal]);
    }

    #[test]
    fn typed_typeof_pushes_answer() {
        let mut e = emitter(false);
        e.invoke_unary(UnaryOp::TypeOfNumber, &[], None);
        assert_opcodes(e.code(), &[OpCode::PushString]);
        assert_eq!(e.stack_depth(), 1);
        assert!(e.module.pools.utf8_at(1) == Some("number"));
    }

    #[test]
    fn int_plus_and_logical_ops_emit_nothing() {
        let mut e = emitter(false);
        e.push_byte(1);
        e.invoke_unary(UnaryOp::PlusInt, &[], None);
        e.invoke_unary(UnaryOp::Void, &[], None);
        e.push_byte(2);
        e.invoke_binary(BinaryOp::LogicalOr, &NumberUsage::default());
        assert_opcodes(e.code(), &[OpCode::PushByte, OpCode::PushByte]);
    }

    #[test]
    fn late_property_operations() {
        let mut e = emitter(false);
        let open = [Namespace::public()];
        e.load_this();
        e.push_string("x");
        e.invoke_unary(UnaryOp::Get, &open, None);
        assert_eq!(e.stack_depth(), 1);

        e.load_this();
        e.push_string("x");
        e.push_true();
        e.invoke_unary(UnaryOp::Put, &open, None);
        assert_eq!(e.stack_depth(), 1);

        e.load_this();
        e.push_string("x");
        e.invoke_unary(UnaryOp::Delete, &open, None);
        assert_eq!(e.stack_depth(), 2);
        assert!(e.error().is_none());
    }

    #[test]
    fn shifts_ignore_int_specialization() {
        let mut e = emitter(false);
        e.push_byte(1);
        e.push_byte(3);
        e.invoke_binary(BinaryOp::UnsignedRightShift, &NumberUsage::default());
        e.push_byte(4);
        e.invoke_binary(BinaryOp::AddInt, &NumberUsage::default());
        assert_opcodes(
            e.code(),
            &[
                OpCode::PushByte,
                OpCode::PushByte,
                OpCode::URShift,
                OpCode::PushByte,
                OpCode::AddI,
            ],
        );
    }
}
