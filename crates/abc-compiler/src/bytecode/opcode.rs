//! AVM2 instruction set.
//!
//! Each opcode is a single byte followed by inline operands. The operand
//! layout of every opcode is described by [`Operands`], which is enough to
//! walk a method body without understanding the instructions.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// AVM2 operation codes.
///
/// The VM is a stack machine with a separate scope stack. Multiname,
/// string and numeric operands are constant pool indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Misc
    // =========================================================================
    Bkpt = 0x01,
    Nop = 0x02,
    /// Pop a value and throw it.
    Throw = 0x03,
    /// Operand: u30 multiname index
    GetSuper = 0x04,
    /// Operand: u30 multiname index
    SetSuper = 0x05,
    /// Set the default XML namespace.
    /// Operand: u30 string index
    Dxns = 0x06,
    /// Set the default XML namespace from the stack.
    DxnsLate = 0x07,
    /// Mark a register as dead.
    /// Operand: u30 register
    Kill = 0x08,
    /// Branch target marker.
    Label = 0x09,

    // =========================================================================
    // Branches (operand: s24 offset from the next instruction)
    // =========================================================================
    IfNlt = 0x0C,
    IfNle = 0x0D,
    IfNgt = 0x0E,
    IfNge = 0x0F,
    Jump = 0x10,
    IfTrue = 0x11,
    IfFalse = 0x12,
    IfEq = 0x13,
    IfNe = 0x14,
    IfLt = 0x15,
    IfLe = 0x16,
    IfGt = 0x17,
    IfGe = 0x18,
    IfStrictEq = 0x19,
    IfStrictNe = 0x1A,
    /// Operands: s24 default offset, u30 case count minus one, s24 per case.
    /// Offsets are relative to the start of this instruction.
    LookupSwitch = 0x1B,

    // =========================================================================
    // Scope and iteration
    // =========================================================================
    PushWith = 0x1C,
    PopScope = 0x1D,
    NextName = 0x1E,
    HasNext = 0x1F,

    // =========================================================================
    // Pushes
    // =========================================================================
    PushNull = 0x20,
    PushUndefined = 0x21,
    PushUninitialized = 0x22,
    NextValue = 0x23,
    /// Operand: u8 (sign-extended)
    PushByte = 0x24,
    /// Operand: u30 (sign-extended from 16 bits)
    PushShort = 0x25,
    PushTrue = 0x26,
    PushFalse = 0x27,
    PushNaN = 0x28,
    Pop = 0x29,
    Dup = 0x2A,
    Swap = 0x2B,
    /// Operand: u30 string index
    PushString = 0x2C,
    /// Operand: u30 int index
    PushInt = 0x2D,
    /// Operand: u30 uint index
    PushUint = 0x2E,
    /// Operand: u30 double index
    PushDouble = 0x2F,
    PushScope = 0x30,
    /// Operand: u30 namespace index
    PushNamespace = 0x31,
    /// Operands: u30 object register, u30 index register
    HasNext2 = 0x32,
    /// Operand: u30 decimal index
    PushDecimal = 0x33,

    // =========================================================================
    // Functions and calls
    // =========================================================================
    /// Operand: u30 method index
    NewFunction = 0x40,
    /// Operand: u30 arg count
    Call = 0x41,
    /// Operand: u30 arg count
    Construct = 0x42,
    /// Operands: u30 dispatch id, u30 arg count
    CallMethod = 0x43,
    /// Operands: u30 method index, u30 arg count
    CallStatic = 0x44,
    /// Operands: u30 multiname index, u30 arg count
    CallSuper = 0x45,
    /// Operands: u30 multiname index, u30 arg count
    CallProperty = 0x46,
    ReturnVoid = 0x47,
    ReturnValue = 0x48,
    /// Operand: u30 arg count
    ConstructSuper = 0x49,
    /// Operands: u30 multiname index, u30 arg count
    ConstructProp = 0x4A,
    /// Operands: u30 multiname index, u30 arg count
    CallPropLex = 0x4C,
    /// Operand: u30 param count
    ApplyType = 0x53,

    // =========================================================================
    // Object creation
    // =========================================================================
    /// Operand: u30 property count
    NewObject = 0x55,
    /// Operand: u30 element count
    NewArray = 0x56,
    NewActivation = 0x57,
    /// Operand: u30 class index
    NewClass = 0x58,
    /// Operand: u30 multiname index
    GetDescendants = 0x59,
    /// Operand: u30 exception index
    NewCatch = 0x5A,

    // =========================================================================
    // Properties
    // =========================================================================
    /// Operand: u30 multiname index
    FindPropStrict = 0x5D,
    /// Operand: u30 multiname index
    FindProperty = 0x5E,
    /// Operand: u30 multiname index
    FindDef = 0x5F,
    /// Operand: u30 multiname index
    GetLex = 0x60,
    /// Operand: u30 multiname index
    SetProperty = 0x61,
    /// Operand: u30 register
    GetLocal = 0x62,
    /// Operand: u30 register
    SetLocal = 0x63,
    GetGlobalScope = 0x64,
    /// Operand: u8 scope index
    GetScopeObject = 0x65,
    /// Operand: u30 multiname index
    GetProperty = 0x66,
    /// Operand: u30 multiname index
    InitProperty = 0x68,
    /// Operand: u30 multiname index
    DeleteProperty = 0x6A,
    /// Operand: u30 slot id
    GetSlot = 0x6C,
    /// Operand: u30 slot id
    SetSlot = 0x6D,

    // =========================================================================
    // Conversions
    // =========================================================================
    ConvertS = 0x70,
    EscXElem = 0x71,
    EscXAttr = 0x72,
    ConvertI = 0x73,
    ConvertU = 0x74,
    ConvertD = 0x75,
    ConvertB = 0x76,
    ConvertO = 0x77,
    CheckFilter = 0x78,
    ConvertM = 0x79,
    /// Operand: u30 number usage
    ConvertMP = 0x7A,
    /// Operand: u30 multiname index
    Coerce = 0x80,
    CoerceB = 0x81,
    CoerceA = 0x82,
    CoerceI = 0x83,
    CoerceD = 0x84,
    CoerceS = 0x85,
    /// Operand: u30 multiname index
    AsType = 0x86,
    AsTypeLate = 0x87,
    CoerceU = 0x88,
    CoerceO = 0x89,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    /// Operand: u30 number usage
    NegateP = 0x8F,
    Negate = 0x90,
    Increment = 0x91,
    /// Operand: u30 register
    IncLocal = 0x92,
    Decrement = 0x93,
    /// Operand: u30 register
    DecLocal = 0x94,
    TypeOf = 0x95,
    Not = 0x96,
    BitNot = 0x97,
    /// Operand: u30 number usage
    IncrementP = 0x9C,
    /// Operands: u30 number usage, u30 register
    IncLocalP = 0x9D,
    /// Operand: u30 number usage
    DecrementP = 0x9E,
    /// Operands: u30 number usage, u30 register
    DecLocalP = 0x9F,
    Add = 0xA0,
    Subtract = 0xA1,
    Multiply = 0xA2,
    Divide = 0xA3,
    Modulo = 0xA4,
    LShift = 0xA5,
    RShift = 0xA6,
    URShift = 0xA7,
    BitAnd = 0xA8,
    BitOr = 0xA9,
    BitXor = 0xAA,
    Equals = 0xAB,
    StrictEquals = 0xAC,
    LessThan = 0xAD,
    LessEquals = 0xAE,
    GreaterThan = 0xAF,
    GreaterEquals = 0xB0,
    InstanceOf = 0xB1,
    /// Operand: u30 multiname index
    IsType = 0xB2,
    IsTypeLate = 0xB3,
    In = 0xB4,
    /// Operand: u30 number usage
    AddP = 0xB5,
    /// Operand: u30 number usage
    SubtractP = 0xB6,
    /// Operand: u30 number usage
    MultiplyP = 0xB7,
    /// Operand: u30 number usage
    DivideP = 0xB8,
    /// Operand: u30 number usage
    ModuloP = 0xB9,
    IncrementI = 0xC0,
    DecrementI = 0xC1,
    /// Operand: u30 register
    IncLocalI = 0xC2,
    /// Operand: u30 register
    DecLocalI = 0xC3,
    NegateI = 0xC4,
    AddI = 0xC5,
    SubtractI = 0xC6,
    MultiplyI = 0xC7,

    // =========================================================================
    // Short register forms
    // =========================================================================
    GetLocal0 = 0xD0,
    GetLocal1 = 0xD1,
    GetLocal2 = 0xD2,
    GetLocal3 = 0xD3,
    SetLocal0 = 0xD4,
    SetLocal1 = 0xD5,
    SetLocal2 = 0xD6,
    SetLocal3 = 0xD7,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Operands: u8 kind, u30 string index, u8 register, u30 extra
    Debug = 0xEF,
    /// Operand: u30 line
    DebugLine = 0xF0,
    /// Operand: u30 string index
    DebugFile = 0xF1,
}

/// Inline operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One raw byte.
    Byte,
    /// One varint.
    U30,
    /// Two varints.
    U30U30,
    /// A 24-bit branch offset.
    Branch,
    /// Default offset, case count, case offsets.
    LookupSwitch,
    /// u8, u30, u8, u30.
    Debug,
}

impl OpCode {
    /// Convert from u8, returning None for unassigned values.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Inline operand layout.
    pub fn operands(&self) -> Operands {
        use OpCode::*;
        match self {
            IfNlt | IfNle | IfNgt | IfNge | Jump | IfTrue | IfFalse | IfEq | IfNe | IfLt
            | IfLe | IfGt | IfGe | IfStrictEq | IfStrictNe => Operands::Branch,

            LookupSwitch => Operands::LookupSwitch,

            PushByte | GetScopeObject => Operands::Byte,

            GetSuper | SetSuper | Dxns | Kill | PushShort | PushString | PushInt | PushUint
            | PushDouble | PushNamespace | PushDecimal | NewFunction | Call | Construct
            | ConstructSuper | ApplyType | NewObject | NewArray | NewClass | GetDescendants
            | NewCatch | FindPropStrict | FindProperty | FindDef | GetLex | SetProperty
            | GetLocal | SetLocal | GetProperty | InitProperty | DeleteProperty | GetSlot
            | SetSlot | ConvertMP | Coerce | AsType | NegateP | IncLocal | DecLocal
            | IncrementP | DecrementP | IsType | AddP | SubtractP | MultiplyP | DivideP
            | ModuloP | IncLocalI | DecLocalI | DebugLine | DebugFile => Operands::U30,

            HasNext2 | CallMethod | CallStatic | CallSuper | CallProperty | ConstructProp
            | CallPropLex | IncLocalP | DecLocalP => Operands::U30U30,

            Debug => Operands::Debug,

            _ => Operands::None,
        }
    }

    /// Whether this is a conditional or unconditional branch.
    pub fn is_branch(&self) -> bool {
        self.operands() == Operands::Branch
    }

    /// Assembler mnemonic.
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Bkpt => "bkpt",
            Nop => "nop",
            Throw => "throw",
            GetSuper => "getsuper",
            SetSuper => "setsuper",
            Dxns => "dxns",
            DxnsLate => "dxnslate",
            Kill => "kill",
            Label => "label",
            IfNlt => "ifnlt",
            IfNle => "ifnle",
            IfNgt => "ifngt",
            IfNge => "ifnge",
            Jump => "jump",
            IfTrue => "iftrue",
            IfFalse => "iffalse",
            IfEq => "ifeq",
            IfNe => "ifne",
            IfLt => "iflt",
            IfLe => "ifle",
            IfGt => "ifgt",
            IfGe => "ifge",
            IfStrictEq => "ifstricteq",
            IfStrictNe => "ifstrictne",
            LookupSwitch => "lookupswitch",
            PushWith => "pushwith",
            PopScope => "popscope",
            NextName => "nextname",
            HasNext => "hasnext",
            PushNull => "pushnull",
            PushUndefined => "pushundefined",
            PushUninitialized => "pushuninitialized",
            NextValue => "nextvalue",
            PushByte => "pushbyte",
            PushShort => "pushshort",
            PushTrue => "pushtrue",
            PushFalse => "pushfalse",
            PushNaN => "pushnan",
            Pop => "pop",
            Dup => "dup",
            Swap => "swap",
            PushString => "pushstring",
            PushInt => "pushint",
            PushUint => "pushuint",
            PushDouble => "pushdouble",
            PushScope => "pushscope",
            PushNamespace => "pushnamespace",
            HasNext2 => "hasnext2",
            PushDecimal => "pushdecimal",
            NewFunction => "newfunction",
            Call => "call",
            Construct => "construct",
            CallMethod => "callmethod",
            CallStatic => "callstatic",
            CallSuper => "callsuper",
            CallProperty => "callproperty",
            ReturnVoid => "returnvoid",
            ReturnValue => "returnvalue",
            ConstructSuper => "constructsuper",
            ConstructProp => "constructprop",
            CallPropLex => "callproplex",
            ApplyType => "applytype",
            NewObject => "newobject",
            NewArray => "newarray",
            NewActivation => "newactivation",
            NewClass => "newclass",
            GetDescendants => "getdescendants",
            NewCatch => "newcatch",
            FindPropStrict => "findpropstrict",
            FindProperty => "findproperty",
            FindDef => "finddef",
            GetLex => "getlex",
            SetProperty => "setproperty",
            GetLocal => "getlocal",
            SetLocal => "setlocal",
            GetGlobalScope => "getglobalscope",
            GetScopeObject => "getscopeobject",
            GetProperty => "getproperty",
            InitProperty => "initproperty",
            DeleteProperty => "deleteproperty",
            GetSlot => "getslot",
            SetSlot => "setslot",
            ConvertS => "convert_s",
            EscXElem => "esc_xelem",
            EscXAttr => "esc_xattr",
            ConvertI => "convert_i",
            ConvertU => "convert_u",
            ConvertD => "convert_d",
            ConvertB => "convert_b",
            ConvertO => "convert_o",
            CheckFilter => "checkfilter",
            ConvertM => "convert_m",
            ConvertMP => "convert_m_p",
            Coerce => "coerce",
            CoerceB => "coerce_b",
            CoerceA => "coerce_a",
            CoerceI => "coerce_i",
            CoerceD => "coerce_d",
            CoerceS => "coerce_s",
            AsType => "astype",
            AsTypeLate => "astypelate",
            CoerceU => "coerce_u",
            CoerceO => "coerce_o",
            NegateP => "negate_p",
            Negate => "negate",
            Increment => "increment",
            IncLocal => "inclocal",
            Decrement => "decrement",
            DecLocal => "declocal",
            TypeOf => "typeof",
            Not => "not",
            BitNot => "bitnot",
            IncrementP => "increment_p",
            IncLocalP => "inclocal_p",
            DecrementP => "decrement_p",
            DecLocalP => "declocal_p",
            Add => "add",
            Subtract => "subtract",
            Multiply => "multiply",
            Divide => "divide",
            Modulo => "modulo",
            LShift => "lshift",
            RShift => "rshift",
            URShift => "urshift",
            BitAnd => "bitand",
            BitOr => "bitor",
            BitXor => "bitxor",
            Equals => "equals",
            StrictEquals => "strictequals",
            LessThan => "lessthan",
            LessEquals => "lessequals",
            GreaterThan => "greaterthan",
            GreaterEquals => "greaterequals",
            InstanceOf => "instanceof",
            IsType => "istype",
            IsTypeLate => "istypelate",
            In => "in",
            AddP => "add_p",
            SubtractP => "subtract_p",
            MultiplyP => "multiply_p",
            DivideP => "divide_p",
            ModuloP => "modulo_p",
            IncrementI => "increment_i",
            DecrementI => "decrement_i",
            IncLocalI => "inclocal_i",
            DecLocalI => "declocal_i",
            NegateI => "negate_i",
            AddI => "add_i",
            SubtractI => "subtract_i",
            MultiplyI => "multiply_i",
            GetLocal0 => "getlocal0",
            GetLocal1 => "getlocal1",
            GetLocal2 => "getlocal2",
            GetLocal3 => "getlocal3",
            SetLocal0 => "setlocal0",
            SetLocal1 => "setlocal1",
            SetLocal2 => "setlocal2",
            SetLocal3 => "setlocal3",
            Debug => "debug",
            DebugLine => "debugline",
            DebugFile => "debugfile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values() {
        assert_eq!(u8::from(OpCode::Jump), 0x10);
        assert_eq!(u8::from(OpCode::LookupSwitch), 0x1B);
        assert_eq!(u8::from(OpCode::PushDecimal), 0x33);
        assert_eq!(u8::from(OpCode::GetLocal0), 0xD0);
        assert_eq!(u8::from(OpCode::DebugFile), 0xF1);
    }

    #[test]
    fn opcode_from_u8() {
        assert_eq!(OpCode::from_u8(0x47), Some(OpCode::ReturnVoid));
        assert_eq!(OpCode::from_u8(0x00), None);
        assert_eq!(OpCode::from_u8(0x0A), None);
    }

    #[test]
    fn operand_layouts() {
        assert_eq!(OpCode::PushByte.operands(), Operands::Byte);
        assert_eq!(OpCode::PushShort.operands(), Operands::U30);
        assert_eq!(OpCode::CallProperty.operands(), Operands::U30U30);
        assert_eq!(OpCode::IfStrictNe.operands(), Operands::Branch);
        assert_eq!(OpCode::Add.operands(), Operands::None);
        assert!(OpCode::Jump.is_branch());
        assert!(!OpCode::LookupSwitch.is_branch());
    }

    #[test]
    fn opcode_name() {
        assert_eq!(OpCode::ConvertMP.name(), "convert_m_p");
        assert_eq!(OpCode::PushNaN.name(), "pushnan");
    }
}
