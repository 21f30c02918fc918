//! Binary record encoders.
//!
//! Each record type mirrors one ABC structure and knows how to append its
//! encoding to a buffer. Records hold pool indices only; resolving names
//! and values to indices is the caller's job.

use bitflags::bitflags;
use num_enum::IntoPrimitive;

use super::constant::ConstantKind;
use super::writer::AbcWrite;

// =============================================================================
// Multinames
// =============================================================================

/// A multiname constant. Name index 0 is the any-name `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Multiname {
    /// Name in exactly one namespace.
    QName { ns: u32, name: u32, attribute: bool },
    /// Name with the namespace supplied at runtime.
    RTQName { name: u32, attribute: bool },
    /// Name and namespace both supplied at runtime.
    RTQNameL { attribute: bool },
    /// Name looked up in a namespace set.
    Multiname { name: u32, ns_set: u32, attribute: bool },
    /// Name supplied at runtime, looked up in a namespace set.
    MultinameL { ns_set: u32, attribute: bool },
    /// Parameterized type application (`Vector.<T>`).
    TypeName { name: u32, params: Vec<u32> },
}

impl Multiname {
    /// The kind tag written first.
    pub fn kind(&self) -> ConstantKind {
        match *self {
            Multiname::QName { attribute, .. } => pick(attribute, ConstantKind::QNameA, ConstantKind::QName),
            Multiname::RTQName { attribute, .. } => pick(attribute, ConstantKind::RTQNameA, ConstantKind::RTQName),
            Multiname::RTQNameL { attribute } => pick(attribute, ConstantKind::RTQNameLA, ConstantKind::RTQNameL),
            Multiname::Multiname { attribute, .. } => {
                pick(attribute, ConstantKind::MultinameA, ConstantKind::Multiname)
            }
            Multiname::MultinameL { attribute, .. } => {
                pick(attribute, ConstantKind::MultinameLA, ConstantKind::MultinameL)
            }
            Multiname::TypeName { .. } => ConstantKind::TypeName,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6);
        out.write_u8(self.kind().into());
        match self {
            Multiname::QName { ns, name, .. } => {
                out.write_u30(*ns);
                out.write_u30(*name);
            }
            Multiname::RTQName { name, .. } => out.write_u30(*name),
            Multiname::RTQNameL { .. } => {}
            Multiname::Multiname { name, ns_set, .. } => {
                out.write_u30(*name);
                out.write_u30(*ns_set);
            }
            Multiname::MultinameL { ns_set, .. } => out.write_u30(*ns_set),
            Multiname::TypeName { name, params } => {
                out.write_u30(*name);
                out.write_u30(params.len() as u32);
                for param in params {
                    out.write_u30(*param);
                }
            }
        }
        out
    }
}

fn pick(attribute: bool, yes: ConstantKind, no: ConstantKind) -> ConstantKind {
    if attribute { yes } else { no }
}

// =============================================================================
// Traits
// =============================================================================

/// Trait kinds, the low nibble of the kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum TraitKind {
    Slot = 0,
    Method = 1,
    Getter = 2,
    Setter = 3,
    Class = 4,
    Function = 5,
    Const = 6,
}

bitflags! {
    /// Trait attributes, the high nibble of the kind byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraitAttributes: u8 {
        const FINAL = 0x1;
        const OVERRIDE = 0x2;
        const METADATA = 0x4;
    }
}

/// Default value of a slot or optional parameter: pool index plus kind.
///
/// Booleans and null carry a fixed kind with an ignored index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValueRef {
    pub index: u32,
    /// `None` for the absent value.
    pub kind: Option<ConstantKind>,
}

impl ValueRef {
    pub fn new(index: u32, kind: ConstantKind) -> Self {
        Self {
            index,
            kind: Some(kind),
        }
    }

    /// Append `index` and, when the index is nonzero, the kind byte.
    fn write_slot_value(&self, out: &mut Vec<u8>) {
        out.write_u30(self.index);
        if self.index != 0 {
            out.write_u8(self.kind.map_or(0, u8::from));
        }
    }
}

/// Kind-specific payload of a trait.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TraitData {
    Slot { slot_id: u32, type_name: u32, value: ValueRef },
    Const { slot_id: u32, type_name: u32, value: ValueRef },
    Method { disp_id: u32, method: u32 },
    Getter { disp_id: u32, method: u32 },
    Setter { disp_id: u32, method: u32 },
    Class { slot_id: u32, class: u32 },
    Function { slot_id: u32, function: u32 },
}

impl TraitData {
    pub fn kind(&self) -> TraitKind {
        match self {
            TraitData::Slot { .. } => TraitKind::Slot,
            TraitData::Const { .. } => TraitKind::Const,
            TraitData::Method { .. } => TraitKind::Method,
            TraitData::Getter { .. } => TraitKind::Getter,
            TraitData::Setter { .. } => TraitKind::Setter,
            TraitData::Class { .. } => TraitKind::Class,
            TraitData::Function { .. } => TraitKind::Function,
        }
    }
}

/// A trait record attached to an instance, class, script or body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraitInfo {
    /// Multiname index of the member name.
    pub name: u32,
    pub data: TraitData,
    pub attributes: TraitAttributes,
    /// Metadata table indices.
    pub metadata: Vec<u32>,
}

impl TraitInfo {
    pub fn new(name: u32, data: TraitData) -> Self {
        Self {
            name,
            data,
            attributes: TraitAttributes::empty(),
            metadata: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: TraitAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    pub fn with_metadata(mut self, metadata: Vec<u32>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut attributes = self.attributes;
        attributes.set(TraitAttributes::METADATA, !self.metadata.is_empty());

        out.write_u30(self.name);
        out.write_u8(u8::from(self.data.kind()) | attributes.bits() << 4);
        match &self.data {
            TraitData::Slot {
                slot_id,
                type_name,
                value,
            }
            | TraitData::Const {
                slot_id,
                type_name,
                value,
            } => {
                out.write_u30(*slot_id);
                out.write_u30(*type_name);
                value.write_slot_value(out);
            }
            TraitData::Method { disp_id, method }
            | TraitData::Getter { disp_id, method }
            | TraitData::Setter { disp_id, method } => {
                out.write_u30(*disp_id);
                out.write_u30(*method);
            }
            TraitData::Class { slot_id, class } => {
                out.write_u30(*slot_id);
                out.write_u30(*class);
            }
            TraitData::Function { slot_id, function } => {
                out.write_u30(*slot_id);
                out.write_u30(*function);
            }
        }
        if !self.metadata.is_empty() {
            out.write_u30(self.metadata.len() as u32);
            for &index in &self.metadata {
                out.write_u30(index);
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

fn write_traits(out: &mut Vec<u8>, traits: &[TraitInfo]) {
    out.write_u30(traits.len() as u32);
    for t in traits {
        t.write_to(out);
    }
}

// =============================================================================
// Methods
// =============================================================================

bitflags! {
    /// Method signature flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        const NEED_ARGUMENTS = 0x01;
        const NEED_ACTIVATION = 0x02;
        const NEED_REST = 0x04;
        const HAS_OPTIONAL = 0x08;
        const IGNORE_REST = 0x10;
        const NATIVE = 0x20;
        const SETS_DXNS = 0x40;
        const HAS_PARAM_NAMES = 0x80;
    }
}

/// A method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MethodInfo {
    /// Multiname index of the return type, 0 for `*`.
    pub return_type: u32,
    /// Multiname index of each parameter type.
    pub param_types: Vec<u32>,
    /// String index of the debug name.
    pub name: u32,
    pub flags: MethodFlags,
    /// Defaults for the trailing optional parameters.
    pub optional: Vec<ValueRef>,
    /// String index of each parameter name.
    pub param_names: Vec<u32>,
}

impl MethodInfo {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut flags = self.flags;
        flags.set(MethodFlags::HAS_OPTIONAL, !self.optional.is_empty());
        flags.set(MethodFlags::HAS_PARAM_NAMES, !self.param_names.is_empty());

        out.write_u30(self.param_types.len() as u32);
        out.write_u30(self.return_type);
        for &param in &self.param_types {
            out.write_u30(param);
        }
        out.write_u30(self.name);
        out.write_u8(flags.bits());
        if !self.optional.is_empty() {
            out.write_u30(self.optional.len() as u32);
            for value in &self.optional {
                out.write_u30(value.index);
                out.write_u8(value.kind.map_or(0, u8::from));
            }
        }
        for &name in &self.param_names {
            out.write_u30(name);
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

/// One exception handler of a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionInfo {
    pub from: u32,
    pub to: u32,
    pub target: u32,
    /// Multiname index of the caught type, 0 for `*`.
    pub exc_type: u32,
    /// Multiname index of the catch variable, 0 for none.
    pub var_name: u32,
}

impl ExceptionInfo {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.write_u30(self.from);
        out.write_u30(self.to);
        out.write_u30(self.target);
        out.write_u30(self.exc_type);
        out.write_u30(self.var_name);
    }
}

/// The code and frame limits of one method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MethodBody {
    pub method: u32,
    pub max_stack: u32,
    pub local_count: u32,
    pub init_scope_depth: u32,
    pub max_scope_depth: u32,
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionInfo>,
    /// Activation traits.
    pub traits: Vec<TraitInfo>,
}

impl MethodBody {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.write_u30(self.method);
        out.write_u30(self.max_stack);
        out.write_u30(self.local_count);
        out.write_u30(self.init_scope_depth);
        out.write_u30(self.max_scope_depth);
        out.write_u30(self.code.len() as u32);
        out.extend_from_slice(&self.code);
        out.write_u30(self.exceptions.len() as u32);
        for exception in &self.exceptions {
            exception.write_to(out);
        }
        write_traits(out, &self.traits);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.code.len() + 16);
        self.write_to(&mut out);
        out
    }
}

// =============================================================================
// Classes, scripts and metadata
// =============================================================================

bitflags! {
    /// Instance flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u8 {
        const SEALED = 0x01;
        const FINAL = 0x02;
        const INTERFACE = 0x04;
        const PROTECTED_NS = 0x08;
        const NON_NULLABLE = 0x10;
    }
}

/// The instance half of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InstanceInfo {
    pub name: u32,
    pub super_name: u32,
    pub flags: ClassFlags,
    /// Namespace index of the protected namespace, 0 when absent.
    pub protected_ns: u32,
    pub interfaces: Vec<u32>,
    /// Method index of the instance initializer.
    pub iinit: u32,
    pub traits: Vec<TraitInfo>,
}

impl InstanceInfo {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut flags = self.flags;
        flags.set(ClassFlags::PROTECTED_NS, self.protected_ns != 0);

        out.write_u30(self.name);
        out.write_u30(self.super_name);
        out.write_u8(flags.bits());
        if self.protected_ns != 0 {
            out.write_u30(self.protected_ns);
        }
        out.write_u30(self.interfaces.len() as u32);
        for &interface in &self.interfaces {
            out.write_u30(interface);
        }
        out.write_u30(self.iinit);
        write_traits(out, &self.traits);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

/// The static half of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClassInfo {
    pub cinit: u32,
    pub traits: Vec<TraitInfo>,
}

impl ClassInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u30(self.cinit);
        write_traits(&mut out, &self.traits);
        out
    }
}

/// A script: its initializer and top-level definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScriptInfo {
    pub init: u32,
    pub traits: Vec<TraitInfo>,
}

impl ScriptInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u30(self.init);
        write_traits(&mut out, &self.traits);
        out
    }
}

/// A metadata annotation: name plus parallel key/value string indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MetadataInfo {
    pub name: u32,
    /// Key string indices, 0 for keyless values.
    pub keys: Vec<u32>,
    pub values: Vec<u32>,
}

impl MetadataInfo {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u30(self.name);
        out.write_u30(self.values.len() as u32);
        for &key in &self.keys {
            out.write_u30(key);
        }
        for &value in &self.values {
            out.write_u30(value);
        }
        out
    }
}
