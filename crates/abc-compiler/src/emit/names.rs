//! Namespaces, multinames and the name-based property helpers.
//!
//! Namespaces are interned through a cache keyed by the resolved
//! [`Namespace`]. With API versioning on, a package namespace can also be
//! added once per API version; each version gets its own URI, marked with
//! a private-use character, and so its own pool entry.

use std::collections::BTreeSet;

use abc_core::{EmitError, Namespace, NamespaceKind, QName, TypeName};
use bitflags::bitflags;

use super::{AbcEmitter, LastInstruction};
use crate::bytecode::{ConstantKind, Multiname, OpCode, Operand};

/// First private-use code point. Version `v` is marked by `U+E000 + v`.
const VERSION_MARK_BASE: u32 = 0xE000;

bitflags! {
    /// How a property reference is resolved and accessed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u8 {
        /// The name is qualified; a single namespace makes a QName.
        const QUALIFIED = 0x01;
        /// XML attribute (`@name`).
        const ATTRIBUTE = 0x02;
        /// Access through `super`.
        const SUPER = 0x04;
        /// `findpropstrict` instead of `findproperty`.
        const STRICT = 0x08;
        /// `callproplex`: call with a null receiver.
        const LEX = 0x10;
        /// Initialize a constant with `initproperty`.
        const INIT = 0x20;
    }
}

/// The name part of a property access.
///
/// Runtime parts are popped from the operand stack: the name on top, the
/// namespace below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyName<'a> {
    /// Name known at compile time, looked up in `namespaces`.
    Static {
        name: &'a str,
        namespaces: &'a [Namespace],
    },
    /// Name known, namespace on the stack.
    RuntimeNamespace(&'a str),
    /// Name on the stack, looked up in the given namespaces.
    RuntimeName(&'a [Namespace]),
    /// Name and namespace both on the stack.
    Runtime,
}

impl<'a> PropertyName<'a> {
    pub fn new(name: &'a str, namespaces: &'a [Namespace]) -> Self {
        PropertyName::Static { name, namespaces }
    }

    /// Number of operands the name takes from the stack.
    pub fn runtime_operands(&self) -> i32 {
        match self {
            PropertyName::Static { .. } => 0,
            PropertyName::RuntimeNamespace(_) | PropertyName::RuntimeName(_) => 1,
            PropertyName::Runtime => 2,
        }
    }
}

fn namespace_kind(kind: NamespaceKind) -> ConstantKind {
    match kind {
        NamespaceKind::Package => ConstantKind::PackageNamespace,
        NamespaceKind::PackageInternal => ConstantKind::PackageInternalNamespace,
        NamespaceKind::Private => ConstantKind::PrivateNamespace,
        NamespaceKind::Protected => ConstantKind::ProtectedNamespace,
        NamespaceKind::StaticProtected => ConstantKind::StaticProtectedNamespace,
        NamespaceKind::Any | NamespaceKind::Explicit | NamespaceKind::User => {
            ConstantKind::Namespace
        }
    }
}

impl AbcEmitter {
    // =========================================================================
    // Namespaces
    // =========================================================================

    /// Pool index of `namespace`. The any namespace is 0.
    pub fn add_namespace(&mut self, namespace: &Namespace) -> u32 {
        if namespace.is_any() {
            return 0;
        }
        if let Some(&index) = self.ns_cache.get(namespace) {
            return index;
        }
        let index = self.add_namespace_version(namespace, None);
        self.ns_cache.insert(namespace.clone(), index);
        index
    }

    /// Intern `namespace` with its URI marked for `version`.
    ///
    /// The mark only applies to versioned namespaces and only with API
    /// versioning on; otherwise this is the plain namespace.
    fn add_namespace_version(&mut self, namespace: &Namespace, version: Option<u32>) -> u32 {
        if namespace.is_any() {
            return 0;
        }
        let mark = version
            .filter(|_| self.config.api_versioning && namespace.is_versioned())
            .and_then(|v| char::from_u32(VERSION_MARK_BASE + v));
        let uri = match mark {
            Some(mark) => {
                let mut uri = String::with_capacity(namespace.uri.len() + 3);
                uri.push_str(&namespace.uri);
                uri.push(mark);
                self.module.pools.add_utf8(&uri)
            }
            None => self.module.pools.add_utf8(&namespace.uri),
        };
        self.module
            .pools
            .add_namespace(namespace_kind(namespace.kind), uri)
    }

    /// Intern the set of `namespaces`. Order and duplicates do not matter.
    pub fn make_namespace_set(&mut self, namespaces: &[Namespace]) -> u32 {
        let set: BTreeSet<u32> = namespaces.iter().map(|ns| self.add_namespace(ns)).collect();
        self.module.pools.add_namespace_set(&set)
    }

    /// Intern the set of `namespace`'s aliases, one per API version.
    pub fn make_versioned_namespace_set(
        &mut self,
        namespace: &Namespace,
        versions: &BTreeSet<u32>,
    ) -> Result<u32, EmitError> {
        if versions.is_empty() {
            return Err(EmitError::EmptyVersionSet {
                uri: namespace.uri.clone(),
            });
        }
        let set: BTreeSet<u32> = versions
            .iter()
            .map(|&v| self.add_namespace_version(namespace, Some(v)))
            .collect();
        Ok(self.module.pools.add_namespace_set(&set))
    }

    // =========================================================================
    // Multinames
    // =========================================================================

    /// Utf8 index of a name, 0 for the any-name `*`.
    fn name_index(&mut self, name: &str) -> u32 {
        if name == "*" {
            0
        } else {
            self.module.pools.add_utf8(name)
        }
    }

    pub fn add_qname(&mut self, name: &QName, attribute: bool) -> u32 {
        let ns = self.add_namespace(&name.namespace);
        let name = self.name_index(&name.name);
        self.module
            .pools
            .add_multiname(&Multiname::QName { ns, name, attribute })
    }

    /// A multiname looking `name` up in `namespaces`.
    pub fn make_multiname(&mut self, name: &str, namespaces: &[Namespace]) -> u32 {
        let name = self.name_index(name);
        let ns_set = self.make_namespace_set(namespaces);
        self.module.pools.add_multiname(&Multiname::Multiname {
            name,
            ns_set,
            attribute: false,
        })
    }

    /// Multiname index for a type reference. No type, or `*`, is 0.
    ///
    /// Parameterized types become a type-name multiname over the base
    /// QName and each parameter's index.
    pub fn add_class_name(&mut self, type_name: Option<&TypeName>) -> u32 {
        let Some(type_name) = type_name else {
            return 0;
        };
        if type_name.to_string() == "*" {
            return 0;
        }
        let base = self.add_qname(&type_name.name, false);
        if !type_name.is_parameterized() {
            return base;
        }
        let params = type_name
            .params
            .iter()
            .map(|param| self.add_class_name(Some(param)))
            .collect();
        self.module
            .pools
            .add_multiname(&Multiname::TypeName { name: base, params })
    }

    /// Pick and intern the multiname form for a property reference.
    fn property_multiname(&mut self, name: &PropertyName<'_>, flags: PropertyFlags) -> u32 {
        let attribute = flags.contains(PropertyFlags::ATTRIBUTE);
        let multiname = match *name {
            PropertyName::Static { name, namespaces } => {
                let name = self.name_index(name);
                match namespaces {
                    [ns] if flags.contains(PropertyFlags::QUALIFIED) => Multiname::QName {
                        ns: self.add_namespace(ns),
                        name,
                        attribute,
                    },
                    _ => Multiname::Multiname {
                        name,
                        ns_set: self.make_namespace_set(namespaces),
                        attribute,
                    },
                }
            }
            PropertyName::RuntimeNamespace(name) => Multiname::RTQName {
                name: self.name_index(name),
                attribute,
            },
            PropertyName::RuntimeName(namespaces) => Multiname::MultinameL {
                ns_set: self.make_namespace_set(namespaces),
                attribute,
            },
            PropertyName::Runtime => Multiname::RTQNameL { attribute },
        };
        self.module.pools.add_multiname(&multiname)
    }

    fn property_op(&mut self, opcode: OpCode, multiname: u32, stack: i32) {
        self.prepare(LastInstruction::Other);
        self.instr(opcode, &[Operand::U30(multiname)], stack);
    }

    // =========================================================================
    // Property access
    // =========================================================================

    /// Replace the object on the stack with its property `name`.
    pub fn get_property(&mut self, name: PropertyName<'_>, flags: PropertyFlags) {
        let index = self.property_multiname(&name, flags);
        let opcode = if flags.contains(PropertyFlags::SUPER) {
            OpCode::GetSuper
        } else {
            OpCode::GetProperty
        };
        self.property_op(opcode, index, -name.runtime_operands());
    }

    /// Store the value on top into property `name` of the object below.
    pub fn set_property(&mut self, name: PropertyName<'_>, flags: PropertyFlags) {
        let index = self.property_multiname(&name, flags);
        let opcode = if flags.contains(PropertyFlags::SUPER) {
            OpCode::SetSuper
        } else if flags.contains(PropertyFlags::INIT) {
            OpCode::InitProperty
        } else {
            OpCode::SetProperty
        };
        self.property_op(opcode, index, -2 - name.runtime_operands());
    }

    /// Replace the object on the stack with the result of deleting `name`.
    pub fn delete_property(&mut self, name: PropertyName<'_>, flags: PropertyFlags) {
        if flags.contains(PropertyFlags::SUPER) {
            self.poison(EmitError::Unimplemented {
                construct: "delete through super",
            });
            return;
        }
        let index = self.property_multiname(&name, flags);
        self.property_op(OpCode::DeleteProperty, index, -name.runtime_operands());
    }

    /// XML descendants (`x..name`).
    pub fn get_descendants(&mut self, name: PropertyName<'_>, flags: PropertyFlags) {
        if flags.contains(PropertyFlags::SUPER) {
            self.poison(EmitError::Unimplemented {
                construct: "descendants through super",
            });
            return;
        }
        let index = self.property_multiname(&name, flags);
        self.property_op(OpCode::GetDescendants, index, -name.runtime_operands());
    }

    /// Push the scope object that holds `name`.
    pub fn find_property(&mut self, name: PropertyName<'_>, flags: PropertyFlags) {
        let index = self.property_multiname(&name, flags);
        let opcode = if flags.contains(PropertyFlags::STRICT) {
            OpCode::FindPropStrict
        } else {
            OpCode::FindProperty
        };
        self.property_op(opcode, index, 1 - name.runtime_operands());
    }

    /// Call property `name` of the object below `argc` arguments.
    pub fn call_property(&mut self, name: PropertyName<'_>, argc: u32, flags: PropertyFlags) {
        let opcode = if flags.contains(PropertyFlags::SUPER) {
            OpCode::CallSuper
        } else if flags.contains(PropertyFlags::LEX) {
            OpCode::CallPropLex
        } else {
            OpCode::CallProperty
        };
        self.call_named(opcode, name, argc, flags);
    }

    /// `new obj.name(args)`.
    pub fn construct_property(&mut self, name: PropertyName<'_>, argc: u32, flags: PropertyFlags) {
        let opcode = if flags.contains(PropertyFlags::SUPER) {
            OpCode::CallSuper
        } else {
            OpCode::ConstructProp
        };
        self.call_named(opcode, name, argc, flags);
    }

    fn call_named(&mut self, opcode: OpCode, name: PropertyName<'_>, argc: u32, flags: PropertyFlags) {
        let index = self.property_multiname(&name, flags);
        self.prepare(LastInstruction::Other);
        self.instr(
            opcode,
            &[Operand::U30(index), Operand::U30(argc)],
            -(argc as i32) - name.runtime_operands(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_opcodes, disassemble};
    use crate::emit::FrameLayout;
    use abc_core::EmitterConfig;

    fn emitter(config: EmitterConfig) -> AbcEmitter {
        let mut e = AbcEmitter::new(config);
        e.start_method("test", FrameLayout::default()).unwrap();
        e
    }

    fn last_operand(e: &AbcEmitter) -> u32 {
        let ins = disassemble(e.code());
        match ins.last().and_then(|i| i.operands.first()) {
            Some(Operand::U30(v)) => *v,
            other => panic!("expected u30 operand, got {other:?}"),
        }
    }

    #[test]
    fn any_namespace_is_zero() {
        let mut e = emitter(EmitterConfig::new());
        assert_eq!(e.add_namespace(&Namespace::any()), 0);
        assert_eq!(e.module.pools.namespaces.len(), 0);
    }

    #[test]
    fn namespaces_are_cached_by_kind_and_uri() {
        let mut e = emitter(EmitterConfig::new());
        let a = e.add_namespace(&Namespace::package("flash.display"));
        let b = e.add_namespace(&Namespace::package("flash.display"));
        let c = e.add_namespace(&Namespace::private("flash.display"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        // both share one uri string
        assert_eq!(e.module.pools.utf8.len(), 1);

        let kind = e.module.pools.namespaces.get(c).unwrap()[0];
        assert_eq!(kind, u8::from(ConstantKind::PrivateNamespace));
    }

    #[test]
    fn namespace_sets_ignore_order() {
        let mut e = emitter(EmitterConfig::new());
        let a = Namespace::public();
        let b = Namespace::internal("pkg");
        let first = e.make_namespace_set(&[a.clone(), b.clone()]);
        let second = e.make_namespace_set(&[b, a.clone(), a]);
        assert_eq!(first, second);
    }

    #[test]
    fn versioned_set_marks_uris() {
        let mut e = emitter(EmitterConfig::new().with_api_versioning(true));
        let ns = Namespace::package("flash.display");
        let versions = BTreeSet::from([660, 661]);
        let set = e.make_versioned_namespace_set(&ns, &versions).unwrap();
        assert!(set > 0);
        assert_eq!(e.module.pools.namespaces.len(), 2);

        let marked = format!("flash.display{}", char::from_u32(0xE000 + 660).unwrap());
        let uri = e.module.pools.add_utf8(&marked);
        assert_eq!(e.module.pools.utf8.len(), 2, "marked uri already interned");
        assert!(uri > 0);
    }

    #[test]
    fn private_namespaces_are_never_marked() {
        let mut e = emitter(EmitterConfig::new().with_api_versioning(true));
        let ns = Namespace::private("Foo");
        e.make_versioned_namespace_set(&ns, &BTreeSet::from([660, 661]))
            .unwrap();
        assert_eq!(e.module.pools.namespaces.len(), 1);
    }

    #[test]
    fn versioning_off_collapses_aliases() {
        let mut e = emitter(EmitterConfig::new());
        let ns = Namespace::package("flash.display");
        e.make_versioned_namespace_set(&ns, &BTreeSet::from([660, 661]))
            .unwrap();
        assert_eq!(e.module.pools.namespaces.len(), 1);
    }

    #[test]
    fn empty_version_set_fails() {
        let mut e = emitter(EmitterConfig::new().with_api_versioning(true));
        let err = e
            .make_versioned_namespace_set(&Namespace::public(), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, EmitError::EmptyVersionSet { .. }));
    }

    #[test]
    fn class_names() {
        let mut e = emitter(EmitterConfig::new());
        assert_eq!(e.add_class_name(None), 0);
        assert_eq!(e.add_class_name(Some(&TypeName::any())), 0);

        let int = e.add_class_name(Some(&TypeName::public("int")));
        let vector = TypeName::new(QName::new(Namespace::package("__AS3__.vec"), "Vector"))
            .with_params(vec![TypeName::public("int")]);
        let applied = e.add_class_name(Some(&vector));
        let base = e.add_qname(&vector.name, false);

        let expected = Multiname::TypeName {
            name: base,
            params: vec![int],
        };
        assert_eq!(e.module.pools.multinames.get(applied), Some(expected.encode().as_slice()));
    }

    #[test]
    fn single_qualified_namespace_makes_qname() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        e.load_this();
        e.get_property(PropertyName::new("x", &public), PropertyFlags::QUALIFIED);
        assert_eq!(e.stack_depth(), 1);

        let index = last_operand(&e);
        let ns = e.add_namespace(&Namespace::public());
        let name = e.module.pools.add_utf8("x");
        let expected = Multiname::QName {
            ns,
            name,
            attribute: false,
        };
        assert_eq!(e.module.pools.multinames.get(index), Some(expected.encode().as_slice()));
    }

    #[test]
    fn open_namespaces_make_multiname() {
        let mut e = emitter(EmitterConfig::new());
        let open = [Namespace::public(), Namespace::internal("pkg")];
        e.load_this();
        e.get_property(PropertyName::new("x", &open), PropertyFlags::QUALIFIED);
        let index = last_operand(&e);
        assert_eq!(
            e.module.pools.multinames.get(index).unwrap()[0],
            u8::from(ConstantKind::Multiname)
        );
    }

    #[test]
    fn any_name_uses_index_zero() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        e.load_this();
        e.get_property(PropertyName::new("*", &public), PropertyFlags::QUALIFIED);
        let index = last_operand(&e);
        let ns = e.add_namespace(&Namespace::public());
        let expected = Multiname::QName {
            ns,
            name: 0,
            attribute: false,
        };
        assert_eq!(e.module.pools.multinames.get(index), Some(expected.encode().as_slice()));
    }

    #[test]
    fn runtime_operands_adjust_stack() {
        let mut e = emitter(EmitterConfig::new());
        let open = [Namespace::public()];
        e.load_this();
        e.push_string("name");
        e.push_null();
        // base, namespace, name, value
        e.set_property(PropertyName::Runtime, PropertyFlags::empty());
        assert_eq!(e.stack_depth(), 0);

        e.load_this();
        e.push_string("name");
        e.get_property(PropertyName::RuntimeName(&open), PropertyFlags::empty());
        assert_eq!(e.stack_depth(), 1);

        e.push_null();
        e.push_string("ns");
        e.get_property(PropertyName::RuntimeNamespace("x"), PropertyFlags::empty());
        assert_eq!(e.stack_depth(), 2);
        assert!(e.error().is_none());
    }

    #[test]
    fn set_property_variants() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        for flags in [PropertyFlags::empty(), PropertyFlags::INIT, PropertyFlags::SUPER] {
            e.load_this();
            e.push_true();
            e.set_property(PropertyName::new("x", &public), flags);
        }
        assert_eq!(e.stack_depth(), 0);
        let ops: Vec<OpCode> = disassemble(e.code())
            .iter()
            .map(|i| i.opcode)
            .filter(|op| matches!(op, OpCode::SetProperty | OpCode::InitProperty | OpCode::SetSuper))
            .collect();
        assert_eq!(ops, [OpCode::SetProperty, OpCode::InitProperty, OpCode::SetSuper]);
    }

    #[test]
    fn find_and_call() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        let trace = PropertyName::new("trace", &public);
        e.find_property(trace, PropertyFlags::STRICT | PropertyFlags::QUALIFIED);
        e.push_string("hello");
        e.call_property(trace, 1, PropertyFlags::QUALIFIED | PropertyFlags::LEX);
        e.pop();
        assert_opcodes(
            e.code(),
            &[
                OpCode::FindPropStrict,
                OpCode::PushString,
                OpCode::CallPropLex,
                OpCode::Pop,
            ],
        );
        assert_eq!(e.stack_depth(), 0);
        assert_eq!(e.max_stack_depth(), 2);
    }

    #[test]
    fn construct_property_pops_arguments() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        e.find_property(PropertyName::new("Foo", &public), PropertyFlags::QUALIFIED);
        e.push_byte(1);
        e.push_byte(2);
        e.construct_property(PropertyName::new("Foo", &public), 2, PropertyFlags::QUALIFIED);
        assert_eq!(e.stack_depth(), 1);
    }

    #[test]
    fn delete_through_super_poisons() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        e.load_this();
        e.delete_property(PropertyName::new("x", &public), PropertyFlags::SUPER);
        assert!(matches!(e.error(), Some(EmitError::Unimplemented { .. })));
    }

    #[test]
    fn descendants_keep_depth() {
        let mut e = emitter(EmitterConfig::new());
        let public = [Namespace::public()];
        e.load_this();
        e.get_descendants(PropertyName::new("item", &public), PropertyFlags::empty());
        assert_eq!(e.stack_depth(), 1);
        assert_eq!(opcodes_of(&e).last(), Some(&OpCode::GetDescendants));
    }

    fn opcodes_of(e: &AbcEmitter) -> Vec<OpCode> {
        disassemble(e.code()).iter().map(|i| i.opcode).collect()
    }
}
