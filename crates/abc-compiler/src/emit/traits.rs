//! Member declarations, traits, classes and scripts.
//!
//! The code generator describes each scope's members with [`MemberDecl`]s
//! once their slots and dispatch ids are known. This module turns them
//! into trait records and writes the class, instance and script records
//! that own them.

use std::collections::BTreeSet;

use abc_core::{DefaultValue, EmitError, MetadataEntry, Namespace, QName, TypeName};
use tracing::debug;

use super::AbcEmitter;
use crate::bytecode::{
    ClassFlags, ClassInfo, ConstantKind, InstanceInfo, MetadataInfo, MethodFlags, Multiname,
    ScriptInfo, TraitAttributes, TraitData, TraitInfo, ValueRef, add_to_table,
};

// =============================================================================
// Declarations
// =============================================================================

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub type_name: TypeName,
    /// Default value for an optional parameter.
    pub default: Option<DefaultValue>,
}

impl Param {
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            default: None,
        }
    }

    pub fn optional(type_name: TypeName, default: DefaultValue) -> Self {
        Self {
            type_name,
            default: Some(default),
        }
    }
}

/// Everything about a method that is only written when it finishes.
#[derive(Debug, Clone, Default)]
pub struct MethodSignature {
    /// `None` for the any type.
    pub return_type: Option<TypeName>,
    pub params: Vec<Param>,
    /// Parameter names, written only with code hints enabled.
    pub param_names: Vec<String>,
    /// `NEED_ARGUMENTS`, `NEED_REST` and `IGNORE_REST`; other bits are
    /// derived.
    pub arguments: MethodFlags,
    /// Members of the method's activation object, if it needs one.
    pub activation: Option<TraitOwner>,
    /// Scope depth at method entry.
    pub scope_depth: u32,
    /// Source-level name, used for code hints and native constants.
    pub debug_name: String,
    /// Implemented natively: no body is written.
    pub native: bool,
    /// Declared on an interface: no body is written.
    pub interface: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// What a slot holds when the scope is initialized.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// Default-initialized.
    None,
    /// A constant initial value.
    Value(DefaultValue),
    /// A class definition; becomes a class trait.
    Class(QName),
    /// A function definition, by method internal name; becomes a function
    /// trait.
    Function(String),
}

/// A variable or constant member.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDecl {
    pub name: String,
    pub namespace: Namespace,
    pub type_name: Option<TypeName>,
    pub constant: bool,
    /// 1-based slot index, written only when the owner can early-bind.
    pub slot_id: u32,
    pub value: SlotValue,
    pub metadata: Vec<MetadataEntry>,
}

impl SlotDecl {
    pub fn var(name: impl Into<String>, namespace: Namespace, type_name: Option<TypeName>) -> Self {
        Self {
            name: name.into(),
            namespace,
            type_name,
            constant: false,
            slot_id: 0,
            value: SlotValue::None,
            metadata: Vec::new(),
        }
    }

    pub fn constant(
        name: impl Into<String>,
        namespace: Namespace,
        type_name: Option<TypeName>,
        value: DefaultValue,
    ) -> Self {
        Self {
            constant: true,
            value: SlotValue::Value(value),
            ..Self::var(name, namespace, type_name)
        }
    }

    pub fn with_slot_id(mut self, slot_id: u32) -> Self {
        self.slot_id = slot_id;
        self
    }

    pub fn with_metadata(mut self, entry: MetadataEntry) -> Self {
        self.metadata.push(entry);
        self
    }
}

/// A method, getter or setter member.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub namespace: Namespace,
    pub kind: MethodKind,
    /// Internal name of the implementing method. Empty for accessors that
    /// are not traits.
    pub method: String,
    /// Dispatch id, written only when the owner can early-bind.
    pub disp_id: u32,
    pub is_final: bool,
    pub is_override: bool,
    /// The name is qualified by an interface's namespace.
    pub via_interface: bool,
    pub metadata: Vec<MetadataEntry>,
}

impl MethodDecl {
    pub fn new(
        name: impl Into<String>,
        namespace: Namespace,
        kind: MethodKind,
        method: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace,
            kind,
            method: method.into(),
            disp_id: 0,
            is_final: false,
            is_override: false,
            via_interface: false,
            metadata: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    Slot(SlotDecl),
    Method(MethodDecl),
}

/// A scope whose members become traits: a class, an instance, a script or
/// an activation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraitOwner {
    pub members: Vec<MemberDecl>,
    /// Slot and dispatch ids are fixed at compile time.
    pub early_bind: bool,
    pub is_interface: bool,
}

impl TraitOwner {
    pub fn new(members: Vec<MemberDecl>) -> Self {
        Self {
            members,
            ..Self::default()
        }
    }
}

/// An implemented interface, resolved against the namespaces open at the
/// `implements` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRef {
    pub name: String,
    pub namespaces: Vec<Namespace>,
}

/// A class or interface definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: QName,
    pub base: Option<QName>,
    pub dynamic: bool,
    pub is_final: bool,
    pub is_interface: bool,
    pub nullable: bool,
    pub protected_namespace: Option<Namespace>,
    pub interfaces: Vec<InterfaceRef>,
    /// Internal name of the instance initializer.
    pub constructor: String,
    pub instance: TraitOwner,
    pub statics: TraitOwner,
}

impl ClassDecl {
    pub fn new(name: QName) -> Self {
        let constructor = format!("{name}$iinit");
        Self {
            name,
            base: None,
            dynamic: false,
            is_final: false,
            is_interface: false,
            nullable: true,
            protected_namespace: None,
            interfaces: Vec::new(),
            constructor,
            instance: TraitOwner::default(),
            statics: TraitOwner::default(),
        }
    }
}

// =============================================================================
// API versions
// =============================================================================

/// Version numbers for the release names used in `Version` metadata.
fn release_version(name: &str) -> Option<u32> {
    Some(match name {
        "9" => 660,
        "air1" => 661,
        "10" => 662,
        "air1.5" => 663,
        "air1.5.1" => 664,
        "10.0.32" => 665,
        "air1.5.2" => 666,
        "10.1" => 667,
        "airAthena" | "air2.0" | "100" => 668,
        _ => return None,
    })
}

/// The API versions a member belongs to.
///
/// `API` metadata lists version numbers, `Version` metadata lists release
/// names. A member with neither is in version 0, which the VM reads as the
/// oldest available version.
pub fn api_versions_of(metadata: &[MetadataEntry]) -> Result<BTreeSet<u32>, EmitError> {
    let mut versions = BTreeSet::new();
    for entry in metadata {
        let parse: fn(&str) -> Option<u32> = match entry.id.as_str() {
            "API" => |v| v.trim().parse().ok(),
            "Version" => release_version,
            _ => continue,
        };
        for value in &entry.values {
            let version = parse(&value.value).ok_or_else(|| EmitError::BadApiVersion {
                id: entry.id.clone(),
                value: value.value.clone(),
            })?;
            versions.insert(version);
        }
    }
    if versions.is_empty() {
        versions.insert(0);
    }
    Ok(versions)
}

// =============================================================================
// Trait building
// =============================================================================

impl AbcEmitter {
    /// Pool reference for a default value.
    ///
    /// Booleans and null are encoded in the kind byte alone. Undefined has
    /// no reference. Decimals need decimal numerics; without them the value
    /// is dropped.
    pub fn value_ref(&mut self, value: &DefaultValue) -> ValueRef {
        let fixed = |kind: ConstantKind| ValueRef::new(u32::from(u8::from(kind)), kind);
        let pools = &mut self.module.pools;
        match value {
            DefaultValue::Undefined => ValueRef::default(),
            DefaultValue::Null => fixed(ConstantKind::Null),
            DefaultValue::Bool(true) => fixed(ConstantKind::True),
            DefaultValue::Bool(false) => fixed(ConstantKind::False),
            DefaultValue::Int(v) => ValueRef::new(pools.add_int(*v), ConstantKind::Int),
            DefaultValue::Uint(v) => ValueRef::new(pools.add_uint(*v), ConstantKind::Uint),
            DefaultValue::Double(v) => ValueRef::new(pools.add_double(*v), ConstantKind::Double),
            DefaultValue::Decimal(v) if self.config.es4_numerics => {
                ValueRef::new(pools.add_decimal(v), ConstantKind::Decimal)
            }
            DefaultValue::Decimal(_) => ValueRef::default(),
            DefaultValue::String(s) => ValueRef::new(pools.add_utf8(s), ConstantKind::Utf8),
            DefaultValue::Namespace(ns) => {
                let index = self.add_namespace(ns);
                ValueRef::new(index, ConstantKind::Namespace)
            }
        }
    }

    /// Metadata table index for an annotation. Identical annotations share
    /// one record.
    pub fn add_metadata(&mut self, entry: &MetadataEntry) -> Result<u32, EmitError> {
        let pools = &mut self.module.pools;
        let name = pools.add_utf8(&entry.id);
        let mut keys = Vec::with_capacity(entry.values.len());
        let mut values = Vec::with_capacity(entry.values.len());
        for value in &entry.values {
            keys.push(value.key.as_deref().map_or(0, |k| pools.add_utf8(k)));
            values.push(pools.add_utf8(&value.value));
        }
        let index = self.module.metadata_info(&entry.content_key())?;
        self.module
            .set_metadata_once(index, &MetadataInfo { name, keys, values })?;
        Ok(index)
    }

    fn add_metadata_list(&mut self, metadata: &[MetadataEntry]) -> Result<Vec<u32>, EmitError> {
        metadata.iter().map(|entry| self.add_metadata(entry)).collect()
    }

    /// Multiname for a trait. Under API versioning the name is looked up in
    /// the set of the member's versioned namespace aliases.
    fn trait_name(
        &mut self,
        name: &str,
        namespace: &Namespace,
        metadata: &[MetadataEntry],
    ) -> Result<u32, EmitError> {
        let name = self.module.pools.add_utf8(name);
        let multiname = if self.config.api_versioning {
            let versions = api_versions_of(metadata)?;
            Multiname::Multiname {
                name,
                ns_set: self.make_versioned_namespace_set(namespace, &versions)?,
                attribute: false,
            }
        } else {
            Multiname::QName {
                ns: self.add_namespace(namespace),
                name,
                attribute: false,
            }
        };
        Ok(self.module.pools.add_multiname(&multiname))
    }

    fn slot_trait(&mut self, slot: &SlotDecl, early_bind: bool) -> Result<TraitInfo, EmitError> {
        let name = self.trait_name(&slot.name, &slot.namespace, &slot.metadata)?;
        let slot_id = if early_bind { slot.slot_id } else { 0 };
        let data = match &slot.value {
            SlotValue::Class(class) => TraitData::Class {
                slot_id,
                class: self.module.class_info(&class.to_string())?,
            },
            SlotValue::Function(method) => TraitData::Function {
                slot_id,
                function: self.module.method_info(method)?,
            },
            SlotValue::None | SlotValue::Value(_) => {
                let value = match &slot.value {
                    SlotValue::Value(value) => self.value_ref(value),
                    _ => ValueRef::default(),
                };
                let type_name = self.add_class_name(slot.type_name.as_ref());
                if slot.constant {
                    TraitData::Const {
                        slot_id,
                        type_name,
                        value,
                    }
                } else {
                    TraitData::Slot {
                        slot_id,
                        type_name,
                        value,
                    }
                }
            }
        };
        let metadata = self.add_metadata_list(&slot.metadata)?;
        Ok(TraitInfo::new(name, data).with_metadata(metadata))
    }

    fn method_trait(
        &mut self,
        method: &MethodDecl,
        owner: &TraitOwner,
    ) -> Result<Option<TraitInfo>, EmitError> {
        // Constructors are reached through the instance record, not a trait.
        if method.name == "$construct" || method.method.is_empty() {
            return Ok(None);
        }
        // A class gets interface-qualified aliases from the VM.
        if method.via_interface && !owner.is_interface {
            return Ok(None);
        }

        let name = self.trait_name(&method.name, &method.namespace, &method.metadata)?;
        let info = self.module.method_info(&method.method)?;
        let disp_id = if owner.early_bind { method.disp_id } else { 0 };
        let data = match method.kind {
            MethodKind::Method => TraitData::Method {
                disp_id,
                method: info,
            },
            MethodKind::Getter => TraitData::Getter {
                disp_id,
                method: info,
            },
            MethodKind::Setter => TraitData::Setter {
                disp_id,
                method: info,
            },
        };
        let mut attributes = TraitAttributes::empty();
        attributes.set(TraitAttributes::FINAL, method.is_final);
        attributes.set(TraitAttributes::OVERRIDE, method.is_override);
        let metadata = self.add_metadata_list(&method.metadata)?;
        Ok(Some(
            TraitInfo::new(name, data)
                .with_attributes(attributes)
                .with_metadata(metadata),
        ))
    }

    /// Trait records for every member of `owner`, duplicates removed.
    pub fn build_traits(&mut self, owner: &TraitOwner) -> Result<Vec<TraitInfo>, EmitError> {
        let mut traits = Vec::with_capacity(owner.members.len());
        for member in &owner.members {
            let built = match member {
                MemberDecl::Slot(slot) => Some(self.slot_trait(slot, owner.early_bind)?),
                MemberDecl::Method(method) => self.method_trait(method, owner)?,
            };
            if let Some(info) = built {
                add_to_table(&mut traits, info);
            }
        }
        Ok(traits)
    }

    // =========================================================================
    // Classes and scripts
    // =========================================================================

    /// Write the instance and class records of a class definition.
    ///
    /// Returns the class index. Interfaces carry no static traits and no
    /// protected namespace.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish_class(&mut self, class: &ClassDecl) -> Result<u32, EmitError> {
        self.check_poisoned()?;

        let (static_traits, protected_ns) = if class.is_interface {
            (Vec::new(), 0)
        } else {
            let traits = self.build_traits(&class.statics)?;
            let protected = class
                .protected_namespace
                .as_ref()
                .map_or(0, |ns| self.add_namespace(ns));
            (traits, protected)
        };
        let interfaces = class
            .interfaces
            .iter()
            .map(|iface| self.make_multiname(&iface.name, &iface.namespaces))
            .collect();
        let instance_traits = self.build_traits(&class.instance)?;

        let name = self.add_class_name(Some(&TypeName::new(class.name.clone())));
        let super_name = match &class.base {
            Some(base) => self.add_class_name(Some(&TypeName::new(base.clone()))),
            None => 0,
        };
        let iinit = self.module.method_info(&class.constructor)?;
        let full_name = class.name.to_string();
        let index = self.module.class_info(&full_name)?;

        let mut flags = ClassFlags::empty();
        flags.set(ClassFlags::SEALED, !class.dynamic);
        flags.set(ClassFlags::FINAL, class.is_final);
        flags.set(ClassFlags::INTERFACE, class.is_interface);
        flags.set(ClassFlags::NON_NULLABLE, !class.nullable);

        let instance = InstanceInfo {
            name,
            super_name,
            flags,
            protected_ns,
            interfaces,
            iinit,
            traits: instance_traits,
        };
        let cinit = self.module.method_info(&format!("{full_name}$cinit"))?;
        let statics = ClassInfo {
            cinit,
            traits: static_traits,
        };
        self.module.set_class(index, &instance, &statics)?;
        self.header.native_class(&full_name, index);

        debug!(class = %full_name, index, "finish class");
        self.trace
            .event(format_args!("// FinishClass {full_name} {index}"));
        Ok(index)
    }

    /// Write the script record for package `name` with initializer
    /// `init` and the package's top-level definitions as traits.
    pub fn finish_program(
        &mut self,
        name: &str,
        init: u32,
        definitions: &TraitOwner,
    ) -> Result<u32, EmitError> {
        self.check_poisoned()?;
        let traits = self.build_traits(definitions)?;
        let index = self.module.script_info(name)?;
        self.module.set_script(index, &ScriptInfo { init, traits })?;
        debug!(script = name, index, "finish program");
        Ok(index)
    }
}
