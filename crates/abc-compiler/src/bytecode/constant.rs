//! Constant pools for ABC modules.
//!
//! Every pool stores the canonical byte encoding of its entries and
//! interns them: byte-identical encodings share one index. Indices are
//! 1-based because index 0 means "absent" (or "any" for names and
//! namespaces) throughout the format.

use std::collections::BTreeSet;

use abc_core::Decimal128;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;

use super::records::Multiname;
use super::writer::AbcWrite;

/// Kind tags for constants, namespaces and multinames.
///
/// The same tags double as the value-kind byte of default values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConstantKind {
    Utf8 = 0x01,
    Decimal = 0x02,
    Int = 0x03,
    Uint = 0x04,
    PrivateNamespace = 0x05,
    Double = 0x06,
    QName = 0x07,
    Namespace = 0x08,
    Multiname = 0x09,
    False = 0x0A,
    True = 0x0B,
    Null = 0x0C,
    QNameA = 0x0D,
    MultinameA = 0x0E,
    RTQName = 0x0F,
    RTQNameA = 0x10,
    RTQNameL = 0x11,
    RTQNameLA = 0x12,
    NamespaceSet = 0x15,
    PackageNamespace = 0x16,
    PackageInternalNamespace = 0x17,
    ProtectedNamespace = 0x18,
    ExplicitNamespace = 0x19,
    StaticProtectedNamespace = 0x1A,
    MultinameL = 0x1B,
    MultinameLA = 0x1C,
    TypeName = 0x1D,
}

/// One interning pool of byte-encoded constants.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// Encoded entries in insertion order.
    entries: Vec<Vec<u8>>,
    /// Deduplication index: encoding to 1-based index.
    index: FxHashMap<Vec<u8>, u32>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or find an encoded constant, returning its 1-based index.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn add(&mut self, bytes: Vec<u8>) -> u32 {
        if let Some(&idx) = self.index.get(&bytes) {
            return idx;
        }

        let idx = self.entries.len() as u32 + 1;
        self.index.insert(bytes.clone(), idx);
        self.entries.push(bytes);
        idx
    }

    /// Look up an entry by its 1-based index.
    pub fn get(&self, index: u32) -> Option<&[u8]> {
        let slot = (index as usize).checked_sub(1)?;
        self.entries.get(slot).map(Vec::as_slice)
    }

    /// Encoded entries in index order.
    pub fn entries(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The count written in the module header: entries plus the implicit
    /// zeroth entry, or 0 for an empty pool.
    pub fn header_count(&self) -> u32 {
        if self.entries.is_empty() {
            0
        } else {
            self.entries.len() as u32 + 1
        }
    }

    /// Write the count and every entry.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.write_u30(self.header_count());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

/// The eight constant pools of one module.
#[derive(Debug, Clone, Default)]
pub struct ConstantPools {
    pub ints: ConstantPool,
    pub uints: ConstantPool,
    pub doubles: ConstantPool,
    pub decimals: ConstantPool,
    pub utf8: ConstantPool,
    pub namespaces: ConstantPool,
    pub namespace_sets: ConstantPool,
    pub multinames: ConstantPool,
}

impl ConstantPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int(&mut self, value: i32) -> u32 {
        let mut bytes = Vec::with_capacity(5);
        bytes.write_s32(value);
        self.ints.add(bytes)
    }

    pub fn add_uint(&mut self, value: u32) -> u32 {
        let mut bytes = Vec::with_capacity(5);
        bytes.write_u30(value);
        self.uints.add(bytes)
    }

    /// Doubles intern by bit pattern, so `0.0` and `-0.0` stay distinct.
    pub fn add_double(&mut self, value: f64) -> u32 {
        let mut bytes = Vec::with_capacity(8);
        bytes.write_d64(value);
        self.doubles.add(bytes)
    }

    pub fn add_decimal(&mut self, value: &Decimal128) -> u32 {
        let mut bytes = Vec::with_capacity(16);
        bytes.write_decimal(value);
        self.decimals.add(bytes)
    }

    pub fn add_utf8(&mut self, value: &str) -> u32 {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.write_u30(value.len() as u32);
        bytes.extend_from_slice(value.as_bytes());
        self.utf8.add(bytes)
    }

    /// Intern a namespace record of the given kind over a URI string index.
    pub fn add_namespace(&mut self, kind: ConstantKind, uri: u32) -> u32 {
        let mut bytes = Vec::with_capacity(4);
        bytes.write_u8(kind.into());
        bytes.write_u30(uri);
        self.namespaces.add(bytes)
    }

    /// Intern a namespace set. The set is already sorted and duplicate-free.
    pub fn add_namespace_set(&mut self, namespaces: &BTreeSet<u32>) -> u32 {
        let mut bytes = Vec::with_capacity(namespaces.len() + 1);
        bytes.write_u30(namespaces.len() as u32);
        for &ns in namespaces {
            bytes.write_u30(ns);
        }
        self.namespace_sets.add(bytes)
    }

    pub fn add_multiname(&mut self, name: &Multiname) -> u32 {
        self.multinames.add(name.encode())
    }

    /// Decode a utf8 entry back to text.
    pub fn utf8_at(&self, index: u32) -> Option<&str> {
        let bytes = self.utf8.get(index)?;
        let mut pos = 0;
        let len = super::writer::read_u30(bytes, &mut pos)? as usize;
        std::str::from_utf8(bytes.get(pos..pos + len)?).ok()
    }
}
