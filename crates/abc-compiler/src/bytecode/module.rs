//! The module under construction.
//!
//! [`AbcModule`] owns the constant pools and the record tables, plus the
//! identity maps that tie symbolic internal names (`Foo$iinit`,
//! `flash.display:Sprite`) to stable table indices. Tables only grow; an
//! index handed out once keeps referring to the same record.

use abc_core::{EmitError, MAJOR_VERSION, MINOR_VERSION_WITH_DECIMAL};
use rustc_hash::FxHashMap;
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use super::constant::ConstantPools;
use super::records::{ClassInfo, InstanceInfo, MethodBody, MethodInfo, MetadataInfo, ScriptInfo};
use super::writer::AbcWrite;

/// Append `item` to `table` unless an equal entry is already present.
///
/// Returns the 1-based position. Linear, so only meant for short tables
/// with no hash index, such as trait and interface lists.
pub fn add_to_table<T: PartialEq>(table: &mut Vec<T>, item: T) -> u32 {
    if let Some(pos) = table.iter().position(|existing| *existing == item) {
        return pos as u32 + 1;
    }
    table.push(item);
    table.len() as u32
}

/// An ABC module being assembled.
#[derive(Debug, Clone)]
pub struct AbcModule {
    minor_version: u16,
    major_version: u16,

    /// The eight constant pools.
    pub pools: ConstantPools,

    // =========================================================================
    // Record tables (encoded; empty until the record is finished)
    // =========================================================================
    methods: Vec<Vec<u8>>,
    metadata: Vec<Vec<u8>>,
    instances: Vec<Vec<u8>>,
    classes: Vec<Vec<u8>>,
    scripts: Vec<Vec<u8>>,
    bodies: Vec<Vec<u8>>,

    // =========================================================================
    // Identity maps
    // =========================================================================
    /// Internal name of every allocated method slot, by index.
    method_names: Vec<String>,
    /// Current name to method index mapping. `$init` may be evicted.
    method_index: FxHashMap<String, u32>,
    metadata_index: FxHashMap<String, u32>,
    class_names: Vec<String>,
    script_names: Vec<String>,
    /// Body hash to body indices with that hash.
    body_index: FxHashMap<u64, Vec<u32>>,
    /// Global method ids, 1-based.
    global_method_names: Vec<String>,
}

impl AbcModule {
    pub fn new(minor_version: u16) -> Self {
        Self {
            minor_version,
            major_version: MAJOR_VERSION,
            pools: ConstantPools::new(),
            methods: Vec::new(),
            metadata: Vec::new(),
            instances: Vec::new(),
            classes: Vec::new(),
            scripts: Vec::new(),
            bodies: Vec::new(),
            method_names: Vec::new(),
            method_index: FxHashMap::default(),
            metadata_index: FxHashMap::default(),
            class_names: Vec::new(),
            script_names: Vec::new(),
            body_index: FxHashMap::default(),
            global_method_names: Vec::new(),
        }
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    // =========================================================================
    // Methods
    // =========================================================================

    /// Index of the method info for an internal name, allocating a slot on
    /// first use.
    pub fn method_info(&mut self, name: &str) -> Result<u32, EmitError> {
        if let Some(&id) = self.method_index.get(name) {
            return Ok(id);
        }
        let id = self.method_names.len() as u32;
        self.method_index.insert(name.to_string(), id);
        self.method_names.push(name.to_string());
        self.methods.push(Vec::new());
        if self.method_names.len() != self.methods.len() {
            return Err(EmitError::out_of_sync(
                "method",
                id as usize,
                self.methods.len(),
            ));
        }
        Ok(id)
    }

    /// Look up a method index without allocating.
    pub fn find_method_info(&self, name: &str) -> Option<u32> {
        self.method_index.get(name).copied()
    }

    /// Forget the mapping for `name` so the next request allocates a new
    /// slot. The old record stays in the table.
    pub fn evict_method_name(&mut self, name: &str) {
        self.method_index.remove(name);
    }

    /// Internal name of the method at `index`.
    pub fn method_name(&self, index: u32) -> Option<&str> {
        self.method_names.get(index as usize).map(String::as_str)
    }

    pub fn set_method(&mut self, index: u32, info: &MethodInfo) -> Result<(), EmitError> {
        let slot = self
            .methods
            .get_mut(index as usize)
            .ok_or_else(|| EmitError::invalid_index("method", index))?;
        *slot = info.encode();
        Ok(())
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Encoded method info at `index`.
    pub fn method(&self, index: u32) -> Option<&[u8]> {
        self.methods.get(index as usize).map(Vec::as_slice)
    }

    /// 1-based global id for a method name, used for dispatch slots.
    pub fn method_id(&mut self, name: &str) -> u32 {
        if let Some(pos) = self.global_method_names.iter().position(|n| n == name) {
            return pos as u32 + 1;
        }
        self.global_method_names.push(name.to_string());
        self.global_method_names.len() as u32
    }

    /// Name for a global method id.
    pub fn method_id_name(&self, id: u32) -> Result<&str, EmitError> {
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.global_method_names.get(i))
            .map(String::as_str)
            .ok_or_else(|| EmitError::invalid_index("method id", id))
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    /// Add a method body, reusing an existing byte-identical one.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn add_body(&mut self, body: &MethodBody) -> u32 {
        let bytes = body.encode();
        let hash = xxh64(&bytes, 0);
        let candidates = self.body_index.entry(hash).or_default();
        if let Some(&existing) = candidates
            .iter()
            .find(|&&i| self.bodies[i as usize] == bytes)
        {
            return existing;
        }
        let index = self.bodies.len() as u32;
        candidates.push(index);
        self.bodies.push(bytes);
        index
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body(&self, index: u32) -> Option<&[u8]> {
        self.bodies.get(index as usize).map(Vec::as_slice)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Index for a metadata content key, allocating an empty record.
    pub fn metadata_info(&mut self, key: &str) -> Result<u32, EmitError> {
        if let Some(&id) = self.metadata_index.get(key) {
            return Ok(id);
        }
        let id = self.metadata_index.len() as u32;
        self.metadata_index.insert(key.to_string(), id);
        self.metadata.push(Vec::new());
        if self.metadata_index.len() != self.metadata.len() {
            return Err(EmitError::out_of_sync(
                "metadata",
                id as usize,
                self.metadata.len(),
            ));
        }
        Ok(id)
    }

    /// Write a metadata record unless the slot is already filled.
    pub fn set_metadata_once(&mut self, index: u32, info: &MetadataInfo) -> Result<(), EmitError> {
        let slot = self
            .metadata
            .get_mut(index as usize)
            .ok_or_else(|| EmitError::invalid_index("metadata", index))?;
        if slot.is_empty() {
            *slot = info.encode();
        }
        Ok(())
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata.len()
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Index of the class named `name`, allocating paired instance and
    /// class slots on first use.
    pub fn class_info(&mut self, name: &str) -> Result<u32, EmitError> {
        if let Some(pos) = self.class_names.iter().position(|n| n == name) {
            return Ok(pos as u32);
        }
        let id = self.class_names.len();
        self.class_names.push(name.to_string());
        self.classes.push(Vec::new());
        self.instances.push(Vec::new());
        if self.class_names.len() != self.classes.len() {
            return Err(EmitError::out_of_sync("class", id, self.classes.len()));
        }
        Ok(id as u32)
    }

    pub fn set_class(
        &mut self,
        index: u32,
        instance: &InstanceInfo,
        class: &ClassInfo,
    ) -> Result<(), EmitError> {
        let i = index as usize;
        if i >= self.classes.len() || i >= self.instances.len() {
            return Err(EmitError::invalid_index("class", index));
        }
        self.instances[i] = instance.encode();
        self.classes[i] = class.encode();
        Ok(())
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn instance(&self, index: u32) -> Option<&[u8]> {
        self.instances.get(index as usize).map(Vec::as_slice)
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    /// Index of the script for a package name, allocating on first use.
    pub fn script_info(&mut self, name: &str) -> Result<u32, EmitError> {
        if let Some(index) = self.find_script_info(name) {
            return Ok(index);
        }
        let id = self.script_names.len();
        self.script_names.push(name.to_string());
        self.scripts.push(Vec::new());
        if self.script_names.len() != self.scripts.len() {
            return Err(EmitError::out_of_sync("script", id, self.scripts.len()));
        }
        Ok(id as u32)
    }

    /// Look up a script index without allocating.
    pub fn find_script_info(&self, name: &str) -> Option<u32> {
        self.script_names
            .iter()
            .position(|n| n == name)
            .map(|pos| pos as u32)
    }

    pub fn set_script(&mut self, index: u32, info: &ScriptInfo) -> Result<(), EmitError> {
        let slot = self
            .scripts
            .get_mut(index as usize)
            .ok_or_else(|| EmitError::invalid_index("script", index))?;
        *slot = info.encode();
        Ok(())
    }

    /// Move the first script to the end, so the main script runs last.
    ///
    /// Every script shifts down by one, so script indices returned before
    /// the reorder are stale afterwards. Look them up again with
    /// [`find_script_info`](Self::find_script_info).
    pub fn reorder_main_script(&mut self) {
        if !self.scripts.is_empty() {
            let first = self.scripts.remove(0);
            self.scripts.push(first);
            let name = self.script_names.remove(0);
            self.script_names.push(name);
        }
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    pub fn script(&self, index: u32) -> Option<&[u8]> {
        self.scripts.get(index as usize).map(Vec::as_slice)
    }

    pub fn script_names(&self) -> &[String] {
        &self.script_names
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize the whole module.
    ///
    /// Fails if a decimal constant exists below the decimal-capable minor
    /// version, or if any allocated record was never written.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn to_bytes(&self) -> Result<Vec<u8>, EmitError> {
        let has_decimal = self.minor_version >= MINOR_VERSION_WITH_DECIMAL;
        if !has_decimal && !self.pools.decimals.is_empty() {
            return Err(EmitError::DecimalUnsupported {
                minor: self.minor_version,
                required: MINOR_VERSION_WITH_DECIMAL,
            });
        }
        check_filled("method", &self.methods)?;
        check_filled("metadata", &self.metadata)?;
        check_filled("instance", &self.instances)?;
        check_filled("class", &self.classes)?;
        check_filled("script", &self.scripts)?;

        let mut out = Vec::new();
        out.write_u16(self.minor_version);
        out.write_u16(self.major_version);

        self.pools.ints.write_to(&mut out);
        self.pools.uints.write_to(&mut out);
        self.pools.doubles.write_to(&mut out);
        if has_decimal {
            self.pools.decimals.write_to(&mut out);
        }
        self.pools.utf8.write_to(&mut out);
        self.pools.namespaces.write_to(&mut out);
        self.pools.namespace_sets.write_to(&mut out);
        self.pools.multinames.write_to(&mut out);

        write_table(&mut out, &self.methods);
        write_table(&mut out, &self.metadata);
        out.write_u30(self.classes.len() as u32);
        for instance in &self.instances {
            out.extend_from_slice(instance);
        }
        for class in &self.classes {
            out.extend_from_slice(class);
        }
        write_table(&mut out, &self.scripts);
        write_table(&mut out, &self.bodies);

        debug!(
            bytes = out.len(),
            methods = self.methods.len(),
            classes = self.classes.len(),
            scripts = self.scripts.len(),
            bodies = self.bodies.len(),
            "serialized module"
        );
        Ok(out)
    }
}

fn check_filled(what: &'static str, table: &[Vec<u8>]) -> Result<(), EmitError> {
    match table.iter().position(Vec::is_empty) {
        Some(index) => Err(EmitError::invalid_index(what, index as i64)),
        None => Ok(()),
    }
}

fn write_table(out: &mut Vec<u8>, table: &[Vec<u8>]) {
    out.write_u30(table.len() as u32);
    for record in table {
        out.extend_from_slice(record);
    }
}
