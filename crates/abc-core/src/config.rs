//! Emitter configuration.

/// ABC major version written in every module header.
pub const MAJOR_VERSION: u16 = 46;
/// ABC minor version for modules without decimal support.
pub const MINOR_VERSION: u16 = 16;
/// First minor version that carries a decimal constant pool.
pub const MINOR_VERSION_WITH_DECIMAL: u16 = 17;

/// Feature flags for one emitter instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Emit `debugfile`/`debugline` instructions.
    pub emit_debug_info: bool,
    /// Keep method debug names in method signatures.
    pub emit_code_hints: bool,
    /// Enable decimal constants and typed arithmetic (minor version 17).
    pub es4_numerics: bool,
    /// Alias versioned namespaces per API version.
    pub api_versioning: bool,
    /// Record a human-readable instruction trace.
    pub show_instructions: bool,
    /// Include source line markers in the trace.
    pub show_linenums: bool,
    /// Include raw bytecode and pool dumps in the trace.
    pub show_bytecode: bool,
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.emit_debug_info = enabled;
        self
    }

    pub fn with_code_hints(mut self, enabled: bool) -> Self {
        self.emit_code_hints = enabled;
        self
    }

    pub fn with_es4_numerics(mut self, enabled: bool) -> Self {
        self.es4_numerics = enabled;
        self
    }

    pub fn with_api_versioning(mut self, enabled: bool) -> Self {
        self.api_versioning = enabled;
        self
    }

    /// Turn on the instruction trace, optionally with line markers and
    /// bytecode dumps.
    pub fn with_trace(mut self, linenums: bool, bytecode: bool) -> Self {
        self.show_instructions = true;
        self.show_linenums = linenums;
        self.show_bytecode = bytecode;
        self
    }

    /// Minor version implied by the numeric mode.
    pub fn minor_version(&self) -> u16 {
        if self.es4_numerics {
            MINOR_VERSION_WITH_DECIMAL
        } else {
            MINOR_VERSION
        }
    }
}
