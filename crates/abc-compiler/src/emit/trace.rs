//! Human-readable instruction trace.
//!
//! One line per instruction (`offset:name operands [stack]`) interleaved
//! with emitter events and, optionally, source line markers, raw bytes and
//! a constant pool dump.

use std::fmt::{self, Write};

use abc_core::EmitterConfig;

use crate::bytecode::{ConstantPool, ConstantPools, Instruction};

#[derive(Debug, Default)]
pub(super) struct Trace {
    enabled: bool,
    bytecode: bool,
    out: String,
}

impl Trace {
    pub(super) fn new(config: &EmitterConfig) -> Self {
        Self {
            enabled: config.show_instructions || config.show_linenums || config.show_bytecode,
            bytecode: config.show_bytecode,
            out: String::new(),
        }
    }

    pub(super) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(super) fn text(&self) -> &str {
        &self.out
    }

    /// Record an emitter event such as a method boundary or a temp
    /// allocation.
    pub(super) fn event(&mut self, args: fmt::Arguments<'_>) {
        if self.enabled {
            self.out.push('\n');
            let _ = self.out.write_fmt(args);
        }
    }

    pub(super) fn line(&mut self, line: i32) {
        if self.enabled {
            let _ = write!(self.out, "\n[Ln {line}]");
        }
    }

    pub(super) fn instruction(&mut self, ins: &Instruction, bytes: &[u8], stack: i32, scope: i32) {
        if !self.enabled {
            return;
        }
        let _ = write!(self.out, "\n      {ins} [{stack}]");
        if scope != 0 {
            let _ = write!(self.out, " {{{scope}}}");
        }
        if self.bytecode {
            self.out.push_str("  //");
            for byte in bytes {
                let _ = write!(self.out, " {byte:02x}");
            }
        }
    }

    /// Dump every constant pool, one encoded entry per line.
    pub(super) fn pools(&mut self, pools: &ConstantPools) {
        if !self.enabled {
            return;
        }
        let named: [(&str, &ConstantPool); 8] = [
            ("int", &pools.ints),
            ("uint", &pools.uints),
            ("double", &pools.doubles),
            ("decimal", &pools.decimals),
            ("utf8", &pools.utf8),
            ("namespace", &pools.namespaces),
            ("namespace set", &pools.namespace_sets),
            ("multiname", &pools.multinames),
        ];
        for (name, pool) in named {
            if pool.is_empty() {
                continue;
            }
            let _ = write!(self.out, "\n// {name} pool ({})", pool.len());
            for (i, entry) in pool.entries().enumerate() {
                let _ = write!(self.out, "\n  {}:", i + 1);
                let text = (name == "utf8")
                    .then(|| pools.utf8_at(i as u32 + 1))
                    .flatten();
                if let Some(text) = text {
                    let _ = write!(self.out, " {text:?}");
                } else {
                    for byte in entry {
                        let _ = write!(self.out, " {byte:02x}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{OpCode, Operand};

    fn pushbyte() -> Instruction {
        Instruction {
            offset: 4,
            opcode: OpCode::PushByte,
            operands: vec![Operand::Byte(7)],
        }
    }

    #[test]
    fn disabled_trace_records_nothing() {
        let mut trace = Trace::new(&EmitterConfig::new());
        assert!(!trace.enabled());
        trace.event(format_args!("AllocTemp 1"));
        trace.instruction(&pushbyte(), &[0x24, 7], 1, 0);
        assert_eq!(trace.text(), "");
    }

    #[test]
    fn instruction_lines() {
        let mut trace = Trace::new(&EmitterConfig::new().with_trace(true, false));
        trace.line(12);
        trace.instruction(&pushbyte(), &[0x24, 7], 1, 0);
        trace.event(format_args!("AllocTemp {}", 2));
        assert_eq!(trace.text(), "\n[Ln 12]\n      4:pushbyte 7 [1]\nAllocTemp 2");
    }

    #[test]
    fn bytecode_and_pools() {
        let mut trace = Trace::new(&EmitterConfig::new().with_trace(false, true));
        trace.instruction(&pushbyte(), &[0x24, 7], 1, 2);
        assert!(trace.text().ends_with("[1] {2}  // 24 07"));

        let mut pools = ConstantPools::new();
        pools.add_utf8("abc");
        pools.add_int(300);
        trace.pools(&pools);
        assert!(trace.text().contains("// utf8 pool (1)\n  1: \"abc\""));
        assert!(trace.text().contains("// int pool (1)"));
    }
}
