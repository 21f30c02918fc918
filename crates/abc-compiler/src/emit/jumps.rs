//! Control-flow resolution.
//!
//! Branches are emitted with a zero placeholder offset and their operand
//! position is remembered as a pending site. When the target address is
//! known the site is patched in place. Loops, labeled statements and
//! switches open break/continue frames; exception regions remember enough
//! to route break, continue and return through any `finally` blocks they
//! cross.
//!
//! Frames are addressed by loop index: the code generator numbers the
//! open break frames from the outermost (0) to the innermost.

use abc_core::{EmitError, QName, TypeName};

use super::{AbcEmitter, LastInstruction};
use crate::bytecode::{ExceptionInfo, OpCode, Operand, patch_s24};

/// Relative offset from a branch operand at `site` to `target`.
///
/// Branch offsets count from the byte after the 3-byte operand.
pub fn branch_offset(target: usize, site: usize) -> Result<i32, EmitError> {
    let offset = target as i64 - site as i64 - 3;
    if !(-(1 << 23)..(1 << 23)).contains(&offset) {
        return Err(EmitError::BranchOutOfRange { offset });
    }
    Ok(offset as i32)
}

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Always,
    IfTrue,
    IfFalse,
    IfEq,
    IfNe,
    IfLt,
    IfLe,
    IfGt,
    IfGe,
    IfStrictEq,
    IfStrictNe,
    IfNlt,
    IfNle,
    IfNgt,
    IfNge,
}

impl BranchKind {
    pub fn opcode(self) -> OpCode {
        match self {
            BranchKind::Always => OpCode::Jump,
            BranchKind::IfTrue => OpCode::IfTrue,
            BranchKind::IfFalse => OpCode::IfFalse,
            BranchKind::IfEq => OpCode::IfEq,
            BranchKind::IfNe => OpCode::IfNe,
            BranchKind::IfLt => OpCode::IfLt,
            BranchKind::IfLe => OpCode::IfLe,
            BranchKind::IfGt => OpCode::IfGt,
            BranchKind::IfGe => OpCode::IfGe,
            BranchKind::IfStrictEq => OpCode::IfStrictEq,
            BranchKind::IfStrictNe => OpCode::IfStrictNe,
            BranchKind::IfNlt => OpCode::IfNlt,
            BranchKind::IfNle => OpCode::IfNle,
            BranchKind::IfNgt => OpCode::IfNgt,
            BranchKind::IfNge => OpCode::IfNge,
        }
    }

    /// Operands consumed by the test.
    pub fn stack_effect(self) -> i32 {
        match self {
            BranchKind::Always => 0,
            BranchKind::IfTrue | BranchKind::IfFalse => -1,
            _ => -2,
        }
    }
}

/// Pending breaks of one loop, labeled statement or switch.
#[derive(Debug)]
struct BreakFrame {
    sites: Vec<usize>,
    scope_depth: i32,
    /// Registers live at entry; a break kills everything above.
    temp_count: u32,
}

#[derive(Debug)]
struct ContinueFrame {
    sites: Vec<usize>,
    scope_depth: i32,
}

/// An open try region.
#[derive(Debug)]
struct ExceptionBlock {
    try_start: usize,
    try_end: usize,
    has_finally: bool,
    scope_depth: i32,
    /// Innermost loop frame open when the region started, -1 for none.
    loop_index: i32,
    /// Registers to restore after the finally body.
    cur_locals: u32,
    /// Jumps to the end of the catch clauses, or into the finally body.
    fixups: Vec<usize>,
    /// Resume addresses the finally body dispatches back to.
    finally_addrs: Vec<usize>,
}

/// Control-flow state of one method.
#[derive(Debug, Default)]
pub(super) struct FlowState {
    if_sites: Vec<usize>,
    else_sites: Vec<usize>,
    loop_begin_sites: Vec<usize>,
    switch_begin_sites: Vec<usize>,
    breaks: Vec<BreakFrame>,
    continues: Vec<ContinueFrame>,
    case_addrs: Vec<Vec<usize>>,
    default_addrs: Vec<usize>,
    seen_default: Vec<bool>,
    exception_blocks: Vec<ExceptionBlock>,
}

/// Which frame list a break or continue jumps through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Break,
    Continue,
}

impl AbcEmitter {
    fn flow(&mut self, operation: &'static str) -> Result<&mut FlowState, EmitError> {
        Ok(&mut self.current(operation)?.flow)
    }

    /// Emit `opcode` with a placeholder offset and return the operand site.
    fn emit_branch_site(&mut self, opcode: OpCode, stack: i32) -> usize {
        self.instr(opcode, &[Operand::Branch(0)], stack);
        self.ip().saturating_sub(3)
    }

    fn patch_site(&mut self, site: usize, target: usize) -> Result<(), EmitError> {
        let offset = branch_offset(target, site)?;
        let method = self.current("patch")?;
        patch_s24(&mut method.code, site, offset);
        self.trace
            .event(format_args!("      Jump@{} <- {offset}", site.saturating_sub(1)));
        Ok(())
    }

    fn patch_all(&mut self, sites: Vec<usize>, target: usize) -> Result<(), EmitError> {
        for site in sites.into_iter().rev() {
            self.patch_site(site, target)?;
        }
        Ok(())
    }

    /// A branch may land here, so the next coercion must not fold into
    /// the one before it.
    fn mark_branch_target(&mut self) {
        if let Some(method) = self.method.as_mut() {
            method.last_in = LastInstruction::Other;
        }
    }

    fn push_break_frames(&mut self) -> Result<(), EmitError> {
        let method = self.current("loop")?;
        let (scope_depth, temp_count) = (method.cur_scope, method.cur_locals);
        method.flow.breaks.push(BreakFrame {
            sites: Vec::new(),
            scope_depth,
            temp_count,
        });
        method.flow.continues.push(ContinueFrame {
            sites: Vec::new(),
            scope_depth,
        });
        Ok(())
    }

    // =========================================================================
    // If / else
    // =========================================================================

    /// Emit a conditional branch whose target is patched by
    /// [`patch_if`](Self::patch_if).
    pub fn if_branch(&mut self, kind: BranchKind) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let site = self.emit_branch_site(kind.opcode(), kind.stack_effect());
        self.flow("if")?.if_sites.push(site);
        self.save_stack_depth();
        Ok(())
    }

    /// Emit the jump over the else branch.
    pub fn else_branch(&mut self) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let site = self.emit_branch_site(OpCode::Jump, 0);
        self.flow("else")?.else_sites.push(site);
        Ok(())
    }

    /// Resolve the innermost pending `if` to `target` and restore the stack
    /// depth seen at the branch.
    pub fn patch_if(&mut self, target: usize) -> Result<(), EmitError> {
        self.restore_stack_depth()?;
        let site = self
            .flow("patch_if")?
            .if_sites
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "if" })?;
        self.mark_branch_target();
        self.patch_site(site, target)
    }

    pub fn patch_else(&mut self, target: usize) -> Result<(), EmitError> {
        let site = self
            .flow("patch_else")?
            .else_sites
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "else" })?;
        self.mark_branch_target();
        self.patch_site(site, target)
    }

    // =========================================================================
    // Loops and labeled statements
    // =========================================================================

    /// Open a loop: new break and continue frames, a jump to the first
    /// test, and the label the back edge targets.
    pub fn loop_begin(&mut self) -> Result<(), EmitError> {
        self.push_break_frames()?;
        let site = self.emit_branch_site(OpCode::Jump, 0);
        self.flow("loop_begin")?.loop_begin_sites.push(site);
        self.instr(OpCode::Label, &[], 0);
        self.mark_branch_target();
        Ok(())
    }

    /// Emit the back edge to the loop's label.
    pub fn loop_end(&mut self, kind: BranchKind) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let site = *self
            .flow("loop_end")?
            .loop_begin_sites
            .last()
            .ok_or(EmitError::NoPendingSite { site: "loop begin" })?;
        // The label sits right after the initial jump's operand.
        let label = site + 3;
        let offset = label as i64 - (self.ip() as i64 + 4);
        if !(-(1 << 23)..(1 << 23)).contains(&offset) {
            return Err(EmitError::BranchOutOfRange { offset });
        }
        self.instr(
            kind.opcode(),
            &[Operand::Branch(offset as i32)],
            kind.stack_effect(),
        );
        self.flow("loop_end")?.loop_begin_sites.pop();
        Ok(())
    }

    /// Point the loop's initial jump at its first test.
    pub fn patch_loop_begin(&mut self, target: usize) -> Result<(), EmitError> {
        let site = *self
            .flow("patch_loop_begin")?
            .loop_begin_sites
            .last()
            .ok_or(EmitError::NoPendingSite { site: "loop begin" })?;
        self.mark_branch_target();
        self.patch_site(site, target)
    }

    /// Open break and continue frames for a labeled statement.
    pub fn label_statement_begin(&mut self) -> Result<(), EmitError> {
        self.push_break_frames()
    }

    pub fn label_statement_end(&mut self, loop_index: i32) -> Result<(), EmitError> {
        self.patch_break(loop_index)?;
        self.patch_continue(loop_index)
    }

    /// Resolve every break of the innermost frame to the current address.
    pub fn patch_break(&mut self, loop_index: i32) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        self.trace.event(format_args!("PatchBreak {loop_index}"));
        let target = self.ip();
        let frame = self
            .flow("patch_break")?
            .breaks
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "break" })?;
        self.patch_all(frame.sites, target)
    }

    pub fn patch_continue(&mut self, loop_index: i32) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        self.trace.event(format_args!("PatchContinue {loop_index}"));
        let target = self.ip();
        let frame = self
            .flow("patch_continue")?
            .continues
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "continue" })?;
        self.patch_all(frame.sites, target)
    }

    // =========================================================================
    // Switch
    // =========================================================================

    /// Open a switch: case bookkeeping, break and continue frames, and a
    /// jump to the dispatch table emitted by [`switch_table`](Self::switch_table).
    pub fn switch_begin(&mut self) -> Result<(), EmitError> {
        {
            let flow = self.flow("switch_begin")?;
            flow.seen_default.push(false);
            flow.case_addrs.push(Vec::new());
        }
        self.push_break_frames()?;
        let site = self.emit_branch_site(OpCode::Jump, 0);
        self.flow("switch_begin")?.switch_begin_sites.push(site);
        self.save_stack_depth();
        self.mark_branch_target();
        Ok(())
    }

    /// Record the address of a case. A case directly following another
    /// shares its label.
    pub fn case_label(&mut self, is_default: bool) -> Result<(), EmitError> {
        self.restore_stack_depth()?;
        self.save_stack_depth();
        let ip = self.ip();
        let flow = self.flow("case_label")?;
        let cases = flow
            .case_addrs
            .last_mut()
            .ok_or(EmitError::NoPendingSite { site: "switch" })?;

        let mut need_label = true;
        if is_default {
            let seen = flow
                .seen_default
                .last_mut()
                .ok_or(EmitError::NoPendingSite { site: "switch" })?;
            if !*seen {
                cases.push(ip);
                flow.default_addrs.push(ip);
                *seen = true;
            }
        } else {
            if ip > 0 && cases.last() == Some(&(ip - 1)) {
                need_label = false;
            }
            cases.push(if need_label { ip } else { ip - 1 });
        }

        if need_label {
            self.instr(OpCode::Label, &[], 0);
        }
        self.mark_branch_target();
        Ok(())
    }

    /// Emit the `lookupswitch` over the recorded cases. The case index is
    /// on the stack.
    pub fn switch_table(&mut self) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let start = self.ip();
        let (default_addr, cases) = {
            let flow = self.flow("switch_table")?;
            let cases = flow
                .case_addrs
                .pop()
                .ok_or(EmitError::NoPendingSite { site: "case" })?;
            let default_addr = flow
                .default_addrs
                .pop()
                .ok_or(EmitError::NoPendingSite { site: "default case" })?;
            (default_addr, cases)
        };
        if cases.is_empty() {
            return Err(EmitError::NoPendingSite { site: "case" });
        }

        let relative = |addr: usize| Operand::Branch(addr as i32 - start as i32);
        let mut operands = Vec::with_capacity(cases.len() + 2);
        operands.push(relative(default_addr));
        operands.push(Operand::U30(cases.len() as u32 - 1));
        operands.extend(cases.iter().map(|&addr| relative(addr)));
        self.instr(OpCode::LookupSwitch, &operands, -1);

        // A switch is not a continue target. Hand its continues to the
        // enclosing loop.
        let flow = self.flow("switch_table")?;
        let frame = flow
            .continues
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "continue" })?;
        if let Some(outer) = flow.continues.last_mut() {
            outer.sites.extend(frame.sites);
        }
        Ok(())
    }

    /// Point the switch's initial jump at the dispatch table.
    pub fn patch_switch_begin(&mut self, target: usize) -> Result<(), EmitError> {
        self.restore_stack_depth()?;
        let flow = self.flow("patch_switch_begin")?;
        let site = flow
            .switch_begin_sites
            .pop()
            .ok_or(EmitError::NoPendingSite { site: "switch" })?;
        flow.seen_default.pop();
        self.mark_branch_target();
        self.patch_site(site, target)
    }

    // =========================================================================
    // Break / continue
    // =========================================================================

    /// Jump to the end of the frame at `loop_index`, running every
    /// `finally` block in between.
    pub fn break_loop(&mut self, loop_index: i32) -> Result<(), EmitError> {
        self.exit_loop(loop_index, Exit::Break)
    }

    /// Jump to the continue point of the frame at `loop_index`.
    pub fn continue_loop(&mut self, loop_index: i32) -> Result<(), EmitError> {
        self.exit_loop(loop_index, Exit::Continue)
    }

    fn exit_loop(&mut self, loop_index: i32, exit: Exit) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        self.trace.event(format_args!("{exit:?} {loop_index}"));

        let method = self.current("break")?;
        let open = match exit {
            Exit::Break => method.flow.breaks.len(),
            Exit::Continue => method.flow.continues.len(),
        };
        if loop_index < 0 || loop_index as usize >= open {
            return Err(EmitError::InvalidLoopIndex {
                index: loop_index,
                open,
            });
        }
        let index = loop_index as usize;
        let (frame_scope, temp_count) = match exit {
            Exit::Break => {
                let frame = &method.flow.breaks[index];
                (frame.scope_depth, Some(frame.temp_count))
            }
            Exit::Continue => (method.flow.continues[index].scope_depth, None),
        };

        if let Some(temp_count) = temp_count {
            let live = self.temp_count();
            for register in (temp_count..live).rev() {
                self.instr(OpCode::Kill, &[Operand::U30(register)], 0);
            }
        }

        let mut scope = self.scope_depth();
        let mut block = self.flow("break")?.exception_blocks.len();
        while block > 0 {
            let (block_loop, block_scope, has_finally) = {
                let b = &self.flow("break")?.exception_blocks[block - 1];
                (b.loop_index, b.scope_depth, b.has_finally)
            };
            if block_loop < loop_index {
                break;
            }
            while scope > block_scope {
                self.unwind_scope(scope);
                scope -= 1;
            }
            if has_finally {
                // Label keeps the VM from discarding the sequence.
                self.instr(OpCode::Label, &[], 0);
                self.call_finally_block(block - 1)?;
            }
            block -= 1;
        }
        while scope > frame_scope {
            self.unwind_scope(scope);
            scope -= 1;
        }

        let site = self.emit_branch_site(OpCode::Jump, 0);
        let flow = self.flow("break")?;
        match exit {
            Exit::Break => flow.breaks[index].sites.push(site),
            Exit::Continue => flow.continues[index].sites.push(site),
        }
        Ok(())
    }

    /// Pop the scope at `depth` without changing the tracked depth, killing
    /// the register that held its object, if any.
    fn unwind_scope(&mut self, depth: i32) {
        self.instr(OpCode::PopScope, &[], 0);
        let register = self.method.as_ref().and_then(|m| {
            m.scope_registers
                .get((depth - 1).max(0) as usize)
                .copied()
                .flatten()
        });
        if let Some(register) = register {
            self.instr(OpCode::Kill, &[Operand::U30(register)], 0);
        }
    }

    /// Push the resume index, jump into the finally body of `block`, and
    /// record where it returns to.
    fn call_finally_block(&mut self, block: usize) -> Result<(), EmitError> {
        let resume_index = self.flow("call_finally")?.exception_blocks[block]
            .finally_addrs
            .len();
        self.instr(OpCode::PushByte, &[Operand::Byte(resume_index as u8)], 1);
        let site = self.emit_branch_site(OpCode::Jump, 0);
        self.flow("call_finally")?.exception_blocks[block]
            .fixups
            .push(site);

        // Never runs; balances the stack for the verifier.
        self.instr(OpCode::Label, &[], 0);
        self.instr(OpCode::Pop, &[], -1);

        let resume = self.ip();
        self.flow("call_finally")?.exception_blocks[block]
            .finally_addrs
            .push(resume);
        self.instr(OpCode::Label, &[], 0);
        Ok(())
    }

    // =========================================================================
    // Try / catch / finally
    // =========================================================================

    /// Open a try region.
    pub fn try_begin(&mut self, has_finally: bool) -> Result<(), EmitError> {
        let ip = self.ip();
        let method = self.current("try")?;
        let block = ExceptionBlock {
            try_start: ip,
            try_end: ip,
            has_finally,
            scope_depth: method.cur_scope,
            loop_index: method.flow.breaks.len() as i32 - 1,
            cur_locals: method.cur_locals,
            fixups: Vec::new(),
            finally_addrs: Vec::new(),
        };
        method.flow.exception_blocks.push(block);
        method.last_in = LastInstruction::Other;
        self.flush_debug_info();
        Ok(())
    }

    fn innermost_block(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut ExceptionBlock, EmitError> {
        self.flow(operation)?
            .exception_blocks
            .last_mut()
            .ok_or(EmitError::NoExceptionRegion { operation })
    }

    /// End the protected range.
    pub fn catch_clauses_begin(&mut self) -> Result<(), EmitError> {
        let (ip, locals) = (self.ip(), self.temp_count());
        let block = self.innermost_block("catch_clauses_begin")?;
        block.try_end = ip;
        block.cur_locals = locals;
        self.prepare(LastInstruction::Other);
        Ok(())
    }

    /// Resolve the jumps past the catch clauses to the current address.
    pub fn catch_clauses_end(&mut self) -> Result<(), EmitError> {
        let target = self.ip();
        let fixups = std::mem::take(&mut self.innermost_block("catch_clauses_end")?.fixups);
        self.patch_all(fixups, target)?;
        self.prepare(LastInstruction::Other);
        Ok(())
    }

    /// Start a catch handler for `exc_type` (`None` catches anything).
    ///
    /// The preceding code jumps past the handlers; the handler starts with
    /// the caught value on the stack.
    pub fn catch_clause(
        &mut self,
        exc_type: Option<&TypeName>,
        var_name: Option<&QName>,
    ) -> Result<(), EmitError> {
        self.innermost_block("catch")?;
        self.prepare(LastInstruction::Other);
        let site = self.emit_branch_site(OpCode::Jump, 0);
        let target = self.ip();

        let exc_type = self.add_class_name(exc_type);
        let var_name = match var_name {
            Some(name) => self.add_class_name(Some(&TypeName::new(name.clone()))),
            None => 0,
        };

        let block = self.innermost_block("catch")?;
        block.fixups.push(site);
        let info = ExceptionInfo {
            from: block.try_start as u32,
            to: block.try_end as u32,
            target: target as u32,
            exc_type,
            var_name,
        };
        let method = self.current("catch")?;
        method.exceptions.push(info);
        // The exception arrives on the stack.
        let offset = method.ip();
        method.adjust(offset, 1, 0)
    }

    /// Route a `return` or `throw` through enclosing finally blocks.
    ///
    /// Calls at most `count` finally bodies, innermost first; a negative
    /// count calls all of them.
    pub fn call_finally(&mut self, count: i32) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let locals = self.temp_count();
        let mut invoked = 0;
        let mut block = self.flow("call_finally")?.exception_blocks.len();
        while block > 0 {
            block -= 1;
            let has_finally = {
                let b = &mut self.flow("call_finally")?.exception_blocks[block];
                b.cur_locals = b.cur_locals.max(locals);
                b.has_finally
            };
            if has_finally {
                self.call_finally_block(block)?;
                invoked += 1;
                if invoked == count {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Enter the finally body. Registers live in the catch handlers stay
    /// reserved until [`finally_clause_end`](Self::finally_clause_end).
    pub fn finally_clause_begin(&mut self) -> Result<(), EmitError> {
        let locals = self.temp_count();
        let block = self.innermost_block("finally_clause_begin")?;
        let saved = std::mem::replace(&mut block.cur_locals, locals);
        let method = self.current("finally_clause_begin")?;
        method.cur_locals = saved;
        method.max_locals = method.max_locals.max(saved);
        Ok(())
    }

    /// Dispatch back to the recorded resume addresses and close the region.
    pub fn finally_clause_end(&mut self) -> Result<(), EmitError> {
        self.prepare(LastInstruction::Other);
        let resumes = self
            .innermost_block("finally_clause_end")?
            .finally_addrs
            .clone();

        if !resumes.is_empty() {
            let start = self.ip();
            // The default falls through to the instruction after the switch.
            let case_bytes = 3 * resumes.len();
            let count = resumes.len() as u32 - 1;
            let len = 1 + 3 + crate::bytecode::u30_len(count) + case_bytes;
            let mut operands = Vec::with_capacity(resumes.len() + 2);
            operands.push(Operand::Branch(len as i32));
            operands.push(Operand::U30(count));
            operands.extend(
                resumes
                    .iter()
                    .map(|&addr| Operand::Branch(addr as i32 - start as i32)),
            );
            self.instr(OpCode::LookupSwitch, &operands, -1);
        }

        let method = self.current("finally_clause_end")?;
        let block = method
            .flow
            .exception_blocks
            .pop()
            .ok_or(EmitError::NoExceptionRegion {
                operation: "finally_clause_end",
            })?;
        method.cur_locals = block.cur_locals;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_opcodes, disassemble};
    use crate::emit::{FrameLayout, MethodSignature};
    use abc_core::EmitterConfig;

    fn emitter() -> AbcEmitter {
        let mut e = AbcEmitter::new(EmitterConfig::new());
        e.start_method("test", FrameLayout::default()).unwrap();
        e
    }

    #[test]
    fn offset_counts_from_after_operand() {
        assert_eq!(branch_offset(10, 1).unwrap(), 6);
        assert_eq!(branch_offset(0, 10).unwrap(), -13);
        assert!(matches!(
            branch_offset(1 << 24, 0),
            Err(EmitError::BranchOutOfRange { .. })
        ));
    }

    #[test]
    fn if_else_patching() {
        let mut e = emitter();
        e.push_true();
        e.if_branch(BranchKind::IfFalse).unwrap();
        e.push_byte(1);
        e.else_branch().unwrap();
        let else_start = e.ip();
        e.patch_if(else_start).unwrap();
        e.push_byte(2);
        let end = e.ip();
        e.patch_else(end).unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[1].opcode, OpCode::IfFalse);
        assert_eq!(ins[1].branch_target(), Some(else_start));
        assert_eq!(ins[3].opcode, OpCode::Jump);
        assert_eq!(ins[3].branch_target(), Some(end));
        // both arms leave one value
        assert_eq!(e.stack_depth(), 1);
    }

    #[test]
    fn coercion_at_conditional_join_is_kept() {
        let foo = TypeName::public("Foo");
        let mut e = emitter();
        e.push_true();
        e.if_branch(BranchKind::IfFalse).unwrap();
        e.push_null();
        e.check_type(&foo);
        e.else_branch().unwrap();
        e.patch_if(e.ip()).unwrap();
        e.push_null();
        e.check_type(&foo);
        let join = e.ip();
        e.patch_else(join).unwrap();
        e.check_type(&TypeName::public("String"));
        e.pop();
        e.return_void();

        assert_opcodes(
            e.code(),
            &[
                OpCode::PushTrue,
                OpCode::IfFalse,
                OpCode::PushNull,
                OpCode::Coerce,
                OpCode::Jump,
                OpCode::PushNull,
                OpCode::Coerce,
                OpCode::CoerceS,
                OpCode::Pop,
                OpCode::ReturnVoid,
            ],
        );
        let ins = disassemble(e.code());
        let coerce_s = ins.iter().find(|i| i.opcode == OpCode::CoerceS).unwrap();
        assert_eq!(coerce_s.offset, join);
        assert_eq!(ins[4].branch_target(), Some(join));
    }

    #[test]
    fn coercion_at_loop_entry_is_kept() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        e.push_null();
        e.check_type(&TypeName::public("Foo"));
        let test = e.ip();
        e.patch_loop_begin(test).unwrap();
        e.check_type(&TypeName::public("String"));
        e.loop_end(BranchKind::IfTrue).unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[0].opcode, OpCode::Jump);
        assert_eq!(ins[0].branch_target(), Some(test));
        assert!(ins.iter().any(|i| i.opcode == OpCode::Coerce));
        let coerce_s = ins.iter().find(|i| i.opcode == OpCode::CoerceS).unwrap();
        assert_eq!(coerce_s.offset, test);
    }

    #[test]
    fn coercion_after_loop_label_is_not_folded() {
        let mut e = emitter();
        e.push_null();
        e.check_type(&TypeName::public("Foo"));
        e.loop_begin().unwrap();
        e.check_type(&TypeName::public("String"));
        assert!(disassemble(e.code()).iter().any(|i| i.opcode == OpCode::Coerce));
    }

    #[test]
    fn patch_without_site_fails() {
        let mut e = emitter();
        e.save_stack_depth();
        assert_eq!(
            e.patch_if(0),
            Err(EmitError::NoPendingSite { site: "if" })
        );
        assert_eq!(
            e.patch_else(0),
            Err(EmitError::NoPendingSite { site: "else" })
        );
    }

    #[test]
    fn while_loop_shape() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        // body
        e.push_null();
        e.pop();
        let test = e.ip();
        e.patch_continue(0).unwrap();
        e.patch_loop_begin(test).unwrap();
        e.push_true();
        e.loop_end(BranchKind::IfTrue).unwrap();
        e.patch_break(0).unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[0].opcode, OpCode::Jump);
        assert_eq!(ins[0].branch_target(), Some(test));
        assert_eq!(ins[1].opcode, OpCode::Label);
        let back = ins.last().unwrap();
        assert_eq!(back.opcode, OpCode::IfTrue);
        assert_eq!(back.branch_target(), Some(ins[1].offset));
    }

    #[test]
    fn break_jumps_to_loop_end() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        e.break_loop(0).unwrap();
        let test = e.ip();
        e.patch_continue(0).unwrap();
        e.patch_loop_begin(test).unwrap();
        e.push_true();
        e.loop_end(BranchKind::IfTrue).unwrap();
        let end = e.ip();
        e.patch_break(0).unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[2].opcode, OpCode::Jump);
        assert_eq!(ins[2].branch_target(), Some(end));
    }

    #[test]
    fn break_kills_loop_temps() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        let t = e.allocate_temp();
        e.break_loop(0).unwrap();
        e.free_temp(t);
        assert_opcodes(
            e.code(),
            &[
                OpCode::Jump,
                OpCode::Label,
                OpCode::Kill,
                OpCode::Jump,
                OpCode::Kill,
            ],
        );
    }

    #[test]
    fn break_pops_scopes_opened_in_loop() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        e.push_null();
        e.push_with();
        e.break_loop(0).unwrap();
        // tracked depth is unchanged by the unwinding
        assert_eq!(e.scope_depth(), 1);
        assert_opcodes(
            e.code(),
            &[
                OpCode::Jump,
                OpCode::Label,
                OpCode::PushNull,
                OpCode::PushWith,
                OpCode::PopScope,
                OpCode::Jump,
            ],
        );
    }

    #[test]
    fn break_with_unknown_index_fails() {
        let mut e = emitter();
        assert_eq!(
            e.break_loop(0),
            Err(EmitError::InvalidLoopIndex { index: 0, open: 0 })
        );
        e.loop_begin().unwrap();
        assert_eq!(
            e.continue_loop(-1),
            Err(EmitError::InvalidLoopIndex { index: -1, open: 1 })
        );
    }

    #[test]
    fn switch_dispatch_table() {
        let mut e = emitter();
        e.switch_begin().unwrap();
        e.case_label(false).unwrap();
        let case0 = e.ip() - 1;
        e.push_null();
        e.pop();
        e.case_label(true).unwrap();
        let default = e.ip() - 1;
        e.break_loop(0).unwrap();
        let table = e.ip();
        e.patch_switch_begin(table).unwrap();
        e.push_byte(0);
        e.switch_table().unwrap();
        e.patch_break(0).unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[0].branch_target(), Some(table));
        let switch = ins
            .iter()
            .find(|i| i.opcode == OpCode::LookupSwitch)
            .unwrap();
        assert_eq!(switch.switch_targets(), vec![default, case0, default]);
        assert_eq!(e.stack_depth(), 0);
    }

    #[test]
    fn adjacent_cases_share_a_label() {
        let mut e = emitter();
        e.switch_begin().unwrap();
        e.case_label(false).unwrap();
        e.case_label(false).unwrap();
        e.case_label(true).unwrap();
        let table = e.ip();
        e.patch_switch_begin(table).unwrap();
        e.push_byte(1);
        e.switch_table().unwrap();
        e.patch_break(0).unwrap();

        // jump, one label per distinct address
        let labels = disassemble(e.code())
            .iter()
            .filter(|i| i.opcode == OpCode::Label)
            .count();
        assert_eq!(labels, 2);
    }

    #[test]
    fn switch_continues_move_to_enclosing_loop() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        e.switch_begin().unwrap();
        e.case_label(true).unwrap();
        e.continue_loop(1).unwrap();
        let table = e.ip();
        e.patch_switch_begin(table).unwrap();
        e.push_byte(0);
        e.switch_table().unwrap();
        e.patch_break(1).unwrap();
        let continue_target = e.ip();
        e.patch_continue(0).unwrap();

        let ins = disassemble(e.code());
        let cont = ins
            .iter()
            .filter(|i| i.opcode == OpCode::Jump)
            .nth(2)
            .unwrap();
        assert_eq!(cont.branch_target(), Some(continue_target));
    }

    #[test]
    fn switch_without_default_fails() {
        let mut e = emitter();
        e.switch_begin().unwrap();
        e.case_label(false).unwrap();
        e.push_byte(0);
        assert_eq!(
            e.switch_table(),
            Err(EmitError::NoPendingSite {
                site: "default case"
            })
        );
    }

    #[test]
    fn try_catch_records_exception() {
        let mut e = emitter();
        e.try_begin(false).unwrap();
        e.push_null();
        e.pop();
        e.catch_clauses_begin().unwrap();
        e.catch_clause(Some(&TypeName::public("Error")), Some(&QName::public("e")))
            .unwrap();
        assert_eq!(e.stack_depth(), 1);
        e.pop();
        e.catch_clauses_end().unwrap();
        e.finally_clause_end().unwrap();
        let end = e.ip();
        e.return_void();

        let ins = disassemble(e.code());
        assert_eq!(ins[2].opcode, OpCode::Jump);
        assert_eq!(ins[2].branch_target(), Some(end));
        let method = e.current("test").unwrap();
        assert_eq!(method.exceptions.len(), 1);
        let info = &method.exceptions[0];
        assert_eq!((info.from, info.to, info.target), (0, 2, 6));
        assert_ne!(info.exc_type, 0);
        assert_ne!(info.var_name, 0);
    }

    #[test]
    fn catch_outside_try_fails() {
        let mut e = emitter();
        assert_eq!(
            e.catch_clause(None, None),
            Err(EmitError::NoExceptionRegion { operation: "catch" })
        );
    }

    #[test]
    fn return_through_finally() {
        let mut e = emitter();
        e.try_begin(true).unwrap();
        e.try_begin(false).unwrap();
        e.call_finally(-1).unwrap();
        e.return_void();
        e.catch_clauses_begin().unwrap();
        e.catch_clauses_end().unwrap();
        e.finally_clause_end().unwrap();
        e.push_byte(-1);
        e.catch_clauses_begin().unwrap();
        e.catch_clause(None, None).unwrap();
        e.pop();
        e.catch_clauses_end().unwrap();
        e.finally_clause_begin().unwrap();
        e.finally_clause_end().unwrap();

        let ins = disassemble(e.code());
        assert_eq!(ins[0].opcode, OpCode::PushByte);
        assert_eq!(ins[0].operands, vec![Operand::Byte(0)]);
        let resume = ins[4].offset;
        let switch = ins.last().unwrap();
        assert_eq!(switch.opcode, OpCode::LookupSwitch);
        let targets = switch.switch_targets();
        // default falls through past the table
        assert_eq!(targets[0], e.ip());
        assert_eq!(targets[1], resume);
        // the call jumps into the finally body
        let finally_entry = ins[1].branch_target().unwrap();
        assert!(finally_entry > resume);
    }

    #[test]
    fn break_through_finally_records_resume() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        e.try_begin(true).unwrap();
        e.break_loop(0).unwrap();
        assert_opcodes(
            e.code(),
            &[
                OpCode::Jump,
                OpCode::Label,
                OpCode::Label,
                OpCode::PushByte,
                OpCode::Jump,
                OpCode::Label,
                OpCode::Pop,
                OpCode::Label,
                OpCode::Jump,
            ],
        );
        assert_eq!(e.stack_depth(), 0);
    }

    #[test]
    fn finally_restores_registers() {
        let mut e = emitter();
        e.try_begin(true).unwrap();
        e.catch_clauses_begin().unwrap();
        let t = e.allocate_temp();
        assert_eq!(t, 1);
        e.finally_clause_begin().unwrap();
        assert_eq!(e.temp_count(), 1);
        e.finally_clause_end().unwrap();
        assert_eq!(e.temp_count(), 2);
    }

    #[test]
    fn loop_method_finishes() {
        let mut e = emitter();
        e.loop_begin().unwrap();
        let test = e.ip();
        e.patch_continue(0).unwrap();
        e.patch_loop_begin(test).unwrap();
        e.push_false();
        e.loop_end(BranchKind::IfTrue).unwrap();
        e.patch_break(0).unwrap();
        e.return_void();
        assert!(e.finish_method("test", &MethodSignature::default()).is_ok());
    }
}
