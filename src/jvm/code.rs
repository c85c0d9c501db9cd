use super::bytecode::{BranchInstruction, Instruction, InvokeType};
use super::class_file::{BytecodeArray, BytecodeIndex, Code, ExceptionHandler};
use super::{
    ByteBuffer, ClassConstantIndex, Error, MethodDescriptor, MethodRefConstantIndex, Serialize,
};
use std::fmt;

/// Opaque label for a position in the code being built
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct Label(usize);

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

#[derive(Debug, Default)]
struct LabelInfo {
    /// Offset in the code array, once placed
    offset: Option<usize>,

    /// Operand stack depth on entry, once known (from a jump or from being placed)
    depth: Option<usize>,
}

#[derive(Debug)]
struct PendingJump {
    /// Offset of the branch opcode (jump offsets are relative to this)
    instruction_offset: usize,

    /// Offset of the 2-byte placeholder to patch
    operand_offset: usize,

    target: Label,
}

#[derive(Debug)]
struct PendingHandler {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: ClassConstantIndex,
}

/// Builder for the body of a single method
///
/// Instructions are serialized straight into the code array as they come. Jumps are written with
/// a placeholder offset and patched once every label is placed. Alongside, the builder tracks the
/// operand stack depth so that `max_stack` comes out of the emission itself.
///
/// Code is strictly linear: after an unconditional branch, the depth at the next placed label is
/// taken from whichever jump targets that label.
#[derive(Debug)]
pub struct CodeBuilder {
    code: ByteBuffer,
    labels: Vec<LabelInfo>,
    jumps: Vec<PendingJump>,
    handlers: Vec<PendingHandler>,
    depth: usize,
    max_depth: usize,
    reachable: bool,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        CodeBuilder::new()
    }
}

impl CodeBuilder {
    /// Largest allowed `code_length`
    const MAX_CODE_LENGTH: usize = u16::MAX as usize;

    pub fn new() -> CodeBuilder {
        CodeBuilder {
            code: ByteBuffer::with_capacity(128),
            labels: vec![],
            jumps: vec![],
            handlers: vec![],
            depth: 0,
            max_depth: 0,
            reachable: true,
        }
    }

    /// Offset at which the next instruction will go
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Current operand stack depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Largest operand stack depth seen so far
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Get a fresh label (which still needs to be placed)
    pub fn fresh_label(&mut self) -> Label {
        let label = Label(self.labels.len());
        self.labels.push(LabelInfo::default());
        label
    }

    /// Place a label at the current offset
    pub fn place_label(&mut self, label: Label) -> Result<(), Error> {
        let offset = self.code.len();
        let depth = self.depth;
        let reachable = self.reachable;
        let info = self.label_info(label)?;
        if info.offset.is_some() {
            return Err(Error::DuplicateLabel(label.0));
        }
        info.offset = Some(offset);

        let entry_depth = match (info.depth, reachable) {
            (Some(known), _) => known,
            (None, true) => depth,
            (None, false) => 0,
        };
        info.depth = Some(entry_depth);
        self.depth = entry_depth;
        self.reachable = true;
        Ok(())
    }

    /// Place the entry point of an exception handler, where the stack holds just the exception
    pub fn place_handler(&mut self, label: Label) -> Result<(), Error> {
        self.label_info(label)?.depth = Some(1);
        self.place_label(label)?;
        self.max_depth = self.max_depth.max(1);
        Ok(())
    }

    /// Push a non-branching instruction whose stack effect is known up front
    pub fn push_instruction(&mut self, instruction: Instruction) -> Result<(), Error> {
        let (pops, pushes) = instruction
            .stack_effect()
            .ok_or(Error::UnknownStackEffect {
                offset: self.code.len(),
            })?;
        self.adjust_depth(pops, pushes)?;
        instruction.serialize(&mut self.code)?;
        Ok(())
    }

    /// Push a method invocation
    ///
    /// The descriptor determines how many slots are popped (arguments plus the receiver, if any)
    /// and pushed (the return value, if any).
    pub fn push_invoke(
        &mut self,
        invoke_type: InvokeType,
        method: MethodRefConstantIndex,
        descriptor: &MethodDescriptor,
    ) -> Result<(), Error> {
        let pops = descriptor.parameter_length(invoke_type.has_receiver());
        let pushes = descriptor.return_type.as_ref().map_or(0, |ret| ret.width());
        self.adjust_depth(pops, pushes)?;
        Instruction::Invoke(invoke_type, method).serialize(&mut self.code)?;
        Ok(())
    }

    /// Push a branch instruction
    pub fn push_branch(&mut self, branch: BranchInstruction<Label>) -> Result<(), Error> {
        self.adjust_depth(branch.pops(), 0)?;

        if let Some(target) = branch.jump_target() {
            let depth = self.depth;
            let info = self.label_info(target)?;
            if info.depth.is_none() {
                info.depth = Some(depth);
            }
            let instruction_offset = self.code.len();
            self.jumps.push(PendingJump {
                instruction_offset,
                operand_offset: instruction_offset + 1,
                target,
            });
        }

        branch.map_label(|_| 0i16).serialize(&mut self.code)?;
        if !branch.falls_through() {
            self.reachable = false;
        }
        Ok(())
    }

    /// Register an exception handler covering `[start, end)`
    ///
    /// Handlers are searched by the JVM in the order they are added.
    pub fn add_exception_handler(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: ClassConstantIndex,
    ) {
        self.handlers.push(PendingHandler {
            start,
            end,
            handler,
            catch_type,
        });
    }

    /// Resolve all jumps and handlers into a `Code` attribute
    pub fn finish(mut self, max_locals: u16) -> Result<Code, Error> {
        let code_length = self.code.len();
        if code_length > Self::MAX_CODE_LENGTH {
            return Err(Error::MethodCodeOverflow(code_length));
        }

        for jump in &self.jumps {
            let target = self.label_offset(jump.target)?;
            let relative = target as isize - jump.instruction_offset as isize;
            let relative = i16::try_from(relative).map_err(|_| Error::JumpOverflow {
                from: jump.instruction_offset,
                to: target,
            })?;
            self.code.patch_i16(jump.operand_offset, relative)?;
        }

        let mut exception_table = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            exception_table.push(ExceptionHandler {
                start_pc: BytecodeIndex(self.label_offset(handler.start)? as u16),
                end_pc: BytecodeIndex(self.label_offset(handler.end)? as u16),
                handler_pc: BytecodeIndex(self.label_offset(handler.handler)? as u16),
                catch_type: handler.catch_type,
            });
        }

        let max_stack = u16::try_from(self.max_depth)
            .map_err(|_| Error::MethodCodeMaxStackOverflow(self.max_depth))?;

        log::trace!(
            "finished code: {} bytes, max_stack {}, {} handlers",
            code_length,
            max_stack,
            exception_table.len()
        );

        Ok(Code {
            max_stack,
            max_locals,
            code_array: BytecodeArray(self.code.into_vec()),
            exception_table,
        })
    }

    fn adjust_depth(&mut self, pops: usize, pushes: usize) -> Result<(), Error> {
        if self.depth < pops {
            return Err(Error::StackUnderflow {
                offset: self.code.len(),
            });
        }
        self.depth = self.depth - pops + pushes;
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    fn label_info(&mut self, label: Label) -> Result<&mut LabelInfo, Error> {
        self.labels
            .get_mut(label.0)
            .ok_or(Error::UnplacedLabel(label.0))
    }

    fn label_offset(&self, label: Label) -> Result<usize, Error> {
        self.labels
            .get(label.0)
            .and_then(|info| info.offset)
            .ok_or(Error::UnplacedLabel(label.0))
    }
}
