use super::layout::{PoolLayout, SharedEntries};
use super::{AccessorKind, Error, MemberDescriptor, MemberKind};
use crate::jvm::bytecode::{BranchInstruction, EqComparison, Instruction, InvokeType, OrdComparison};
use crate::jvm::class_file::Code;
use crate::jvm::{ClassConstantIndex, CodeBuilder, FieldType, Label, MethodRefConstantIndex};

/// Emits the body of the dispatch method
///
/// The generated code, in order:
///
///   1. for instance methods, throws `NullPointerException` if the receiver is `null`
///   2. throws `IllegalArgumentException` unless the argument array has exactly one element per
///      parameter (a `null` array counts as empty)
///   3. pushes the wrapper for a primitive result, the receiver cast to the owner, or the new
///      uninitialized object for constructors
///   4. pushes each argument: primitives are checked against `null`, cast to their wrapper and
///      unboxed, references are cast to the parameter type
///   5. invokes the target and boxes its result (`null` for `void`)
///
/// Casts which fail throw `ClassCastException` straight from the `checkcast`. Declared checked
/// exceptions thrown by the target are caught and wrapped in `InvocationTargetException`.
pub struct AccessorCodeEmitter<'a> {
    member: &'a MemberDescriptor,
    kind: AccessorKind,
    layout: &'a PoolLayout,
    code: CodeBuilder,
}

impl<'a> AccessorCodeEmitter<'a> {
    /// Local holding `this`
    const THIS_LOCAL: u16 = 0;

    pub fn new(
        member: &'a MemberDescriptor,
        kind: AccessorKind,
        layout: &'a PoolLayout,
    ) -> AccessorCodeEmitter<'a> {
        AccessorCodeEmitter {
            member,
            kind,
            layout,
            code: CodeBuilder::new(),
        }
    }

    /// Local holding the receiver (method accessors only)
    fn receiver_local(&self) -> u16 {
        Self::THIS_LOCAL + 1
    }

    /// Local holding the `Object[]` of arguments
    fn arguments_local(&self) -> u16 {
        match self.kind {
            AccessorKind::Method => 2,
            AccessorKind::Constructor | AccessorKind::SerializationConstructor => 1,
        }
    }

    /// Local used to stash a caught exception
    fn scratch_local(&self) -> u16 {
        self.arguments_local() + 1
    }

    /// Emit the whole method body
    pub fn emit(mut self) -> Result<Code, Error> {
        if self.member.needs_instance() {
            self.check_receiver()?;
        }
        self.check_argument_count()?;

        let layout = self.layout;
        let boxed_result = match self.member.return_type() {
            Some(FieldType::Base(primitive)) => Some(layout.boxing_for(*primitive)?),
            _ => None,
        };
        if let Some(boxing) = boxed_result {
            self.code.push_instruction(Instruction::New(boxing.wrapper))?;
            self.code.push_instruction(Instruction::Dup)?;
        }

        match self.member.kind() {
            MemberKind::InstanceMethod => {
                self.code
                    .push_instruction(Instruction::ALoad(self.receiver_local()))?;
                self.code
                    .push_instruction(Instruction::CheckCast(self.layout.owner))?;
            }
            MemberKind::StaticMethod => (),
            MemberKind::Constructor | MemberKind::SerializationConstructor { .. } => {
                self.code.push_instruction(Instruction::New(self.layout.owner))?;
                self.code.push_instruction(Instruction::Dup)?;
            }
        }

        for index in 0..self.member.parameters().len() {
            self.push_argument(index)?;
        }

        let invoke_start = self.code.fresh_label();
        let invoke_end = self.code.fresh_label();
        self.code.place_label(invoke_start)?;
        self.code.push_invoke(
            self.invoke_type(),
            self.layout.target_method,
            self.member.descriptor(),
        )?;
        self.code.place_label(invoke_end)?;

        match boxed_result {
            Some(boxing) => self.code.push_invoke(
                InvokeType::Special,
                boxing.box_method,
                &boxing.plan.box_descriptor,
            )?,
            None if self.member.return_type().is_none() && self.kind == AccessorKind::Method => {
                self.code.push_instruction(Instruction::AConstNull)?
            }
            None => (),
        }
        self.code.push_branch(BranchInstruction::AReturn)?;

        self.emit_exception_handlers(invoke_start, invoke_end)?;

        let max_locals = self.scratch_local() + 1;
        Ok(self.code.finish(max_locals)?)
    }

    /// Throw a fresh exception built with its no-argument constructor
    fn throw_new(
        &mut self,
        class: ClassConstantIndex,
        init: MethodRefConstantIndex,
    ) -> Result<(), Error> {
        self.code.push_instruction(Instruction::New(class))?;
        self.code.push_instruction(Instruction::Dup)?;
        self.code.push_invoke(
            InvokeType::Special,
            init,
            &SharedEntries::no_arg_init_descriptor(),
        )?;
        self.code.push_branch(BranchInstruction::AThrow)?;
        Ok(())
    }

    fn check_receiver(&mut self) -> Result<(), Error> {
        let non_null = self.code.fresh_label();
        self.code
            .push_instruction(Instruction::ALoad(self.receiver_local()))?;
        self.code
            .push_branch(BranchInstruction::IfNull(EqComparison::NE, non_null))?;
        self.throw_new(
            self.layout.shared.null_pointer_exception,
            self.layout.shared.null_pointer_exception_init,
        )?;
        self.code.place_label(non_null)?;
        Ok(())
    }

    fn check_argument_count(&mut self) -> Result<(), Error> {
        let arguments = self.arguments_local();
        let parameter_count = self.member.parameters().len();
        let ok = self.code.fresh_label();

        if parameter_count == 0 {
            // `null` or an empty array
            self.code.push_instruction(Instruction::ALoad(arguments))?;
            self.code
                .push_branch(BranchInstruction::IfNull(EqComparison::EQ, ok))?;
            self.code.push_instruction(Instruction::ALoad(arguments))?;
            self.code.push_instruction(Instruction::ArrayLength)?;
            self.code
                .push_branch(BranchInstruction::If(OrdComparison::EQ, ok))?;
            self.throw_new(
                self.layout.shared.illegal_argument_exception,
                self.layout.shared.illegal_argument_exception_init,
            )?;
        } else {
            let bad_count = self.code.fresh_label();
            let expected = i16::try_from(parameter_count).map_err(|_| {
                Error::UnsupportedDescriptor(format!("{} parameters", parameter_count))
            })?;
            self.code.push_instruction(Instruction::ALoad(arguments))?;
            self.code
                .push_branch(BranchInstruction::IfNull(EqComparison::EQ, bad_count))?;
            self.code.push_instruction(Instruction::ALoad(arguments))?;
            self.code.push_instruction(Instruction::ArrayLength)?;
            self.code
                .push_instruction(Instruction::int_constant(expected))?;
            self.code
                .push_branch(BranchInstruction::IfICmp(OrdComparison::EQ, ok))?;
            self.code.place_label(bad_count)?;
            self.throw_new(
                self.layout.shared.illegal_argument_exception,
                self.layout.shared.illegal_argument_exception_init,
            )?;
        }

        self.code.place_label(ok)?;
        Ok(())
    }

    /// Load, check, and convert the argument at `index`
    fn push_argument(&mut self, index: usize) -> Result<(), Error> {
        let position = i16::try_from(index)
            .map_err(|_| Error::UnsupportedDescriptor(format!("parameter {}", index)))?;
        self.code
            .push_instruction(Instruction::ALoad(self.arguments_local()))?;
        self.code
            .push_instruction(Instruction::int_constant(position))?;
        self.code.push_instruction(Instruction::AALoad)?;

        let member = self.member;
        let layout = self.layout;
        match &member.parameters()[index] {
            FieldType::Base(primitive) => {
                let boxing = layout.boxing_for(*primitive)?;

                // `null` can't be unboxed
                let non_null = self.code.fresh_label();
                self.code.push_instruction(Instruction::Dup)?;
                self.code
                    .push_branch(BranchInstruction::IfNull(EqComparison::NE, non_null))?;
                self.throw_new(
                    self.layout.shared.null_pointer_exception,
                    self.layout.shared.null_pointer_exception_init,
                )?;
                self.code.place_label(non_null)?;

                self.code
                    .push_instruction(Instruction::CheckCast(boxing.wrapper))?;
                self.code.push_invoke(
                    InvokeType::Virtual,
                    boxing.unbox_method,
                    &boxing.plan.unbox_descriptor,
                )?;
            }
            FieldType::Ref(_) => {
                if let Some(class) = layout.parameter_classes[index] {
                    self.code.push_instruction(Instruction::CheckCast(class))?;
                }
            }
        }
        Ok(())
    }

    fn invoke_type(&self) -> InvokeType {
        match self.member.kind() {
            MemberKind::StaticMethod => InvokeType::Static,
            MemberKind::InstanceMethod if self.member.owner_is_interface() => {
                // Validated to fit when the member was built
                let count = self.member.descriptor().parameter_length(true);
                InvokeType::Interface(count as u8)
            }
            MemberKind::InstanceMethod => InvokeType::Virtual,
            MemberKind::Constructor | MemberKind::SerializationConstructor { .. } => {
                InvokeType::Special
            }
        }
    }

    /// Handlers around the invocation of the target
    ///
    /// Unchecked throwables are rethrown as-is, then every declared exception is wrapped. All of the rethrowing
    /// handlers share one `athrow` and all of the wrapping handlers share one wrapping block.
    fn emit_exception_handlers(&mut self, start: Label, end: Label) -> Result<(), Error> {
        if self.layout.declared_exceptions.is_empty() {
            return Ok(());
        }

        if let Some(guards) = &self.layout.unchecked_guards {
            let rethrow = self.code.fresh_label();
            self.code.place_handler(rethrow)?;
            self.code.push_branch(BranchInstruction::AThrow)?;
            self.code
                .add_exception_handler(start, end, rethrow, guards.runtime_exception);
            self.code
                .add_exception_handler(start, end, rethrow, guards.error);
        }

        let wrap = self.code.fresh_label();
        let scratch = self.scratch_local();
        self.code.place_handler(wrap)?;
        self.code.push_instruction(Instruction::AStore(scratch))?;
        self.code.push_instruction(Instruction::New(
            self.layout.shared.invocation_target_exception,
        ))?;
        self.code.push_instruction(Instruction::Dup)?;
        self.code.push_instruction(Instruction::ALoad(scratch))?;
        self.code.push_invoke(
            InvokeType::Special,
            self.layout.shared.invocation_target_exception_init,
            &SharedEntries::throwable_init_descriptor(),
        )?;
        self.code.push_branch(BranchInstruction::AThrow)?;
        for exception in &self.layout.declared_exceptions {
            self.code.add_exception_handler(start, end, wrap, *exception);
        }

        Ok(())
    }
}
