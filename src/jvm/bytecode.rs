//! This module contains the subset of JVM bytecode that generated accessors use. As in the full
//! instruction set, some instructions are abstracted into one variant with a field:
//!
//!   - `aload`/`aload_<n>`/`wide aload` are all just `ALoad`, and the shortest encoding is picked
//!     when serializing
//!
//!   - conditional branches carry their comparison as a field
//!
//! Branches are kept separate from the other instructions since their operand is a label which
//! only gets resolved into a relative offset once the target has been placed.

use super::{ClassConstantIndex, MethodRefConstantIndex, Serialize};
use byteorder::WriteBytesExt;
use std::io::Result;

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    AConstNull,
    IConst0,
    BiPush(i8),
    SiPush(i16),
    ALoad(u16), // covers `aload`, `aload_{0,3}`, and `wide aload`
    AStore(u16),
    AALoad,
    Pop,
    Dup,
    ArrayLength,
    New(ClassConstantIndex),
    CheckCast(ClassConstantIndex),

    /// Stack effect depends on the descriptor of the method, so that is tracked separately
    Invoke(InvokeType, MethodRefConstantIndex),
}

impl Instruction {
    /// Push the smallest instruction which loads an `int` constant
    pub fn int_constant(value: i16) -> Instruction {
        match (value, i8::try_from(value)) {
            (0, _) => Instruction::IConst0,
            (_, Ok(byte)) => Instruction::BiPush(byte),
            (_, Err(_)) => Instruction::SiPush(value),
        }
    }

    /// Number of operand stack slots popped then pushed
    ///
    /// Returns `None` for invocations, since those depend on the method descriptor.
    pub fn stack_effect(&self) -> Option<(usize, usize)> {
        let effect = match self {
            Instruction::AConstNull
            | Instruction::IConst0
            | Instruction::BiPush(_)
            | Instruction::SiPush(_)
            | Instruction::ALoad(_)
            | Instruction::New(_) => (0, 1),
            Instruction::AStore(_) | Instruction::Pop => (1, 0),
            Instruction::AALoad => (2, 1),
            Instruction::Dup => (1, 2),
            Instruction::ArrayLength | Instruction::CheckCast(_) => (1, 1),
            Instruction::Invoke(_, _) => return None,
        };
        Some(effect)
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - short form (0-3) have special bytes
         *   - normal form (0-255) use `aload` plus a byte operand
         *   - wide form (255-65535) use `wide aload` plus two byte operands
         */
        fn serialize_load_or_store<W: WriteBytesExt>(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            writer: &mut W,
        ) -> Result<()> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(writer),
                Ok(n) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                Err(_) => {
                    0xC4u8.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        match self {
            Instruction::AConstNull => 0x01u8.serialize(writer)?,
            Instruction::IConst0 => 0x03u8.serialize(writer)?,
            Instruction::BiPush(b) => {
                0x10u8.serialize(writer)?;
                b.serialize(writer)?;
            }
            Instruction::SiPush(s) => {
                0x11u8.serialize(writer)?;
                s.serialize(writer)?;
            }
            Instruction::ALoad(idx) => serialize_load_or_store(*idx, 0x2A, 0x19, writer)?,
            Instruction::AStore(idx) => serialize_load_or_store(*idx, 0x4B, 0x3A, writer)?,
            Instruction::AALoad => 0x32u8.serialize(writer)?,
            Instruction::Pop => 0x57u8.serialize(writer)?,
            Instruction::Dup => 0x59u8.serialize(writer)?,
            Instruction::ArrayLength => 0xbeu8.serialize(writer)?,
            Instruction::New(idx) => {
                0xbbu8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::CheckCast(idx) => {
                0xc0u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Virtual, idx) => {
                0xb6u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Special, idx) => {
                0xb7u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Static, idx) => {
                0xb8u8.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Interface(cnt), idx) => {
                0xb9u8.serialize(writer)?;
                idx.serialize(writer)?;
                cnt.serialize(writer)?;
                0u8.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Branching instructions
///
/// The label type is left abstract: while emitting it is a symbolic label, and once the target is
/// known it becomes the relative `i16` offset which actually gets serialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction<Lbl> {
    If(OrdComparison, Lbl), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Lbl), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfNull(EqComparison, Lbl), // covers `ifnull`, `ifnonnull`
    Goto(Lbl),
    AReturn,
    AThrow,
}

impl<Lbl: Copy> BranchInstruction<Lbl> {
    /// Jump target, if there is one
    pub fn jump_target(&self) -> Option<Lbl> {
        match self {
            BranchInstruction::If(_, lbl)
            | BranchInstruction::IfICmp(_, lbl)
            | BranchInstruction::IfNull(_, lbl)
            | BranchInstruction::Goto(lbl) => Some(*lbl),
            BranchInstruction::AReturn | BranchInstruction::AThrow => None,
        }
    }

    /// Can execution continue with the next instruction?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            BranchInstruction::Goto(_) | BranchInstruction::AReturn | BranchInstruction::AThrow
        )
    }

    /// Number of operand stack slots popped
    pub fn pops(&self) -> usize {
        match self {
            BranchInstruction::IfICmp(_, _) => 2,
            BranchInstruction::If(_, _)
            | BranchInstruction::IfNull(_, _)
            | BranchInstruction::AReturn
            | BranchInstruction::AThrow => 1,
            BranchInstruction::Goto(_) => 0,
        }
    }

    /// Swap out the label
    pub fn map_label<Lbl2>(&self, map: impl FnOnce(Lbl) -> Lbl2) -> BranchInstruction<Lbl2> {
        match self {
            BranchInstruction::If(comp, lbl) => BranchInstruction::If(*comp, map(*lbl)),
            BranchInstruction::IfICmp(comp, lbl) => BranchInstruction::IfICmp(*comp, map(*lbl)),
            BranchInstruction::IfNull(comp, lbl) => BranchInstruction::IfNull(*comp, map(*lbl)),
            BranchInstruction::Goto(lbl) => BranchInstruction::Goto(map(*lbl)),
            BranchInstruction::AReturn => BranchInstruction::AReturn,
            BranchInstruction::AThrow => BranchInstruction::AThrow,
        }
    }
}

impl Serialize for BranchInstruction<i16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            BranchInstruction::If(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x99,
                    OrdComparison::NE => 0x9a,
                    OrdComparison::LT => 0x9b,
                    OrdComparison::GE => 0x9c,
                    OrdComparison::GT => 0x9d,
                    OrdComparison::LE => 0x9e,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::IfICmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    OrdComparison::EQ => 0x9f,
                    OrdComparison::NE => 0xa0,
                    OrdComparison::LT => 0xa1,
                    OrdComparison::GE => 0xa2,
                    OrdComparison::GT => 0xa3,
                    OrdComparison::LE => 0xa4,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::IfNull(comp, lbl) => {
                let opcode: u8 = match comp {
                    EqComparison::EQ => 0xc6,
                    EqComparison::NE => 0xc7,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::Goto(lbl) => {
                0xa7u8.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            BranchInstruction::AReturn => 0xb0u8.serialize(writer)?,
            BranchInstruction::AThrow => 0xbfu8.serialize(writer)?,
        }
        Ok(())
    }
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // `count` is of total arguments, where `long`/`double` count for 2
}

impl InvokeType {
    /// Does the invoked method take a receiver off the stack?
    pub fn has_receiver(&self) -> bool {
        !matches!(self, InvokeType::Static)
    }
}
