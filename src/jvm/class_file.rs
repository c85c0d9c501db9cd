//! Class file structures above the constant pool: header, methods, and the attributes we emit

use super::{
    ByteBuffer, ClassAccessFlags, ClassConstantIndex, Error, MethodAccessFlags, Serialize,
    Utf8ConstantIndex,
};
use byteorder::WriteBytesExt;

/// Magic header bytes that go at the front of the serialized class file
pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub minor_version: u16,
    pub major_version: u16,
}

impl Version {
    /// JVM class file version corresponding to Java SE 5
    ///
    /// This is the last version for which the type-inferencing verifier is used unconditionally,
    /// so methods with branches don't need a `StackMapTable`.
    pub const JAVA5: Version = Version {
        minor_version: 0,
        major_version: 49,
    };

    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version {
        minor_version: 0,
        major_version: 52,
    };

    /// Does this version require a `StackMapTable` on methods with branches?
    pub fn requires_stack_map_frames(&self) -> bool {
        self.major_version >= 50
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

/// Fields that sit between the constant pool and the methods
#[derive(Debug)]
pub struct ClassHeader {
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
}

impl Serialize for ClassHeader {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        Ok(())
    }
}

/// Leading part of a `method_info` (the attributes are written separately)
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6
#[derive(Debug)]
pub struct MethodHeader {
    pub access_flags: MethodAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes_count: u16,
}

impl Serialize for MethodHeader {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes_count.serialize(writer)?;
        Ok(())
    }
}

/// Attributes are all stored in the same way (a name, a `u4` length, then the payload), but
/// internally they represent very different things. This trait is implemented by things which
/// can be turned into attributes.
pub trait AttributeLike: Serialize {
    /// Name of the attribute
    const NAME: &'static str;

    /// Write the attribute, including its name and length prefix
    ///
    /// The length is only known after the payload has been written, so a placeholder is written
    /// first and patched afterwards.
    fn write_attribute(
        &self,
        name_index: Utf8ConstantIndex,
        buffer: &mut ByteBuffer,
    ) -> Result<(), Error> {
        name_index.serialize(buffer)?;
        let length_offset = buffer.len();
        buffer.put_u32(0);
        self.serialize(buffer)?;
        let length = buffer.len() - length_offset - 4;
        let length = u32::try_from(length).map_err(|_| Error::MethodCodeOverflow(length))?;
        buffer.patch_u32(length_offset, length)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: BytecodeArray,
    pub exception_table: Vec<ExceptionHandler>,
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        self.code_array.serialize(writer)?;
        self.exception_table.serialize(writer)?;

        // No nested attributes: the versions we target need no `StackMapTable`
        0u16.serialize(writer)?;
        Ok(())
    }
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: BytecodeIndex,

    /// End of exception handler range (exclusive)
    pub end_pc: BytecodeIndex,

    /// Start of the exception handler
    pub handler_pc: BytecodeIndex,

    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

/// Encoded bytecode instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeArray(pub Vec<u8>);

impl Serialize for BytecodeArray {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let len = self.0.len() as u32;
        len.serialize(writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// Index into `BytecodeArray`
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BytecodeIndex(pub u16);

impl Serialize for BytecodeIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Checked exceptions a method declares it can throw
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exceptions(pub Vec<ClassConstantIndex>);

impl Serialize for Exceptions {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl AttributeLike for Exceptions {
    const NAME: &'static str = "Exceptions";
}
