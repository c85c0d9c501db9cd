use super::{ByteBuffer, Error, Serialize};
use byteorder::WriteBytesExt;

/// Class file constants pool builder
///
/// The pool is append only: every `add_*` call pushes a brand new entry (there is no implicit
/// de-duplication) and returns its 1-based index. Since nothing is ever reordered, the index of
/// the next entry is always known ahead of time via [`ConstantPoolBuilder::next_index`].
///
/// Every entry that refers to other entries is checked to only refer to entries that already
/// exist, so a finished pool never contains dangling or forward references.
#[derive(Debug, Default)]
pub struct ConstantPoolBuilder {
    constants: Vec<Constant>,
}

impl ConstantPoolBuilder {
    /// Largest value the `constant_pool_count` can take
    const MAX_COUNT: usize = u16::MAX as usize;

    /// Make a fresh empty constants pool
    pub fn new() -> ConstantPoolBuilder {
        ConstantPoolBuilder { constants: vec![] }
    }

    /// Index that the next constant added will get
    pub fn next_index(&self) -> ConstantIndex {
        ConstantIndex(self.constants.len() as u16 + 1)
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Value of the `constant_pool_count` header field for the entries so far
    ///
    /// Quirk of the class file format: this is one more than the number of entries.
    pub fn count(&self) -> u16 {
        self.constants.len() as u16 + 1
    }

    /// Look up a constant by its index
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        match index.0 {
            0 => None,
            n => self.constants.get(n as usize - 1),
        }
    }

    /// Push a constant into the constant pool, provided there is space for it and every index it
    /// mentions has already been assigned
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let next_index = self.next_index();

        if self.constants.len() + 1 >= Self::MAX_COUNT {
            return Err(Error::ConstantPoolOverflow {
                constant,
                offset: next_index.0 as usize,
            });
        }

        for referenced in constant.references() {
            if referenced.0 == 0 || referenced.0 >= next_index.0 {
                return Err(Error::InvalidConstantReference {
                    index: referenced.0,
                    next_index: next_index.0,
                });
            }
        }

        log::trace!("#{} = {:?}", next_index.0, constant);
        self.constants.push(constant);
        Ok(next_index)
    }

    /// Add a utf8 constant
    pub fn add_utf8(&mut self, utf8: impl Into<String>) -> Result<Utf8ConstantIndex, Error> {
        let utf8 = utf8.into();
        let length = modified_utf8_length(&utf8);
        if length > u16::MAX as usize {
            return Err(Error::Utf8TooLong { length });
        }
        self.push_constant(Constant::Utf8(utf8))
            .map(Utf8ConstantIndex)
    }

    /// Add a class constant
    pub fn add_class(&mut self, name: Utf8ConstantIndex) -> Result<ClassConstantIndex, Error> {
        self.push_constant(Constant::Class(name))
            .map(ClassConstantIndex)
    }

    /// Add a name & type constant
    pub fn add_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        self.push_constant(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    /// Add a method reference constant (for a method on a class)
    pub fn add_method_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<MethodRefConstantIndex, Error> {
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface: false,
        };
        self.push_constant(constant).map(MethodRefConstantIndex)
    }

    /// Add a method reference constant (for a method on an interface)
    pub fn add_interface_method_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<MethodRefConstantIndex, Error> {
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface: true,
        };
        self.push_constant(constant).map(MethodRefConstantIndex)
    }

    /// Add a field reference constant
    pub fn add_field_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<FieldRefConstantIndex, Error> {
        self.push_constant(Constant::FieldRef(class, name_and_type))
            .map(FieldRefConstantIndex)
    }

    /// Add the three entries needed for a class whose name isn't in the pool yet
    pub fn add_class_named(&mut self, name: impl Into<String>) -> Result<ClassConstantIndex, Error> {
        let utf8 = self.add_utf8(name)?;
        self.add_class(utf8)
    }

    /// Write out all of the entries (but not the count)
    pub fn serialize_entries(&self, buffer: &mut ByteBuffer) -> Result<(), Error> {
        for constant in &self.constants {
            constant.serialize(buffer)?;
        }
        Ok(())
    }
}

/// Constants as in the constant pool
///
/// Note: only the constant kinds needed by generated accessors are included
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),
}

impl Constant {
    /// Tag byte identifying the kind of constant
    pub const fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Class(_) => 7,
            Constant::FieldRef(_, _) => 9,
            Constant::MethodRef {
                is_interface: false,
                ..
            } => 10,
            Constant::MethodRef {
                is_interface: true, ..
            } => 11,
            Constant::NameAndType { .. } => 12,
        }
    }

    /// Indices of other constants this one points at
    pub fn references(&self) -> Vec<ConstantIndex> {
        match self {
            Constant::Utf8(_) => vec![],
            Constant::Class(name) => vec![name.0],
            Constant::FieldRef(class, name_and_type) => vec![class.0, name_and_type.0],
            Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => vec![class.0, name_and_type.0],
            Constant::NameAndType { name, descriptor } => vec![name.0, descriptor.0],
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.tag().serialize(writer)?;
        match self {
            Constant::Utf8(string) => {
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Class(name) => {
                name.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => {
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Length of a string once encoded with [`encode_modified_utf8`]
fn modified_utf8_length(string: &str) -> usize {
    string
        .chars()
        .map(|c| match c {
            '\u{0000}' => 2,
            c if c.len_utf8() == 4 => 6,
            c => c.len_utf8(),
        })
        .sum()
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for c in string.chars() {
        let code: u32 = c as u32;

        match c {
            '\u{0000}' => buffer.extend_from_slice(&[0b1100_0000, 0b1000_0000]),
            c if c.len_utf8() == 1 => buffer.push(code as u8),
            c if c.len_utf8() == 2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            c if c.len_utf8() == 3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: split into a surrogate pair, each encoded in 3 bytes
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units).iter() {
                    let unit = *unit as u32;
                    buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
                    buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
                    buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
                }
            }
        }
    }
    buffer
}

/// Raw index into the constant pool
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Debug)]
pub struct ConstantIndex(pub u16);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Index types which remember what sort of constant they point to
macro_rules! typed_constant_index {
    ($($(#[$attr:meta])* $name:ident,)*) => {
        $(
            $(#[$attr])*
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
            pub struct $name(ConstantIndex);

            impl From<$name> for ConstantIndex {
                fn from(index: $name) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $name {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }
        )*
    };
}

typed_constant_index! {
    /// Index of a `CONSTANT_Utf8_info`
    Utf8ConstantIndex,
    /// Index of a `CONSTANT_Class_info`
    ClassConstantIndex,
    /// Index of a `CONSTANT_NameAndType_info`
    NameAndTypeConstantIndex,
    /// Index of a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    MethodRefConstantIndex,
    /// Index of a `CONSTANT_Fieldref_info`
    FieldRefConstantIndex,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indices_start_at_one_and_are_predictable() {
        let mut pool = ConstantPoolBuilder::new();
        assert_eq!(pool.next_index(), ConstantIndex(1));
        assert_eq!(pool.count(), 1);

        let name = pool.add_utf8("java/lang/Object").unwrap();
        assert_eq!(ConstantIndex::from(name), ConstantIndex(1));
        assert_eq!(pool.next_index(), ConstantIndex(2));

        let class = pool.add_class(name).unwrap();
        assert_eq!(ConstantIndex::from(class), ConstantIndex(2));
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.get(ConstantIndex(0)), None);
        assert_eq!(pool.get(ConstantIndex(2)), Some(&Constant::Class(name)));
    }

    #[test]
    fn no_implicit_deduplication() {
        let mut pool = ConstantPoolBuilder::new();
        let first = pool.add_utf8("Code").unwrap();
        let second = pool.add_utf8("Code").unwrap();
        assert_ne!(first, second);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn forward_references_are_rejected() {
        let mut pool = ConstantPoolBuilder::new();
        let name = pool.add_utf8("foo").unwrap();
        let forward = Utf8ConstantIndex(ConstantIndex(5));
        assert!(matches!(
            pool.add_name_and_type(name, forward),
            Err(Error::InvalidConstantReference {
                index: 5,
                next_index: 2
            })
        ));
        let zero = Utf8ConstantIndex(ConstantIndex(0));
        assert!(pool.add_class(zero).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn serialized_entries() {
        let mut pool = ConstantPoolBuilder::new();
        let class = pool.add_class_named("A").unwrap();
        let name = pool.add_utf8("m").unwrap();
        let desc = pool.add_utf8("()V").unwrap();
        let name_and_type = pool.add_name_and_type(name, desc).unwrap();
        pool.add_method_ref(class, name_and_type).unwrap();
        pool.add_interface_method_ref(class, name_and_type).unwrap();
        pool.add_field_ref(class, name_and_type).unwrap();

        let mut buffer = ByteBuffer::new();
        pool.serialize_entries(&mut buffer).unwrap();
        assert_eq!(
            buffer.into_vec(),
            vec![
                1, 0, 1, b'A', // #1 utf8
                7, 0, 1, // #2 class
                1, 0, 1, b'm', // #3 utf8
                1, 0, 3, b'(', b')', b'V', // #4 utf8
                12, 0, 3, 0, 4, // #5 name and type
                10, 0, 2, 0, 5, // #6 method ref
                11, 0, 2, 0, 5, // #7 interface method ref
                9, 0, 2, 0, 5, // #8 field ref
            ]
        );
    }

    #[test]
    fn overflowing_pool() {
        let mut pool = ConstantPoolBuilder::new();
        for _ in 0..65534 {
            pool.add_utf8("").unwrap();
        }
        assert_eq!(pool.count(), u16::MAX);
        assert!(matches!(
            pool.add_utf8(""),
            Err(Error::ConstantPoolOverflow { offset: 65535, .. })
        ));
    }

    #[test]
    fn long_utf8_is_rejected() {
        let mut pool = ConstantPoolBuilder::new();
        let long: String = std::iter::repeat('\u{0000}').take(40_000).collect();
        assert!(matches!(
            pool.add_utf8(long),
            Err(Error::Utf8TooLong { length: 80_000 })
        ));
    }
}
