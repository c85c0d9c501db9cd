//! Just enough of a class file reader to check the structure of generated accessors
//!
//! Everything panics on malformed input, which is exactly what a test wants.

#![allow(dead_code)]

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(String),
    Class(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

#[derive(Debug)]
pub struct Handler {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    pub catch_type: String,
}

#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub handlers: Vec<Handler>,
}

#[derive(Debug)]
pub struct Method {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub code: CodeAttribute,
    pub exceptions: Vec<String>,
}

#[derive(Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub declared_count: u16,
    pub constants: Vec<Constant>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces_count: u16,
    pub fields_count: u16,
    pub methods: Vec<Method>,
    pub attributes_count: u16,
}

/// Decoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    pub offset: usize,
    pub opcode: u8,

    /// Constant pool index, local index, pushed constant, or absolute jump target
    pub operand: Option<i32>,
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> u8 {
    cursor.read_u8().expect("truncated class file")
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> u16 {
    cursor
        .read_u16::<BigEndian>()
        .expect("truncated class file")
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> u32 {
    cursor
        .read_u32::<BigEndian>()
        .expect("truncated class file")
}

fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    cursor.read_exact(&mut bytes).expect("truncated class file");
    bytes
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> ClassFile {
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_bytes(&mut cursor, 4), vec![0xCA, 0xFE, 0xBA, 0xBE]);
        let minor_version = read_u16(&mut cursor);
        let major_version = read_u16(&mut cursor);

        let declared_count = read_u16(&mut cursor);
        assert!(declared_count >= 1);
        let mut constants = vec![];
        for _ in 1..declared_count {
            let constant = match read_u8(&mut cursor) {
                1 => {
                    let len = read_u16(&mut cursor) as usize;
                    let bytes = read_bytes(&mut cursor, len);
                    Constant::Utf8(String::from_utf8(bytes).expect("non-ASCII test name"))
                }
                7 => Constant::Class(read_u16(&mut cursor)),
                9 => Constant::FieldRef(read_u16(&mut cursor), read_u16(&mut cursor)),
                10 => Constant::MethodRef(read_u16(&mut cursor), read_u16(&mut cursor)),
                11 => Constant::InterfaceMethodRef(read_u16(&mut cursor), read_u16(&mut cursor)),
                12 => Constant::NameAndType(read_u16(&mut cursor), read_u16(&mut cursor)),
                tag => panic!("unexpected constant tag {}", tag),
            };
            constants.push(constant);
        }

        let mut class = ClassFile {
            minor_version,
            major_version,
            declared_count,
            constants,
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces_count: 0,
            fields_count: 0,
            methods: vec![],
            attributes_count: 0,
        };
        class.check_references();

        class.access_flags = read_u16(&mut cursor);
        class.this_class = read_u16(&mut cursor);
        class.super_class = read_u16(&mut cursor);
        class.interfaces_count = read_u16(&mut cursor);
        for _ in 0..class.interfaces_count {
            read_u16(&mut cursor);
        }
        class.fields_count = read_u16(&mut cursor);
        assert_eq!(class.fields_count, 0, "accessors have no fields");

        let methods_count = read_u16(&mut cursor);
        for _ in 0..methods_count {
            let method = class.parse_method(&mut cursor);
            class.methods.push(method);
        }
        class.attributes_count = read_u16(&mut cursor);
        assert_eq!(cursor.position() as usize, bytes.len(), "trailing bytes");
        class
    }

    /// Every index in the pool must point at an earlier, existing entry of the right kind
    fn check_references(&self) {
        for constant in &self.constants {
            match constant {
                Constant::Utf8(_) => (),
                Constant::Class(name) => {
                    self.utf8(*name);
                }
                Constant::NameAndType(name, descriptor) => {
                    self.utf8(*name);
                    self.utf8(*descriptor);
                }
                Constant::FieldRef(class, name_and_type)
                | Constant::MethodRef(class, name_and_type)
                | Constant::InterfaceMethodRef(class, name_and_type) => {
                    self.class_name(*class);
                    self.name_and_type(*name_and_type);
                }
            }
        }
    }

    fn parse_method(&self, cursor: &mut Cursor<&[u8]>) -> Method {
        let access_flags = read_u16(cursor);
        let name = self.utf8(read_u16(cursor)).to_owned();
        let descriptor = self.utf8(read_u16(cursor)).to_owned();
        let attributes_count = read_u16(cursor);

        let mut code = None;
        let mut exceptions = vec![];
        for _ in 0..attributes_count {
            let attribute_name = self.utf8(read_u16(cursor)).to_owned();
            let len = read_u32(cursor) as usize;
            let payload = read_bytes(cursor, len);
            let mut payload = Cursor::new(&payload[..]);
            match attribute_name.as_str() {
                "Code" => code = Some(self.parse_code(&mut payload)),
                "Exceptions" => {
                    let count = read_u16(&mut payload);
                    for _ in 0..count {
                        let class = read_u16(&mut payload);
                        exceptions.push(self.class_name(class).to_owned());
                    }
                }
                other => panic!("unexpected attribute {}", other),
            }
            assert_eq!(payload.position() as usize, len, "attribute length");
        }

        Method {
            access_flags,
            name,
            descriptor,
            code: code.expect("method without code"),
            exceptions,
        }
    }

    fn parse_code(&self, cursor: &mut Cursor<&[u8]>) -> CodeAttribute {
        let max_stack = read_u16(cursor);
        let max_locals = read_u16(cursor);
        let code_len = read_u32(cursor) as usize;
        let code = read_bytes(cursor, code_len);
        let handlers_count = read_u16(cursor);
        let mut handlers = vec![];
        for _ in 0..handlers_count {
            let start = read_u16(cursor);
            let end = read_u16(cursor);
            let handler = read_u16(cursor);
            let catch_type = self.class_name(read_u16(cursor)).to_owned();
            handlers.push(Handler {
                start,
                end,
                handler,
                catch_type,
            });
        }
        assert_eq!(read_u16(cursor), 0, "no nested attributes");
        CodeAttribute {
            max_stack,
            max_locals,
            code,
            handlers,
        }
    }

    pub fn constant(&self, index: u16) -> &Constant {
        assert!(index > 0, "index 0 is never valid");
        self.constants
            .get(index as usize - 1)
            .unwrap_or_else(|| panic!("index {} out of range", index))
    }

    pub fn utf8(&self, index: u16) -> &str {
        match self.constant(index) {
            Constant::Utf8(string) => string,
            other => panic!("expected utf8 at {}, got {:?}", index, other),
        }
    }

    pub fn class_name(&self, index: u16) -> &str {
        match self.constant(index) {
            Constant::Class(name) => self.utf8(*name),
            other => panic!("expected class at {}, got {:?}", index, other),
        }
    }

    pub fn name_and_type(&self, index: u16) -> (&str, &str) {
        match self.constant(index) {
            Constant::NameAndType(name, descriptor) => (self.utf8(*name), self.utf8(*descriptor)),
            other => panic!("expected name and type at {}, got {:?}", index, other),
        }
    }

    /// Method reference rendered as `Class.name:descriptor` (with a `*` suffix for interfaces)
    pub fn method_ref(&self, index: u16) -> String {
        let (class, name_and_type, suffix) = match self.constant(index) {
            Constant::MethodRef(class, name_and_type) => (*class, *name_and_type, ""),
            Constant::InterfaceMethodRef(class, name_and_type) => (*class, *name_and_type, "*"),
            other => panic!("expected method ref at {}, got {:?}", index, other),
        };
        let (name, descriptor) = self.name_and_type(name_and_type);
        format!("{}.{}:{}{}", self.class_name(class), name, descriptor, suffix)
    }

    pub fn this_class_name(&self) -> &str {
        self.class_name(self.this_class)
    }

    pub fn super_class_name(&self) -> &str {
        self.class_name(self.super_class)
    }

    /// All class names in the pool
    pub fn class_names(&self) -> Vec<&str> {
        self.constants
            .iter()
            .filter_map(|constant| match constant {
                Constant::Class(name) => Some(self.utf8(*name)),
                _ => None,
            })
            .collect()
    }

    /// All method references in the pool
    pub fn method_refs(&self) -> Vec<String> {
        (1..self.declared_count)
            .filter(|index| {
                matches!(
                    self.constant(*index),
                    Constant::MethodRef(_, _) | Constant::InterfaceMethodRef(_, _)
                )
            })
            .map(|index| self.method_ref(index))
            .collect()
    }

    pub fn dispatch_method(&self) -> &Method {
        assert_eq!(self.methods.len(), 1);
        &self.methods[0]
    }
}

/// Decode the instructions generated accessors use
pub fn disassemble(code: &[u8]) -> Vec<Insn> {
    let mut insns = vec![];
    let mut offset = 0;
    while offset < code.len() {
        let opcode = code[offset];
        let u16_operand = || u16::from_be_bytes([code[offset + 1], code[offset + 2]]) as i32;
        let i16_operand = || i16::from_be_bytes([code[offset + 1], code[offset + 2]]) as i32;
        let (width, operand) = match opcode {
            0x01 | 0x03 | 0x2a..=0x2d | 0x4b..=0x4e | 0x32 | 0x57 | 0x59 | 0xbe | 0xb0
            | 0xbf => (1, None),
            0x10 => (2, Some(code[offset + 1] as i8 as i32)),
            0x19 | 0x3a => (2, Some(code[offset + 1] as i32)),
            0x11 => (3, Some(i16_operand())),
            0xbb | 0xc0 | 0xb6 | 0xb7 | 0xb8 => (3, Some(u16_operand())),
            0x99..=0xa7 | 0xc6 | 0xc7 => (3, Some(offset as i32 + i16_operand())),
            0xb9 => (5, Some(u16_operand())),
            other => panic!("unexpected opcode {:#x} at {}", other, offset),
        };
        insns.push(Insn {
            offset,
            opcode,
            operand,
        });
        offset += width;
    }
    insns
}

pub mod op {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_0: u8 = 0x03;
    pub const BIPUSH: u8 = 0x10;
    pub const ALOAD_1: u8 = 0x2b;
    pub const ALOAD_2: u8 = 0x2c;
    pub const ASTORE_2: u8 = 0x4d;
    pub const AALOAD: u8 = 0x32;
    pub const DUP: u8 = 0x59;
    pub const IFEQ: u8 = 0x99;
    pub const IF_ICMPEQ: u8 = 0x9f;
    pub const ARETURN: u8 = 0xb0;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const NEW: u8 = 0xbb;
    pub const ARRAYLENGTH: u8 = 0xbe;
    pub const ATHROW: u8 = 0xbf;
    pub const CHECKCAST: u8 = 0xc0;
    pub const IFNULL: u8 = 0xc6;
    pub const IFNONNULL: u8 = 0xc7;
}
