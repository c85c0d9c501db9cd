use super::{BinaryName, Name};
use std::io::{Error, ErrorKind, Result};
use std::iter::Peekable;
use std::str::Chars;

/// Utility trait for converting descriptors to and from string representations
pub trait RenderDescriptor {
    /// Turn the descriptor into a string
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Write the descriptor to a string
    fn render_to(&self, write_to: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a descriptor from a string
    fn parse(source: &str) -> Result<Self> {
        let mut chars = source.chars().peekable();
        let ret = Self::parse_from(&mut chars)?;
        match chars.next() {
            None => Ok(ret),
            Some(c) => {
                let msg = format!("Unexpected leftover input '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }

    /// Read the descriptor from a character buffer
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self>;
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BaseType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl BaseType {
    /// Every primitive type, in a fixed order
    pub const ALL: [BaseType; 8] = [
        BaseType::Boolean,
        BaseType::Byte,
        BaseType::Char,
        BaseType::Short,
        BaseType::Int,
        BaseType::Long,
        BaseType::Float,
        BaseType::Double,
    ];

    /// Number of local variable or operand stack slots a value of this type occupies
    pub const fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        let c = match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        };
        write_to.push(c);
    }
}

impl ParseDescriptor for BaseType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        let typ = match source.next() {
            Some('B') => BaseType::Byte,
            Some('C') => BaseType::Char,
            Some('D') => BaseType::Double,
            Some('F') => BaseType::Float,
            Some('I') => BaseType::Int,
            Some('J') => BaseType::Long,
            Some('S') => BaseType::Short,
            Some('Z') => BaseType::Boolean,
            Some(c) => {
                let msg = format!("Invalid base type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing base type character";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        };
        Ok(typ)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),
    ObjectArray(ArrayType<BinaryName>),
    PrimitiveArray(ArrayType<BaseType>),
}

/// Generic array type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Additional dimensions (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Underlying element type (`A` is the underlying element type of `A[][]`)
    pub element_type: T,
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        for _ in 0..=self.additional_dimensions {
            write_to.push('[');
        }
        self.element_type.render_to(write_to);
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        if let Some('L') = source.next() {
            let mut class_name = String::new();
            loop {
                let c: char = source.next().ok_or_else(|| {
                    let msg = format!("Missing terminator for 'L{}'", class_name);
                    Error::new(ErrorKind::UnexpectedEof, msg)
                })?;
                if c == ';' {
                    return BinaryName::from_string(class_name)
                        .map_err(|msg| Error::new(ErrorKind::InvalidInput, msg));
                } else {
                    class_name.push(c)
                }
            }
        } else {
            Err(Error::new(
                ErrorKind::InvalidInput,
                "Expected object type to start with `L`",
            ))
        }
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(cls) => cls.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
        }
    }
}

impl ParseDescriptor for RefType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        Ok(match source.peek().copied() {
            Some('L') => RefType::Object(BinaryName::parse_from(source)?),
            Some('[') => {
                source.next();
                let mut additional_dimensions = 0;
                while let Some('[') = source.peek().copied() {
                    additional_dimensions += 1;
                    source.next();
                }
                if let Some('L') = source.peek().copied() {
                    RefType::ObjectArray(ArrayType {
                        additional_dimensions,
                        element_type: BinaryName::parse_from(source)?,
                    })
                } else {
                    RefType::PrimitiveArray(ArrayType {
                        additional_dimensions,
                        element_type: BaseType::parse_from(source)?,
                    })
                }
            }
            Some(c) => {
                let msg = format!("Invalid reference type character '{}'", c);
                return Err(Error::new(ErrorKind::InvalidInput, msg));
            }
            None => {
                let msg = "Missing field type";
                return Err(Error::new(ErrorKind::UnexpectedEof, msg));
            }
        })
    }
}

impl RefType {
    pub fn array(field_type: FieldType) -> RefType {
        match field_type {
            FieldType::Base(element_type) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::Object(element_type)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: 0,
                element_type,
            }),
            FieldType::Ref(RefType::PrimitiveArray(arr)) => RefType::PrimitiveArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
            FieldType::Ref(RefType::ObjectArray(arr)) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions + 1,
                element_type: arr.element_type,
            }),
        }
    }

    /// Name to put in a `CONSTANT_Class_info` for this type
    ///
    /// Object types use their binary name, but array types use their full descriptor (eg. the
    /// class constant for `String[]` is `[Ljava/lang/String;`). See [this section][0] for more.
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4.1
    pub fn class_constant_name(&self) -> String {
        match self {
            RefType::Object(class) => class.as_str().to_owned(),
            other => other.render(),
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl FieldType {
    pub fn array(field_type: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(field_type))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn char() -> FieldType {
        FieldType::Base(BaseType::Char)
    }

    /// Number of local variable or operand stack slots a value of this type occupies
    pub fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }

    /// Is this exactly `java/lang/Object`?
    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Ref(RefType::Object(name)) if *name == BinaryName::OBJECT)
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(reference_type) => reference_type.render_to(write_to),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        match source.peek().copied() {
            None => Err(Error::new(ErrorKind::UnexpectedEof, "Missing field type")),
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                BaseType::parse_from(source).map(FieldType::Base)
            }
            Some('L' | '[') => RefType::parse_from(source).map(FieldType::Ref),
            Some(c) => {
                let msg = format!("Invalid field type character '{}'", c);
                Err(Error::new(ErrorKind::InvalidInput, msg))
            }
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>, // `None` is for `void` (ie. no return)
}

impl MethodDescriptor {
    /// Total length of parameters (not the same as the length of the vector),
    /// which must be 255 or less for it to be valid
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let mut len = if has_this_param { 1 } else { 0 };
        for parameter in &self.parameters {
            len += parameter.width();
        }
        len
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(typ) => typ.render_to(write_to),
        };
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn parse_from(source: &mut Peekable<Chars>) -> Result<Self> {
        // Assert open paren
        if source.next() != Some('(') {
            let msg = "Expected '(' for method";
            return Err(Error::new(ErrorKind::InvalidInput, msg));
        }

        // Parse parameters
        let mut parameters = vec![];
        while source.peek().copied() != Some(')') {
            parameters.push(FieldType::parse_from(source)?);
        }

        // Close paren (already peeked)
        let _ = source.next();

        // Parse return
        let return_type = if let Some('V') = source.peek().copied() {
            let _ = source.next();
            None
        } else {
            Some(FieldType::parse_from(source)?)
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fmt::Debug;

    fn round_trip<T: RenderDescriptor + ParseDescriptor + Debug + Eq>(rendered: &str, parsed: T) {
        assert_eq!(rendered, parsed.render());
        assert_eq!(T::parse(rendered).unwrap(), parsed);
    }

    const INT: FieldType = FieldType::Base(BaseType::Int);
    const DOUBLE: FieldType = FieldType::Base(BaseType::Double);
    const OBJECT: FieldType = FieldType::object(BinaryName::OBJECT);
    const STRING: FieldType = FieldType::object(BinaryName::STRING);
    const INTEGER: FieldType = FieldType::object(BinaryName::INTEGER);

    #[test]
    fn base_types() {
        round_trip("B", BaseType::Byte);
        round_trip("C", BaseType::Char);
        round_trip("D", BaseType::Double);
        round_trip("F", BaseType::Float);
        round_trip("I", BaseType::Int);
        round_trip("J", BaseType::Long);
        round_trip("S", BaseType::Short);
        round_trip("Z", BaseType::Boolean);
    }

    #[test]
    fn field_types() {
        round_trip("I", INT);
        round_trip("Ljava/lang/Object;", OBJECT);
        round_trip(
            "[[[D",
            FieldType::array(FieldType::array(FieldType::array(DOUBLE))),
        );
        round_trip("[Ljava/lang/String;", FieldType::array(STRING));
    }

    #[test]
    fn method_descriptors() {
        round_trip(
            "(IDLjava/lang/Integer;)Ljava/lang/Object;",
            MethodDescriptor {
                parameters: vec![INT, DOUBLE, INTEGER],
                return_type: Some(OBJECT),
            },
        );
        round_trip(
            "()V",
            MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        );
    }

    #[test]
    fn bad_descriptors() {
        assert!(FieldType::parse("V").is_err());
        assert!(FieldType::parse("Ljava/lang/String").is_err());
        assert!(FieldType::parse("II").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
    }

    #[test]
    fn class_constant_names() {
        assert_eq!(
            RefType::Object(BinaryName::STRING).class_constant_name(),
            "java/lang/String"
        );
        assert_eq!(
            RefType::array(FieldType::array(STRING)).class_constant_name(),
            "[[Ljava/lang/String;"
        );
        assert_eq!(RefType::array(INT).class_constant_name(), "[I");
    }

    #[test]
    fn parameter_slots() {
        let descriptor = MethodDescriptor::parse("(JILjava/lang/String;D)V").unwrap();
        assert_eq!(descriptor.parameter_length(false), 6);
        assert_eq!(descriptor.parameter_length(true), 7);
    }
}
