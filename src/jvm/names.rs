use std::borrow::Cow;
use std::fmt::{Debug, Display, Error as FmtError, Formatter};

/// Names of methods, fields
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct UnqualifiedName(Cow<'static, str>);

/// Names of classes and interfaces
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct BinaryName(Cow<'static, str>);

/// Extracts the raw underlying string name
impl AsRef<str> for UnqualifiedName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Extracts the raw underlying string name
impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

pub trait Name: Sized {
    /// Check if a string would be a valid name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    /// Extact the raw underlying string data:
    fn as_cow(&self) -> &Cow<'static, str>;

    /// Extact the raw underlying string name
    fn as_str(&self) -> &str {
        self.as_cow().as_ref()
    }

    /// Try to construct a name from a string
    fn from_string(name: String) -> Result<Self, String>;
}

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name == "<init>" || name == "<clinit>" {
            Ok(())
        } else if name.contains(&['.', ';', '[', '/', '<', '>'][..]) {
            Err(format!(
                "Unqualified name '{}' contains an illegal character",
                name
            ))
        } else if name.is_empty() {
            Err(format!("Unqualified name '{}' is empty", name))
        } else {
            Ok(())
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(UnqualifiedName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Name for BinaryName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            Err(format!("Binary name '{}' is empty", name))
        } else if name == "<init>" || name == "<clinit>" {
            Err(format!("Binary name '{}' is a special method name", name))
        } else {
            name.split('/').map(UnqualifiedName::check_valid).collect()
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        match Self::check_valid(&name) {
            Ok(()) => Ok(BinaryName(Cow::Owned(name))),
            Err(msg) => Err(msg),
        }
    }
}

impl Debug for UnqualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Debug for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}
impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(self.0.as_ref())
    }
}

impl UnqualifiedName {
    const fn name(value: &'static str) -> UnqualifiedName {
        UnqualifiedName(Cow::Borrowed(value))
    }

    // JDK names
    pub const BOOLEANVALUE: Self = Self::name("booleanValue");
    pub const BYTEVALUE: Self = Self::name("byteValue");
    pub const CHARVALUE: Self = Self::name("charValue");
    pub const DOUBLEVALUE: Self = Self::name("doubleValue");
    pub const FLOATVALUE: Self = Self::name("floatValue");
    pub const INTVALUE: Self = Self::name("intValue");
    pub const LONGVALUE: Self = Self::name("longValue");
    pub const SHORTVALUE: Self = Self::name("shortValue");
    pub const TOSTRING: Self = Self::name("toString");

    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    // Names we generate
    pub const INVOKE: Self = Self::name("invoke");
    pub const NEWINSTANCE: Self = Self::name("newInstance");
}

impl BinaryName {
    const fn name(value: &'static str) -> BinaryName {
        BinaryName(Cow::Borrowed(value))
    }

    // JDK names
    pub const BOOLEAN: Self = Self::name("java/lang/Boolean");
    pub const BYTE: Self = Self::name("java/lang/Byte");
    pub const CHARACTER: Self = Self::name("java/lang/Character");
    pub const CLASSCASTEXCEPTION: Self = Self::name("java/lang/ClassCastException");
    pub const DOUBLE: Self = Self::name("java/lang/Double");
    pub const ERROR: Self = Self::name("java/lang/Error");
    pub const EXCEPTION: Self = Self::name("java/lang/Exception");
    pub const FLOAT: Self = Self::name("java/lang/Float");
    pub const ILLEGALARGUMENTEXCEPTION: Self = Self::name("java/lang/IllegalArgumentException");
    pub const INTEGER: Self = Self::name("java/lang/Integer");
    pub const INVOCATIONTARGETEXCEPTION: Self =
        Self::name("java/lang/reflect/InvocationTargetException");
    pub const LONG: Self = Self::name("java/lang/Long");
    pub const NULLPOINTEREXCEPTION: Self = Self::name("java/lang/NullPointerException");
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const RUNTIMEEXCEPTION: Self = Self::name("java/lang/RuntimeException");
    pub const SHORT: Self = Self::name("java/lang/Short");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binary_names() {
        assert!(BinaryName::from_string(String::from("java/lang/String")).is_ok());
        assert!(BinaryName::from_string(String::from("Foo$Bar")).is_ok());
        assert!(BinaryName::from_string(String::from("")).is_err());
        assert!(BinaryName::from_string(String::from("java.lang.String")).is_err());
        assert!(BinaryName::from_string(String::from("java//String")).is_err());
        assert!(BinaryName::from_string(String::from("<init>")).is_err());
    }

    #[test]
    fn unqualified_names() {
        assert!(UnqualifiedName::from_string(String::from("toString")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<init>")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("<foo>")).is_err());
        assert!(UnqualifiedName::from_string(String::from("a/b")).is_err());
    }
}
