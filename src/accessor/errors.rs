use super::AccessorKind;
use crate::jvm;

#[derive(Debug)]
pub enum Error {
    /// Low-level failure while laying out the class file (including internal consistency checks
    /// such as the constant pool count)
    BytecodeGen(jvm::Error),

    /// The requested accessor kind cannot call this sort of member
    KindMismatch {
        member: AccessorKind,
        requested: AccessorKind,
    },

    MalformedName(String),

    /// The member has a shape that generated accessors cannot call
    UnsupportedDescriptor(String),

    /// Generated methods branch without `StackMapTable` frames, which this class file version
    /// would demand
    UnsupportedVersion(jvm::class_file::Version),

    Io(std::io::Error),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::BytecodeGen(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
