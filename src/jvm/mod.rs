//! Low-level pieces of the JVM class file format
//!
//! Nothing in here knows about accessors: these are the byte-level building blocks (a growable
//! big-endian buffer, the constant pool, descriptors, instruction encodings, and the attributes
//! we emit) that [`crate::accessor`] stitches together.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html

mod access_flags;
mod binary_format;
mod byte_buffer;
pub mod bytecode;
pub mod class_file;
mod code;
mod constants;
mod descriptors;
mod errors;
mod names;

pub use access_flags::*;
pub use binary_format::*;
pub use byte_buffer::*;
pub use code::*;
pub use constants::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
