//! Generate JVM classes which dispatch reflective calls directly
//!
//! Reflective invocation of a method or constructor on the JVM normally goes through a slow,
//! generic path. The classes produced here replace that path: each one extends an accessor base
//! class and implements exactly one dispatch method (`invoke` or `newInstance`) whose body unpacks
//! an `Object[]` of arguments and calls the target member with a plain invoke instruction.
//!
//! The [`jvm`] module contains the class file building blocks (constant pool, descriptors,
//! bytecode encoding) and the [`accessor`] module uses them to assemble accessor classes.

pub mod accessor;
pub mod jvm;
