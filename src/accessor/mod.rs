//! Generation of accessor classes
//!
//! An accessor is a tiny class extending one of the JDK's accessor superclasses with a single
//! public dispatch method. That method unpacks an `Object[]` of arguments, calls one particular
//! member directly (no reflection), and boxes up the result:
//!
//! ```text
//! public final class GeneratedMethodAccessor1 extends MethodAccessorImpl {
//!     public Object invoke(Object receiver, Object[] arguments)
//!         throws IllegalArgumentException, InvocationTargetException;
//! }
//!
//! public final class GeneratedConstructorAccessor1 extends ConstructorAccessorImpl {
//!     public Object newInstance(Object[] arguments)
//!         throws IllegalArgumentException, InvocationTargetException;
//! }
//! ```

mod assembler;
pub mod codec;
mod emitter;
mod errors;
pub mod layout;
mod loader;
mod member;
mod naming;
mod settings;

pub use assembler::*;
pub use emitter::*;
pub use errors::*;
pub use loader::*;
pub use member::*;
pub use naming::*;
pub use settings::*;

/// Generate the class file of an accessor for `member`
///
/// This uses the JDK's accessor superclasses and the process-wide name allocator. Use
/// [`ClassImageAssembler`] directly for anything else.
pub fn generate(member: &MemberDescriptor, kind: AccessorKind) -> Result<Vec<u8>, Error> {
    ClassImageAssembler::new(member, kind)?
        .assemble()
        .map(GeneratedImage::into_bytes)
}
