use super::{AccessorKind, Error};
use crate::jvm::class_file::Version;
use crate::jvm::{BinaryName, Name, UnqualifiedName};

pub struct Settings {
    /// Package the generated classes go in, written as `my/package/` (with the trailing slash)
    ///
    /// An empty prefix puts the classes in the default package.
    pub package_prefix: String,

    /// Superclass of method accessors
    pub method_accessor_superclass: BinaryName,

    /// Superclass of constructor accessors
    pub constructor_accessor_superclass: BinaryName,

    /// Superclass of serialization constructor accessors
    pub serialization_constructor_accessor_superclass: BinaryName,

    /// Name of the dispatch method on method accessors
    pub invoke_method_name: UnqualifiedName,

    /// Name of the dispatch method on both sorts of constructor accessors
    pub new_instance_method_name: UnqualifiedName,

    /// Class file version of the output
    ///
    /// Generated code has branches, so this must be a version which does not require stack map
    /// frames. Assembling with any other version fails with `Error::UnsupportedVersion`.
    pub version: Version,
}

impl Settings {
    /// Package where the JDK's own accessor superclasses live
    pub const DEFAULT_PACKAGE_PREFIX: &'static str = "sun/reflect/";

    pub fn new(package_prefix: impl Into<String>) -> Result<Settings, Error> {
        let package_prefix = package_prefix.into();
        if let Some(package) = package_prefix.strip_suffix('/') {
            BinaryName::check_valid(package).map_err(Error::MalformedName)?;
        } else if !package_prefix.is_empty() {
            return Err(Error::MalformedName(format!(
                "Package prefix '{}' must be empty or end in '/'",
                package_prefix
            )));
        }

        fn make_name<N: Name>(name: impl Into<String>) -> Result<N, Error> {
            N::from_string(name.into()).map_err(Error::MalformedName)
        }

        Ok(Settings {
            method_accessor_superclass: make_name(format!(
                "{}MethodAccessorImpl",
                package_prefix
            ))?,
            constructor_accessor_superclass: make_name(format!(
                "{}ConstructorAccessorImpl",
                package_prefix
            ))?,
            serialization_constructor_accessor_superclass: make_name(format!(
                "{}SerializationConstructorAccessorImpl",
                package_prefix
            ))?,
            invoke_method_name: UnqualifiedName::INVOKE,
            new_instance_method_name: UnqualifiedName::NEWINSTANCE,
            version: Version::JAVA5,
            package_prefix,
        })
    }

    /// Settings matching the JDK's own accessors
    pub fn jdk() -> Result<Settings, Error> {
        Settings::new(Self::DEFAULT_PACKAGE_PREFIX)
    }

    /// Superclass for the given kind of accessor
    pub fn superclass(&self, kind: AccessorKind) -> &BinaryName {
        match kind {
            AccessorKind::Method => &self.method_accessor_superclass,
            AccessorKind::Constructor => &self.constructor_accessor_superclass,
            AccessorKind::SerializationConstructor => {
                &self.serialization_constructor_accessor_superclass
            }
        }
    }

    /// Name of the single dispatch method for the given kind of accessor
    pub fn dispatch_method_name(&self, kind: AccessorKind) -> &UnqualifiedName {
        match kind {
            AccessorKind::Method => &self.invoke_method_name,
            AccessorKind::Constructor | AccessorKind::SerializationConstructor => {
                &self.new_instance_method_name
            }
        }
    }
}
