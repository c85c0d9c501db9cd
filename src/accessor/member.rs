use super::{AccessorKind, Error};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, Name, UnqualifiedName};

/// What sort of member is being called
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MemberKind {
    InstanceMethod,
    StaticMethod,
    Constructor,

    /// Allocate the declared owner, but run the constructor of `target`
    ///
    /// `target` is usually a superclass of the owner (eg. the first non-serializable one), so the
    /// object gets created without running any of the owner's own constructors.
    SerializationConstructor { target: BinaryName },
}

/// Description of the member a generated accessor will call
///
/// Built once through one of the validating constructors and read-only afterwards.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemberDescriptor {
    owner: BinaryName,
    owner_is_interface: bool,
    name: UnqualifiedName,
    descriptor: MethodDescriptor,
    kind: MemberKind,
    exceptions: Vec<BinaryName>,
}

impl MemberDescriptor {
    /// Most parameter slots a method can take (including `this`)
    const MAX_PARAMETER_SLOTS: usize = 255;

    /// Virtual (or interface) method
    pub fn instance_method(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> Result<MemberDescriptor, Error> {
        Self::method(owner, name, descriptor, MemberKind::InstanceMethod)
    }

    /// Static method
    pub fn static_method(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> Result<MemberDescriptor, Error> {
        Self::method(owner, name, descriptor, MemberKind::StaticMethod)
    }

    fn method(
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        kind: MemberKind,
    ) -> Result<MemberDescriptor, Error> {
        if name == UnqualifiedName::INIT || name == UnqualifiedName::CLINIT {
            return Err(Error::MalformedName(format!(
                "'{}' is not a method name",
                name.as_str()
            )));
        }
        let member = MemberDescriptor {
            owner,
            owner_is_interface: false,
            name,
            descriptor,
            kind,
            exceptions: vec![],
        };
        member.check_parameter_slots()?;
        Ok(member)
    }

    /// Ordinary constructor
    pub fn constructor(
        owner: BinaryName,
        parameters: Vec<FieldType>,
    ) -> Result<MemberDescriptor, Error> {
        Self::initializer(owner, parameters, MemberKind::Constructor)
    }

    /// Constructor of `target`, run on a freshly allocated `owner`
    pub fn serialization_constructor(
        owner: BinaryName,
        target: BinaryName,
        parameters: Vec<FieldType>,
    ) -> Result<MemberDescriptor, Error> {
        Self::initializer(
            owner,
            parameters,
            MemberKind::SerializationConstructor { target },
        )
    }

    fn initializer(
        owner: BinaryName,
        parameters: Vec<FieldType>,
        kind: MemberKind,
    ) -> Result<MemberDescriptor, Error> {
        let member = MemberDescriptor {
            owner,
            owner_is_interface: false,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor {
                parameters,
                return_type: None,
            },
            kind,
            exceptions: vec![],
        };
        member.check_parameter_slots()?;
        Ok(member)
    }

    /// Mark the owner as an interface (so calls go through `invokeinterface`)
    pub fn with_interface_owner(mut self) -> Result<MemberDescriptor, Error> {
        match self.kind {
            MemberKind::InstanceMethod => {
                self.owner_is_interface = true;
                Ok(self)
            }
            MemberKind::StaticMethod => Err(Error::UnsupportedDescriptor(format!(
                "static interface method '{}.{}' needs a newer class file version",
                self.owner,
                self.name.as_str()
            ))),
            _ => Err(Error::UnsupportedDescriptor(format!(
                "interface '{}' has no constructors",
                self.owner
            ))),
        }
    }

    /// Set the checked exceptions the member declares
    ///
    /// `java/lang/RuntimeException` and `java/lang/Error` are dropped since they are unchecked and
    /// must propagate out of the accessor as-is.
    pub fn with_exceptions(mut self, exceptions: Vec<BinaryName>) -> MemberDescriptor {
        self.exceptions = exceptions
            .into_iter()
            .filter(|exception| {
                let unchecked =
                    *exception == BinaryName::RUNTIMEEXCEPTION || *exception == BinaryName::ERROR;
                if unchecked {
                    log::debug!("ignoring unchecked declared exception {}", exception);
                }
                !unchecked
            })
            .collect();
        self
    }

    fn check_parameter_slots(&self) -> Result<(), Error> {
        let slots = self.descriptor.parameter_length(self.has_receiver());
        if slots > Self::MAX_PARAMETER_SLOTS {
            return Err(Error::UnsupportedDescriptor(format!(
                "'{}.{}' takes {} parameter slots",
                self.owner,
                self.name.as_str(),
                slots
            )));
        }
        Ok(())
    }

    /// Type declaring the member
    pub fn owner(&self) -> &BinaryName {
        &self.owner
    }

    pub fn owner_is_interface(&self) -> bool {
        self.owner_is_interface
    }

    /// Member name (`<init>` for both sorts of constructors)
    pub fn name(&self) -> &UnqualifiedName {
        &self.name
    }

    /// Descriptor of the member itself (not of the accessor calling it)
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn parameters(&self) -> &[FieldType] {
        &self.descriptor.parameters
    }

    pub fn return_type(&self) -> Option<&FieldType> {
        self.descriptor.return_type.as_ref()
    }

    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// Declared checked exceptions, in declaration order
    pub fn exceptions(&self) -> &[BinaryName] {
        &self.exceptions
    }

    /// Class whose `<init>` or method actually gets invoked
    ///
    /// This is the owner, except for serialization constructors.
    pub fn invoked_class(&self) -> &BinaryName {
        match &self.kind {
            MemberKind::SerializationConstructor { target } => target,
            _ => &self.owner,
        }
    }

    /// Does the invocation take a receiver (or a freshly allocated object) off the stack?
    pub fn has_receiver(&self) -> bool {
        !matches!(self.kind, MemberKind::StaticMethod)
    }

    /// Is this a method which needs an instance to be called on?
    pub fn needs_instance(&self) -> bool {
        matches!(self.kind, MemberKind::InstanceMethod)
    }

    /// Sort of accessor which can call this member
    pub fn accessor_kind(&self) -> AccessorKind {
        match self.kind {
            MemberKind::InstanceMethod | MemberKind::StaticMethod => AccessorKind::Method,
            MemberKind::Constructor => AccessorKind::Constructor,
            MemberKind::SerializationConstructor { .. } => AccessorKind::SerializationConstructor,
        }
    }

    /// Check that an accessor of the given kind can call this member
    pub fn check_accessor_kind(&self, requested: AccessorKind) -> Result<(), Error> {
        let member = self.accessor_kind();
        if member == requested {
            Ok(())
        } else {
            Err(Error::KindMismatch { member, requested })
        }
    }
}
