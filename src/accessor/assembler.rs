use super::emitter::AccessorCodeEmitter;
use super::layout::{expected_constant_count, PoolLayout};
use super::{AccessorKind, Error, MemberDescriptor, Settings, SymbolAllocator};
use crate::jvm::class_file::{AttributeLike, ClassHeader, Exceptions, MethodHeader, MAGIC};
use crate::jvm::{
    self, BinaryName, ByteBuffer, ClassAccessFlags, ClassConstantIndex, ConstantPoolBuilder,
    MethodAccessFlags, Name, Serialize,
};

/// Finished accessor class, ready to be handed to a loader
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    bytes: Vec<u8>,
    class_name: BinaryName,
    this_class: ClassConstantIndex,
    super_class: ClassConstantIndex,
    kind: AccessorKind,
}

impl GeneratedImage {
    /// Serialized class file
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Name the class was generated with
    pub fn class_name(&self) -> &BinaryName {
        &self.class_name
    }

    pub fn this_class(&self) -> ClassConstantIndex {
        self.this_class
    }

    pub fn super_class(&self) -> ClassConstantIndex {
        self.super_class
    }

    pub fn kind(&self) -> AccessorKind {
        self.kind
    }
}

/// Assembles one accessor class for one member
///
/// Assembling consumes the assembler, so each one produces at most one image.
pub struct ClassImageAssembler<'a> {
    member: &'a MemberDescriptor,
    kind: AccessorKind,
    settings: Settings,
    allocator: &'a SymbolAllocator,
}

impl<'a> ClassImageAssembler<'a> {
    /// Assembler using the JDK's accessor superclasses and the process-wide name allocator
    pub fn new(
        member: &'a MemberDescriptor,
        kind: AccessorKind,
    ) -> Result<ClassImageAssembler<'a>, Error> {
        member.check_accessor_kind(kind)?;
        Ok(ClassImageAssembler {
            member,
            kind,
            settings: Settings::jdk()?,
            allocator: SymbolAllocator::global(),
        })
    }

    pub fn with_settings(mut self, settings: Settings) -> ClassImageAssembler<'a> {
        self.settings = settings;
        self
    }

    pub fn with_allocator(mut self, allocator: &'a SymbolAllocator) -> ClassImageAssembler<'a> {
        self.allocator = allocator;
        self
    }

    /// Lay out and serialize the whole class
    pub fn assemble(self) -> Result<GeneratedImage, Error> {
        if self.settings.version.requires_stack_map_frames() {
            return Err(Error::UnsupportedVersion(self.settings.version));
        }

        let class_name = self.allocator.next_name(self.kind, &self.settings)?;
        log::debug!(
            "Assembling {} for {}.{}{}",
            class_name,
            self.member.owner(),
            self.member.name().as_str(),
            jvm::RenderDescriptor::render(self.member.descriptor())
        );

        let expected = expected_constant_count(self.member, self.kind);
        let expected =
            u16::try_from(expected).map_err(|_| jvm::Error::ConstantPoolTooLarge(expected))?;

        let mut buffer = ByteBuffer::with_capacity(1024);
        buffer.put_bytes(&MAGIC);
        self.settings.version.serialize(&mut buffer)?;
        buffer.put_u16(expected);

        let mut pool = ConstantPoolBuilder::new();
        let layout = PoolLayout::emit(
            &mut pool,
            self.member,
            self.kind,
            &class_name,
            &self.settings,
        )?;
        let actual = pool.count();
        if actual != expected {
            return Err(jvm::Error::ConstantPoolCountMismatch { expected, actual }.into());
        }
        pool.serialize_entries(&mut buffer)?;
        log::trace!("{} constant pool entries", pool.len());

        let code = AccessorCodeEmitter::new(self.member, self.kind, &layout).emit()?;

        ClassHeader {
            access_flags: ClassAccessFlags::ACCESSOR,
            this_class: layout.this_class,
            super_class: layout.super_class,
            interfaces: vec![],
        }
        .serialize(&mut buffer)?;

        // Fields
        buffer.put_u16(0);

        // Methods
        buffer.put_u16(1);
        MethodHeader {
            access_flags: MethodAccessFlags::PUBLIC,
            name_index: layout.dispatch_name,
            descriptor_index: layout.dispatch_descriptor,
            attributes_count: 2,
        }
        .serialize(&mut buffer)?;
        code.write_attribute(layout.shared.code_attribute, &mut buffer)?;
        Exceptions(vec![
            layout.shared.illegal_argument_exception,
            layout.shared.invocation_target_exception,
        ])
        .write_attribute(layout.shared.exceptions_attribute, &mut buffer)?;

        // Class attributes
        buffer.put_u16(0);

        log::debug!("Assembled {} ({} bytes)", class_name, buffer.len());
        Ok(GeneratedImage {
            bytes: buffer.into_vec(),
            class_name,
            this_class: layout.this_class,
            super_class: layout.super_class,
            kind: self.kind,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Version;
    use crate::jvm::{ConstantIndex, FieldType, UnqualifiedName};

    #[test]
    fn header_and_metadata() {
        let member = MemberDescriptor::constructor(
            BinaryName::STRING,
            vec![FieldType::object(BinaryName::STRING)],
        )
        .unwrap();
        let allocator = SymbolAllocator::new();
        let image = ClassImageAssembler::new(&member, AccessorKind::Constructor)
            .unwrap()
            .with_allocator(&allocator)
            .assemble()
            .unwrap();

        assert_eq!(
            image.class_name().as_str(),
            "sun/reflect/GeneratedConstructorAccessor1"
        );
        assert_eq!(image.kind(), AccessorKind::Constructor);
        assert_eq!(ConstantIndex::from(image.this_class()), ConstantIndex(36));
        assert_eq!(ConstantIndex::from(image.super_class()), ConstantIndex(38));

        let bytes = image.bytes();
        assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);
        let count = expected_constant_count(&member, AccessorKind::Constructor) as u16;
        assert_eq!(&bytes[8..10], &count.to_be_bytes());

        // No class attributes at the very end
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
    }

    #[test]
    fn custom_package() {
        let member = MemberDescriptor::static_method(
            BinaryName::OBJECT,
            UnqualifiedName::from_string(String::from("m")).unwrap(),
            crate::jvm::MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        )
        .unwrap();
        let allocator = SymbolAllocator::new();
        let image = ClassImageAssembler::new(&member, AccessorKind::Method)
            .unwrap()
            .with_settings(Settings::new("my/pkg/").unwrap())
            .with_allocator(&allocator)
            .assemble()
            .unwrap();
        assert_eq!(
            image.class_name().as_str(),
            "my/pkg/GeneratedMethodAccessor1"
        );
    }

    #[test]
    fn versions_needing_stack_maps_are_rejected() {
        let member = MemberDescriptor::constructor(BinaryName::OBJECT, vec![]).unwrap();
        let allocator = SymbolAllocator::new();
        let mut settings = Settings::jdk().unwrap();
        settings.version = Version::JAVA8;
        let result = ClassImageAssembler::new(&member, AccessorKind::Constructor)
            .unwrap()
            .with_settings(settings)
            .with_allocator(&allocator)
            .assemble();
        assert!(matches!(
            result,
            Err(Error::UnsupportedVersion(version)) if version == Version::JAVA8
        ));

        // The refused class did not use up a name
        let image = ClassImageAssembler::new(&member, AccessorKind::Constructor)
            .unwrap()
            .with_allocator(&allocator)
            .assemble()
            .unwrap();
        assert_eq!(
            image.class_name().as_str(),
            "sun/reflect/GeneratedConstructorAccessor1"
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let member = MemberDescriptor::constructor(BinaryName::OBJECT, vec![]).unwrap();
        assert!(matches!(
            ClassImageAssembler::new(&member, AccessorKind::Method),
            Err(Error::KindMismatch {
                member: AccessorKind::Constructor,
                requested: AccessorKind::Method,
            })
        ));
    }
}
