use super::{Error, Settings};
use crate::jvm::{BinaryName, Name};
use std::sync::atomic::{AtomicU32, Ordering};

/// Sort of accessor class being generated
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AccessorKind {
    Method,
    Constructor,
    SerializationConstructor,
}

impl AccessorKind {
    pub const ALL: [AccessorKind; 3] = [
        AccessorKind::Method,
        AccessorKind::Constructor,
        AccessorKind::SerializationConstructor,
    ];

    /// Simple name of generated classes, before the serial number
    pub const fn base_name(&self) -> &'static str {
        match self {
            AccessorKind::Method => "GeneratedMethodAccessor",
            AccessorKind::Constructor => "GeneratedConstructorAccessor",
            AccessorKind::SerializationConstructor => "GeneratedSerializationConstructorAccessor",
        }
    }
}

/// Hands out unique class names for generated accessors
///
/// There is one counter per kind of accessor, so names only need to be unique within a kind (the
/// base names already keep the kinds apart). Counters are atomics: many threads can generate
/// accessors at once without ever getting the same name.
#[derive(Debug, Default)]
pub struct SymbolAllocator {
    method: AtomicU32,
    constructor: AtomicU32,
    serialization_constructor: AtomicU32,
}

static GLOBAL_ALLOCATOR: SymbolAllocator = SymbolAllocator::new();

impl SymbolAllocator {
    /// Fresh allocator whose first name for each kind ends in `1`
    pub const fn new() -> SymbolAllocator {
        SymbolAllocator {
            method: AtomicU32::new(0),
            constructor: AtomicU32::new(0),
            serialization_constructor: AtomicU32::new(0),
        }
    }

    /// Process-wide allocator
    pub fn global() -> &'static SymbolAllocator {
        &GLOBAL_ALLOCATOR
    }

    fn counter(&self, kind: AccessorKind) -> &AtomicU32 {
        match kind {
            AccessorKind::Method => &self.method,
            AccessorKind::Constructor => &self.constructor,
            AccessorKind::SerializationConstructor => &self.serialization_constructor,
        }
    }

    /// Next serial number for the kind
    pub fn next_serial(&self, kind: AccessorKind) -> u32 {
        self.counter(kind).fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Next class name for the kind, in the package from the settings
    pub fn next_name(&self, kind: AccessorKind, settings: &Settings) -> Result<BinaryName, Error> {
        let serial = self.next_serial(kind);
        let name = format!("{}{}{}", settings.package_prefix, kind.base_name(), serial);
        BinaryName::from_string(name).map_err(Error::MalformedName)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_count_up_per_kind() {
        let settings = Settings::jdk().unwrap();
        let allocator = SymbolAllocator::new();
        let first = allocator.next_name(AccessorKind::Method, &settings).unwrap();
        let second = allocator.next_name(AccessorKind::Method, &settings).unwrap();
        let constructor = allocator
            .next_name(AccessorKind::Constructor, &settings)
            .unwrap();
        assert_eq!(first.as_str(), "sun/reflect/GeneratedMethodAccessor1");
        assert_eq!(second.as_str(), "sun/reflect/GeneratedMethodAccessor2");
        assert_eq!(
            constructor.as_str(),
            "sun/reflect/GeneratedConstructorAccessor1"
        );
        assert_eq!(
            allocator
                .next_name(AccessorKind::SerializationConstructor, &settings)
                .unwrap()
                .as_str(),
            "sun/reflect/GeneratedSerializationConstructorAccessor1"
        );
    }

    #[test]
    fn independent_allocators() {
        let first = SymbolAllocator::new();
        let second = SymbolAllocator::new();
        assert_eq!(first.next_serial(AccessorKind::Constructor), 1);
        assert_eq!(first.next_serial(AccessorKind::Constructor), 2);
        assert_eq!(second.next_serial(AccessorKind::Constructor), 1);
    }

    #[test]
    fn concurrent_serials_are_unique() {
        let allocator = SymbolAllocator::new();
        let mut serials: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..1000)
                            .map(|_| allocator.next_serial(AccessorKind::Method))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });
        serials.sort_unstable();
        serials.dedup();
        assert_eq!(serials.len(), 8000);
        assert_eq!(serials.first(), Some(&1));
        assert_eq!(serials.last(), Some(&8000));
    }
}
