//! Handing generated classes over to something that can load them
//!
//! Actually loading a class into a running JVM is outside of this crate. The traits here describe
//! what such a loader looks like, and [`DirectoryLoader`] is the one loader that needs nothing
//! more than a file system: it writes the class where a class path can pick it up.

use super::{Error, GeneratedImage};
use crate::jvm::Name;
use std::fs;
use std::path::{Path, PathBuf};

/// Something that turns a finished image into a live object
pub trait AccessorLoader {
    /// Defining context (eg. the class loader the accessor should be defined in)
    type Context;

    /// What a successful definition produces
    type Handle;

    type Error;

    fn define(
        &self,
        image: &GeneratedImage,
        context: &Self::Context,
    ) -> Result<Self::Handle, Self::Error>;
}

/// Live accessor object, as returned by a JVM-backed loader
///
/// Calls follow the fixed dispatch descriptors: `invoke(receiver, arguments)` for method
/// accessors and `newInstance(arguments)` for constructor accessors.
pub trait CallableHandle {
    /// Reference to a JVM object
    type Value;

    /// Whatever the JVM threw
    type Error;

    fn invoke(
        &self,
        receiver: Option<&Self::Value>,
        arguments: &[Self::Value],
    ) -> Result<Option<Self::Value>, Self::Error>;

    fn new_instance(&self, arguments: &[Self::Value]) -> Result<Self::Value, Self::Error>;
}

/// Loader which writes each class to `<root>/<class name>.class`
///
/// The context is ignored. The handle is the path of the written class file. Names are only unique
/// per allocator, so a class file left behind by an earlier process gets overwritten.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> DirectoryLoader {
        DirectoryLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the class file for an image goes
    pub fn class_file_path(&self, image: &GeneratedImage) -> PathBuf {
        let mut path = self.root.clone();
        for segment in image.class_name().as_str().split('/') {
            path.push(segment);
        }
        path.set_extension("class");
        path
    }
}

impl AccessorLoader for DirectoryLoader {
    type Context = ();
    type Handle = PathBuf;
    type Error = Error;

    fn define(&self, image: &GeneratedImage, _context: &()) -> Result<PathBuf, Error> {
        let path = self.class_file_path(image);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            log::warn!("Overwriting existing class file '{}'", path.display());
        } else {
            log::info!("Writing '{}'", path.display());
        }
        fs::write(&path, image.bytes())?;
        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::accessor::{
        AccessorKind, ClassImageAssembler, MemberDescriptor, Settings, SymbolAllocator,
    };
    use crate::jvm::BinaryName;

    fn image() -> GeneratedImage {
        image_for(&MemberDescriptor::constructor(BinaryName::OBJECT, vec![]).unwrap())
    }

    fn image_for(member: &MemberDescriptor) -> GeneratedImage {
        let allocator = SymbolAllocator::new();
        ClassImageAssembler::new(member, AccessorKind::Constructor)
            .unwrap()
            .with_settings(Settings::new("gen/").unwrap())
            .with_allocator(&allocator)
            .assemble()
            .unwrap()
    }

    #[test]
    fn class_file_paths() {
        let loader = DirectoryLoader::new("out");
        assert_eq!(
            loader.class_file_path(&image()),
            Path::new("out/gen/GeneratedConstructorAccessor1.class")
        );
    }

    #[test]
    fn writes_class_files() {
        let root = std::env::temp_dir().join(format!("accessorgen-loader-{}", std::process::id()));
        let loader = DirectoryLoader::new(&root);
        let image = image();
        let path = loader.define(&image, &()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), image.bytes());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn rewriting_replaces_earlier_class_files() {
        let root = std::env::temp_dir().join(format!("accessorgen-rewrite-{}", std::process::id()));
        let loader = DirectoryLoader::new(&root);
        let first = image();
        let second = image_for(
            &MemberDescriptor::constructor(BinaryName::STRING, vec![]).unwrap(),
        );
        assert_eq!(first.class_name(), second.class_name());

        let path = loader.define(&first, &()).unwrap();
        assert_eq!(loader.define(&second, &()).unwrap(), path);
        assert_eq!(fs::read(&path).unwrap(), second.bytes());
        fs::remove_dir_all(&root).unwrap();
    }
}
