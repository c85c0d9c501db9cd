//! Constant pool layout of an accessor class
//!
//! The pool is laid out in a fixed order: the entries shared by every accessor, then the entries
//! specific to this accessor and its target member, then the boxing entries for the primitive
//! types the member actually uses. [`expected_constant_count`] computes the size of that layout
//! without building anything, and [`PoolLayout::emit`] builds it. The two must agree exactly.

use super::codec::{boxing_plans, invocation_descriptor, BoxingPlan};
use super::{AccessorKind, Error, MemberDescriptor, MemberKind, Settings};
use crate::jvm::class_file::{AttributeLike, Code, Exceptions};
use crate::jvm::{
    BaseType, BinaryName, ClassConstantIndex, ConstantPoolBuilder, FieldType, MethodDescriptor,
    MethodRefConstantIndex, Name, NameAndTypeConstantIndex, RefType, RenderDescriptor,
    UnqualifiedName, Utf8ConstantIndex,
};
use std::collections::BTreeMap;

/// Entries every accessor class carries, whether or not its code needs them all
#[derive(Debug)]
pub struct SharedEntries {
    /// Attribute name `Code`
    pub code_attribute: Utf8ConstantIndex,

    /// Attribute name `Exceptions`
    pub exceptions_attribute: Utf8ConstantIndex,

    pub object: ClassConstantIndex,
    pub exception: ClassConstantIndex,
    pub class_cast_exception: ClassConstantIndex,
    pub null_pointer_exception: ClassConstantIndex,
    pub illegal_argument_exception: ClassConstantIndex,
    pub invocation_target_exception: ClassConstantIndex,

    /// Name `<init>`
    pub init_name: Utf8ConstantIndex,

    pub exception_init: MethodRefConstantIndex,
    pub exception_init_string: MethodRefConstantIndex,
    pub class_cast_exception_init: MethodRefConstantIndex,
    pub class_cast_exception_init_string: MethodRefConstantIndex,
    pub null_pointer_exception_init: MethodRefConstantIndex,
    pub null_pointer_exception_init_string: MethodRefConstantIndex,
    pub illegal_argument_exception_init: MethodRefConstantIndex,
    pub illegal_argument_exception_init_string: MethodRefConstantIndex,

    /// `InvocationTargetException(Throwable)`
    pub invocation_target_exception_init: MethodRefConstantIndex,

    /// `Object#toString()`
    pub object_to_string: MethodRefConstantIndex,
}

impl SharedEntries {
    /// Number of pool entries added by [`SharedEntries::emit`]
    pub const ENTRY_COUNT: usize = 34;

    pub fn emit(pool: &mut ConstantPoolBuilder) -> Result<SharedEntries, Error> {
        let code_attribute = pool.add_utf8(Code::NAME)?;
        let exceptions_attribute = pool.add_utf8(Exceptions::NAME)?;

        let object = pool.add_class_named(BinaryName::OBJECT.as_str())?;
        let exception = pool.add_class_named(BinaryName::EXCEPTION.as_str())?;
        let class_cast_exception = pool.add_class_named(BinaryName::CLASSCASTEXCEPTION.as_str())?;
        let null_pointer_exception =
            pool.add_class_named(BinaryName::NULLPOINTEREXCEPTION.as_str())?;
        let illegal_argument_exception =
            pool.add_class_named(BinaryName::ILLEGALARGUMENTEXCEPTION.as_str())?;
        let invocation_target_exception =
            pool.add_class_named(BinaryName::INVOCATIONTARGETEXCEPTION.as_str())?;

        let init_name = pool.add_utf8(UnqualifiedName::INIT.as_str())?;
        let no_arg = pool.add_utf8(Self::NO_ARG_INIT)?;
        let no_arg = pool.add_name_and_type(init_name, no_arg)?;
        let string_arg = pool.add_utf8(Self::STRING_INIT)?;
        let string_arg = pool.add_name_and_type(init_name, string_arg)?;
        let throwable_arg = pool.add_utf8(Self::THROWABLE_INIT)?;
        let throwable_arg = pool.add_name_and_type(init_name, throwable_arg)?;

        let exception_init = pool.add_method_ref(exception, no_arg)?;
        let exception_init_string = pool.add_method_ref(exception, string_arg)?;
        let class_cast_exception_init = pool.add_method_ref(class_cast_exception, no_arg)?;
        let class_cast_exception_init_string =
            pool.add_method_ref(class_cast_exception, string_arg)?;
        let null_pointer_exception_init = pool.add_method_ref(null_pointer_exception, no_arg)?;
        let null_pointer_exception_init_string =
            pool.add_method_ref(null_pointer_exception, string_arg)?;
        let illegal_argument_exception_init =
            pool.add_method_ref(illegal_argument_exception, no_arg)?;
        let illegal_argument_exception_init_string =
            pool.add_method_ref(illegal_argument_exception, string_arg)?;
        let invocation_target_exception_init =
            pool.add_method_ref(invocation_target_exception, throwable_arg)?;

        let to_string = pool.add_utf8(UnqualifiedName::TOSTRING.as_str())?;
        let to_string_descriptor = pool.add_utf8(Self::TO_STRING)?;
        let to_string = pool.add_name_and_type(to_string, to_string_descriptor)?;
        let object_to_string = pool.add_method_ref(object, to_string)?;

        Ok(SharedEntries {
            code_attribute,
            exceptions_attribute,
            object,
            exception,
            class_cast_exception,
            null_pointer_exception,
            illegal_argument_exception,
            invocation_target_exception,
            init_name,
            exception_init,
            exception_init_string,
            class_cast_exception_init,
            class_cast_exception_init_string,
            null_pointer_exception_init,
            null_pointer_exception_init_string,
            illegal_argument_exception_init,
            illegal_argument_exception_init_string,
            invocation_target_exception_init,
            object_to_string,
        })
    }

    const NO_ARG_INIT: &'static str = "()V";
    const STRING_INIT: &'static str = "(Ljava/lang/String;)V";
    const THROWABLE_INIT: &'static str = "(Ljava/lang/Throwable;)V";
    const TO_STRING: &'static str = "()Ljava/lang/String;";

    /// Descriptor of the no-argument exception constructors
    pub fn no_arg_init_descriptor() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![],
            return_type: None,
        }
    }

    /// Descriptor of `InvocationTargetException(Throwable)`
    pub fn throwable_init_descriptor() -> MethodDescriptor {
        MethodDescriptor {
            parameters: vec![FieldType::object(BinaryName::THROWABLE)],
            return_type: None,
        }
    }
}

/// Entries needed to box and unbox one primitive type
#[derive(Debug)]
pub struct BoxingEntries {
    pub plan: BoxingPlan,
    pub wrapper: ClassConstantIndex,

    /// Wrapper constructor taking the primitive
    pub box_method: MethodRefConstantIndex,

    /// `xValue()` accessor on the wrapper
    pub unbox_method: MethodRefConstantIndex,
}

impl BoxingEntries {
    /// Number of pool entries added per primitive type
    pub const ENTRY_COUNT: usize = 9;

    fn emit(
        pool: &mut ConstantPoolBuilder,
        shared: &SharedEntries,
        plan: BoxingPlan,
    ) -> Result<BoxingEntries, Error> {
        let wrapper = pool.add_class_named(plan.wrapper.as_str())?;

        let box_descriptor = pool.add_utf8(plan.box_descriptor.render())?;
        let box_name_and_type = pool.add_name_and_type(shared.init_name, box_descriptor)?;
        let box_method = pool.add_method_ref(wrapper, box_name_and_type)?;

        let unbox_name = pool.add_utf8(plan.unbox_name.as_str())?;
        let unbox_descriptor = pool.add_utf8(plan.unbox_descriptor.render())?;
        let unbox_name_and_type = pool.add_name_and_type(unbox_name, unbox_descriptor)?;
        let unbox_method = pool.add_method_ref(wrapper, unbox_name_and_type)?;

        Ok(BoxingEntries {
            plan,
            wrapper,
            box_method,
            unbox_method,
        })
    }
}

/// Handlers letting unchecked throwables escape before the wrapping handlers see them
#[derive(Debug)]
pub struct UncheckedGuards {
    pub runtime_exception: ClassConstantIndex,
    pub error: ClassConstantIndex,
}

/// Every constant pool index the rest of the class refers to
#[derive(Debug)]
pub struct PoolLayout {
    pub shared: SharedEntries,
    pub this_class: ClassConstantIndex,
    pub super_class: ClassConstantIndex,

    /// Declared owner of the member (allocated by constructor accessors)
    pub owner: ClassConstantIndex,

    /// Method (or `<init>`) invoked by the accessor
    pub target_method: MethodRefConstantIndex,

    /// Name of the dispatch method
    pub dispatch_name: Utf8ConstantIndex,

    /// Descriptor of the dispatch method
    pub dispatch_descriptor: Utf8ConstantIndex,

    /// Class to `checkcast` each parameter to (`None` for primitives and `java/lang/Object`)
    pub parameter_classes: Vec<Option<ClassConstantIndex>>,

    /// Declared checked exceptions, which get wrapped in `InvocationTargetException`
    pub declared_exceptions: Vec<ClassConstantIndex>,

    pub unchecked_guards: Option<UncheckedGuards>,

    pub boxing: BTreeMap<BaseType, BoxingEntries>,
}

/// Does a declared exception list need unchecked throwables filtered out before wrapping?
///
/// The target may throw `RuntimeException` or `Error` subclasses through any of its declared
/// types (including undeclared unchecked ones listed in its `throws` clause), so the guards are
/// emitted as soon as anything gets wrapped.
pub fn needs_unchecked_guards(member: &MemberDescriptor) -> bool {
    !member.exceptions().is_empty()
}

/// Type which needs a `checkcast` (and hence a class entry) when passed as a parameter
fn parameter_class(parameter: &FieldType) -> Option<&RefType> {
    match parameter {
        FieldType::Ref(ref_type) if !parameter.is_object() => Some(ref_type),
        _ => None,
    }
}

/// Value of the `constant_pool_count` field for an accessor calling this member
///
/// This is worked out purely from the shape of the member, before anything is emitted.
pub fn expected_constant_count(member: &MemberDescriptor, kind: AccessorKind) -> usize {
    let mut entries = SharedEntries::ENTRY_COUNT;

    // This class, superclass, owner
    entries += 2 + 2 + 2;
    if let MemberKind::SerializationConstructor { .. } = member.kind() {
        entries += 2;
    }

    // Target member: constructors reuse the shared `<init>` name
    if kind == AccessorKind::Method {
        entries += 1;
    }
    entries += 3;

    // Dispatch method name and descriptor
    entries += 2;

    entries += 2 * member
        .parameters()
        .iter()
        .filter(|parameter| parameter_class(parameter).is_some())
        .count();

    // `java/lang/Exception` is already a shared entry
    entries += 2 * member
        .exceptions()
        .iter()
        .filter(|exception| **exception != BinaryName::EXCEPTION)
        .count();
    if needs_unchecked_guards(member) {
        entries += 4;
    }

    entries += BoxingEntries::ENTRY_COUNT * boxing_plans(member).len();

    entries + 1
}

impl PoolLayout {
    /// Add all of the entries for an accessor class named `class_name` to an empty pool
    pub fn emit(
        pool: &mut ConstantPoolBuilder,
        member: &MemberDescriptor,
        kind: AccessorKind,
        class_name: &BinaryName,
        settings: &Settings,
    ) -> Result<PoolLayout, Error> {
        let shared = SharedEntries::emit(pool)?;

        let this_class = pool.add_class_named(class_name.as_str())?;
        let super_class = pool.add_class_named(settings.superclass(kind).as_str())?;
        let owner = pool.add_class_named(member.owner().as_str())?;
        let invoked_class = match member.kind() {
            MemberKind::SerializationConstructor { target } => {
                pool.add_class_named(target.as_str())?
            }
            _ => owner,
        };

        let member_name = match kind {
            AccessorKind::Method => pool.add_utf8(member.name().as_str())?,
            AccessorKind::Constructor | AccessorKind::SerializationConstructor => {
                shared.init_name
            }
        };
        let member_descriptor = pool.add_utf8(member.descriptor().render())?;
        let member_name_and_type: NameAndTypeConstantIndex =
            pool.add_name_and_type(member_name, member_descriptor)?;
        let target_method = if member.owner_is_interface() {
            pool.add_interface_method_ref(invoked_class, member_name_and_type)?
        } else {
            pool.add_method_ref(invoked_class, member_name_and_type)?
        };

        let dispatch_name = pool.add_utf8(settings.dispatch_method_name(kind).as_str())?;
        let dispatch_descriptor = pool.add_utf8(invocation_descriptor(kind).render())?;

        let mut parameter_classes = Vec::with_capacity(member.parameters().len());
        for parameter in member.parameters() {
            let class = match parameter_class(parameter) {
                Some(ref_type) => Some(pool.add_class_named(ref_type.class_constant_name())?),
                None => None,
            };
            parameter_classes.push(class);
        }

        let mut declared_exceptions = Vec::with_capacity(member.exceptions().len());
        for exception in member.exceptions() {
            let class = if *exception == BinaryName::EXCEPTION {
                shared.exception
            } else {
                pool.add_class_named(exception.as_str())?
            };
            declared_exceptions.push(class);
        }

        let unchecked_guards = if needs_unchecked_guards(member) {
            Some(UncheckedGuards {
                runtime_exception: pool.add_class_named(BinaryName::RUNTIMEEXCEPTION.as_str())?,
                error: pool.add_class_named(BinaryName::ERROR.as_str())?,
            })
        } else {
            None
        };

        let mut boxing = BTreeMap::new();
        for plan in boxing_plans(member) {
            let primitive = plan.primitive;
            boxing.insert(primitive, BoxingEntries::emit(pool, &shared, plan)?);
        }

        Ok(PoolLayout {
            shared,
            this_class,
            super_class,
            owner,
            target_method,
            dispatch_name,
            dispatch_descriptor,
            parameter_classes,
            declared_exceptions,
            unchecked_guards,
            boxing,
        })
    }

    /// Entries for boxing a primitive type
    pub fn boxing_for(&self, primitive: BaseType) -> Result<&BoxingEntries, Error> {
        self.boxing.get(&primitive).ok_or_else(|| {
            Error::UnsupportedDescriptor(format!("no boxing entries for {:?}", primitive))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{Constant, ConstantIndex, ParseDescriptor};

    fn name(s: &str) -> UnqualifiedName {
        UnqualifiedName::from_string(s.to_owned()).unwrap()
    }

    fn class(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    fn check_count(member: &MemberDescriptor) -> PoolLayout {
        let settings = Settings::jdk().unwrap();
        let kind = member.accessor_kind();
        let mut pool = ConstantPoolBuilder::new();
        let layout =
            PoolLayout::emit(&mut pool, member, kind, &class("Accessor1"), &settings).unwrap();
        assert_eq!(pool.count() as usize, expected_constant_count(member, kind));
        layout
    }

    #[test]
    fn shared_entry_count() {
        let mut pool = ConstantPoolBuilder::new();
        let shared = SharedEntries::emit(&mut pool).unwrap();
        assert_eq!(pool.len(), SharedEntries::ENTRY_COUNT);
        assert_eq!(
            pool.get(shared.code_attribute.into()),
            Some(&Constant::Utf8(String::from("Code")))
        );
    }

    #[test]
    fn counts_agree_for_methods() {
        let descriptor = MethodDescriptor::parse("(ILjava/lang/Object;[IJLjava/lang/String;)D").unwrap();
        let member =
            MemberDescriptor::instance_method(class("a/B"), name("m"), descriptor).unwrap();
        let layout = check_count(&member);
        assert_eq!(layout.parameter_classes.iter().filter(|c| c.is_some()).count(), 2);
        let boxed: Vec<BaseType> = layout.boxing.keys().copied().collect();
        assert_eq!(boxed, vec![BaseType::Int, BaseType::Long, BaseType::Double]);
        assert_eq!(
            expected_constant_count(&member, AccessorKind::Method),
            1 + 34 + 6 + 4 + 2 + 4 + 27
        );
    }

    #[test]
    fn counts_agree_for_constructors() {
        let member = MemberDescriptor::constructor(
            class("a/B"),
            vec![FieldType::object(BinaryName::STRING), FieldType::int()],
        )
        .unwrap();
        check_count(&member);
        assert_eq!(
            expected_constant_count(&member, AccessorKind::Constructor),
            1 + 34 + 6 + 3 + 2 + 2 + 9
        );

        let member =
            MemberDescriptor::serialization_constructor(class("a/B"), BinaryName::OBJECT, vec![])
                .unwrap();
        check_count(&member);
    }

    #[test]
    fn counts_agree_with_exceptions() {
        let io = class("java/io/IOException");
        let member = MemberDescriptor::constructor(class("a/B"), vec![])
            .unwrap()
            .with_exceptions(vec![io.clone(), BinaryName::EXCEPTION]);
        let layout = check_count(&member);
        assert_eq!(layout.declared_exceptions.len(), 2);
        assert_eq!(layout.declared_exceptions[1], layout.shared.exception);
        assert!(layout.unchecked_guards.is_some());

        let member = MemberDescriptor::constructor(class("a/B"), vec![])
            .unwrap()
            .with_exceptions(vec![io]);
        let layout = check_count(&member);
        assert!(layout.unchecked_guards.is_some());

        let member = MemberDescriptor::constructor(class("a/B"), vec![]).unwrap();
        let layout = check_count(&member);
        assert!(layout.unchecked_guards.is_none());
    }

    #[test]
    fn interface_targets() {
        let descriptor = MethodDescriptor::parse("()V").unwrap();
        let member = MemberDescriptor::instance_method(class("java/lang/Runnable"), name("run"), descriptor)
            .unwrap()
            .with_interface_owner()
            .unwrap();
        let settings = Settings::jdk().unwrap();
        let mut pool = ConstantPoolBuilder::new();
        let layout = PoolLayout::emit(
            &mut pool,
            &member,
            AccessorKind::Method,
            &class("Accessor1"),
            &settings,
        )
        .unwrap();
        let target = pool.get(ConstantIndex::from(layout.target_method)).unwrap();
        assert_eq!(target.tag(), 11);
        assert!(layout.boxing.is_empty());
    }
}
