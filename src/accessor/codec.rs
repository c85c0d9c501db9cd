//! Descriptors of the accessor's dispatch method and the marshalling of primitive values

use super::{AccessorKind, MemberDescriptor};
use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RenderDescriptor, UnqualifiedName};
use std::collections::BTreeSet;

/// Render the descriptor of a method with the given parameters and return type
pub fn method_descriptor(parameters: &[FieldType], return_type: Option<&FieldType>) -> String {
    MethodDescriptor {
        parameters: parameters.to_vec(),
        return_type: return_type.cloned(),
    }
    .render()
}

/// Descriptor of the dispatch method, which only depends on the kind of accessor
///
///   - `Object invoke(Object receiver, Object[] arguments)` for methods
///   - `Object newInstance(Object[] arguments)` for both sorts of constructors
pub fn invocation_descriptor(kind: AccessorKind) -> MethodDescriptor {
    let object = FieldType::object(BinaryName::OBJECT);
    let arguments = FieldType::array(object.clone());
    let parameters = match kind {
        AccessorKind::Method => vec![object.clone(), arguments],
        AccessorKind::Constructor | AccessorKind::SerializationConstructor => vec![arguments],
    };
    MethodDescriptor {
        parameters,
        return_type: Some(object),
    }
}

/// How a primitive type gets boxed into (and unboxed from) its wrapper class
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BoxingPlan {
    pub primitive: BaseType,

    /// Wrapper class (eg. `java/lang/Integer` for `int`)
    pub wrapper: BinaryName,

    /// Descriptor of the single argument constructor (eg. `(I)V`)
    pub box_descriptor: MethodDescriptor,

    /// Name of the unboxing accessor (eg. `intValue`)
    pub unbox_name: UnqualifiedName,

    /// Descriptor of the unboxing accessor (eg. `()I`)
    pub unbox_descriptor: MethodDescriptor,
}

impl BoxingPlan {
    pub fn for_base_type(primitive: BaseType) -> BoxingPlan {
        let (wrapper, unbox_name) = match primitive {
            BaseType::Boolean => (BinaryName::BOOLEAN, UnqualifiedName::BOOLEANVALUE),
            BaseType::Byte => (BinaryName::BYTE, UnqualifiedName::BYTEVALUE),
            BaseType::Char => (BinaryName::CHARACTER, UnqualifiedName::CHARVALUE),
            BaseType::Short => (BinaryName::SHORT, UnqualifiedName::SHORTVALUE),
            BaseType::Int => (BinaryName::INTEGER, UnqualifiedName::INTVALUE),
            BaseType::Long => (BinaryName::LONG, UnqualifiedName::LONGVALUE),
            BaseType::Float => (BinaryName::FLOAT, UnqualifiedName::FLOATVALUE),
            BaseType::Double => (BinaryName::DOUBLE, UnqualifiedName::DOUBLEVALUE),
        };
        BoxingPlan {
            primitive,
            wrapper,
            box_descriptor: MethodDescriptor {
                parameters: vec![FieldType::Base(primitive)],
                return_type: None,
            },
            unbox_name,
            unbox_descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: Some(FieldType::Base(primitive)),
            },
        }
    }

    /// Plan for a field type, or `None` if it is a reference type
    pub fn for_type(field_type: &FieldType) -> Option<BoxingPlan> {
        match field_type {
            FieldType::Base(primitive) => Some(BoxingPlan::for_base_type(*primitive)),
            FieldType::Ref(_) => None,
        }
    }
}

/// Distinct primitive types among the parameters and return type, in a fixed order
pub fn primitive_types(member: &MemberDescriptor) -> BTreeSet<BaseType> {
    member
        .parameters()
        .iter()
        .chain(member.return_type())
        .filter_map(|field_type| match field_type {
            FieldType::Base(primitive) => Some(*primitive),
            FieldType::Ref(_) => None,
        })
        .collect()
}

/// Boxing plans for every primitive type the member uses (and only those)
pub fn boxing_plans(member: &MemberDescriptor) -> Vec<BoxingPlan> {
    primitive_types(member)
        .into_iter()
        .map(BoxingPlan::for_base_type)
        .collect()
}
