//! Constant values and annotation instances.
//!
//! Floats are stored as raw bits so every value is `Eq + Hash` and can be
//! compared structurally across builds.

use serde::{Deserialize, Serialize};

use crate::{ClassId, Symbol};

/// A compile-time constant: a field's `ConstantValue` attribute, an
/// annotation member value or an annotation member default.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    /// `f32` bits.
    Float(u32),
    /// `f64` bits.
    Double(u64),
    Boolean(bool),
    String(Symbol),
    /// Class literal, by class id.
    Class(ClassId),
    Enum { enum_type: ClassId, constant: Symbol },
    Annotation(AnnotationValue),
    Array(Vec<ConstantValue>),
}

impl ConstantValue {
    pub fn float(value: f32) -> Self {
        ConstantValue::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        ConstantValue::Double(value.to_bits())
    }

    /// Call `f` for every class id mentioned by this value, recursively.
    pub fn for_each_class(&self, f: &mut impl FnMut(ClassId)) {
        match self {
            ConstantValue::Class(id) => f(*id),
            ConstantValue::Enum { enum_type, .. } => f(*enum_type),
            ConstantValue::Annotation(annotation) => annotation.for_each_class(f),
            ConstantValue::Array(items) => {
                for item in items {
                    item.for_each_class(f);
                }
            }
            ConstantValue::Int(_)
            | ConstantValue::Long(_)
            | ConstantValue::Float(_)
            | ConstantValue::Double(_)
            | ConstantValue::Boolean(_)
            | ConstantValue::String(_) => {}
        }
    }
}

/// An annotation instance: its type and explicitly given member values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationValue {
    pub annotation: ClassId,
    pub members: Vec<(Symbol, ConstantValue)>,
}

impl AnnotationValue {
    pub fn new(annotation: ClassId) -> Self {
        AnnotationValue {
            annotation,
            members: Vec::new(),
        }
    }

    pub fn member(&self, name: Symbol) -> Option<&ConstantValue> {
        self.members
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(_, value)| value)
    }

    /// Same member names bound to equal values, ignoring member order.
    pub fn same_values(&self, other: &AnnotationValue) -> bool {
        self.members.len() == other.members.len()
            && other
                .members
                .iter()
                .all(|(name, value)| self.member(*name) == Some(value))
    }

    pub fn for_each_class(&self, f: &mut impl FnMut(ClassId)) {
        f(self.annotation);
        for (_, value) in &self.members {
            value.for_each_class(f);
        }
    }
}

/// Runtime-visible and runtime-invisible annotations of one element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationLists {
    pub visible: Vec<AnnotationValue>,
    pub invisible: Vec<AnnotationValue>,
}

impl AnnotationLists {
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationValue> {
        self.visible.iter().chain(&self.invisible)
    }

    pub fn find(&self, annotation: ClassId) -> Option<&AnnotationValue> {
        self.iter().find(|value| value.annotation == annotation)
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.invisible.is_empty()
    }

    pub fn for_each_class(&self, f: &mut impl FnMut(ClassId)) {
        for annotation in self.iter() {
            annotation.for_each_class(f);
        }
    }
}
