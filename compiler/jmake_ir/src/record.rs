//! Class metadata records.
//!
//! A [`ClassRecord`] is built once per compiled class and stored in the
//! class cache. All names are [`Symbol`]s; the few derived facts the change
//! analysis needs on hot paths (constructor-ness, parameter part and return
//! part of a method descriptor) are interned at import time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constant::{AnnotationLists, ConstantValue};
use crate::flags::AccessFlags;
use crate::reference::ClassReference;
use crate::{ClassId, Symbol};

/// Structural metadata of one compiled class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: ClassId,
    /// `None` for `java.lang.Object` and for classes whose superclass is
    /// not known.
    pub super_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub flags: AccessFlags,
    pub generic_signature: Option<Symbol>,
    pub source_file: Option<String>,
    pub source_path: Option<PathBuf>,
    /// Implements the remote-invocation marker, directly or through
    /// superinterfaces.
    pub remote: bool,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub annotations: AnnotationLists,
    /// Constant-pool references, present only between import and
    /// promotion into the committed cache.
    #[serde(skip)]
    pub references: Vec<ClassReference>,
}

impl ClassRecord {
    pub fn new(id: ClassId, flags: AccessFlags) -> Self {
        ClassRecord {
            id,
            super_class: None,
            interfaces: Vec::new(),
            flags,
            generic_signature: None,
            source_file: None,
            source_path: None,
            remote: false,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: AnnotationLists::default(),
            references: Vec::new(),
        }
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    #[inline]
    pub fn is_annotation(&self) -> bool {
        self.flags.is_annotation()
    }

    /// Superclass followed by direct superinterfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.super_class.into_iter().chain(self.interfaces.iter().copied())
    }

    pub fn find_field(&self, name: Symbol) -> Option<&FieldRecord> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Method with the exact name and descriptor.
    pub fn find_method(&self, name: Symbol, descriptor: Symbol) -> Option<&MethodRecord> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    /// First method matching name and parameter types, whatever its return
    /// type.
    pub fn find_method_by_key(&self, key: MethodKey) -> Option<&MethodRecord> {
        self.methods.iter().find(|method| method.key() == key)
    }

    pub fn methods_named(&self, name: Symbol) -> impl Iterator<Item = &MethodRecord> {
        self.methods.iter().filter(move |method| method.name == name)
    }

    /// Copy for storage: drops the transient reference list.
    pub fn without_references(&self) -> (ClassRecord, Vec<ClassReference>) {
        let mut stored = self.clone();
        let references = std::mem::take(&mut stored.references);
        (stored, references)
    }
}

/// Field metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: Symbol,
    pub descriptor: Symbol,
    pub flags: AccessFlags,
    pub generic_signature: Option<Symbol>,
    /// `ConstantValue` attribute, if the field is a compile-time constant.
    pub constant: Option<ConstantValue>,
    pub annotations: AnnotationLists,
}

impl FieldRecord {
    pub fn new(name: Symbol, descriptor: Symbol, flags: AccessFlags) -> Self {
        FieldRecord {
            name,
            descriptor,
            flags,
            generic_signature: None,
            constant: None,
            annotations: AnnotationLists::default(),
        }
    }
}

/// Method identity without the return type.
///
/// Covariant overrides share a key; that is how the class-file format
/// exposes them and how the analysis groups them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub name: Symbol,
    pub params: Symbol,
}

/// Method metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: Symbol,
    /// Full descriptor, e.g. `(ILjava/lang/String;)V`.
    pub descriptor: Symbol,
    /// Parameter part of the descriptor including parentheses.
    pub params: Symbol,
    /// Return part of the descriptor.
    pub return_type: Symbol,
    pub flags: AccessFlags,
    pub generic_signature: Option<Symbol>,
    pub thrown: Vec<ClassId>,
    pub annotations: AnnotationLists,
    pub parameter_annotations: Vec<AnnotationLists>,
    pub annotation_default: Option<ConstantValue>,
    /// Named `<init>`.
    pub constructor: bool,
}

impl MethodRecord {
    #[inline]
    pub fn key(&self) -> MethodKey {
        MethodKey {
            name: self.name,
            params: self.params,
        }
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.flags.is_abstract()
    }

    /// Can be overridden by a subclass.
    pub fn is_overridable(&self) -> bool {
        !(self.constructor
            || self.flags.is_final()
            || self.flags.is_static()
            || self.flags.is_private())
    }

    /// Same thrown exceptions, ignoring order.
    pub fn same_thrown(&self, other: &MethodRecord) -> bool {
        self.thrown.len() == other.thrown.len()
            && self.thrown.iter().all(|e| other.thrown.contains(e))
    }
}

/// A class member, for change sets that mix fields and methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberRecord {
    Field(FieldRecord),
    Method(MethodRecord),
}

impl MemberRecord {
    pub fn name(&self) -> Symbol {
        match self {
            MemberRecord::Field(field) => field.name,
            MemberRecord::Method(method) => method.name,
        }
    }

    pub fn flags(&self) -> AccessFlags {
        match self {
            MemberRecord::Field(field) => field.flags,
            MemberRecord::Method(method) => method.flags,
        }
    }

    pub fn as_method(&self) -> Option<&MethodRecord> {
        match self {
            MemberRecord::Method(method) => Some(method),
            MemberRecord::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&FieldRecord> {
        match self {
            MemberRecord::Field(field) => Some(field),
            MemberRecord::Method(_) => None,
        }
    }
}
