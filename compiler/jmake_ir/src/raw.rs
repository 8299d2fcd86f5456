//! Import boundary: class metadata as handed over by the class-file parser.
//!
//! Raw classes carry plain strings. Class names are qualified
//! (`java.lang.String`); member descriptors and generic signatures are kept
//! in class-file form. [`RawClass::intern`] turns one into a [`ClassRecord`]
//! keyed by symbols.

use std::path::PathBuf;

use crate::constant::{AnnotationLists, AnnotationValue, ConstantValue};
use crate::descriptor::method_parts;
use crate::flags::AccessFlags;
use crate::record::{ClassRecord, FieldRecord, MethodRecord};
use crate::reference::ClassReference;
use crate::{Symbol, SymbolError, SymbolTable};

/// Class metadata before interning.
#[derive(Clone, Debug, PartialEq)]
pub struct RawClass {
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub flags: AccessFlags,
    pub signature: Option<String>,
    pub source_file: Option<String>,
    pub source_path: Option<PathBuf>,
    pub fields: Vec<RawField>,
    pub methods: Vec<RawMethod>,
    pub annotations: Vec<RawAnnotation>,
    pub references: Vec<RawReference>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawField {
    pub name: String,
    pub descriptor: String,
    pub flags: AccessFlags,
    pub signature: Option<String>,
    pub constant: Option<RawConstant>,
    pub annotations: Vec<RawAnnotation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawMethod {
    pub name: String,
    pub descriptor: String,
    pub flags: AccessFlags,
    pub signature: Option<String>,
    pub thrown: Vec<String>,
    pub annotations: Vec<RawAnnotation>,
    pub parameter_annotations: Vec<Vec<RawAnnotation>>,
    pub annotation_default: Option<RawConstant>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawAnnotation {
    pub type_name: String,
    /// `RuntimeVisibleAnnotations` rather than `RuntimeInvisibleAnnotations`.
    pub visible: bool,
    pub members: Vec<(String, RawConstant)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawConstant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Class(String),
    Enum { type_name: String, constant: String },
    Annotation(RawAnnotation),
    Array(Vec<RawConstant>),
}

/// A constant-pool reference of the class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawReference {
    Class(String),
    Field {
        owner: String,
        name: String,
    },
    Method {
        owner: String,
        name: String,
        descriptor: String,
    },
}

const OBJECT: &str = "java.lang.Object";

impl RawClass {
    /// Public class extending `java.lang.Object`.
    pub fn class(name: impl Into<String>) -> Self {
        RawClass {
            name: name.into(),
            super_class: Some(OBJECT.to_string()),
            interfaces: Vec::new(),
            flags: AccessFlags::PUBLIC,
            signature: None,
            source_file: None,
            source_path: None,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        RawClass {
            flags: AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
            ..RawClass::class(name)
        }
    }

    pub fn annotation_type(name: impl Into<String>) -> Self {
        let mut raw = RawClass::interface(name);
        raw.flags |= AccessFlags::ANNOTATION;
        raw.interfaces.push("java.lang.annotation.Annotation".to_string());
        raw
    }

    #[must_use]
    pub fn with_flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn extends(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn source(mut self, file: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.source_file = Some(file.into());
        self.source_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: RawField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn method(mut self, method: RawMethod) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn annotate(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn uses_class(mut self, class: impl Into<String>) -> Self {
        self.references.push(RawReference::Class(class.into()));
        self
    }

    #[must_use]
    pub fn uses_field(mut self, owner: impl Into<String>, name: impl Into<String>) -> Self {
        self.references.push(RawReference::Field {
            owner: owner.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub fn uses_method(
        mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.references.push(RawReference::Method {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        });
        self
    }

    /// Intern every name and build the class record, references included.
    pub fn intern(&self, symbols: &SymbolTable) -> Result<ClassRecord, SymbolError> {
        let mut record = ClassRecord::new(symbols.try_intern(&self.name)?, self.flags);
        record.super_class = intern_opt(symbols, self.super_class.as_deref())?;
        record.interfaces = intern_all(symbols, &self.interfaces)?;
        record.generic_signature = intern_opt(symbols, self.signature.as_deref())?;
        record.source_file.clone_from(&self.source_file);
        record.source_path.clone_from(&self.source_path);
        record.fields = self
            .fields
            .iter()
            .map(|field| field.intern(symbols))
            .collect::<Result<_, _>>()?;
        record.methods = self
            .methods
            .iter()
            .map(|method| method.intern(symbols))
            .collect::<Result<_, _>>()?;
        record.annotations = intern_annotations(symbols, &self.annotations)?;
        record.references = self
            .references
            .iter()
            .map(|reference| reference.intern(symbols))
            .collect::<Result<_, _>>()?;
        Ok(record)
    }
}

impl RawField {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, flags: AccessFlags) -> Self {
        RawField {
            name: name.into(),
            descriptor: descriptor.into(),
            flags,
            signature: None,
            constant: None,
            annotations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_constant(mut self, constant: RawConstant) -> Self {
        self.constant = Some(constant);
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn annotate(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    fn intern(&self, symbols: &SymbolTable) -> Result<FieldRecord, SymbolError> {
        let mut field = FieldRecord::new(
            symbols.try_intern(&self.name)?,
            symbols.try_intern(&self.descriptor)?,
            self.flags,
        );
        field.generic_signature = intern_opt(symbols, self.signature.as_deref())?;
        field.constant = self
            .constant
            .as_ref()
            .map(|constant| constant.intern(symbols))
            .transpose()?;
        field.annotations = intern_annotations(symbols, &self.annotations)?;
        Ok(field)
    }
}

impl RawMethod {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, flags: AccessFlags) -> Self {
        RawMethod {
            name: name.into(),
            descriptor: descriptor.into(),
            flags,
            signature: None,
            thrown: Vec::new(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            annotation_default: None,
        }
    }

    /// Public `<init>` with the given descriptor.
    pub fn constructor(descriptor: impl Into<String>) -> Self {
        RawMethod::new("<init>", descriptor, AccessFlags::PUBLIC)
    }

    #[must_use]
    pub fn throws(mut self, exception: impl Into<String>) -> Self {
        self.thrown.push(exception.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn annotate(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn annotate_parameter(mut self, index: usize, annotation: RawAnnotation) -> Self {
        if self.parameter_annotations.len() <= index {
            self.parameter_annotations.resize_with(index + 1, Vec::new);
        }
        self.parameter_annotations[index].push(annotation);
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: RawConstant) -> Self {
        self.annotation_default = Some(value);
        self
    }

    fn intern(&self, symbols: &SymbolTable) -> Result<MethodRecord, SymbolError> {
        // A malformed descriptor keeps whole-descriptor identity.
        let (params, return_type) =
            method_parts(&self.descriptor).unwrap_or((self.descriptor.as_str(), ""));
        Ok(MethodRecord {
            name: symbols.try_intern(&self.name)?,
            descriptor: symbols.try_intern(&self.descriptor)?,
            params: symbols.try_intern(params)?,
            return_type: symbols.try_intern(return_type)?,
            flags: self.flags,
            generic_signature: intern_opt(symbols, self.signature.as_deref())?,
            thrown: intern_all(symbols, &self.thrown)?,
            annotations: intern_annotations(symbols, &self.annotations)?,
            parameter_annotations: self
                .parameter_annotations
                .iter()
                .map(|list| intern_annotations(symbols, list))
                .collect::<Result<_, _>>()?,
            annotation_default: self
                .annotation_default
                .as_ref()
                .map(|value| value.intern(symbols))
                .transpose()?,
            constructor: self.name == "<init>",
        })
    }
}

impl RawAnnotation {
    /// Runtime-visible annotation without member values.
    pub fn new(type_name: impl Into<String>) -> Self {
        RawAnnotation {
            type_name: type_name.into(),
            visible: true,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    #[must_use]
    pub fn member(mut self, name: impl Into<String>, value: RawConstant) -> Self {
        self.members.push((name.into(), value));
        self
    }

    fn intern(&self, symbols: &SymbolTable) -> Result<AnnotationValue, SymbolError> {
        let mut value = AnnotationValue::new(symbols.try_intern(&self.type_name)?);
        for (name, member) in &self.members {
            value
                .members
                .push((symbols.try_intern(name)?, member.intern(symbols)?));
        }
        Ok(value)
    }
}

impl RawConstant {
    /// `RetentionPolicy.<policy>` enum constant.
    pub fn retention(policy: &str) -> Self {
        RawConstant::Enum {
            type_name: "java.lang.annotation.RetentionPolicy".to_string(),
            constant: policy.to_string(),
        }
    }

    /// `ElementType.<target>` enum constant.
    pub fn element_type(target: &str) -> Self {
        RawConstant::Enum {
            type_name: "java.lang.annotation.ElementType".to_string(),
            constant: target.to_string(),
        }
    }

    fn intern(&self, symbols: &SymbolTable) -> Result<ConstantValue, SymbolError> {
        Ok(match self {
            RawConstant::Int(v) => ConstantValue::Int(*v),
            RawConstant::Long(v) => ConstantValue::Long(*v),
            RawConstant::Float(v) => ConstantValue::float(*v),
            RawConstant::Double(v) => ConstantValue::double(*v),
            RawConstant::Boolean(v) => ConstantValue::Boolean(*v),
            RawConstant::String(v) => ConstantValue::String(symbols.try_intern(v)?),
            RawConstant::Class(name) => ConstantValue::Class(symbols.try_intern(name)?),
            RawConstant::Enum {
                type_name,
                constant,
            } => ConstantValue::Enum {
                enum_type: symbols.try_intern(type_name)?,
                constant: symbols.try_intern(constant)?,
            },
            RawConstant::Annotation(annotation) => {
                ConstantValue::Annotation(annotation.intern(symbols)?)
            }
            RawConstant::Array(items) => ConstantValue::Array(
                items
                    .iter()
                    .map(|item| item.intern(symbols))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl RawReference {
    fn intern(&self, symbols: &SymbolTable) -> Result<ClassReference, SymbolError> {
        Ok(match self {
            RawReference::Class(name) => ClassReference::Class(symbols.try_intern(name)?),
            RawReference::Field { owner, name } => ClassReference::Field {
                owner: symbols.try_intern(owner)?,
                name: symbols.try_intern(name)?,
            },
            RawReference::Method {
                owner,
                name,
                descriptor,
            } => ClassReference::Method {
                owner: symbols.try_intern(owner)?,
                name: symbols.try_intern(name)?,
                descriptor: symbols.try_intern(descriptor)?,
            },
        })
    }
}

fn intern_opt(symbols: &SymbolTable, name: Option<&str>) -> Result<Option<Symbol>, SymbolError> {
    name.map(|name| symbols.try_intern(name)).transpose()
}

fn intern_all(symbols: &SymbolTable, names: &[String]) -> Result<Vec<Symbol>, SymbolError> {
    names.iter().map(|name| symbols.try_intern(name)).collect()
}

fn intern_annotations(
    symbols: &SymbolTable,
    annotations: &[RawAnnotation],
) -> Result<AnnotationLists, SymbolError> {
    let mut lists = AnnotationLists::default();
    for annotation in annotations {
        let value = annotation.intern(symbols)?;
        if annotation.visible {
            lists.visible.push(value);
        } else {
            lists.invisible.push(value);
        }
    }
    Ok(lists)
}
