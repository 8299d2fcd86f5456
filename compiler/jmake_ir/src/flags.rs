//! Access flags and annotation metadata enums.
//!
//! Flag bits follow the class-file encoding so the parser can hand them
//! over unchanged.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Class, field and method access flags (class-file bit layout).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method (shares the bit with `volatile`).
        const BRIDGE = 0x0040;
        /// Varargs method (shares the bit with `transient`).
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// Visibility ordering, least to most accessible.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Private,
    Package,
    Protected,
    Public,
}

impl AccessFlags {
    #[inline]
    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    #[inline]
    pub const fn is_annotation(self) -> bool {
        self.contains(Self::ANNOTATION)
    }

    #[inline]
    pub const fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    #[inline]
    pub const fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    #[inline]
    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    #[inline]
    pub const fn is_bridge(self) -> bool {
        self.contains(Self::BRIDGE)
    }

    pub const fn access_level(self) -> AccessLevel {
        if self.contains(Self::PUBLIC) {
            AccessLevel::Public
        } else if self.contains(Self::PROTECTED) {
            AccessLevel::Protected
        } else if self.contains(Self::PRIVATE) {
            AccessLevel::Private
        } else {
            AccessLevel::Package
        }
    }

    /// `true` if `self` grants strictly more access than `other`.
    ///
    /// Comparing old flags against new flags this answers "was access
    /// restricted".
    pub fn is_more_accessible_than(self, other: AccessFlags) -> bool {
        self.access_level() > other.access_level()
    }
}

bitflags! {
    /// Program elements an annotation type may be applied to.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AnnotationTargets: u16 {
        const TYPE = 1 << 0;
        const FIELD = 1 << 1;
        const METHOD = 1 << 2;
        const PARAMETER = 1 << 3;
        const CONSTRUCTOR = 1 << 4;
        const LOCAL_VARIABLE = 1 << 5;
        const ANNOTATION_TYPE = 1 << 6;
        const PACKAGE = 1 << 7;
        const TYPE_PARAMETER = 1 << 8;
        const TYPE_USE = 1 << 9;
        const MODULE = 1 << 10;
        const RECORD_COMPONENT = 1 << 11;
    }
}

impl AnnotationTargets {
    /// Targets of an annotation type without `@Target`.
    pub const DEFAULT: Self = Self::from_bits_truncate(
        Self::TYPE.bits()
            | Self::FIELD.bits()
            | Self::METHOD.bits()
            | Self::PARAMETER.bits()
            | Self::CONSTRUCTOR.bits()
            | Self::LOCAL_VARIABLE.bits()
            | Self::ANNOTATION_TYPE.bits()
            | Self::PACKAGE.bits(),
    );

    /// Map an `ElementType` constant name to its flag.
    pub fn from_element_type(name: &str) -> Option<Self> {
        let target = match name {
            "TYPE" => Self::TYPE,
            "FIELD" => Self::FIELD,
            "METHOD" => Self::METHOD,
            "PARAMETER" => Self::PARAMETER,
            "CONSTRUCTOR" => Self::CONSTRUCTOR,
            "LOCAL_VARIABLE" => Self::LOCAL_VARIABLE,
            "ANNOTATION_TYPE" => Self::ANNOTATION_TYPE,
            "PACKAGE" => Self::PACKAGE,
            "TYPE_PARAMETER" => Self::TYPE_PARAMETER,
            "TYPE_USE" => Self::TYPE_USE,
            "MODULE" => Self::MODULE,
            "RECORD_COMPONENT" => Self::RECORD_COMPONENT,
            _ => return None,
        };
        Some(target)
    }

    /// `true` if any target present in `self` is missing from `new`.
    pub fn lost_any(self, new: AnnotationTargets) -> bool {
        !self.difference(new).is_empty()
    }
}

/// Annotation retention, ordered by how long the annotation survives.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RetentionPolicy {
    Source,
    #[default]
    Class,
    Runtime,
}

impl RetentionPolicy {
    /// Map a `RetentionPolicy` constant name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SOURCE" => Some(Self::Source),
            "CLASS" => Some(Self::Class),
            "RUNTIME" => Some(Self::Runtime),
            _ => None,
        }
    }

    /// SOURCE → CLASS/RUNTIME or CLASS → RUNTIME.
    ///
    /// Users compiled under the old policy lack the annotation in their
    /// class files and must be recompiled to carry it.
    pub fn escalated_to(self, new: RetentionPolicy) -> bool {
        new > self
    }
}
