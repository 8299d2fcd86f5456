//! jmake IR - class metadata for the incremental dependency engine
//!
//! This crate contains the data every other jmake crate speaks:
//! - `Symbol`/`ClassId` and the persistent `SymbolTable`
//! - Access flags, annotation targets and retention policies
//! - Class, field and method records with their constant and annotation values
//! - Referencer records (who uses a class, and through which member)
//! - Descriptor and generic-signature parsing
//! - `RawClass`, the string-based import boundary for the class-file parser
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: class names, member names, descriptors and
//!   signatures are `Symbol(u32)`; records compare by id, never by string.
//! - **Records Are Plain Data**: every record is `Clone + Eq + Hash` and
//!   serde-serializable; floats are stored as raw bits.

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod constant;
pub mod descriptor;
pub mod flags;
pub mod raw;
pub mod record;
pub mod reference;
mod symbol;

pub use constant::{AnnotationLists, AnnotationValue, ConstantValue};
pub use flags::{AccessFlags, AccessLevel, AnnotationTargets, RetentionPolicy};
pub use raw::{RawAnnotation, RawClass, RawConstant, RawField, RawMethod, RawReference};
pub use record::{ClassRecord, FieldRecord, MemberRecord, MethodKey, MethodRecord};
pub use reference::{ClassReference, Dependency, MemberRef, MethodRef, ReferencerRecord};
pub use symbol::{ClassId, Symbol, SymbolError, SymbolTable};

static_assert_size!(Symbol, 4);
static_assert_size!(ReferencerRecord, 16);
