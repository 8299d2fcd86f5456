//! Usage edges between classes.
//!
//! A [`ReferencerRecord`] is one entry of a class's back-dependency set:
//! "class R uses this class, possibly through field F or method M". The
//! [`Dependency`] view groups those entries per referencing class.

use rustc_hash::FxHashSet;

use crate::{ClassId, Symbol};

/// How a referencing class reaches the target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberRef {
    /// Whole-class use (type reference, instantiation, annotation).
    Class,
    Field { name: Symbol },
    Method { name: Symbol, descriptor: Symbol },
}

/// One back-dependency entry. Equality is by (class, discriminator).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferencerRecord {
    pub class: ClassId,
    pub member: MemberRef,
}

impl ReferencerRecord {
    pub fn class(class: ClassId) -> Self {
        ReferencerRecord {
            class,
            member: MemberRef::Class,
        }
    }

    pub fn field(class: ClassId, name: Symbol) -> Self {
        ReferencerRecord {
            class,
            member: MemberRef::Field { name },
        }
    }

    pub fn method(class: ClassId, name: Symbol, descriptor: Symbol) -> Self {
        ReferencerRecord {
            class,
            member: MemberRef::Method { name, descriptor },
        }
    }
}

/// A method used by a referencing class.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub name: Symbol,
    pub descriptor: Symbol,
}

/// Back-dependencies of a class grouped by referencing class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub class: ClassId,
    pub fields: FxHashSet<Symbol>,
    pub methods: FxHashSet<MethodRef>,
}

impl Dependency {
    pub fn new(class: ClassId) -> Self {
        Dependency {
            class,
            fields: FxHashSet::default(),
            methods: FxHashSet::default(),
        }
    }

    /// Group referencer records, ordered by referencing class id.
    pub fn group(records: impl IntoIterator<Item = ReferencerRecord>) -> Vec<Dependency> {
        let mut records: Vec<ReferencerRecord> = records.into_iter().collect();
        records.sort_unstable();

        let mut grouped: Vec<Dependency> = Vec::new();
        for record in records {
            if grouped.last().map(|dep| dep.class) != Some(record.class) {
                grouped.push(Dependency::new(record.class));
            }
            // Just pushed if it was missing.
            let Some(dependency) = grouped.last_mut() else {
                continue;
            };
            match record.member {
                MemberRef::Class => {}
                MemberRef::Field { name } => {
                    dependency.fields.insert(name);
                }
                MemberRef::Method { name, descriptor } => {
                    dependency.methods.insert(MethodRef { name, descriptor });
                }
            }
        }
        grouped
    }
}

/// A reference found in a compiled class's constant pool.
///
/// The owner of a member reference is the class named at the use site,
/// which may be a subclass of the class that actually declares the member.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassReference {
    Class(ClassId),
    Field {
        owner: ClassId,
        name: Symbol,
    },
    Method {
        owner: ClassId,
        name: Symbol,
        descriptor: Symbol,
    },
}

impl ClassReference {
    pub fn owner(&self) -> ClassId {
        match *self {
            ClassReference::Class(owner)
            | ClassReference::Field { owner, .. }
            | ClassReference::Method { owner, .. } => owner,
        }
    }
}

#[cfg(test)]
mod tests;
