//! Users of changed compile-time constants.

use jmake_ir::{ClassId, ClassRecord, Symbol};
use tracing::{debug, warn};

use super::oracle::SearchCancelled;
use super::SourceUsageProcessor;
use crate::marks::MarkReason;

/// A constant field of the old version whose value its users may have
/// inlined.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ChangedConstant {
    pub field: Symbol,
    pub private: bool,
}

/// Constant fields of `old` that are gone, no longer constant or hold a
/// different value in `new`.
pub(crate) fn changed_constants(old: &ClassRecord, new: &ClassRecord) -> Vec<ChangedConstant> {
    old.fields
        .iter()
        .filter(|field| {
            let Some(value) = &field.constant else {
                return false;
            };
            new.find_field(field.name)
                .and_then(|new_field| new_field.constant.as_ref())
                != Some(value)
        })
        .map(|field| ChangedConstant {
            field: field.name,
            private: field.flags.is_private(),
        })
        .collect()
}

impl SourceUsageProcessor<'_> {
    /// Mark the classes using any of `constants` of `owner`. A cancelled
    /// search abandons the remaining constants of `owner`.
    pub fn process_constants(&mut self, owner: ClassId, constants: &[ChangedConstant]) {
        let Some(owner_name) = self.symbols.resolve(owner) else {
            return;
        };
        if let Err(cancelled) = self.mark_constant_users(owner, &owner_name, constants) {
            warn!(class = %owner_name, "{cancelled}; constant users not searched");
        }
    }

    fn mark_constant_users(
        &mut self,
        owner: ClassId,
        owner_name: &str,
        constants: &[ChangedConstant],
    ) -> Result<(), SearchCancelled> {
        for constant in constants {
            let Some(field_name) = self.symbols.resolve(constant.field) else {
                continue;
            };
            let usages = self.oracle.find_field_usages(owner_name, &field_name)?;
            debug!(
                class = %owner_name,
                field = %field_name,
                usages = usages.len(),
                "constant changed"
            );
            for usage in &usages {
                if constant.private && usage.enclosing_class == owner_name {
                    continue;
                }
                if self.is_real(usage)? {
                    let reason = MarkReason::ConstantChanged {
                        class: owner,
                        field: constant.field,
                    };
                    self.mark_usage(usage, reason);
                }
            }
        }
        Ok(())
    }
}
