//! Users of annotation types whose retention was escalated.
//!
//! Under SOURCE retention an annotation leaves no trace in its users' class
//! files, so only a source search finds them.

use jmake_ir::ClassId;
use tracing::warn;

use super::oracle::SearchCancelled;
use super::SourceUsageProcessor;
use crate::marks::MarkReason;

impl SourceUsageProcessor<'_> {
    pub fn process_retention(&mut self, annotation: ClassId) {
        let Some(name) = self.symbols.resolve(annotation) else {
            return;
        };
        if let Err(cancelled) = self.mark_annotation_users(annotation, &name) {
            warn!(annotation = %name, "{cancelled}; annotation users not searched");
        }
    }

    fn mark_annotation_users(&mut self, annotation: ClassId, name: &str) -> Result<(), SearchCancelled> {
        for usage in self.oracle.find_annotation_usages(name)? {
            if self.is_real(&usage)? {
                self.mark_usage(&usage, MarkReason::AnnotationSourceUse(annotation));
            }
        }
        Ok(())
    }
}
