use quire_types::{FieldId, SectionId};
use serde::{Deserialize, Serialize};

/// A directed link from a parent section to a child section, created by a
/// child field that draws on a parent field (e.g. a select box with dynamic
/// options).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionAssociation {
    pub id: Option<i64>,
    pub parent_section_id: SectionId,
    pub parent_section_field_id: Option<FieldId>,
    pub child_section_id: SectionId,
    pub child_section_field_id: FieldId,
    /// Hidden associations are skipped when callers respect visibility.
    pub hide_association: bool,
    pub interface: Option<String>,
    pub editor: Option<String>,
}

impl SectionAssociation {
    pub fn new(
        parent_section_id: SectionId,
        parent_section_field_id: Option<FieldId>,
        child_section_id: SectionId,
        child_section_field_id: FieldId,
    ) -> Self {
        Self {
            id: None,
            parent_section_id,
            parent_section_field_id,
            child_section_id,
            child_section_field_id,
            hide_association: false,
            interface: None,
            editor: None,
        }
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hide_association = hidden;
        self
    }

    pub fn is_visible(&self) -> bool {
        !self.hide_association
    }
}
