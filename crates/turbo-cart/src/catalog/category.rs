//! Category references as the catalog hands them out.
//!
//! Catalog payloads reference a category either by bare id or by embedding
//! the category document. Both forms normalize to a [`CategoryId`] and
//! compare by id only.

use crate::ids::CategoryId;
use serde::{Deserialize, Serialize};

/// An embedded category document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddedCategory {
    /// Category identifier.
    #[serde(alias = "_id")]
    pub id: CategoryId,
    /// Display name, if the payload carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Reference to a category: a bare id or an embedded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CategoryRef {
    /// Bare identifier.
    Id(CategoryId),
    /// Embedded document carrying the identifier.
    Embedded(EmbeddedCategory),
}

impl CategoryRef {
    /// Reference a category by id.
    pub fn id_only(id: impl Into<CategoryId>) -> Self {
        CategoryRef::Id(id.into())
    }

    /// The normalized identifier.
    pub fn id(&self) -> &CategoryId {
        match self {
            CategoryRef::Id(id) => id,
            CategoryRef::Embedded(embedded) => &embedded.id,
        }
    }

    /// Whether both references point at the same category.
    pub fn same_category(&self, other: &CategoryRef) -> bool {
        self.id() == other.id()
    }
}

impl From<CategoryId> for CategoryRef {
    fn from(id: CategoryId) -> Self {
        CategoryRef::Id(id)
    }
}
