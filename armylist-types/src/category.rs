//! Local record categories and their change topics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed local data groupings.
///
/// Each category lives under a single well-known local key holding a JSON
/// object that maps record id to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    ArmyLists,
    ArmyListsMetadata,
    CustomDetachments,
    CustomDetachmentsMetadata,
    CustomUnits,
}

impl Category {
    /// Every category, in storage-key order.
    pub const ALL: [Category; 5] = [
        Category::ArmyLists,
        Category::ArmyListsMetadata,
        Category::CustomDetachments,
        Category::CustomDetachmentsMetadata,
        Category::CustomUnits,
    ];

    /// The local storage key this category is persisted under.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Category::ArmyLists => "armyLists",
            Category::ArmyListsMetadata => "armyListsMetadata",
            Category::CustomDetachments => "customDetachments",
            Category::CustomDetachmentsMetadata => "customDetachmentsMetadata",
            Category::CustomUnits => "customUnits",
        }
    }

    /// Looks a category up by its storage key.
    #[must_use]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.storage_key() == key)
    }

    /// The lightweight index category maintained alongside this one, if any.
    #[must_use]
    pub const fn metadata(self) -> Option<Category> {
        match self {
            Category::ArmyLists => Some(Category::ArmyListsMetadata),
            Category::CustomDetachments => Some(Category::CustomDetachmentsMetadata),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_metadata(self) -> bool {
        matches!(
            self,
            Category::ArmyListsMetadata | Category::CustomDetachmentsMetadata
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_key())
    }
}

/// Payload-free change notification topic.
///
/// Signals "this category may have changed", never what changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeTopic {
    ArmyListsChanged,
    CustomUnitsChanged,
    CustomDetachmentsChanged,
}

impl ChangeTopic {
    pub const ALL: [ChangeTopic; 3] = [
        ChangeTopic::ArmyListsChanged,
        ChangeTopic::CustomUnitsChanged,
        ChangeTopic::CustomDetachmentsChanged,
    ];

    /// The primary category whose writes publish this topic.
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            ChangeTopic::ArmyListsChanged => Category::ArmyLists,
            ChangeTopic::CustomUnitsChanged => Category::CustomUnits,
            ChangeTopic::CustomDetachmentsChanged => Category::CustomDetachments,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeTopic::ArmyListsChanged => "armyListsChanged",
            ChangeTopic::CustomUnitsChanged => "customUnitsChanged",
            ChangeTopic::CustomDetachmentsChanged => "customDetachmentsChanged",
        }
    }
}

impl fmt::Display for ChangeTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
