//! Remote document shapes.
//!
//! One collection per identity, one document per [`DocumentName`]:
//!
//! | document                    | shape                                                   |
//! |-----------------------------|---------------------------------------------------------|
//! | `data`                      | `{ armyLists, customDetachments, customUnits, lastSynced }` |
//! | `armyListsMetadata`         | `{ data: <metadata> }`                                  |
//! | `customDetachmentsMetadata` | `{ data: <metadata> }`                                  |

use crate::{Category, SyncTimestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A category envelope: record id to opaque record.
pub type RecordMap = Map<String, Value>;

/// Names of the documents stored per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentName {
    #[serde(rename = "data")]
    SyncData,
    #[serde(rename = "armyListsMetadata")]
    ArmyListsMetadata,
    #[serde(rename = "customDetachmentsMetadata")]
    CustomDetachmentsMetadata,
}

impl DocumentName {
    pub const ALL: [DocumentName; 3] = [
        DocumentName::SyncData,
        DocumentName::ArmyListsMetadata,
        DocumentName::CustomDetachmentsMetadata,
    ];

    /// The metadata documents, each mirroring one local metadata category.
    pub const METADATA: [DocumentName; 2] = [
        DocumentName::ArmyListsMetadata,
        DocumentName::CustomDetachmentsMetadata,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DocumentName::SyncData => "data",
            DocumentName::ArmyListsMetadata => "armyListsMetadata",
            DocumentName::CustomDetachmentsMetadata => "customDetachmentsMetadata",
        }
    }

    /// Parses a document name from its wire form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    /// The local category a metadata document mirrors.
    #[must_use]
    pub const fn metadata_category(self) -> Option<Category> {
        match self {
            DocumentName::SyncData => None,
            DocumentName::ArmyListsMetadata => Some(Category::ArmyListsMetadata),
            DocumentName::CustomDetachmentsMetadata => Some(Category::CustomDetachmentsMetadata),
        }
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedData {
    #[serde(default)]
    pub army_lists: RecordMap,
    #[serde(default)]
    pub custom_detachments: RecordMap,
    #[serde(default)]
    pub custom_units: RecordMap,
    pub last_synced: SyncTimestamp,
}

impl SyncedData {
    /// Categories carried by the primary document.
    pub const CATEGORIES: [Category; 3] = [
        Category::ArmyLists,
        Category::CustomDetachments,
        Category::CustomUnits,
    ];

    /// Creates an empty document stamped `last_synced`.
    #[must_use]
    pub fn empty(last_synced: SyncTimestamp) -> Self {
        Self {
            army_lists: RecordMap::new(),
            custom_detachments: RecordMap::new(),
            custom_units: RecordMap::new(),
            last_synced,
        }
    }

    /// Returns the envelope for a primary category.
    #[must_use]
    pub fn records(&self, category: Category) -> Option<&RecordMap> {
        match category {
            Category::ArmyLists => Some(&self.army_lists),
            Category::CustomDetachments => Some(&self.custom_detachments),
            Category::CustomUnits => Some(&self.custom_units),
            _ => None,
        }
    }

    /// Returns a mutable envelope for a primary category.
    pub fn records_mut(&mut self, category: Category) -> Option<&mut RecordMap> {
        match category {
            Category::ArmyLists => Some(&mut self.army_lists),
            Category::CustomDetachments => Some(&mut self.custom_detachments),
            Category::CustomUnits => Some(&mut self.custom_units),
            _ => None,
        }
    }
}

/// Wrapper for the auxiliary metadata documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub data: Value,
}

impl MetadataDocument {
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}
