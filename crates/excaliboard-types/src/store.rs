use serde::{Deserialize, Serialize};

/// The two persisted record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Folders,
    Boards,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folders => "folders",
            Self::Boards => "boards",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Inserted or overwritten.
    Put,
    /// Partially updated in place.
    Update,
    Delete,
}

/// One committed write, published on the store's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: String,
}
