use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::TransactionType;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        CategoryId(s.to_string())
    }
}

/// A user's category. `(user_id, name, kind)` is unique per user, and a
/// category only ever holds transactions of its own `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub color: String,
    pub icon: String,
}

impl NewCategory {
    pub fn new(user_id: &str, name: &str, kind: TransactionType, color: &str, icon: &str) -> Self {
        NewCategory {
            user_id: user_id.to_string(),
            name: name.to_string(),
            kind,
            color: color.to_string(),
            icon: icon.to_string(),
        }
    }

    pub fn into_category(self, id: CategoryId) -> Category {
        Category {
            id,
            user_id: self.user_id,
            name: self.name,
            kind: self.kind,
            color: self.color,
            icon: self.icon,
        }
    }
}
