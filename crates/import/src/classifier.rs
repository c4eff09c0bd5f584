use extrato_core::{CategoryId, CategoryStore, NewCategory, StoreResult, TransactionType};
use std::collections::HashMap;
use tracing::info;

use crate::tables::{CategoryKeywords, CATEGORY_TABLE, FALLBACK_CATEGORY};

/// Keywords longer than this many characters weigh double.
const LONG_KEYWORD_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub score: u32,
}

impl Classification {
    fn from_entry(entry: &'static CategoryKeywords, score: u32) -> Self {
        Self {
            name: entry.name,
            color: entry.color,
            icon: entry.icon,
            score,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.score == 0
    }
}

/// A table entry with its keywords pre-cleaned the same way descriptions are.
struct CompiledCategory {
    entry: &'static CategoryKeywords,
    keywords: Vec<(String, u32)>,
}

pub struct CategoryClassifier {
    categories: Vec<CompiledCategory>,
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(CATEGORY_TABLE)
    }
}

impl CategoryClassifier {
    pub fn new(table: &'static [CategoryKeywords]) -> Self {
        let categories = table
            .iter()
            .map(|entry| CompiledCategory {
                entry,
                keywords: entry
                    .keywords
                    .iter()
                    .filter_map(|kw| {
                        let cleaned = clean_text(kw).trim().to_string();
                        let weight = if kw.chars().count() > LONG_KEYWORD_CHARS { 2 } else { 1 };
                        (!cleaned.is_empty()).then_some((cleaned, weight))
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    /// Best-scoring category for `description`, or the fallback bucket.
    /// Equal scores keep the category listed first.
    pub fn classify(&self, description: &str) -> Classification {
        let text = clean_text(description);

        let mut best: Option<(&CompiledCategory, u32)> = None;
        for category in &self.categories {
            let score: u32 = category
                .keywords
                .iter()
                .filter(|(kw, _)| text.contains(kw.as_str()))
                .map(|(_, weight)| weight)
                .sum();
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((category, score));
            }
        }

        match best {
            Some((category, score)) => Classification::from_entry(category.entry, score),
            None => Classification::from_entry(&FALLBACK_CATEGORY, 0),
        }
    }
}

/// Lowercases and replaces punctuation with spaces.
fn clean_text(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Per-import memo of category ids by `(name, type)`, plus the names this
/// import had to create.
#[derive(Debug, Default)]
pub struct CategoryCache {
    ids: HashMap<(String, TransactionType), CategoryId>,
    created: Vec<String>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create<S>(
        &mut self,
        store: &S,
        user_id: &str,
        name: &str,
        kind: TransactionType,
        color: &str,
        icon: &str,
    ) -> StoreResult<CategoryId>
    where
        S: CategoryStore + ?Sized,
    {
        let key = (name.to_string(), kind);
        if let Some(id) = self.ids.get(&key) {
            return Ok(id.clone());
        }

        let id = match store.find(user_id, name, kind).await? {
            Some(existing) => existing.id,
            None => {
                let id = store
                    .create(NewCategory::new(user_id, name, kind, color, icon))
                    .await?;
                info!("Created {kind} category '{name}'");
                if !self.created.iter().any(|n| n == name) {
                    self.created.push(name.to_string());
                }
                id
            }
        };

        self.ids.insert(key, id.clone());
        Ok(id)
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn into_created(self) -> Vec<String> {
        self.created
    }
}
