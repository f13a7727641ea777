use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub rating: Option<i32>,
}

impl Book {
    /// JSON shape used in every `books` array.
    pub fn format(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "title": self.title,
            "author": self.author,
            "rating": self.rating,
        })
    }

    pub fn title_contains(&self, term: &str) -> bool {
        self.title.to_lowercase().contains(&term.to_lowercase())
    }
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub rating: Option<i32>,
}

impl NewBook {
    pub fn into_book(self, id: i32) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            rating: self.rating,
        }
    }
}
