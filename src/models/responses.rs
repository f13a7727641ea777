use crate::models::book::Book;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
    pub backend: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BooksResponse {
    pub success: bool,
    pub books: Vec<serde_json::Value>,
    pub total_books: usize,
}

impl BooksResponse {
    pub fn new(books: &[Book], total_books: usize) -> Self {
        Self {
            success: true,
            books: books.iter().map(Book::format).collect(),
            total_books,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    pub created: i32,
    pub books: Vec<serde_json::Value>,
    pub total_books: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_book: i32,
    pub books: Vec<serde_json::Value>,
    pub total_books: usize,
}
