use crate::models::book::{Book, NewBook};
use crate::utils::pagination::PageWindow;
use async_trait::async_trait;
use redis::AsyncCommands;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("In-memory store lock poisoned")]
    Poisoned,
}

/// Persistence boundary for the shelf. Every method is one unit of work:
/// writes either commit completely or leave the store untouched.
#[async_trait]
pub trait BookStore {
    fn name(&self) -> &'static str;
    async fn count_books(&self) -> Result<usize, StorageError>;
    /// Books inside `window`, ordered by id ascending.
    async fn list_books(&self, window: PageWindow) -> Result<Vec<Book>, StorageError>;
    /// Every book whose title contains `term`, case-insensitively, ordered by id.
    async fn search_books(&self, term: &str) -> Result<Vec<Book>, StorageError>;
    async fn get_book(&self, id: i32) -> Result<Option<Book>, StorageError>;
    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError>;
    /// Returns the updated row, or `None` when no book has this id.
    async fn update_rating(&self, id: i32, rating: i32) -> Result<Option<Book>, StorageError>;
    /// Returns whether a row was removed.
    async fn delete_book(&self, id: i32) -> Result<bool, StorageError>;
    async fn test_connection(&self) -> Result<(), StorageError>;
}

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id SERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                rating INTEGER
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn book_from_row(row: &PgRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        rating: row.get("rating"),
    }
}

/// Escapes LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl BookStore for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn count_books(&self) -> Result<usize, StorageError> {
        let count = sqlx::query("SELECT COUNT(*) as count FROM books")
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

        Ok(count as usize)
    }

    async fn list_books(&self, window: PageWindow) -> Result<Vec<Book>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, title, author, rating FROM books ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(window.limit as i64)
        .bind(window.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(book_from_row).collect())
    }

    async fn search_books(&self, term: &str) -> Result<Vec<Book>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, title, author, rating FROM books WHERE title ILIKE $1 ORDER BY id",
        )
        .bind(like_pattern(term))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(book_from_row).collect())
    }

    async fn get_book(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let row = sqlx::query("SELECT id, title, author, rating FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(book_from_row))
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author, rating)
            VALUES ($1, $2, $3)
            RETURNING id, title, author, rating
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.rating)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(book_from_row(&row))
    }

    async fn update_rating(&self, id: i32, rating: i32) -> Result<Option<Book>, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "UPDATE books SET rating = $1 WHERE id = $2 RETURNING id, title, author, rating",
        )
        .bind(rating)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.as_ref().map(book_from_row))
    }

    async fn delete_book(&self, id: i32) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

const BOOK_IDS_KEY: &str = "books";
const NEXT_ID_KEY: &str = "books:next_id";

fn book_key(id: i32) -> String {
    format!("book:{}", id)
}

/// Books as JSON strings under `book:{id}`, with the `books` sorted set
/// (score = id) giving the primary-key order.
pub struct RedisBackend {
    client: redis::Client,
}

impl RedisBackend {
    pub fn new(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn load_books(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        ids: &[i32],
    ) -> Result<Vec<Book>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|&id| book_key(id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(conn).await?;

        let mut books = Vec::with_capacity(values.len());
        for json_str in values.into_iter().flatten() {
            books.push(serde_json::from_str::<Book>(&json_str)?);
        }

        Ok(books)
    }
}

#[async_trait]
impl BookStore for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn count_books(&self) -> Result<usize, StorageError> {
        let mut conn = self.get_connection().await?;
        let count: usize = conn.zcard(BOOK_IDS_KEY).await?;
        Ok(count)
    }

    async fn list_books(&self, window: PageWindow) -> Result<Vec<Book>, StorageError> {
        let mut conn = self.get_connection().await?;

        let (Ok(start), Ok(end)) = (
            isize::try_from(window.offset),
            isize::try_from(window.offset + window.limit),
        ) else {
            return Ok(Vec::new());
        };
        let stop = end - 1;
        let ids: Vec<i32> = conn.zrange(BOOK_IDS_KEY, start, stop).await?;

        self.load_books(&mut conn, &ids).await
    }

    async fn search_books(&self, term: &str) -> Result<Vec<Book>, StorageError> {
        let mut conn = self.get_connection().await?;

        let ids: Vec<i32> = conn.zrange(BOOK_IDS_KEY, 0, -1).await?;
        let books = self.load_books(&mut conn, &ids).await?;

        Ok(books
            .into_iter()
            .filter(|book| book.title_contains(term))
            .collect())
    }

    async fn get_book(&self, id: i32) -> Result<Option<Book>, StorageError> {
        let mut conn = self.get_connection().await?;

        let value: Option<String> = conn.get(book_key(id)).await?;

        match value {
            Some(json_str) => Ok(Some(serde_json::from_str(&json_str)?)),
            None => Ok(None),
        }
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError> {
        let mut conn = self.get_connection().await?;

        let id: i32 = conn.incr(NEXT_ID_KEY, 1).await?;
        let stored = book.clone().into_book(id);
        let value = serde_json::to_string(&stored)?;

        redis::pipe()
            .atomic()
            .set(book_key(id), &value)
            .ignore()
            .zadd(BOOK_IDS_KEY, id, id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(stored)
    }

    async fn update_rating(&self, id: i32, rating: i32) -> Result<Option<Book>, StorageError> {
        let mut conn = self.get_connection().await?;

        let value: Option<String> = conn.get(book_key(id)).await?;
        let mut book: Book = match value {
            Some(json_str) => serde_json::from_str(&json_str)?,
            None => return Ok(None),
        };
        book.rating = Some(rating);

        // XX keeps a concurrent delete from being undone by this write.
        let written: Option<String> = redis::cmd("SET")
            .arg(book_key(id))
            .arg(serde_json::to_string(&book)?)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        Ok(written.map(|_| book))
    }

    async fn delete_book(&self, id: i32) -> Result<bool, StorageError> {
        let mut conn = self.get_connection().await?;

        let (removed, _): (usize, usize) = redis::pipe()
            .atomic()
            .del(book_key(id))
            .zrem(BOOK_IDS_KEY, id)
            .query_async(&mut conn)
            .await?;

        Ok(removed > 0)
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryShelf {
    books: BTreeMap<i32, Book>,
    last_id: i32,
}

/// Process-local shelf. Each call takes the lock once, so a write is applied
/// whole or not at all.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    shelf: Mutex<MemoryShelf>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: impl IntoIterator<Item = NewBook>) -> Self {
        let mut shelf = MemoryShelf::default();
        for book in books {
            shelf.last_id += 1;
            shelf.books.insert(shelf.last_id, book.into_book(shelf.last_id));
        }
        info!("Memory backend seeded with {} books", shelf.books.len());

        Self {
            shelf: Mutex::new(shelf),
        }
    }

    fn shelf(&self) -> Result<MutexGuard<'_, MemoryShelf>, StorageError> {
        self.shelf.lock().map_err(|_| StorageError::Poisoned)
    }
}

#[async_trait]
impl BookStore for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn count_books(&self) -> Result<usize, StorageError> {
        Ok(self.shelf()?.books.len())
    }

    async fn list_books(&self, window: PageWindow) -> Result<Vec<Book>, StorageError> {
        let shelf = self.shelf()?;
        let ordered: Vec<&Book> = shelf.books.values().collect();

        Ok(window.slice(&ordered).into_iter().cloned().collect())
    }

    async fn search_books(&self, term: &str) -> Result<Vec<Book>, StorageError> {
        Ok(self
            .shelf()?
            .books
            .values()
            .filter(|book| book.title_contains(term))
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: i32) -> Result<Option<Book>, StorageError> {
        Ok(self.shelf()?.books.get(&id).cloned())
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError> {
        let mut shelf = self.shelf()?;

        let id = shelf
            .last_id
            .checked_add(1)
            .ok_or_else(|| StorageError::Connection("book id space exhausted".to_string()))?;
        let stored = book.clone().into_book(id);

        shelf.last_id = id;
        shelf.books.insert(id, stored.clone());

        Ok(stored)
    }

    async fn update_rating(&self, id: i32, rating: i32) -> Result<Option<Book>, StorageError> {
        let mut shelf = self.shelf()?;

        Ok(shelf.books.get_mut(&id).map(|book| {
            book.rating = Some(rating);
            book.clone()
        }))
    }

    async fn delete_book(&self, id: i32) -> Result<bool, StorageError> {
        Ok(self.shelf()?.books.remove(&id).is_some())
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        self.shelf().map(|_| ())
    }
}
