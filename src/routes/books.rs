use crate::models::book::{Book, NewBook};
use crate::models::error::ApiError;
use crate::models::responses::{BooksResponse, CreateResponse, DeleteResponse, UpdateResponse};
use crate::models::storage::StorageError;
use crate::utils::pagination::{parse_page, PageWindow};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

/// Body of `POST /books`: either a new book or a title search.
#[derive(Debug, Default, Deserialize)]
pub struct BookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub rating: Option<i32>,
    pub search: Option<String>,
}

impl BookRequest {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|term| !term.is_empty())
    }

    fn into_new_book(self) -> Option<NewBook> {
        Some(NewBook {
            title: self.title?,
            author: self.author?,
            rating: self.rating,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: Option<i32>,
}

fn parse_id(raw: &str) -> Option<i32> {
    raw.trim().parse().ok()
}

fn unprocessable(context: &str, e: StorageError) -> ApiError {
    error!("{}: {}", context, e);
    ApiError::Unprocessable
}

async fn search(state: &AppState, term: &str) -> Result<BooksResponse, ApiError> {
    info!("Searching titles for {:?}", term);

    let books = state
        .store
        .search_books(term)
        .await
        .map_err(|e| unprocessable("Failed to search books", e))?;

    Ok(BooksResponse::new(&books, books.len()))
}

async fn first_page(state: &AppState) -> Result<(Vec<Book>, usize), StorageError> {
    let books = state
        .store
        .list_books(PageWindow::first(state.books_per_shelf))
        .await?;
    let total_books = state.store.count_books().await?;

    Ok((books, total_books))
}

/// Listing returned after a committed write. The write already happened, so a
/// failed reload degrades to an empty listing instead of an error.
async fn reload_shelf(state: &AppState) -> (Vec<Book>, usize) {
    match first_page(state).await {
        Ok(shelf) => shelf,
        Err(e) => {
            error!("Failed to reload shelf after write: {}", e);
            (Vec::new(), 0)
        }
    }
}

pub async fn list_books(
    State(state): State<AppState>,
    params: Option<Query<PageParams>>,
    body: Option<Json<BookRequest>>,
) -> Result<Json<BooksResponse>, ApiError> {
    if let Some(term) = body.as_ref().and_then(|Json(request)| request.search_term()) {
        return search(&state, term).await.map(Json);
    }

    let page = parse_page(
        params
            .as_ref()
            .and_then(|Query(params)| params.page.as_deref()),
    );
    let window = PageWindow::new(page, state.books_per_shelf).ok_or(ApiError::NotFound)?;

    let books = state
        .store
        .list_books(window)
        .await
        .map_err(|e| unprocessable("Failed to list books", e))?;

    if books.is_empty() {
        warn!("Page {} is empty", page);
        return Err(ApiError::NotFound);
    }

    let total_books = state
        .store
        .count_books()
        .await
        .map_err(|e| unprocessable("Failed to count books", e))?;

    Ok(Json(BooksResponse::new(&books, total_books)))
}

pub async fn create_book(
    State(state): State<AppState>,
    body: Option<Json<BookRequest>>,
) -> Result<Response, ApiError> {
    let Some(Json(request)) = body else {
        warn!("Create request without a JSON body");
        return Err(ApiError::Unprocessable);
    };

    if let Some(term) = request.search_term() {
        return Ok(Json(search(&state, term).await?).into_response());
    }

    let new_book = request.into_new_book().ok_or_else(|| {
        warn!("Create request is missing title or author");
        ApiError::Unprocessable
    })?;

    let book = state
        .store
        .insert_book(&new_book)
        .await
        .map_err(|e| unprocessable("Failed to create book", e))?;

    info!("Created book {}: {:?}", book.id, book.title);

    let (books, total_books) = reload_shelf(&state).await;

    Ok(Json(CreateResponse {
        success: true,
        created: book.id,
        books: books.iter().map(Book::format).collect(),
        total_books,
    })
    .into_response())
}

pub async fn update_book(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Option<Json<RatingRequest>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let id = parse_id(&raw_id).ok_or(ApiError::BadRequest)?;
    let rating = body
        .and_then(|Json(request)| request.rating)
        .ok_or_else(|| {
            warn!("Update of book {} without a rating", id);
            ApiError::BadRequest
        })?;

    match state.store.update_rating(id, rating).await {
        Ok(Some(book)) => {
            info!("Book {} rated {}", book.id, rating);
            Ok(Json(UpdateResponse {
                success: true,
                id: book.id,
            }))
        }
        Ok(None) => {
            warn!("Update of missing book {}", id);
            Err(ApiError::BadRequest)
        }
        Err(e) => {
            error!("Failed to update book {}: {}", id, e);
            Err(ApiError::BadRequest)
        }
    }
}

pub async fn delete_book(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&raw_id).ok_or(ApiError::Unprocessable)?;

    match state.store.delete_book(id).await {
        Ok(true) => info!("Deleted book {}", id),
        Ok(false) => {
            warn!("Delete of missing book {}", id);
            return Err(ApiError::Unprocessable);
        }
        Err(e) => return Err(unprocessable("Failed to delete book", e)),
    }

    let (books, total_books) = reload_shelf(&state).await;

    Ok(Json(DeleteResponse {
        success: true,
        deleted_book: id,
        books: books.iter().map(Book::format).collect(),
        total_books,
    }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
