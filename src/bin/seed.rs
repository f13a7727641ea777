use bookshelf_service::models::book::NewBook;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct CreateResponse {
    created: i32,
    total_books: usize,
}

struct Seeder {
    client: Client,
    base_url: String,
}

impl Seeder {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn wait_for_service(&self) {
        info!("Waiting for bookshelf service at {}...", self.base_url);

        let url = format!("{}/status", self.base_url);
        loop {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Bookshelf service is ready");
                    return;
                }
                Ok(response) => {
                    warn!("Service responded with status: {}", response.status());
                }
                Err(e) => {
                    warn!("Service not ready: {}", e);
                }
            }
            sleep(Duration::from_secs(2)).await;
        }
    }

    async fn add_book(&self, book: &NewBook) -> Result<CreateResponse, Box<dyn std::error::Error>> {
        let url = format!("{}/books", self.base_url);
        let response = self.client.post(&url).json(book).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(format!("Failed to add {:?}: {}", book.title, response.status()).into())
        }
    }

    async fn run(&self, books: &[NewBook]) {
        info!("Seeding {} books", books.len());

        for book in books {
            match self.add_book(book).await {
                Ok(created) => info!(
                    "Added book {} {:?} ({} on the shelf)",
                    created.created, book.title, created.total_books
                ),
                Err(e) => error!("{}", e),
            }
        }

        info!("Seeding complete");
    }
}

fn default_books() -> Vec<NewBook> {
    [
        ("Anansi Boys", "Neil Gaiman", 5),
        ("The Left Hand of Darkness", "Ursula K. Le Guin", 5),
        ("Frankenstein", "Mary Shelley", 4),
        ("The Graphic Novel Handbook", "Scott McCloud", 3),
        ("Pride and Prejudice", "Jane Austen", 4),
        ("Madness and Civilization", "Michel Foucault", 4),
        ("Invisible Cities", "Italo Calvino", 5),
        ("A Novel Approach", "Ann Patchett", 2),
        ("Kindred", "Octavia E. Butler", 5),
        ("The Novel of the Century", "David Bellos", 3),
    ]
    .into_iter()
    .map(|(title, author, rating)| NewBook {
        title: title.to_string(),
        author: author.to_string(),
        rating: Some(rating),
    })
    .collect()
}

fn load_books(path: &str) -> Result<Vec<NewBook>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("seed=info").init();

    let base_url =
        std::env::var("BOOKSHELF_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());

    let args: Vec<String> = std::env::args().collect();
    let books = if args.len() > 1 {
        match load_books(&args[1]) {
            Ok(books) => books,
            Err(e) => {
                error!("Could not read books from {}: {}", args[1], e);
                info!("Usage: seed [books.json]");
                std::process::exit(1);
            }
        }
    } else {
        info!("No book file given, using the default shelf");
        default_books()
    };

    let seeder = Seeder::new(base_url);
    seeder.wait_for_service().await;
    seeder.run(&books).await;

    Ok(())
}
