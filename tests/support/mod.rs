#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use bookshelf::application::books::BookService;
use bookshelf::application::events::{BookEvent, EventNotifier, EventPublishError};
use bookshelf::application::repos::{BooksRepo, BooksWriteRepo, RepoError};
use bookshelf::cache::{CacheError, SpeedCache};
use bookshelf::domain::books::{Book, BookFilter, UserBook, sort_by_title};
use bookshelf::infra::error::InfraError;
use bookshelf::infra::http::StoreHealth;

pub const TTL: Duration = Duration::from_secs(600);

/// In-process entity store with a switch that makes every call fail.
#[derive(Default)]
pub struct FakeStore {
    books: Mutex<BTreeMap<String, Book>>,
    links: Mutex<BTreeSet<(String, String)>>,
    offline: AtomicBool,
    next_id: AtomicU64,
    finds: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `find_book` calls that reached the store.
    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn book_count(&self) -> usize {
        self.books.lock().unwrap().len()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    fn ensure_online(&self) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::Persistence("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BooksRepo for FakeStore {
    async fn find_book(&self, id: &str) -> Result<Option<Book>, RepoError> {
        self.ensure_online()?;
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.books.lock().unwrap().get(id).cloned())
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, RepoError> {
        self.ensure_online()?;
        let mut books: Vec<Book> = self
            .books
            .lock()
            .unwrap()
            .values()
            .filter(|book| filter.matches(book))
            .cloned()
            .collect();
        sort_by_title(&mut books);
        Ok(books)
    }

    async fn list_user_books(
        &self,
        user_id: &str,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, RepoError> {
        self.ensure_online()?;
        let links = self.links.lock().unwrap();
        let books = self.books.lock().unwrap();
        let mut owned: Vec<Book> = links
            .iter()
            .filter(|(user, _)| user == user_id)
            .filter_map(|(_, book_id)| books.get(book_id))
            .filter(|book| filter.matches(book))
            .cloned()
            .collect();
        sort_by_title(&mut owned);
        Ok(owned)
    }
}

#[async_trait]
impl BooksWriteRepo for FakeStore {
    async fn create_book(&self, mut book: Book) -> Result<Book, RepoError> {
        self.ensure_online()?;
        if !book.has_id() {
            let next = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            book.id = format!("book-{next}");
        }
        let mut books = self.books.lock().unwrap();
        if books.contains_key(&book.id) {
            return Err(RepoError::Duplicate {
                constraint: "books_pkey".to_string(),
            });
        }
        books.insert(book.id.clone(), book.clone());
        Ok(book)
    }

    async fn update_book(&self, book: Book) -> Result<Book, RepoError> {
        self.ensure_online()?;
        let mut books = self.books.lock().unwrap();
        let stored = books.get_mut(&book.id).ok_or(RepoError::NotFound)?;
        *stored = book.clone();
        Ok(book)
    }

    async fn delete_book(&self, id: &str) -> Result<String, RepoError> {
        self.ensure_online()?;
        self.books
            .lock()
            .unwrap()
            .remove(id)
            .ok_or(RepoError::NotFound)?;
        self.links
            .lock()
            .unwrap()
            .retain(|(_, book_id)| book_id != id);
        Ok(id.to_string())
    }

    async fn add_book_to_user(&self, link: UserBook) -> Result<String, RepoError> {
        self.ensure_online()?;
        if !self.books.lock().unwrap().contains_key(&link.book_id) {
            return Err(RepoError::NotFound);
        }
        self.links
            .lock()
            .unwrap()
            .insert((link.user_id, link.book_id.clone()));
        Ok(link.book_id)
    }

    async fn remove_book_from_user(&self, link: UserBook) -> Result<String, RepoError> {
        self.ensure_online()?;
        let removed = self
            .links
            .lock()
            .unwrap()
            .remove(&(link.user_id, link.book_id.clone()));
        if removed {
            Ok(link.book_id)
        } else {
            Err(RepoError::NotFound)
        }
    }
}

#[async_trait]
impl StoreHealth for FakeStore {
    async fn health_check(&self) -> Result<(), InfraError> {
        self.ensure_online()
            .map_err(|err| InfraError::database(err.to_string()))
    }
}

/// Read side that stalls before delegating, for deadline tests.
pub struct SlowStore {
    inner: Arc<FakeStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<FakeStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl BooksRepo for SlowStore {
    async fn find_book(&self, id: &str) -> Result<Option<Book>, RepoError> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_book(id).await
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, RepoError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_books(filter).await
    }

    async fn list_user_books(
        &self,
        user_id: &str,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, RepoError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_user_books(user_id, filter).await
    }
}

/// Speed cache whose backend is always down.
#[derive(Default)]
pub struct FailingCache {
    calls: AtomicUsize,
}

impl FailingCache {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::backend("connection refused"))
    }
}

#[async_trait]
impl SpeedCache for FailingCache {
    async fn get_book(&self, _key: &str) -> Result<Option<Book>, CacheError> {
        self.fail()
    }

    async fn set_book(&self, _key: &str, _book: &Book, _ttl: Duration) -> Result<(), CacheError> {
        self.fail()
    }

    async fn invalidate_book(&self, _key: &str) -> Result<(), CacheError> {
        self.fail()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<BookEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<BookEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventNotifier for RecordingNotifier {
    fn publish(&self, event: BookEvent) -> Result<(), EventPublishError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

pub fn book_service(store: &Arc<FakeStore>, cache: Arc<dyn SpeedCache>) -> BookService {
    BookService::new(store.clone(), store.clone(), cache, TTL)
}

pub fn draft(title: &str, author: &str, year: i32, genre: &str) -> Book {
    Book::draft(title, author, year, genre)
}
