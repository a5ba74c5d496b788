use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    application::repos::{BooksRepo, BooksWriteRepo, RepoError},
    domain::books::{Book, BookFilter, UserBook},
};

use super::{PostgresRepositories, map_sqlx_error, map_sqlx_reference_error};

const BOOK_COLUMNS: &str = "b.book_id, b.title, b.author, b.publication_year, b.genre";

#[derive(sqlx::FromRow)]
struct BookRow {
    book_id: String,
    title: String,
    author: String,
    publication_year: i32,
    genre: String,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.book_id,
            title: row.title,
            author: row.author,
            publication_year: row.publication_year,
            genre: row.genre,
        }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn find_book(&self, id: &str) -> Result<Option<Book>, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT b.book_id, b.title, b.author, b.publication_year, b.genre
            FROM books b
            WHERE b.book_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Book::from))
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<Book>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books b WHERE 1=1");
        Self::apply_book_filter(&mut qb, filter);
        qb.push(" ORDER BY b.title ASC, b.book_id ASC");

        let rows = qb
            .build_query_as::<BookRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn list_user_books(
        &self,
        user_id: &str,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books b INNER JOIN users_books ub ON ub.book_id = b.book_id");
        qb.push(" WHERE ub.user_id = ");
        qb.push_bind(user_id);
        Self::apply_book_filter(&mut qb, filter);
        qb.push(" ORDER BY b.title ASC, b.book_id ASC");

        let rows = qb
            .build_query_as::<BookRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Book::from).collect())
    }
}

#[async_trait]
impl BooksWriteRepo for PostgresRepositories {
    async fn create_book(&self, book: Book) -> Result<Book, RepoError> {
        let id = if book.has_id() {
            book.id
        } else {
            Uuid::new_v4().to_string()
        };

        let row = sqlx::query_as::<_, BookRow>(
            r#"
            INSERT INTO books (book_id, title, author, publication_year, genre)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING book_id, title, author, publication_year, genre
            "#,
        )
        .bind(&id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.genre)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Book::from(row))
    }

    async fn update_book(&self, book: Book) -> Result<Book, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books
            SET title = $2, author = $3, publication_year = $4, genre = $5
            WHERE book_id = $1
            RETURNING book_id, title, author, publication_year, genre
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.publication_year)
        .bind(&book.genre)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(Book::from).ok_or(RepoError::NotFound)
    }

    async fn delete_book(&self, id: &str) -> Result<String, RepoError> {
        // users_books rows go with the book through ON DELETE CASCADE.
        let deleted: Option<String> =
            sqlx::query_scalar("DELETE FROM books WHERE book_id = $1 RETURNING book_id")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        deleted.ok_or(RepoError::NotFound)
    }

    async fn add_book_to_user(&self, link: UserBook) -> Result<String, RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users_books (user_id, book_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, book_id) DO NOTHING
            "#,
        )
        .bind(&link.user_id)
        .bind(&link.book_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_reference_error)?;

        Ok(link.book_id)
    }

    async fn remove_book_from_user(&self, link: UserBook) -> Result<String, RepoError> {
        let removed: Option<String> = sqlx::query_scalar(
            r#"
            DELETE FROM users_books
            WHERE user_id = $1 AND book_id = $2
            RETURNING book_id
            "#,
        )
        .bind(&link.user_id)
        .bind(&link.book_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        removed.ok_or(RepoError::NotFound)
    }
}
