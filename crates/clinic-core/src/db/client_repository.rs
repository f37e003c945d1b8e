//! Client repository implementation

use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{Client, ClientFilter};

use super::appointment_repository::timestamp;
use crate::util::to_millis;

const SELECT_COLUMNS: &str = "SELECT id, name, email, phone, created_at, updated_at FROM clients";

/// libSQL-backed client table access
pub struct LibSqlClientRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlClientRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Client>> {
        self.first(&format!("{SELECT_COLUMNS} WHERE id = ?"), id)
            .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?)", [id])
            .await?;
        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    /// Exact, case-sensitive email lookup
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Client>> {
        self.first(
            &format!("{SELECT_COLUMNS} WHERE email = ? ORDER BY created_at, id LIMIT 1"),
            email,
        )
        .await
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Client>> {
        self.first(
            &format!("{SELECT_COLUMNS} WHERE phone = ? ORDER BY created_at, id LIMIT 1"),
            phone,
        )
        .await
    }

    /// List clients matching `filter`, ordered by name.
    pub async fn list(&self, filter: &ClientFilter) -> Result<Vec<Client>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(fragment) = &filter.name_contains {
            // LIKE is case-insensitive for ASCII
            clauses.push("name LIKE ? ESCAPE '\\'");
            values.push(Value::Text(format!("%{}%", escape_like(fragment))));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC");

        let mut rows = self
            .conn
            .query(&sql, libsql::params::params_from_iter(values))
            .await?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next().await? {
            clients.push(parse_client(&row)?);
        }
        Ok(clients)
    }

    /// Insert or replace by id, keeping the original `created_at`.
    pub async fn upsert(&self, client: &Client) -> Result<Client> {
        self.conn
            .execute(
                "INSERT INTO clients (id, name, email, phone, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     phone = excluded.phone,
                     updated_at = excluded.updated_at",
                params![
                    client.id.as_str(),
                    client.name.as_str(),
                    client.email.as_str(),
                    client.phone.as_str(),
                    to_millis(client.created_at),
                    to_millis(client.updated_at)
                ],
            )
            .await?;

        self.get(&client.id)
            .await?
            .ok_or_else(|| Error::Database(format!("client {} vanished", client.id)))
    }

    /// Insert `client` unless its id is already stored.
    pub async fn insert_new(&self, client: &Client) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO clients (id, name, email, phone, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    client.id.as_str(),
                    client.name.as_str(),
                    client.email.as_str(),
                    client.phone.as_str(),
                    to_millis(client.created_at),
                    to_millis(client.updated_at)
                ],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// Compare-and-set of name, email and phone against the values in
    /// `current`. Returns `false` when the row changed underneath or is gone.
    pub async fn apply_external(&self, current: &Client, merged: &Client) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE clients
                 SET name = ?, email = ?, phone = ?, updated_at = ?
                 WHERE id = ? AND name = ? AND email = ? AND phone = ?",
                params![
                    merged.name.as_str(),
                    merged.email.as_str(),
                    merged.phone.as_str(),
                    to_millis(merged.updated_at),
                    current.id.as_str(),
                    current.name.as_str(),
                    current.email.as_str(),
                    current.phone.as_str()
                ],
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM clients WHERE id = ?", [id])
            .await?;
        Ok(rows > 0)
    }

    async fn first(&self, sql: &str, key: &str) -> Result<Option<Client>> {
        let mut rows = self.conn.query(sql, [key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(parse_client(&row)?)),
            None => Ok(None),
        }
    }
}

fn parse_client(row: &Row) -> Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn client(id: &str, name: &str, email: &str, phone: &str) -> Client {
        Client {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_get_and_lookups() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClientRepository::new(db.connection());

        let ada = client("c-1", "Ada Lovelace", "ada@example.com", "555-0100");
        assert_eq!(repo.upsert(&ada).await.unwrap(), ada);
        assert!(repo.exists("c-1").await.unwrap());

        let by_email = repo.find_by_email("ada@example.com").await.unwrap();
        assert_eq!(by_email.map(|c| c.id), Some("c-1".to_string()));
        let by_phone = repo.find_by_phone("555-0100").await.unwrap();
        assert_eq!(by_phone.map(|c| c.id), Some("c-1".to_string()));
        assert!(repo
            .find_by_email("ADA@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_updates_existing_row() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClientRepository::new(db.connection());

        repo.upsert(&client("c-1", "Ada", "ada@example.com", "555-0100"))
            .await
            .unwrap();
        let mut renamed = client("c-1", "Ada King", "ada@example.com", "555-0100");
        renamed.created_at = at(10);
        renamed.updated_at = at(10);
        let stored = repo.upsert(&renamed).await.unwrap();

        assert_eq!(stored.name, "Ada King");
        assert_eq!(stored.created_at, at(8));
        assert_eq!(stored.updated_at, at(10));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_searches_name_case_insensitively() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClientRepository::new(db.connection());

        repo.upsert(&client("c-2", "grace hopper", "grace@example.com", "2"))
            .await
            .unwrap();
        repo.upsert(&client("c-1", "Ada Lovelace", "ada@example.com", "1"))
            .await
            .unwrap();
        repo.upsert(&client("c-3", "100% Real", "real@example.com", "3"))
            .await
            .unwrap();

        let all = repo.list(&ClientFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["100% Real", "Ada Lovelace", "grace hopper"]);

        let hopper = repo
            .list(&ClientFilter {
                name_contains: Some("HOPP".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(hopper.len(), 1);
        assert_eq!(hopper[0].id, "c-2");

        let literal_percent = repo
            .list(&ClientFilter {
                name_contains: Some("0%".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(literal_percent.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_external_only_over_the_values_it_read() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClientRepository::new(db.connection());

        let seen = client("c-1", "Ada", "ada@example.com", "1");
        assert!(repo.insert_new(&seen).await.unwrap());
        assert!(!repo.insert_new(&seen).await.unwrap());

        let mut merged = seen.clone();
        merged.phone = "2".to_string();
        merged.updated_at = at(9);
        assert!(repo.apply_external(&seen, &merged).await.unwrap());
        assert_eq!(repo.get("c-1").await.unwrap().unwrap().phone, "2");

        // A second writer working from the stale row loses
        let mut stale = seen.clone();
        stale.name = "Ada King".to_string();
        assert!(!repo.apply_external(&seen, &stale).await.unwrap());
        assert_eq!(repo.get("c-1").await.unwrap().unwrap().name, "Ada");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClientRepository::new(db.connection());

        repo.upsert(&client("c-1", "Ada", "ada@example.com", "1"))
            .await
            .unwrap();
        assert!(repo.delete("c-1").await.unwrap());
        assert!(!repo.delete("c-1").await.unwrap());
        assert!(repo.get("c-1").await.unwrap().is_none());
    }
}
