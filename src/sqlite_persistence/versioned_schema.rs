use anyhow::{bail, Result};
use rusqlite::{params, types::Type, Connection};

pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `is_primary_key = true`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

/// A `REFERENCES table(column)` clause. No ON DELETE action is declared since
/// rows are never deleted.
pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub foreign_key: Option<&'a ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
}

impl Table {
    fn primary_key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name)
            .collect()
    }

    /// Builds the `CREATE TABLE` statement. A single primary key column gets an
    /// inline `PRIMARY KEY`, more than one becomes a table-level constraint.
    pub fn create_sql(&self) -> String {
        let primary_key = self.primary_key_columns();
        let composite_key = primary_key.len() > 1;

        let mut create_sql = format!("CREATE TABLE {} (", self.name);
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_sql.push_str(", ");
            }
            create_sql.push_str(&format!("{} {}", column.name, column.sql_type.as_sql()));
            if column.is_primary_key && !composite_key {
                create_sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                create_sql.push_str(" NOT NULL");
            }
            if let Some(foreign_key) = column.foreign_key {
                create_sql.push_str(&format!(
                    " REFERENCES {}({})",
                    foreign_key.foreign_table, foreign_key.foreign_column,
                ));
            }
        }
        if composite_key {
            create_sql.push_str(&format!(", PRIMARY KEY ({})", primary_key.join(", ")));
        }
        create_sql.push_str(");");
        create_sql
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        Ok(())
    }

    fn exists(&self, conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            params![self.name],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        if !self.exists(conn)? {
            bail!("Table {} does not exist", self.name);
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns: Vec<Column<'_, String>> = stmt
            .query_map(params![], |row| {
                let name = row.get::<usize, String>(1)?;
                let sql_type = match row.get::<_, String>(2)?.as_str() {
                    "TEXT" => &SqlType::Text,
                    "INTEGER" => &SqlType::Integer,
                    _ => {
                        return Err(rusqlite::Error::InvalidColumnType(
                            2,
                            name.clone(),
                            Type::Text,
                        ))
                    }
                };

                Ok(Column {
                    name,
                    sql_type,
                    non_null: row.get::<_, i32>(3)? == 1,
                    // pk is the 1-based position inside the primary key, 0 when not part of it
                    is_primary_key: row.get::<_, i32>(5)? > 0,
                    foreign_key: None,
                })
            })?
            .collect::<Result<_, _>>()?;

        if actual_columns.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found column names: {}, expected: {}",
                self.name,
                actual_columns.len(),
                self.columns.len(),
                actual_columns
                    .iter()
                    .map(|c| c.name.clone())
                    .collect::<Vec<String>>()
                    .join(", "),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (actual_column, expected_column) in actual_columns.iter().zip(self.columns.iter()) {
            if actual_column.name != expected_column.name {
                bail!(
                    "Table {} Column name mismatch: expected {}, got {}",
                    self.name,
                    expected_column.name,
                    actual_column.name
                );
            }
            if actual_column.sql_type != expected_column.sql_type {
                bail!(
                    "Table {} Column {} type mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected_column.name,
                    expected_column.sql_type,
                    actual_column.sql_type
                );
            }
            if actual_column.non_null != expected_column.non_null {
                bail!(
                    "Table {} Column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected_column.name,
                    expected_column.non_null,
                    actual_column.non_null
                );
            }
            if actual_column.is_primary_key != expected_column.is_primary_key {
                bail!(
                    "Table {} Column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected_column.name,
                    expected_column.is_primary_key,
                    actual_column.is_primary_key
                );
            }
        }

        // PRAGMA foreign_key_list returns: id, seq, table, from, to, on_update, on_delete, match
        let mut fk_stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", self.name))?;
        let actual_fks: Vec<(String, String, String)> = fk_stmt
            .query_map([], |row| Ok((row.get(3)?, row.get(2)?, row.get(4)?)))?
            .collect::<Result<_, _>>()?;

        for column in self.columns {
            let Some(expected_fk) = column.foreign_key else {
                continue;
            };
            let found = actual_fks.iter().any(|(from, to_table, to_column)| {
                from == column.name
                    && to_table == expected_fk.foreign_table
                    && to_column == expected_fk.foreign_column
            });
            if !found {
                bail!(
                    "Table {} column {} is missing foreign key: expected REFERENCES {}({})",
                    self.name,
                    column.name,
                    expected_fk.foreign_table,
                    expected_fk.foreign_column
                );
            }
        }
        Ok(())
    }
}

/// A secondary index over a single column, created on demand.
pub struct Index {
    pub name: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    pub descending: bool,
}

impl Index {
    pub fn create_if_missing(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({} {})",
                self.name,
                self.table,
                self.column,
                if self.descending { "DESC" } else { "ASC" }
            ),
            params![],
        )?;
        Ok(())
    }

    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
            params![self.name, self.table],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
}

impl VersionedSchema {
    /// Creates every table and stamps the version in one transaction, so an
    /// interrupted run leaves the database empty.
    pub fn create(&self, conn: &Connection) -> Result<()> {
        // Has no effect inside a transaction.
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        let tx = conn.unchecked_transaction()?;
        for table in self.tables {
            table.create(&tx)?;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + self.version)?;
        tx.commit()?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT_FK: ForeignKey = ForeignKey {
        foreign_table: "parent",
        foreign_column: "id",
    };

    const PARENT_TABLE: Table = Table {
        name: "parent",
        columns: &[sqlite_column!(
            "id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true
        )],
    };

    const CHILD_TABLE: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("owner", &SqlType::Text, is_primary_key = true, non_null = true),
            sqlite_column!("at", &SqlType::Integer, is_primary_key = true, non_null = true),
            sqlite_column!("parent_id", &SqlType::Text, foreign_key = Some(&PARENT_FK)),
        ],
    };

    const TEST_SCHEMA: VersionedSchema = VersionedSchema {
        version: 0,
        tables: &[PARENT_TABLE, CHILD_TABLE],
    };

    #[test]
    fn test_create_sql_inline_primary_key() {
        assert_eq!(
            PARENT_TABLE.create_sql(),
            "CREATE TABLE parent (id TEXT PRIMARY KEY NOT NULL);"
        );
    }

    #[test]
    fn test_create_sql_composite_primary_key() {
        assert_eq!(
            CHILD_TABLE.create_sql(),
            "CREATE TABLE child (owner TEXT NOT NULL, at INTEGER NOT NULL, \
             parent_id TEXT REFERENCES parent(id), PRIMARY KEY (owner, at));"
        );
    }

    #[test]
    fn test_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        TEST_SCHEMA.validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, BASE_DB_VERSION as i64);
    }

    #[test]
    fn test_failed_create_leaves_database_empty() {
        const BROKEN_SCHEMA: VersionedSchema = VersionedSchema {
            version: 0,
            tables: &[PARENT_TABLE, CHILD_TABLE, PARENT_TABLE],
        };
        let conn = Connection::open_in_memory().unwrap();

        assert!(BROKEN_SCHEMA.create(&conn).is_err());

        let table_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type='table'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(table_count, 0);
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 0);

        TEST_SCHEMA.create(&conn).unwrap();
        TEST_SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn test_composite_key_rejects_duplicates() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();

        conn.execute("INSERT INTO child (owner, at) VALUES ('a', 1)", [])
            .unwrap();
        conn.execute("INSERT INTO child (owner, at) VALUES ('a', 2)", [])
            .unwrap();
        let result = conn.execute("INSERT INTO child (owner, at) VALUES ('a', 1)", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_detects_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();

        let err_msg = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err_msg.contains("child"));
        assert!(err_msg.contains("does not exist"));
    }

    #[test]
    fn test_validate_detects_missing_foreign_key() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (
                owner TEXT NOT NULL,
                at INTEGER NOT NULL,
                parent_id TEXT,
                PRIMARY KEY (owner, at)
            )",
            [],
        )
        .unwrap();

        let err_msg = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err_msg.contains("missing foreign key"));
        assert!(err_msg.contains("parent_id"));
    }

    #[test]
    fn test_validate_detects_primary_key_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT_TABLE.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (
                owner TEXT PRIMARY KEY NOT NULL,
                at INTEGER NOT NULL,
                parent_id TEXT REFERENCES parent(id)
            )",
            [],
        )
        .unwrap();

        let err_msg = TEST_SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err_msg.contains("primary key mismatch"));
        assert!(err_msg.contains("at"));
    }

    #[test]
    fn test_validate_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY NOT NULL)", [])
            .unwrap();

        let err_msg = PARENT_TABLE.validate(&conn).unwrap_err().to_string();
        assert!(err_msg.contains("type mismatch"));
    }

    #[test]
    fn test_index_create_if_missing_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        TEST_SCHEMA.create(&conn).unwrap();
        let index = Index {
            name: "idx_child_at",
            table: "child",
            column: "at",
            descending: false,
        };

        assert!(!index.exists(&conn).unwrap());
        index.create_if_missing(&conn).unwrap();
        index.create_if_missing(&conn).unwrap();
        assert!(index.exists(&conn).unwrap());
    }
}
