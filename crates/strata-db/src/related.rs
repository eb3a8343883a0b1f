//! Many-to-many association handles.
//!
//! [`Related`] wraps the [`JunctionTable`] behind one many-to-many field and
//! manages its rows for a given owner id.

use strata_core::{StrataError, StrataResult};

use crate::executor::DbExecutor;
use crate::model::ModelMeta;
use crate::naming::quote_ident;
use crate::query::Statement;
use crate::registry::ModelRegistry;
use crate::schema::JunctionTable;
use crate::value::Value;

/// Association operations for one many-to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Related {
    junction: JunctionTable,
}

impl Related {
    /// Resolves the field `field_name` declared on `owner`.
    pub fn resolve(
        registry: &ModelRegistry,
        owner: &ModelMeta,
        field_name: &str,
    ) -> StrataResult<Self> {
        Ok(Self {
            junction: JunctionTable::resolve(registry, owner, field_name)?,
        })
    }

    /// Wraps an already resolved junction table, or one built with
    /// [`JunctionTable::with_columns`].
    pub const fn from_junction(junction: JunctionTable) -> Self {
        Self { junction }
    }

    /// The underlying junction table.
    pub const fn junction(&self) -> &JunctionTable {
        &self.junction
    }

    fn insert_statement(&self, owner_id: i64, target_id: i64) -> Statement {
        Statement::new(
            format!(
                "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                quote_ident(&self.junction.table),
                quote_ident(&self.junction.owner_column),
                quote_ident(&self.junction.target_column),
            ),
            vec![Value::Int(owner_id), Value::Int(target_id)],
        )
    }

    fn clear_statement(&self, owner_id: i64) -> Statement {
        Statement::new(
            format!(
                "DELETE FROM {} WHERE {} = ?",
                quote_ident(&self.junction.table),
                quote_ident(&self.junction.owner_column),
            ),
            vec![Value::Int(owner_id)],
        )
    }

    /// Returns `true` if the pair is already associated.
    pub async fn contains(
        &self,
        db: &dyn DbExecutor,
        owner_id: i64,
        target_id: i64,
    ) -> StrataResult<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ? AND {} = ? LIMIT 1",
            quote_ident(&self.junction.table),
            quote_ident(&self.junction.owner_column),
            quote_ident(&self.junction.target_column),
        );
        let rows = db
            .query(&sql, &[Value::Int(owner_id), Value::Int(target_id)])
            .await?;
        Ok(!rows.is_empty())
    }

    /// Associates `target_id` with `owner_id`. Returns `false` when the pair
    /// already existed.
    pub async fn add(&self, db: &dyn DbExecutor, owner_id: i64, target_id: i64) -> StrataResult<bool> {
        if self.contains(db, owner_id, target_id).await? {
            return Ok(false);
        }
        let stmt = self.insert_statement(owner_id, target_id);
        db.execute_sql(&stmt.sql, &stmt.params).await?;
        Ok(true)
    }

    /// Removes one association; returns whether it existed.
    pub async fn remove(
        &self,
        db: &dyn DbExecutor,
        owner_id: i64,
        target_id: i64,
    ) -> StrataResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ? AND {} = ?",
            quote_ident(&self.junction.table),
            quote_ident(&self.junction.owner_column),
            quote_ident(&self.junction.target_column),
        );
        let n = db
            .execute_sql(&sql, &[Value::Int(owner_id), Value::Int(target_id)])
            .await?;
        Ok(n > 0)
    }

    /// Removes every association of `owner_id`; returns how many.
    pub async fn clear(&self, db: &dyn DbExecutor, owner_id: i64) -> StrataResult<u64> {
        let stmt = self.clear_statement(owner_id);
        db.execute_sql(&stmt.sql, &stmt.params).await
    }

    /// Replaces the associations of `owner_id` with `target_ids` in one
    /// transaction. Duplicate ids are collapsed.
    pub async fn set(
        &self,
        db: &dyn DbExecutor,
        owner_id: i64,
        target_ids: &[i64],
    ) -> StrataResult<()> {
        let mut unique: Vec<i64> = Vec::with_capacity(target_ids.len());
        for id in target_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let mut batch = vec![self.clear_statement(owner_id)];
        batch.extend(unique.into_iter().map(|t| self.insert_statement(owner_id, t)));
        db.execute_atomic(&batch).await?;
        Ok(())
    }

    /// Target ids associated with `owner_id`, in insertion order.
    pub async fn ids(&self, db: &dyn DbExecutor, owner_id: i64) -> StrataResult<Vec<i64>> {
        let sql = format!(
            "SELECT {target} FROM {} WHERE {} = ? ORDER BY \"id\"",
            quote_ident(&self.junction.table),
            quote_ident(&self.junction.owner_column),
            target = quote_ident(&self.junction.target_column),
        );
        db.query(&sql, &[Value::Int(owner_id)])
            .await?
            .iter()
            .map(|row| {
                row.get_by_index::<i64>(0).map_err(|e| {
                    StrataError::DatabaseError(format!(
                        "Malformed row in '{}': {e}",
                        self.junction.table
                    ))
                })
            })
            .collect()
    }
}
