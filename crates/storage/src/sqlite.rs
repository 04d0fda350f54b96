use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use taller_core::{Expedient, ExpedientId, IdSpace};

use crate::error::StorageError;
use crate::traits::Store;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        crate::schema::init_schema(&conn)?;
        debug!("opened expedient store at {}", path.as_ref().display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn encode(expedient: &Expedient) -> Result<Vec<u8>, StorageError> {
    rmp_serde::to_vec(expedient).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode(space: i64, id: i64, body: &[u8]) -> Result<(ExpedientId, Expedient), StorageError> {
    let space = IdSpace::from_i64(space)
        .ok_or_else(|| StorageError::Serialization(format!("unknown id space {space}")))?;
    let number = u64::try_from(id)
        .map_err(|_| StorageError::Serialization(format!("negative expedient id {id}")))?;
    let expedient: Expedient =
        rmp_serde::from_slice(body).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok((ExpedientId::new(space, number), expedient))
}

fn sql_id(id: ExpedientId) -> Result<(i64, i64), StorageError> {
    let number = i64::try_from(id.number())
        .map_err(|_| StorageError::Serialization(format!("expedient id {id} out of range")))?;
    Ok((id.space().as_i64(), number))
}

impl Store for SqliteStore {
    fn insert(&mut self, space: IdSpace, expedient: &Expedient) -> Result<ExpedientId, StorageError> {
        let body = encode(expedient)?;
        let tx = self.conn.transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(id) + 1, 0) FROM expedients WHERE space = ?1",
            [space.as_i64()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO expedients (space, id, created_at, newest_at, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                space.as_i64(),
                next,
                expedient.created.millis(),
                expedient.newest_instant().millis(),
                body,
            ],
        )?;
        tx.commit()?;
        let number = u64::try_from(next)
            .map_err(|_| StorageError::Serialization(format!("negative expedient id {next}")))?;
        Ok(ExpedientId::new(space, number))
    }

    fn put(&mut self, id: ExpedientId, expedient: &Expedient) -> Result<(), StorageError> {
        let (space, number) = sql_id(id)?;
        let changed = self.conn.execute(
            "UPDATE expedients SET created_at = ?1, newest_at = ?2, body = ?3 WHERE space = ?4 AND id = ?5",
            rusqlite::params![
                expedient.created.millis(),
                expedient.newest_instant().millis(),
                encode(expedient)?,
                space,
                number,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    fn remove(&mut self, id: ExpedientId) -> Result<bool, StorageError> {
        let (space, number) = sql_id(id)?;
        let changed = self.conn.execute(
            "DELETE FROM expedients WHERE space = ?1 AND id = ?2",
            rusqlite::params![space, number],
        )?;
        Ok(changed > 0)
    }

    fn get(&self, id: ExpedientId) -> Result<Option<Expedient>, StorageError> {
        let (space, number) = sql_id(id)?;
        let body: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT body FROM expedients WHERE space = ?1 AND id = ?2",
                rusqlite::params![space, number],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(decode(space, number, &body)?.1)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<(ExpedientId, Expedient)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT space, id, body FROM expedients ORDER BY newest_at DESC, space, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, Vec<u8>>(2)?))
        })?;
        let mut expedients = Vec::new();
        for row in rows {
            let (space, id, body) = row?;
            expedients.push(decode(space, id, &body)?);
        }
        Ok(expedients)
    }

    fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM expedients", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("negative row count {count}")))
    }
}
