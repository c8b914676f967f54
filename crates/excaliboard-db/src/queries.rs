use crate::Database;
use crate::error::Result;
use crate::records::Record;

/// Single-record operations. Each runs as its own one-operation batch and
/// is atomic on its own; sequences of them are not.
impl Database {
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        self.batch(|b| b.put(record))
    }

    pub fn get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        self.read(|b| b.get(id))
    }

    pub fn query_by_index<R: Record>(&self, value: &str) -> Result<Vec<R>> {
        self.read(|b| b.query_by_index(value))
    }

    pub fn delete<R: Record>(&self, id: &str) -> Result<bool> {
        self.batch(|b| b.delete::<R>(id))
    }

    pub fn count<R: Record>(&self, value: &str) -> Result<u64> {
        self.read(|b| b.count::<R>(value))
    }
}
