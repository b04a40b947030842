use core::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

use crate::RecordKind;

/// A record persisted by the portal.
///
/// Usually implemented with `#[derive(Record)]`, which also generates the
/// [`Record::Field`] enum naming every document field of the record.
pub trait Record: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// The collection this record lives in.
    const KIND: RecordKind;
    /// Typed names of the record's document fields.
    type Field: RecordField;

    /// Stable identifier assigned at creation.
    fn id(&self) -> &str;
}

/// A field of some [`Record`], usable in queries and partial updates.
pub trait RecordField: Copy + Debug + Send + Sync + 'static {
    /// Name of the field inside a stored document.
    fn name(self) -> &'static str;
}
