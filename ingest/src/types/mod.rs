mod field_path;
mod fragment;
mod record;

pub use field_path::{FieldPath, HeaderField, PayloadSection};
pub use fragment::{Cell, DeferredLookup, FragmentRow, JsonRow, TableRows, WriteFragment};
pub use record::{Payload, Record};
