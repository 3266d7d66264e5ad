//! [`FragmentMapper`](crate::stages::writer::FragmentMapper) implementations.

mod information;

pub use information::{InformationMapper, source_domain};
