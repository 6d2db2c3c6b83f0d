//! Archiving proxy protocol: routing directives and auxiliary record writes

pub mod meta;
pub mod transport;
pub mod writer;

pub use meta::{BucketMode, StatsDirective, WarcproxMeta};
pub use transport::{RecordTransport, TcpRecordTransport, WriteRecordRequest};
pub use writer::RecordWriter;
