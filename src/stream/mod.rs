//! Session adapter.
//!
//! Only the header and the type records are modelled here: enough for a
//! host engine to hand type names to the resolver and cache the answers for
//! the rest of the session. Object graphs and field data are not.

pub mod header;
pub mod input;
pub mod output;

pub use header::{read_header, write_header, BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION};
pub use input::{ObjectInput, StreamConfig};
pub use output::ObjectOutput;
