mod transport;

pub use flowprep_types as types;
pub use transport::{EventRx, Transport, TransportConfig};
