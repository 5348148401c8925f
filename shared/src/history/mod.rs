mod reliable;
mod unreliable;

pub use reliable::ReliableHistory;
pub use unreliable::{
    read_ack_prefix, write_ack_prefix, UnreliableHistory, UnreliableHistoryConfig,
};
