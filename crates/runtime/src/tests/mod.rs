//! Cross-module tests: merge properties over random fact streams and the
//! background sync tasks against a scripted indexer.

mod merge_properties;
mod sync_tasks;

use chain_types::Address;

pub(crate) fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

pub(crate) fn player_a() -> Address {
    addr("0xa")
}

pub(crate) fn player_b() -> Address {
    addr("0xb")
}
