// crates/db/src/queries/mod.rs
// Query methods on `Database`, split by table group.

pub(crate) mod logs;
pub(crate) mod passwords;
pub(crate) mod row_types;
pub(crate) mod users;
