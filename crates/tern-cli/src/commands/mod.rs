//! CLI command implementations

pub(crate) mod common;
pub(crate) mod migrate;
pub(crate) mod plan;
pub(crate) mod resolve;
pub(crate) mod rollback;
pub(crate) mod state;
pub(crate) mod status;
