#![forbid(unsafe_code)]

pub mod cli;
pub mod fetch;
pub mod formats;
pub mod ledger;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod reading_list;
pub mod sources;
pub mod status;
