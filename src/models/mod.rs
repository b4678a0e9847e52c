pub mod account;
pub mod stats;

pub use account::{Account, AccountConfigItem, AccountListResponse};
pub use stats::Stats;
