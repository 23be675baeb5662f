pub mod expand_cmd;
pub mod inspect_cmd;
pub mod query_cmd;

pub use expand_cmd::cmd_expand;
pub use inspect_cmd::cmd_inspect;
pub use query_cmd::cmd_query;
