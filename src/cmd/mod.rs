//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                  |
//! |-----------|-----------------------------------|
//! | `serve`   | `Serve`, `InitDb`                 |
//! | `records` | `Customer`, `Order`               |
//! | `report`  | `Progress`, `Milestone`           |
//! | `config`  | `Config`                          |

pub mod config;
pub mod records;
pub mod report;
pub mod serve;

pub use config::cmd_config;
pub use records::{cmd_customer, cmd_order};
pub use report::{cmd_milestone, cmd_progress};
pub use serve::{cmd_init_db, cmd_serve};
