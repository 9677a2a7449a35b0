pub mod auth; // session credential validation
pub mod client; // client-side advisory gate and credit display helpers
pub mod config_parser; // StoryForge gateway config file
pub mod endpoints; // API endpoints
pub mod error; // error handling
pub mod gateway_util; // utilities for gateway
pub mod generation; // generation backend client
pub mod observability; // utilities for observability (logs, etc.)
pub mod store; // profile, project, and usage-log stores
pub mod subscription; // subscription tiers and credit counters
pub mod validation; // generation request validation
