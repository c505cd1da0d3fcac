//! 行程融资市场的共享类型与业务规则
//!
//! 前后端都依赖本 crate：领域模型、利息计算、逾期判定、分页筛选、
//! CSV 批量解析，以及 REST 协议定义。

pub mod bulk_csv;
pub mod date;
pub mod filter;
pub mod finance;
pub mod maturity;
pub mod model;
pub mod pagination;
pub mod protocol;

pub use date::Timestamp;
pub use model::*;
pub use protocol::{HEADER_AUTH_KEY, HEADER_AUTHORIZATION};
