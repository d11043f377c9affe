//! 数据库仓储层
//!
//! 提供规则、测量值和触发记录的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含评估逻辑
//! - 使用 SQLx 进行类型安全的数据库操作
//! - armed 标记只通过 try_claim / release 两个操作变更
//! - 定义 trait 接口以支持 mock 测试和内存实现

mod firing_repo;
mod memory;
mod rule_repo;
mod traits;
mod value_repo;

pub use firing_repo::FiringRepository;
pub use memory::InMemoryAlarmStore;
pub use rule_repo::RuleRepository;
pub use traits::*;
pub use value_repo::ValueRepository;
