//! 测量值仓储
//!
//! measurement_values 每个类型一列，按 value_type 选择载荷列；
//! 载荷为 NULL 时取该类型的零值，未知类型的行被跳过。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{instrument, warn};

use super::traits::ValueRepositoryTrait;
use crate::error::Result;
use crate::models::{Reading, Value, ValueKind, ValueMap};

/// 测量值仓储
pub struct ValueRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ValueRow {
    id: i64,
    value_type: i32,
    int_value: Option<i64>,
    decimal_value: Option<f64>,
    text_value: Option<String>,
    binary_value: Option<Vec<u8>>,
    bit_value: Option<bool>,
}

impl ValueRow {
    fn into_value(self) -> Option<Value> {
        let reading = match ValueKind::from_type_id(self.value_type)? {
            ValueKind::Integer => Reading::Integer(self.int_value.unwrap_or_default()),
            ValueKind::Decimal => Reading::Decimal(self.decimal_value.unwrap_or_default()),
            ValueKind::Text => Reading::Text(self.text_value.unwrap_or_default()),
            ValueKind::Binary => Reading::Binary(self.binary_value.unwrap_or_default()),
            ValueKind::Boolean => Reading::Boolean(self.bit_value.unwrap_or_default()),
        };
        Some(Value::new(self.id, reading))
    }
}

impl ValueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ValueRepositoryTrait for ValueRepository {
    #[instrument(skip(self))]
    async fn load_values(&self) -> Result<ValueMap> {
        let rows = sqlx::query_as::<_, ValueRow>(
            r#"
            SELECT id, value_type, int_value, decimal_value, text_value, binary_value, bit_value
            FROM measurement_values
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut values = ValueMap::with_capacity(rows.len());
        for row in rows {
            let (id, value_type) = (row.id, row.value_type);
            match row.into_value() {
                Some(value) => {
                    values.insert(id, value);
                }
                None => warn!(value_id = id, value_type, "未知的测量值类型，已跳过"),
            }
        }

        Ok(values)
    }
}
