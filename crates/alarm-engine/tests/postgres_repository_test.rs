//! PostgreSQL 仓储集成测试
//!
//! 需要可用的数据库：
//! DATABASE_URL=postgres://... cargo test -p alarm-engine --test postgres_repository_test -- --ignored

use std::sync::Arc;

use alarm_engine::repository::{
    FiringRepository, FiringRepositoryTrait, RuleRepository, RuleRepositoryTrait,
    ValueRepository, ValueRepositoryTrait,
};
use alarm_engine::{AlarmEngine, LogNotifier, MIGRATOR, Reading, Rule};
use chrono::Utc;
use sqlx::PgPool;

async fn setup() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL 未设置");
    let pool = PgPool::connect(&url).await.unwrap();
    MIGRATOR.run(&pool).await.unwrap();
    pool
}

/// 只测试仓储的规则插入为停用状态，避免被并行运行的引擎测试评估
async fn insert_rule(pool: &PgPool, name: &str, active: bool) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO alarm_rules (name, message, active)
        VALUES ($1, 'integration test', $2)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(active)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_int_value(pool: &PgPool, value: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO measurement_values (value_type, int_value) VALUES (1, $1) RETURNING id",
    )
    .bind(value)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_condition(
    pool: &PgPool,
    rule_id: i64,
    value_id: i64,
    operator: &str,
    literal: &str,
) {
    sqlx::query(
        "INSERT INTO rule_conditions (rule_id, value_id, operator, literal) VALUES ($1, $2, $3, $4)",
    )
    .bind(rule_id)
    .bind(value_id)
    .bind(operator)
    .bind(literal)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_claim_is_compare_and_set() {
    let pool = setup().await;
    let repo = RuleRepository::new(pool.clone());
    let rule_id = insert_rule(&pool, "claim", false).await;

    assert!(repo.try_claim(rule_id).await.unwrap());
    assert!(!repo.try_claim(rule_id).await.unwrap());

    repo.release(rule_id).await.unwrap();
    let rule = repo.get_rule(rule_id).await.unwrap().unwrap();
    assert!(!rule.armed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // 需要数据库连接
async fn test_concurrent_claims_single_winner() {
    let pool = setup().await;
    let repo = Arc::new(RuleRepository::new(pool.clone()));
    let rule_id = insert_rule(&pool, "race", false).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.try_claim(rule_id).await.unwrap() })
        })
        .collect();

    let winners = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter(|r| *r.as_ref().unwrap())
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_update_rule_keeps_armed() {
    let pool = setup().await;
    let repo = RuleRepository::new(pool.clone());
    let rule_id = insert_rule(&pool, "edit", false).await;
    repo.try_claim(rule_id).await.unwrap();

    let mut edited = Rule::new(rule_id, "edited", "new message").with_interval(15);
    edited.active = false;
    repo.update_rule(&edited).await.unwrap();

    let stored = repo.get_rule(rule_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "edited");
    assert_eq!(stored.interval_minutes, 15);
    assert!(stored.armed);

    let missing = Rule::new(-1, "missing", "");
    assert!(repo.update_rule(&missing).await.is_err());
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_null_payload_loads_as_zero() {
    let pool = setup().await;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO measurement_values (value_type) VALUES (2) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let values = ValueRepository::new(pool).load_values().await.unwrap();
    assert_eq!(values.get(&id).map(|v| &v.reading), Some(&Reading::Decimal(0.0)));
}

#[tokio::test]
#[ignore] // 需要数据库连接
async fn test_engine_fires_once_against_postgres() {
    let pool = setup().await;
    let rule_id = insert_rule(&pool, "engine", true).await;
    let value_id = insert_int_value(&pool, 42).await;
    insert_condition(&pool, rule_id, value_id, ">", "40").await;

    let firings = Arc::new(FiringRepository::new(pool.clone()));
    let engine = AlarmEngine::new(
        Arc::new(RuleRepository::new(pool.clone())),
        Arc::new(ValueRepository::new(pool.clone())),
        firings.clone(),
        Arc::new(LogNotifier),
    );

    let now = Utc::now();
    engine.run_cycle_at(now).await.unwrap();
    engine.run_cycle_at(now + chrono::Duration::minutes(1)).await.unwrap();

    let records = firings.list_firings(rule_id, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "integration test");
}
