//! 条件比较与条件集合评估的性能基准测试

use alarm_engine::{Condition, ConditionEvaluator, ConditionSetEvaluator, Value, ValueMap};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// 各类型单次比较
fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");

    let integer = Value::integer(1, 1000);
    let decimal = Value::decimal(2, 36.6);
    let text = Value::text(3, "RUNNING");
    let boolean = Value::boolean(4, true);

    group.bench_function("integer_gt", |b| {
        b.iter(|| ConditionEvaluator::compare(black_box(&integer), black_box(">"), black_box("500")))
    });

    group.bench_function("decimal_lte", |b| {
        b.iter(|| {
            ConditionEvaluator::compare(black_box(&decimal), black_box("<="), black_box(" 37.5 "))
        })
    });

    group.bench_function("text_eq", |b| {
        b.iter(|| {
            ConditionEvaluator::compare(black_box(&text), black_box("=="), black_box("RUNNING"))
        })
    });

    group.bench_function("boolean_neq", |b| {
        b.iter(|| ConditionEvaluator::compare(black_box(&boolean), black_box("!="), black_box("0")))
    });

    group.bench_function("invalid_literal", |b| {
        b.iter(|| ConditionEvaluator::compare(black_box(&integer), black_box(">"), black_box("abc")))
    });

    group.finish();
}

/// 不同条件数量的规则评估
fn bench_condition_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_set");

    for size in [1_i64, 5, 20, 100] {
        let values: ValueMap = (0..size).map(|id| (id, Value::integer(id, id * 10))).collect();
        let conditions: Vec<Condition> = (0..size)
            .map(|id| Condition::new(id, 1, id, ">=", (id * 10).to_string()))
            .collect();

        group.bench_with_input(BenchmarkId::new("all_match", size), &size, |b, _| {
            b.iter(|| {
                ConditionSetEvaluator::evaluate(1, black_box(&conditions), black_box(&values))
                    .matched()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compare, bench_condition_set);
criterion_main!(benches);
