//! Benchmarks for validating and planning specifications of growing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use term_qc::checks::CheckRegistry;
use term_qc::core::{Planner, RawSpecification, Validator};
use term_qc::sources::GlobResolver;

const SINGLE_IDS: [&str; 5] = ["qc1", "qc4", "qc6", "qc7", "qc52"];
const COMPARE_IDS: [&str; 3] = ["qc46", "qc47", "qc49"];

/// A specification with `inputs` slots, every single-dataset check on each
/// slot and every comparison between `input1` and `input2`.
fn create_spec(inputs: usize) -> RawSpecification {
    let mut yaml = String::from("general:\n");
    for i in 1..=inputs {
        yaml.push_str(&format!("  input{i}: data/cohort_{i}.csv\n"));
    }
    yaml.push_str(
        "  output_dir: out/\n  source: csv\n  patient_id_col: PATIENT_ID\n  matched_patient_id_col: MATCHED_ID\n  target_col: TARGET\n  date_cols: [_dt]\n  count_cols: [_count]\n  freq_cols: [_freq]\n  first_exp_date_cols: [FIRST_EXP_dt]\n  last_exp_date_cols: [LAST_EXP_dt]\nchecks:\n",
    );

    let slots: Vec<String> = (1..=inputs).map(|i| format!("input{i}")).collect();
    for (order, id) in SINGLE_IDS.iter().enumerate() {
        yaml.push_str(&format!(
            "  {id}:\n    input_file: [{}]\n    level: warning\n    order: {order}\n",
            slots.join(", ")
        ));
    }
    if inputs >= 2 {
        for id in COMPARE_IDS {
            yaml.push_str(&format!(
                "  {id}:\n    input_file: [input1, input2]\n    level: info\n"
            ));
        }
    }
    RawSpecification::from_yaml_str(&yaml).expect("Generated specification should parse")
}

fn bench_validate(c: &mut Criterion) {
    let registry = CheckRegistry::global();
    let mut group = c.benchmark_group("validate");
    for inputs in [1, 10, 50] {
        let raw = create_spec(inputs);
        group.bench_with_input(BenchmarkId::from_parameter(inputs), &raw, |b, raw| {
            b.iter(|| Validator::new(&registry).validate(black_box(raw)).unwrap())
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let registry = CheckRegistry::global();
    let resolver = GlobResolver::new();
    let mut group = c.benchmark_group("plan");
    for inputs in [1, 10, 50] {
        let spec = Validator::new(&registry)
            .validate(&create_spec(inputs))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(inputs), &spec, |b, spec| {
            b.iter(|| {
                Planner::new(&registry, &resolver)
                    .plan(black_box(spec))
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate, bench_plan);
criterion_main!(benches);
