use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use skillcheck_core::model::{QuestionType, QuizSpec};
use skillcheck_core::quiz::plan_quiz;
use skillcheck_core::rubric::keyword_coverage;

const ANSWER: &str = "In a series circuit the same current flows through every component, \
    while in a parallel circuit the voltage across each branch is the same and the total \
    current is split between branches. A fuse or circuit breaker protects the cable, and the \
    earth conductor gives fault current a low-resistance path back to the supply.";

fn keywords(n: usize) -> Vec<String> {
    let pool = [
        "series", "parallel", "current", "voltage", "fuse", "circuit breaker", "earth",
        "neutral", "insulation", "resistance", "continuity", "polarity",
    ];
    pool.iter().cycle().take(n).map(|s| s.to_string()).collect()
}

fn bench_keyword_coverage(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyword_coverage");

    for n in [3, 12] {
        let keys = keywords(n);
        group.bench_function(format!("keywords={n}"), |b| {
            b.iter(|| keyword_coverage(black_box(ANSWER), black_box(&keys)))
        });
    }

    let long_answer = ANSWER.repeat(20);
    let keys = keywords(12);
    group.bench_function("long_answer", |b| {
        b.iter(|| keyword_coverage(black_box(&long_answer), black_box(&keys)))
    });

    group.finish();
}

fn bench_plan_quiz(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_quiz");

    let plain = QuizSpec {
        topic: "Electrical Wiring".into(),
        counts: BTreeMap::from([
            (QuestionType::Mcq, 10),
            (QuestionType::TrueFalse, 6),
            (QuestionType::ShortAnswer, 4),
        ]),
        ..QuizSpec::default()
    };
    group.bench_function("plain", |b| b.iter(|| plan_quiz(black_box(&plain))));

    let adaptive = QuizSpec {
        weak_areas: (0..5).map(|i| format!("area-{i}")).collect(),
        excluded_topics: vec!["area-4".into()],
        ..plain.clone()
    };
    group.bench_function("adaptive", |b| b.iter(|| plan_quiz(black_box(&adaptive))));

    group.finish();
}

criterion_group!(benches, bench_keyword_coverage, bench_plan_quiz);
criterion_main!(benches);
