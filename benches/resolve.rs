//! Benchmarks for the requirements pipeline: classifying single lines and
//! resolving a small tree of nested requirement and constraint files.

use std::collections::HashSet;
use std::fs;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use devsync::requirements::{classify, resolve, Context, KeySets};

fn key_sets() -> KeySets {
    let set = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<HashSet<_>>();
    KeySets {
        packages: set(&["egg", "ham", "spam"]),
        overrides: set(&["requests", "urllib3"]),
        ignores: set(&["setuptools"]),
    }
}

const LINES: &[&str] = &[
    "requests==2.31.0",
    "Egg[test,docs]>=1.0; python_version >= \"3.8\"",
    "urllib3<2",
    "setuptools",
    "# a comment",
    "-c constraints.txt",
    "git+https://example.com/repo.git#egg=foo",
    "numpy >= 1.24, < 2.0 ; platform_system == 'Linux'",
];

fn bench_classify(c: &mut Criterion) {
    let keys = key_sets();
    c.bench_function("classify_lines", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(classify(black_box(line), &keys, Context::Constraint));
            }
        })
    });
}

fn bench_resolve_tree(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut constraints = String::new();
    for i in 0..200 {
        constraints.push_str(&format!("package{}=={}.0\n", i, i % 7));
    }
    constraints.push_str("requests==2.31.0\nsetuptools<70\n");
    fs::write(dir.path().join("constraints.txt"), constraints).unwrap();

    let mut nested = String::from("-c constraints.txt\n");
    for i in 0..100 {
        nested.push_str(&format!("lib{}>=1\n", i));
    }
    fs::write(dir.path().join("nested.txt"), nested).unwrap();

    let entry = dir.path().join("requirements.txt");
    fs::write(&entry, "-r nested.txt\negg\nham\nrequests\n").unwrap();
    let target = entry.to_string_lossy().to_string();
    let keys = key_sets();

    c.bench_function("resolve_nested_tree", |b| {
        b.iter(|| {
            let result = resolve(black_box(&target), &keys, Context::Requirement).unwrap();
            black_box(result.render_constraints())
        })
    });
}

criterion_group!(benches, bench_classify, bench_resolve_tree);
criterion_main!(benches);
