use criterion::{black_box, criterion_group, criterion_main, Criterion};
use modwire_version::{Comparator, Operator, Version, VersionRange};

fn bench_parse_versions(c: &mut Criterion) {
    let versions = [
        "1",
        "1.2",
        "1.2.3",
        "1.2.3.qualifier",
        "2020.4.20.v20200420-1200",
        "0.0.1.SNAPSHOT",
    ];

    c.bench_function("parse_versions", |b| {
        b.iter(|| {
            for version in versions {
                black_box(Version::parse(black_box(version)).ok());
            }
        })
    });
}

fn bench_parse_ranges(c: &mut Criterion) {
    let ranges = ["[1.0,2.0)", "(1.0,2.0]", "1.5", "[3.1.4,3.1.4]"];

    c.bench_function("parse_ranges", |b| {
        b.iter(|| {
            for range in ranges {
                black_box(VersionRange::parse(black_box(range)).ok());
            }
        })
    });
}

fn bench_range_includes(c: &mut Criterion) {
    let range = VersionRange::parse("[1.0,2.0)").unwrap();
    let versions: Vec<Version> = ["0.9", "1.0", "1.5.3", "2.0", "1.9.9.z"]
        .iter()
        .map(|v| Version::parse(v).unwrap())
        .collect();

    c.bench_function("range_includes", |b| {
        b.iter(|| {
            for version in &versions {
                black_box(range.includes(black_box(version)));
            }
        })
    });
}

fn bench_compare(c: &mut Criterion) {
    let cases = [
        ("1.2.3", "1.2.4", Operator::LessThan),
        ("1.0.0.a", "1.0.0", Operator::GreaterThan),
        ("1", "1.0.0", Operator::Equal),
    ];

    c.bench_function("compare_strings", |b| {
        b.iter(|| {
            for (left, right, op) in cases {
                black_box(Comparator::compare(black_box(left), op, black_box(right)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_parse_versions,
    bench_parse_ranges,
    bench_range_includes,
    bench_compare
);
criterion_main!(benches);
