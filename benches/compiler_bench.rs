use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fec::bind::bind;
use fec::lower::lower;
use fec::spec::{build_spec, EngineParams, EngineSpec};

// Benchmark scenarios. All banks are valid for a 400 MHz clock with the slot
// counts given below.

const SMALL_BANK: &str = "\
FIR[0].sampleRate = 48000;
FIR[0].coeff = [0.0625, 0.25, 0.375, 0.25, 0.0625];
FIR[1].sampleRate = 8000;
FIR[1].coeff = [0.125, 0.375, 0.375, 0.125];
FIR[2].sampleRate = 192000;
FIR[2].coeff = [0.5, 0.5];
";

/// Scaling generator: `n` identical filters force the binder to walk ever
/// fuller MACs before spilling to a fresh one.
fn generate_scaling_bank(n_firs: usize) -> String {
    let mut fsp = String::new();
    for i in 0..n_firs {
        fsp.push_str(&format!("FIR[{i}].sampleRate = 48000;\n"));
        fsp.push_str(&format!(
            "FIR[{i}].coeff = [0.0625, 0.25, 0.375, 0.25, 0.0625];\n"
        ));
    }
    fsp
}

fn spec_from(source: &str, num_time_slots: u32) -> EngineSpec {
    let parsed = fec::parser::parse(source);
    assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
    let result = build_spec(
        &parsed.program.unwrap(),
        EngineParams {
            clock_freq: 400e6,
            num_time_slots,
        },
    );
    result.spec.expect("spec build failed")
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_small_bank", |b| {
        b.iter(|| fec::parser::parse(black_box(SMALL_BANK)))
    });
}

fn bench_bind(c: &mut Criterion) {
    let spec = spec_from(SMALL_BANK, 16);
    c.bench_function("bind_small_bank", |b| {
        b.iter(|| bind(black_box(&spec)))
    });
}

fn bench_bind_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("bind_scaling");
    for n_firs in [4usize, 16, 64] {
        let source = generate_scaling_bank(n_firs);
        // larger cycles keep the tap count within the interval as MACs fill
        let spec = spec_from(&source, 64);
        group.bench_with_input(BenchmarkId::from_parameter(n_firs), &spec, |b, spec| {
            b.iter(|| bind(black_box(spec)))
        });
    }
    group.finish();
}

fn bench_full_lowering(c: &mut Criterion) {
    use chumsky::span::Span as _;
    let span = fec::ast::Span::new((), 0..0);
    let spec = spec_from(SMALL_BANK, 16);
    c.bench_function("bind_and_lower_small_bank", |b| {
        b.iter(|| {
            let engine = bind(black_box(&spec)).engine.unwrap();
            lower(&spec, &engine, span)
        })
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_bind,
    bench_bind_scaling,
    bench_full_lowering
);
criterion_main!(benches);
