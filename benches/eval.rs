use criterion::{black_box, criterion_group, criterion_main, Criterion};
use exprjit::{compile, CompileOptions, Compiler, FunctionTable};

const SMALL: &str = "(x+y)*2 + (1+x)/y";
const BIG: &str = "1+x+(3+y*4+((((x+y*2)+x)+sqrt(8))+y)+10*sin(2-x+y/3))+11";

fn small_native(x: f64, y: f64) -> f64 {
    (x + y) * 2.0 + (1.0 + x) / y
}

fn big_native(x: f64, y: f64) -> f64 {
    1.0 + x + (3.0 + y * 4.0 + ((((x + y * 2.0) + x) + 8f64.sqrt()) + y) + 10.0 * (2.0 - x + y / 3.0).sin()) + 11.0
}

// ============================================================================
// Compilation
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile small", |b| {
        b.iter(|| black_box(compile(black_box(SMALL)).unwrap()))
    });
    c.bench_function("compile big", |b| {
        b.iter(|| black_box(compile(black_box(BIG)).unwrap()))
    });
    c.bench_function("assemble big (no mapping)", |b| {
        let compiler = Compiler::new(FunctionTable::standard());
        b.iter(|| black_box(compiler.assemble(black_box(BIG)).unwrap()))
    });
}

// ============================================================================
// Evaluation
// ============================================================================

fn bench_eval(c: &mut Criterion) {
    for (name, text, native) in [
        ("small", SMALL, small_native as fn(f64, f64) -> f64),
        ("big", BIG, big_native),
    ] {
        let code = compile(text).unwrap();
        c.bench_function(&format!("eval {name} jit"), |b| {
            b.iter(|| black_box(code.eval(black_box(2.0), black_box(3.0))))
        });
        c.bench_function(&format!("eval {name} native"), |b| {
            b.iter(|| black_box(native(black_box(2.0), black_box(3.0))))
        });
    }
}

fn bench_eval_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval big by options");
    for options in CompileOptions::all_combinations() {
        let code = Compiler::new(FunctionTable::standard())
            .with_options(options)
            .compile(BIG)
            .unwrap();
        let label = format!(
            "reuse={} depth={} fold={}",
            options.register_reuse, options.depth_ordering, options.constant_folding
        );
        group.bench_function(label, |b| {
            b.iter(|| black_box(code.eval(black_box(2.0), black_box(3.0))))
        });
    }
    group.finish();
}

fn bench_eval_grid(c: &mut Criterion) {
    let code = compile(BIG).unwrap();
    let mut dst = vec![0.0; 256 * 256];
    c.bench_function("eval_grid big 256x256", |b| {
        b.iter(|| {
            code.eval_grid(&mut dst, -1.0, 1.0, 256, -1.0, 1.0, 256).unwrap();
            black_box(&dst);
        })
    });
}

criterion_group!(benches, bench_compile, bench_eval, bench_eval_options, bench_eval_grid);
criterion_main!(benches);
