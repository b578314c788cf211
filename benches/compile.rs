//! Benchmark: compile the demo device, then the stages behind `make`: settings derivation,
//! SII image packing, context building and PDO synthesis. A generated source with many
//! mapped records measures resolver and wildcard expansion cost at scale.

use coedsl::{compile, context, pdo, settings, sii};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use std::path::PathBuf;

/// `records` records of 8 BOOLs and a UINT, all mapped through one transmit PDO.
fn generated_source(records: usize) -> String {
    let mut src = String::new();
    for r in 0..records {
        let _ = write!(src, "record read ch{} @0x{:04X} {{", r, 0x6000 + r);
        for b in 0..8 {
            let _ = write!(src, " BOOL b{};", b);
        }
        let _ = writeln!(src, " UINT count; }};");
    }
    let _ = writeln!(src, "UDINT read tx_map[] @0x1A00 = {{ &ch*.* }};");
    src
}

fn bench_compile(c: &mut Criterion) {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let demo_path = manifest.join("demos/device.coe");
    let demo = std::fs::read_to_string(&demo_path).expect("read demo");

    c.bench_function("compile_demo_device", |b| {
        b.iter(|| compile(black_box(&demo)).expect("compile"))
    });

    let compiled = compile(&demo).expect("compile");
    let mut world = compiled.world.clone();
    settings::derive(&world.dictionary, &mut world.settings).expect("derive");

    c.bench_function("derive_settings", |b| {
        b.iter(|| {
            let mut s = compiled.world.settings.clone();
            settings::derive(black_box(&compiled.world.dictionary), &mut s).expect("derive");
            s
        })
    });

    c.bench_function("sii_image", |b| {
        b.iter(|| sii::build_image(black_box(&world.settings)).expect("image"))
    });

    c.bench_function("context_json", |b| {
        b.iter(|| {
            context::build_context(black_box(&world.dictionary), &world.settings)
                .and_then(|ctx| ctx.to_json())
                .expect("context")
        })
    });

    // 28 records fill the 252 entries a mapping array can hold
    let large = generated_source(28);
    eprintln!("generated source: {} bytes", large.len());
    c.bench_function("compile_generated_28_records", |b| {
        b.iter(|| compile(black_box(&large)).expect("compile"))
    });

    let compiled = compile(&large).expect("compile");
    let dictionary = &compiled.world.dictionary;
    let map = dictionary.get(0x1A00).expect("map");
    c.bench_function("pdo_synthesize_252_fields", |b| {
        b.iter(|| pdo::synthesize_map(black_box(dictionary), map).expect("packing"))
    });

    let packing = pdo::synthesize_map(dictionary, map).expect("packing");
    let values: Vec<u128> = (0..packing.fields.len() as u128).collect();
    c.bench_function("pdo_collect_scatter", |b| {
        b.iter(|| {
            let buffer = packing.collect(black_box(&values));
            packing.scatter(&buffer)
        })
    });
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
