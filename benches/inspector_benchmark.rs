use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shader_repair_rust::bytecode::test_utils::{BlobSpec, PassSpec, ShaderImageBuilder};
use shader_repair_rust::{BytecodeInspector, TEX_ARRAY_SEMANTIC};

fn benchmark_semantic_search(c: &mut Criterion) {
    let inspector = BytecodeInspector::default();

    let semantics = ["POSITION", "NORMAL", "TEXCOORD", "COLOR"];
    let pass = || PassSpec::with_blobs(vec![BlobSpec::new(1, &semantics), BlobSpec::new(2, &semantics)]);
    let image = ShaderImageBuilder::new()
        .sub_shader(vec![pass(), pass(), pass()])
        .sub_shader(vec![pass(), pass()])
        .build();
    let view = image.view();

    c.bench_function("semantic_absent_full_walk", |b| {
        b.iter(|| inspector.has_semantic_at(&view, black_box(image.shader_address()), TEX_ARRAY_SEMANTIC))
    });

    c.bench_function("bytecode_addresses", |b| {
        b.iter(|| inspector.bytecode_addresses(&view, black_box(image.shader_address())))
    });

    let supported = ShaderImageBuilder::new()
        .sub_shader(vec![PassSpec::with_blobs(vec![BlobSpec::new(2, &["POSITION", TEX_ARRAY_SEMANTIC])])])
        .build();
    let supported_view = supported.view();

    c.bench_function("semantic_found_first_blob", |b| {
        b.iter(|| inspector.has_semantic_at(&supported_view, black_box(supported.shader_address()), TEX_ARRAY_SEMANTIC))
    });
}

criterion_group!(benches, benchmark_semantic_search);
criterion_main!(benches);
