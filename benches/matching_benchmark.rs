use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shader_repair_rust::{match_shader, BestMatch, ShaderEntry, ShaderProperty, ShaderPropertyType, ShaderSignature};

fn properties(count: usize) -> Vec<ShaderProperty> {
    (0..count)
        .map(|i| ShaderProperty::new(format!("_Prop{}", i), format!("Prop {}", i), ShaderPropertyType::Float))
        .collect()
}

fn benchmark_matching(c: &mut Criterion) {
    let query = ShaderSignature::new("Custom/Toon", properties(24), vec!["STEREO_INSTANCING_ON".to_string()]);

    let candidates: Vec<ShaderEntry> = (0..200)
        .map(|i| {
            let name = if i % 10 == 0 { "Legacy/Toon".to_string() } else { format!("Custom/Other{}", i) };
            ShaderEntry::new(format!("assets/{}.shader", i), name, properties(20 + i % 8), Vec::new())
        })
        .collect();

    c.bench_function("match_single_candidate", |b| {
        b.iter(|| match_shader(black_box(&query), black_box(&candidates[0])))
    });

    c.bench_function("best_match_200_candidates", |b| {
        b.iter(|| {
            let mut best = BestMatch::new();
            for candidate in &candidates {
                if let Some(matched) = match_shader(&query, candidate) {
                    best.offer(candidate.asset_path(), matched);
                }
            }
            best.into_inner()
        })
    });
}

criterion_group!(benches, benchmark_matching);
criterion_main!(benches);
