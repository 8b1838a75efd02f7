use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docrag::{chunk_document, ChunkingOptions, EntryMetadata, Fragment, Number, VectorStore};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

const SEED: u64 = 42;
const DIMENSIONS: usize = 384;
const NUM_FILES: usize = 20;
const CHUNKS_PER_FILE: usize = 250;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(2))
        .configure_from_args()
}

fn random_vector(rng: &mut StdRng, normal: &Normal<Number>) -> Vec<Number> {
    normal.sample_iter(rng).take(DIMENSIONS).collect()
}

fn build_store() -> VectorStore {
    let mut rng = StdRng::seed_from_u64(SEED);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let store = VectorStore::new();

    for f in 0..NUM_FILES {
        let file_name = format!("file-{}.txt", f);
        for chunk_index in 0..CHUNKS_PER_FILE {
            let fragment = Fragment {
                id: Fragment::fragment_id(&file_name, chunk_index),
                content: format!("fragment {} of {}", chunk_index, file_name),
                file_name: file_name.clone(),
                chunk_index,
                start_char: 0,
                end_char: 0,
            };
            store.insert(
                fragment.id.clone(),
                random_vector(&mut rng, &normal),
                fragment,
                EntryMetadata::new(&file_name),
            );
        }
    }
    store
}

fn benchmark_chunking(c: &mut Criterion) {
    let document: String = (0..2000)
        .map(|i| format!("Sentence {} talks about chunking, overlap and retrieval quality.", i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut group = c.benchmark_group("chunk_document");
    for preserve_sentences in [true, false] {
        let options = ChunkingOptions {
            preserve_sentences,
            ..ChunkingOptions::default()
        };
        group.bench_with_input(
            BenchmarkId::new("preserve_sentences", preserve_sentences),
            &options,
            |b, options| b.iter(|| chunk_document(black_box(&document), "bench.txt", options).unwrap()),
        );
    }
    group.finish();
}

fn benchmark_search(c: &mut Criterion) {
    let store = build_store();
    let mut rng = StdRng::seed_from_u64(SEED + 1);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let query = random_vector(&mut rng, &normal);

    let mut group = c.benchmark_group("similarity_search");
    for top_k in [5, 50] {
        group.bench_with_input(BenchmarkId::new("all_files", top_k), &top_k, |b, &top_k| {
            b.iter(|| store.similarity_search(black_box(&query), top_k, -1.0, None).unwrap())
        });
    }
    group.bench_function("single_file", |b| {
        b.iter(|| {
            store
                .similarity_search(black_box(&query), 5, -1.0, Some("file-7.txt"))
                .unwrap()
        })
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = benchmark_chunking, benchmark_search
}
criterion_main!(benches);
