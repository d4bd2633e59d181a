use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use corvid::core::config::{DbKind, IndexerConfig};
use corvid::core::indexer::Indexer;
use corvid::core::types::Document;
use corvid::query::TermQuery;
use rand::Rng;
use std::time::{Duration, Instant};

fn create_test_document(id: u64, content_size: usize) -> Document {
    let mut rng = rand::thread_rng();
    let content: String = (0..content_size)
        .map(|_| {
            let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
            words[rng.gen_range(0..words.len())]
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut doc = Document::new(format!("doc-{id}")).with_bits(id % 4);
    for word in content.split_whitespace() {
        doc = doc.with_keyword("content", word);
    }
    doc.with_keyword("category", format!("category_{}", id % 10))
}

fn open_indexer() -> Indexer {
    let dir = tempfile::tempdir().unwrap();
    // leaked on purpose: the directory must outlive the benchmark closure,
    // and these are short-lived benchmark processes.
    let path = Box::leak(Box::new(dir)).path().join("db");
    let config = IndexerConfig { db_kind: DbKind::LsmEngine, db_path: path, doc_num_estimate: 10_000 };
    Indexer::init(&config).unwrap()
}

fn bench_single_insert(c: &mut Criterion) {
    let indexer = open_indexer();
    let mut id = 0;
    c.bench_function("single_document_insert", |b| {
        b.iter(|| {
            let doc = create_test_document(id, 100);
            indexer.add_doc(doc).unwrap();
            id += 1;
        });
    });
}

fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_insert");

    for batch_size in [10, 50, 100, 500, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &batch_size| {
            let indexer = open_indexer();
            let mut id_counter = 0u64;

            b.iter(|| {
                for _ in 0..batch_size {
                    let doc = create_test_document(id_counter, 100);
                    indexer.add_doc(doc).unwrap();
                    id_counter += 1;
                }
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let indexer = open_indexer();
    for i in 0..1000 {
        indexer.add_doc(create_test_document(i, 100)).unwrap();
    }

    let mut group = c.benchmark_group("search");

    group.bench_function("single_term_search", |b| {
        b.iter(|| {
            let _ = indexer.search(black_box(&TermQuery::leaf("content", "fox")), 0, 0, &[]).unwrap();
        });
    });

    group.bench_function("and_search", |b| {
        let query = TermQuery::and([TermQuery::leaf("content", "quick"), TermQuery::leaf("content", "brown")]);
        b.iter(|| {
            let _ = indexer.search(black_box(&query), 0, 0, &[]).unwrap();
        });
    });

    group.bench_function("or_search", |b| {
        let query = TermQuery::or([TermQuery::leaf("content", "fox"), TermQuery::leaf("content", "dog")]);
        b.iter(|| {
            let _ = indexer.search(black_box(&query), 0, 0, &[]).unwrap();
        });
    });

    group.bench_function("nested_and_or_search", |b| {
        let query = TermQuery::or([
            TermQuery::and([TermQuery::leaf("content", "quick"), TermQuery::leaf("content", "brown")]),
            TermQuery::and([TermQuery::leaf("content", "lazy"), TermQuery::leaf("content", "dog")]),
        ]);
        b.iter(|| {
            let _ = indexer.search(black_box(&query), 0, 0, &[]).unwrap();
        });
    });

    group.bench_function("category_search", |b| {
        b.iter(|| {
            let _ = indexer.search(black_box(&TermQuery::leaf("category", "category_5")), 0, 0, &[]).unwrap();
        });
    });

    group.bench_function("bitmask_filtered_search", |b| {
        b.iter(|| {
            let _ = indexer.search(black_box(&TermQuery::leaf("content", "fox")), 0b01, 0, &[]).unwrap();
        });
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("index_throughput", |b| {
        b.iter_custom(|iters| {
            let indexer = open_indexer();
            let mut id = 0;

            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..100 {
                    indexer.add_doc(create_test_document(id, 100)).unwrap();
                    id += 1;
                }
            }
            start.elapsed()
        });
    });

    group.bench_function("query_throughput", |b| {
        let indexer = open_indexer();
        for i in 0..5000 {
            indexer.add_doc(create_test_document(i, 50)).unwrap();
        }

        let queries = vec![
            TermQuery::leaf("content", "fox"),
            TermQuery::and([TermQuery::leaf("content", "quick"), TermQuery::leaf("content", "brown")]),
            TermQuery::or([TermQuery::leaf("content", "lazy"), TermQuery::leaf("content", "dog")]),
            TermQuery::leaf("category", "category_5"),
        ];
        let mut query_idx = 0;

        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..100 {
                    let _ = indexer.search(&queries[query_idx % queries.len()], 0, 0, &[]).unwrap();
                    query_idx += 1;
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_insert, bench_batch_insert, bench_search, bench_throughput);
criterion_main!(benches);
