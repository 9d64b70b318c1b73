//! Performance benchmarks for annotation placement
//!
//! A synthetic document of many pages is annotated with one comment and a few apparatus entries
//! per page, to measure:
//! - Label pattern compilation and search along the page cursor
//! - Splicing into tails and styled runs
//! - Apparatus continuation across entries of one page
//!
//! Run with: cargo bench

use apparatus_core::{
    apparatus::{Reconciler, Segment},
    config::EditionConfig,
    pattern::LabelPattern,
    placement::{AnnotationQueue, ApparatusRecord, CommentRecord, Placer, QueueRecords},
    tree::DocumentTree,
};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

const PAGES: usize = 200;

const PAGE_TEXT: &str = "In principio erat verbum, et verbum erat apud Deum, et Deus erat verbum. \
    Hoc erat in principio apud Deum. Omnia per ipsum facta sunt, et sine ipso factum est nihil \
    quod factum est. In ipso vita erat, et vita erat lux hominum; et lux in tenebris lucet, et \
    tenebrae eam non comprehenderunt.";

fn document() -> String {
    let body = (1..=PAGES)
        .map(|page| {
            format!(
                "<p><pb n=\"{page}\" ed=\"DJAK03\"/>{PAGE_TEXT} \
                 <hi rend=\"italic\">Fuit homo missus a Deo</hi> cui nomen erat Ioannes.</p>"
            )
        })
        .collect::<String>();
    format!("<TEI><text><body>{body}</body></text></TEI>")
}

fn records() -> QueueRecords {
    let mut records = QueueRecords::default();
    for page in 1..=PAGES {
        let page = page.to_string();
        records.comments.push(CommentRecord {
            page: page.clone(),
            sequence: None,
            number: None,
            label: "missus a Deo".to_string(),
            note: "Io 1,6".to_string(),
        });
        for (ordinal, lemma, reading) in [
            (1, "verbum", "sermo"),
            (2, "facta", "creata"),
            (3, "lux", "lumen"),
            (4, "comprehenderunt", "apprehenderunt"),
        ] {
            records.apparatus.push(ApparatusRecord {
                page: page.clone(),
                group: None,
                segments: vec![
                    Segment::plain(format!("{ordinal} {lemma}")),
                    Segment::plain("]"),
                    Segment::plain(format!("{reading} ")),
                    Segment::italic("W"),
                ],
            });
        }
    }
    records
}

// Benchmark: parse the document, place every queued annotation
fn bench_place_all(c: &mut Criterion) {
    let config = EditionConfig::builtin("01").unwrap();
    let reconciler = Reconciler::new(&config).unwrap();
    let (queue, _) = AnnotationQueue::build(&records(), &reconciler, false);
    let placer = Placer::new(&config);
    let xml = document();

    c.bench_function("place_all", |b| {
        b.iter_batched(
            || DocumentTree::from_xml(&xml).unwrap(),
            |mut tree| {
                let report = placer.place_all(&mut tree, &queue).unwrap();
                black_box(report.failures.len())
            },
            BatchSize::SmallInput,
        );
    });
}

// Benchmark: queue building, including apparatus reconciliation
fn bench_build_queue(c: &mut Criterion) {
    let config = EditionConfig::builtin("01").unwrap();
    let reconciler = Reconciler::new(&config).unwrap();
    let records = records();

    c.bench_function("build_queue", |b| {
        b.iter(|| {
            let (queue, _) = AnnotationQueue::build(black_box(&records), &reconciler, false);
            queue.len()
        });
    });
}

// Benchmark: tolerant label pattern compilation and search over one page of text
fn bench_label_search(c: &mut Criterion) {
    let options = EditionConfig::default().pattern_options();

    c.bench_function("label_search", |b| {
        b.iter(|| {
            let pattern = LabelPattern::compile(black_box("lux … tenebris"), &options);
            pattern.find(black_box(PAGE_TEXT))
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .measurement_time(std::time::Duration::from_secs(10));
    targets =
        bench_place_all,
        bench_build_queue,
        bench_label_search
}

criterion_main!(benches);
