/*!
 * Benchmarks for fragment rendering.
 *
 * Measures performance of:
 * - Overlap resolution on nested and crossing spans
 * - XLIFF inline writing
 * - Reading inline markup back
 */

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use codedtext::model::{AnnotationKind, Fragment, Side, Store};
use codedtext::render::{Renderer, XliffWriter};
use codedtext::xliff::InlineReader;

/// Build a fragment with `spans` code pairs; with `crossing`, pairs cross two by two.
fn generate_fragment(spans: usize, crossing: bool) -> (Fragment, Store) {
    let mut store = Store::new();
    let mut frag = Fragment::source();
    for i in 0..spans {
        let id = (i + 1).to_string();
        frag.append("word ");
        frag.open_code(&mut store, &id, "<b>").unwrap();
        frag.append("bold ");
        if crossing && i % 2 == 0 && i + 1 < spans {
            continue;
        }
        if crossing && i % 2 == 1 {
            frag.close_code(&mut store, &i.to_string(), "</b>").unwrap();
            frag.append("tail ");
        }
        frag.close_code(&mut store, &id, "</b>").unwrap();
    }
    frag.annotate(&mut store, 0, None, AnnotationKind::Generic, None).unwrap();
    (frag, store)
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for size in [10, 100, 1000].iter() {
        for crossing in [false, true] {
            let (frag, store) = generate_fragment(*size, crossing);
            let name = if crossing { "crossing" } else { "nested" };
            group.throughput(Throughput::Elements(*size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &(frag, store), |b, (frag, store)| {
                b.iter(|| Renderer::new(black_box(frag), black_box(store)).map(|r| r.split_count()))
            });
        }
    }

    group.finish();
}

fn bench_xliff_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("xliff_write");
    let writer = XliffWriter::new().with_original_data(true);

    for size in [10, 100, 1000].iter() {
        let (frag, store) = generate_fragment(*size, true);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &(frag, store), |b, (frag, store)| {
            b.iter(|| writer.render_fragment(black_box(frag), black_box(store)))
        });
    }

    group.finish();
}

fn bench_xliff_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("xliff_read");

    for size in [10, 100, 1000].iter() {
        let (frag, store) = generate_fragment(*size, true);
        let markup = XliffWriter::new().render_fragment(&frag, &store).unwrap();
        group.throughput(Throughput::Bytes(markup.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &markup, |b, markup| {
            b.iter(|| {
                let mut scratch = Store::new();
                InlineReader::new().read(black_box(markup), &mut scratch, Side::Source)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_xliff_write, bench_xliff_read);
criterion_main!(benches);
