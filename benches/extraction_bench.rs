/*!
 * Benchmarks for the subtitle operation pipeline.
 *
 * Measures performance of:
 * - Lexing content AT documents
 * - Character diffs
 * - Operation extraction
 * - Foreign transfer
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stsync::content_at::{TextDiff, TokenStream};
use stsync::operations::{
    CommitRange, ForeignDocument, ForeignTransfer, SnapshotPair, SubtitleOperationExtractor,
};
use stsync::subtitle::{subtitle_spans, Subtitle, SubtitleSidecar};

/// Generate a document with `count` subtitles; every tenth one is split when `split` is set.
fn generate_document(count: usize, split: bool) -> String {
    let mut doc = String::from("^^^ {: .rid #f-1}\n\n");
    for i in 0..count {
        if i % 25 == 0 && i > 0 {
            doc.push_str(&format!("\n^^^ {{: .rid #f-{}}}\n", i / 25 + 1));
        }
        if split && i % 10 == 0 {
            doc.push_str(&format!("@Sentence number {}@ is here and%  stays. ", i));
        } else {
            doc.push_str(&format!("@Sentence number {} is here and%  stays. ", i));
        }
    }
    doc
}

fn subtitles(content: &str, prefix: &str) -> Vec<Subtitle> {
    let stream = TokenStream::parse(content).expect("benchmark document should lex");
    subtitle_spans(&stream)
        .into_iter()
        .enumerate()
        .map(|(i, span)| Subtitle::new(format!("{}{}", prefix, i), span.record_id, span.content))
        .collect()
}

// ============================================================================
// Token Benchmarks
// ============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    for size in [10, 100, 1000].iter() {
        let doc = generate_document(*size, false);
        group.throughput(Throughput::Bytes(doc.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &doc, |b, doc| {
            b.iter(|| black_box(TokenStream::parse(doc)))
        });
    }

    group.finish();
}

fn bench_text_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_diff");

    for size in [10, 100, 500].iter() {
        let old = TokenStream::parse(&generate_document(*size, false))
            .expect("benchmark document should lex")
            .plain_text();
        let new = old.replace("is here", "was here");
        group.bench_with_input(BenchmarkId::from_parameter(size), &(old, new), |b, (old, new)| {
            b.iter(|| black_box(TextDiff::new(old, new).hunks()))
        });
    }

    group.finish();
}

// ============================================================================
// Operation Benchmarks
// ============================================================================

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let extractor = SubtitleOperationExtractor::default();
    let commits = CommitRange::new("c1", "c2");

    for size in [10, 100, 500].iter() {
        let from = generate_document(*size, false);
        let pair = SnapshotPair {
            file_path: "bench.at".to_string(),
            from_subtitles: subtitles(&from, "s"),
            from_content: from,
            to_content: generate_document(*size, true),
        };
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pair, |b, pair| {
            b.iter(|| black_box(extractor.extract(pair, &commits, 1)))
        });
    }

    group.finish();
}

fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");
    let extractor = SubtitleOperationExtractor::default();
    let transfer = ForeignTransfer::default();
    let commits = CommitRange::new("c1", "c2");

    for size in [10, 100].iter() {
        let from = generate_document(*size, false);
        let pair = SnapshotPair {
            file_path: "bench.at".to_string(),
            from_subtitles: subtitles(&from, "s"),
            from_content: from.clone(),
            to_content: generate_document(*size, true),
        };
        let extracted = extractor
            .extract(&pair, &commits, 1)
            .expect("benchmark extraction should succeed");
        let foreign_content = from.replace("Sentence number", "Phrase numéro");
        let document = ForeignDocument {
            file_path: "bench.at".to_string(),
            sidecar: SubtitleSidecar::new(Some("c1".to_string()), subtitles(&foreign_content, "s")),
            content: foreign_content,
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &document, |b, document| {
            b.iter(|| {
                black_box(transfer.transfer(
                    document,
                    &extracted.from_subtitles,
                    &extracted.to_subtitles,
                    &extracted.operations,
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lexer, bench_text_diff, bench_extraction, bench_transfer);
criterion_main!(benches);
