use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ollama_cli::core::directives::extract_directives;
use ollama_cli::core::stream::LineBuffer;

fn reply_with_blocks(blocks: usize, body_lines: usize) -> String {
    let mut reply = String::from("Sure, here are the files you asked for.\n\n");
    for i in 0..blocks {
        reply.push_str(&format!("<file:src/module_{i}.rs>\n"));
        for line in 0..body_lines {
            reply.push_str(&format!("pub fn f{line}() -> usize {{ {line} }}\n"));
        }
        reply.push_str("</file>\n\nSome commentary between files.\n");
    }
    reply
}

// Many openers with no closing marker; every one scans to the end.
fn unterminated_openers(count: usize) -> String {
    let mut reply = String::new();
    for i in 0..count {
        reply.push_str(&format!("<file:dangling_{i}.txt>\nnot closed\n"));
    }
    reply
}

fn bench_directive_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_directives");
    for &(blocks, body_lines) in &[(1usize, 2000usize), (50, 40), (500, 4)] {
        let reply = reply_with_blocks(blocks, body_lines);
        group.throughput(Throughput::Bytes(reply.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("well_formed", format!("{blocks}x{body_lines}")),
            &reply,
            |b, reply| b.iter(|| extract_directives(reply)),
        );
    }
    for &count in &[100usize, 1000] {
        let reply = unterminated_openers(count);
        group.throughput(Throughput::Bytes(reply.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("unterminated", count),
            &reply,
            |b, reply| b.iter(|| extract_directives(reply)),
        );
    }
    group.finish();
}

fn bench_line_reassembly(c: &mut Criterion) {
    let record = "{\"response\":\"token \",\"done\":false}\n";
    let body = record.repeat(4096);
    let mut group = c.benchmark_group("line_buffer");
    group.throughput(Throughput::Bytes(body.len() as u64));
    for &chunk in &[7usize, 512, 16 * 1024] {
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut buffer = LineBuffer::default();
                let mut lines = 0usize;
                for piece in body.as_bytes().chunks(chunk) {
                    buffer.push(piece);
                    while buffer.next_line().is_some() {
                        lines += 1;
                    }
                }
                lines
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_directive_scan, bench_line_reassembly);
criterion_main!(benches);
