//! Criterion benchmarks for the LuxWS envelope codec.
//!
//! Measures decoding of typical reply frames: a navigation menu, a content
//! page of realistic size, and an unrelated frame that is parsed only to be
//! ignored.
//!
//! Run with:
//! ```bash
//! cargo bench --package luxws --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use luxws::{decode_reply, ContentRoot, NavigationRoot};

// ── Frame fixtures ────────────────────────────────────────────────────────────

fn navigation_frame(entries: usize) -> String {
    let mut frame = String::from(r#"<Navigation id="0x41c123c8">"#);
    for group in 0..entries {
        frame.push_str(&format!(
            r#"<item id="0x{group:08x}"><name>Gruppe {group}</name>"#
        ));
        for child in 0..8 {
            frame.push_str(&format!(
                r#"<item id="0x{group:04x}{child:04x}"><name>Eintrag {child}</name></item>"#
            ));
        }
        frame.push_str("</item>");
    }
    frame.push_str("</Navigation>");
    frame
}

fn content_frame(items: usize) -> String {
    let mut frame = String::from("<?xml version=\"1.0\"?>\n<Content>");
    frame.push_str(r#"<item id="0x41c14bc4"><name>Temperaturen</name>"#);
    for i in 0..items {
        frame.push_str(&format!(
            "<item id=\"0x{i:08x}\"><name>Fühler {i}</name><min>150</min><max>300</max>\
             <step>5</step><unit>°C</unit><div>10.00</div><raw>{i}</raw>\
             <value>{i}.0°C</value></item>"
        ));
    }
    frame.push_str("</item></Content>");
    frame
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_decode_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_navigation");
    for entries in [4usize, 16] {
        let frame = navigation_frame(entries);
        group.bench_with_input(BenchmarkId::new("groups", entries), &frame, |b, frame| {
            b.iter(|| decode_reply::<NavigationRoot>(black_box(frame.as_bytes())))
        });
    }
    group.finish();
}

fn bench_decode_content(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_content");
    for items in [10usize, 100] {
        let frame = content_frame(items);
        group.bench_with_input(BenchmarkId::new("items", items), &frame, |b, frame| {
            b.iter(|| decode_reply::<ContentRoot>(black_box(frame.as_bytes())))
        });
    }
    group.finish();
}

fn bench_ignore_unrelated(c: &mut Criterion) {
    let frame = navigation_frame(16);
    c.bench_function("ignore_navigation_when_content_expected", |b| {
        b.iter(|| decode_reply::<ContentRoot>(black_box(frame.as_bytes())))
    });
}

criterion_group!(
    benches,
    bench_decode_navigation,
    bench_decode_content,
    bench_ignore_unrelated
);
criterion_main!(benches);
