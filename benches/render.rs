//! Message building and EML rendering benchmarks.
//!
//! Run with: `cargo bench`

use base64::prelude::*;
use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smtp_send::config::{AttachmentSlot, HeaderPair};
use smtp_send::{builder, render_eml, BinaryData, BodyFormat, Record, SendFields};
use std::hint::black_box;

const HTML_BODY: &str = r#"
    <!DOCTYPE html>
    <html>
    <head><title>Monthly statement</title></head>
    <body>
        <h1>Your statement is ready</h1>
        <p>Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod tempor
        incididunt ut labore et dolore magna aliqua.</p>
        <img src="cid:logo">
    </body>
    </html>
"#;

fn fields(attachments: usize) -> SendFields {
    let mut fields = SendFields {
        from_email: "billing@example.com".to_string(),
        from_name: "Billing".to_string(),
        to_email: "alice@example.com, bob@example.com".to_string(),
        cc_email: "accounts@example.com".to_string(),
        subject: "Monthly statement".to_string(),
        email_format: BodyFormat::Both,
        text: "Your statement is ready.".to_string(),
        html: HTML_BODY.to_string(),
        attachments: (0..attachments)
            .map(|i| AttachmentSlot {
                property: format!("file{i}"),
                name: format!("statement-{i}.pdf"),
                cid: String::new(),
            })
            .collect(),
        ..Default::default()
    };
    fields.options.custom_headers = vec![HeaderPair {
        name: "X-Statement-Period".to_string(),
        value: "2024-03".to_string(),
    }];
    fields
}

fn record(attachments: usize) -> Record {
    let payload = BASE64_STANDARD.encode(vec![0x25_u8; 64 * 1024]);
    (0..attachments).fold(Record::default(), |record, i| {
        record.with_binary(
            format!("file{i}"),
            BinaryData {
                data: payload.clone(),
                mime_type: "application/pdf".to_string(),
                file_name: None,
            },
        )
    })
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_message");

    for attachments in [0_usize, 1, 4] {
        let fields = fields(attachments);
        let record = record(attachments);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("attachments", attachments),
            &attachments,
            |b, _| b.iter(|| builder::build(black_box(&record), black_box(&fields)).unwrap()),
        );
    }

    group.finish();
}

fn benchmark_render_eml(c: &mut Criterion) {
    let message = builder::build(&Record::default(), &fields(0)).unwrap();
    let now = Utc::now();

    c.bench_function("render_eml_alternative", |b| {
        b.iter(|| render_eml(black_box(&message), now));
    });
}

criterion_group!(benches, benchmark_build, benchmark_render_eml);
criterion_main!(benches);
