// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for IPP packet decoding and response encoding.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use papertrap_ipp::capabilities::{PrinterFacts, default_printer_attributes};
use papertrap_ipp::{PacketBuilder, decode, encode};

// ---------------------------------------------------------------------------
// Helper: build a raw binary IPP request
// ---------------------------------------------------------------------------

/// Construct a binary IPP request the way a client would emit it.
fn build_raw_request(
    operation: u16,
    request_id: u32,
    attributes: &[(u8, &str, &[u8])],
    document: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(0x01);
    buf.push(0x01);
    buf.extend_from_slice(&operation.to_be_bytes());
    buf.extend_from_slice(&request_id.to_be_bytes());
    buf.push(0x01); // operation-attributes
    write_attr(&mut buf, 0x47, "attributes-charset", b"utf-8");
    write_attr(&mut buf, 0x48, "attributes-natural-language", b"en");
    for &(tag, name, value) in attributes {
        write_attr(&mut buf, tag, name, value);
    }
    buf.push(0x03);
    buf.extend_from_slice(document);
    buf
}

/// Write a single IPP attribute into a byte buffer.
fn write_attr(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) {
    buf.push(value_tag);
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Benchmark decoding a minimal Get-Printer-Attributes request.
fn bench_decode(c: &mut Criterion) {
    let data = build_raw_request(0x000B, 42, &[], &[]);

    c.bench_function("decode (minimal)", |b| {
        b.iter(|| {
            let result = decode(black_box(&data));
            assert!(result.is_ok());
        });
    });

    // Print-Job with extra attributes and a document tail, which exercises
    // the payload-boundary path.
    let attrs: Vec<(u8, &str, &[u8])> = vec![
        (0x42, "job-name", b"Benchmark Print Job"),
        (0x49, "document-format", b"application/pdf"),
    ];
    let doc = vec![0xABu8; 4096];
    let data_with_doc = build_raw_request(0x0002, 100, &attrs, &doc);

    c.bench_function("decode (4 KiB document)", |b| {
        b.iter(|| {
            let result = decode(black_box(&data_with_doc));
            assert!(result.is_ok());
        });
    });
}

/// Benchmark encoding a full printer-attributes response.
fn bench_encode_response(c: &mut Criterion) {
    let facts = PrinterFacts {
        printer_name: "Papertrap Virtual Printer".into(),
        host: "localhost".into(),
        port: 8631,
        uuid_uri: "urn:uuid:00000000-0000-0000-0000-000000000001".into(),
        up_time_secs: 3600,
        queued_job_count: 2,
    };

    c.bench_function("encode (printer attrs)", |b| {
        b.iter(|| {
            let mut builder = PacketBuilder::new(black_box(0x0000), black_box(1));
            builder.operation_prelude("successful-ok");
            builder.group(default_printer_attributes(&facts));
            let bytes = encode(&builder.build());
            black_box(bytes);
        });
    });
}

criterion_group!(benches, bench_decode, bench_encode_response);
criterion_main!(benches);
