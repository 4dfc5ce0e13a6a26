use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use facturo_documents::{
    ControlCode, ControlCodeParams, DocumentNumber, DocumentType, EmissionMode, TaxpayerKind,
};

fn params() -> ControlCodeParams {
    ControlCodeParams {
        document_type: DocumentType::Invoice,
        tax_id: "80069563".to_string(),
        tax_id_check_digit: 1,
        number: DocumentNumber::new(1, 1, 42).unwrap(),
        taxpayer_kind: TaxpayerKind::Company,
        emission_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        emission_mode: EmissionMode::Normal,
        security_code: None,
    }
}

fn bench_generate(c: &mut Criterion) {
    let params = params();
    c.bench_function("control_code_generate", |b| {
        b.iter(|| ControlCode::generate(black_box(&params)).unwrap())
    });
}

fn bench_parse(c: &mut Criterion) {
    let code = ControlCode::generate(&params()).unwrap().to_string();
    c.bench_function("control_code_parse", |b| {
        b.iter(|| ControlCode::parse(black_box(&code)).unwrap())
    });
}

criterion_group!(benches, bench_generate, bench_parse);
criterion_main!(benches);
