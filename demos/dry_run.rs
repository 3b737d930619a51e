//! Exercises the parse/derive/flush pipeline on canned result-pane text,
//! no browser required. Handy for checking the output schema.

use citation_scraper::citations::{parser, BatchBuffer, CitationStore, RawBlock};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let block = RawBlock(vec![
        "Citation: P3-00042".to_string(),
        "License Plate/Vin: UT 1ABC234".to_string(),
        "Fine: $125.00".to_string(),
        "Issued: Jan 5, 2022 10:15 AM".to_string(),
        "Location: Lot 16".to_string(),
    ]);
    let payment = parser::check_payment(&["Appeal".to_string(), "Pay Now".to_string()]);
    let record = parser::build_record(&block, &payment);

    let mut buffer = BatchBuffer::new();
    buffer.append(record);

    let out = std::env::temp_dir().join("citations-dry-run.csv");
    let _ = std::fs::remove_file(&out);
    let mut store = CitationStore::open(&out).expect("open store");
    let written = store.flush(&mut buffer).expect("flush");

    println!("Wrote {} record(s) to {:?}:", written, out);
    print!("{}", std::fs::read_to_string(&out).expect("read back"));
}
