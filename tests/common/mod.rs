use polars::prelude::*;

/// A small panel dataset as CSV bytes: 10 rows across two groups.
pub fn sample_csv_bytes() -> Vec<u8> {
    let mut df = sample_frame();
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).finish(&mut df).unwrap();
    buf
}

/// The same dataset as Parquet bytes.
pub fn sample_parquet_bytes() -> Vec<u8> {
    let mut df = sample_frame();
    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf).finish(&mut df).unwrap();
    buf
}

pub fn sample_frame() -> DataFrame {
    df!(
        "city" => ["Atlanta", "Boston", "Chicago", "Denver", "El Paso",
                   "Fresno", "Glendale", "Houston", "Irvine", "Juneau"],
        "region" => ["south", "north", "north", "west", "west",
                     "west", "west", "south", "west", "west"],
        "score" => [81_i64, 75, 68, 90, 62, 70, 77, 85, 88, 59],
    )
    .unwrap()
}
