use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::RowAccessor;

use transect_normalize::PipelineError;
use transect_normalize::execution::{Pipeline, PipelineOptions};
use transect_normalize::ingestion::{MemorySource, Sheet};
use transect_normalize::output::{OutputFormat, OutputOptions, open_sink};
use transect_normalize::types::RawCell;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("transect-normalize-{name}-{nanos}"))
}

fn survey_line(line: f64, genus: &str, species: &str, count: f64, stems: &[f64]) -> Vec<RawCell> {
    let mut row = vec![RawCell::Empty; 14];
    row[0] = RawCell::from(line);
    row[1] = RawCell::from("Fabaceae");
    row[2] = RawCell::from(genus);
    row[3] = RawCell::from(species);
    row[12] = RawCell::from("N");
    row[13] = RawCell::from(count);
    row.extend(stems.iter().map(|&s| RawCell::Number(s)));
    row
}

fn source() -> MemorySource {
    MemorySource::new(vec![Sheet::new(
        "plotA.xls",
        vec![
            vec![RawCell::from("Line")],
            survey_line(1.0, "Inga", "edulis", 12.0, &[3.1, 4.2]),
            survey_line(2.0, "Inga", "edulis", 5.0, &[2.0]),
            survey_line(3.0, "Swartzia", "sp", 1.0, &[7.5]),
        ],
    )])
}

fn run_to(format: OutputFormat, dir: &Path) -> Result<(), PipelineError> {
    let mut sink = open_sink(&OutputOptions {
        format,
        dir: dir.to_path_buf(),
        ..Default::default()
    })?;
    Pipeline::new(PipelineOptions::default()).run(&mut source(), sink.as_mut())?;
    Ok(())
}

#[test]
fn csv_output_has_one_file_per_table_with_headers() {
    let dir = tmp_dir("csv-out");
    run_to(OutputFormat::Csv, &dir).unwrap();

    let species = fs::read_to_string(dir.join("species.csv")).unwrap();
    assert_eq!(
        species,
        "species_id,family,genus,species,id_level,full_id\n\
         1,Fabaceae,Inga,edulis,species,1\n\
         2,Fabaceae,Swartzia,sp,genus,0\n"
    );

    let counts = fs::read_to_string(dir.join("counts.csv")).unwrap();
    assert_eq!(counts.lines().count(), 4);
    assert_eq!(counts.lines().nth(3), Some("3,3,2,plotA,N,1"));

    let stems = fs::read_to_string(dir.join("stems.csv")).unwrap();
    assert_eq!(stems.lines().count(), 5);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn delimited_output_uses_double_colon_without_header() {
    let dir = tmp_dir("delimited-out");
    run_to(OutputFormat::Delimited, &dir).unwrap();

    let stems = fs::read_to_string(dir.join("stems.txt")).unwrap();
    let lines: Vec<&str> = stems.lines().collect();
    assert_eq!(
        lines,
        vec![
            "1::1::1::plotA::N::3.1",
            "2::1::1::plotA::N::4.2",
            "3::2::1::plotA::N::2",
            "4::3::2::plotA::N::7.5",
        ]
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parquet_output_round_trips_through_a_reader() {
    let dir = tmp_dir("parquet-out");
    run_to(OutputFormat::Parquet, &dir).unwrap();

    let reader = SerializedFileReader::try_from(dir.join("counts.parquet").as_path()).unwrap();
    assert_eq!(reader.metadata().file_metadata().num_rows(), 3);

    let rows: Vec<_> = reader
        .get_row_iter(None)
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows[0].get_long(0).unwrap(), 1);
    assert_eq!(rows[0].get_long(1).unwrap(), 1);
    assert_eq!(rows[2].get_long(2).unwrap(), 2);
    assert_eq!(rows[1].get_string(3).unwrap(), "plotA");
    assert_eq!(rows[1].get_double(5).unwrap(), 5.0);

    let species = SerializedFileReader::try_from(dir.join("species.parquet").as_path()).unwrap();
    let first = species.get_row_iter(None).unwrap().next().unwrap().unwrap();
    assert_eq!(first.get_string(2).unwrap(), "Inga");
    assert!(first.get_bool(5).unwrap());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn delimiter_collisions_fail_the_run() {
    let dir = tmp_dir("delimited-collision");
    let mut sink = open_sink(&OutputOptions {
        format: OutputFormat::Delimited,
        dir: dir.clone(),
        delimiter: "/".to_string(),
    })
    .unwrap();

    let mut source = MemorySource::new(vec![Sheet::new(
        "plotA.xls",
        vec![
            vec![RawCell::from("Line")],
            survey_line(1.0, "Inga/Zygia", "edulis", 1.0, &[]),
        ],
    )]);
    let err = Pipeline::new(PipelineOptions::default())
        .run(&mut source, sink.as_mut())
        .unwrap_err();
    assert!(matches!(err, PipelineError::DelimiterCollision { .. }));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn multi_line_cells_fail_delimited_output() {
    let dir = tmp_dir("delimited-multiline");
    let mut sink = open_sink(&OutputOptions {
        format: OutputFormat::Delimited,
        dir: dir.clone(),
        ..Default::default()
    })
    .unwrap();

    let mut row = survey_line(1.0, "Inga", "edulis", 1.0, &[2.0]);
    row[1] = RawCell::from("Fabaceae\nMimosoideae");
    let mut source = MemorySource::new(vec![Sheet::new(
        "plotA.xls",
        vec![vec![RawCell::from("Line")], row],
    )]);
    let err = Pipeline::new(PipelineOptions::default())
        .run(&mut source, sink.as_mut())
        .unwrap_err();
    assert!(matches!(err, PipelineError::DelimiterCollision { ref table, .. } if table == "species"));

    let _ = fs::remove_dir_all(&dir);
}
