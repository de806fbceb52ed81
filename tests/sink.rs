use gtfs_writer::CsvSink;
use std::io::{self, Write};

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn output(sink: CsvSink<Vec<u8>>) -> anyhow::Result<String> {
    Ok(String::from_utf8(sink.into_inner()?)?)
}

#[test]
fn optional_column_omitted_when_entirely_empty() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["id", "name", "phone", "fare_url"]), &["name"])?;
    sink.push_row(row(&["A1", "Metro", "555-0100", ""]));
    sink.push_row(row(&["A2", "Coach", "", ""]));
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "id,name,phone\nA1,Metro,555-0100\nA2,Coach,\n");
    Ok(())
}

#[test]
fn required_column_kept_even_when_empty() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["id", "name", "url"]), &["id", "url"])?;
    sink.push_row(row(&["A1", "", ""]));
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "id,url\nA1,\n");
    Ok(())
}

#[test]
fn required_column_missing_from_schema_is_an_error() {
    let mut sink = CsvSink::new(Vec::new());
    let err = sink
        .set_schema(cols(&["id", "name"]), &["id", "fare_id"])
        .unwrap_err();
    assert!(err.to_string().contains("fare_id"));
}

#[test]
fn header_and_rows_stay_positionally_aligned() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["a", "b", "c", "d", "e"]), &["a"])?;
    sink.push_row(row(&["1", "", "3", "", "5"]));
    sink.push_row(row(&["6", "", "", "", "10"]));
    sink.flush()?;

    let out = output(sink)?;
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "a,c,e");
    assert_eq!(lines[1], "1,3,5");
    assert_eq!(lines[2], "6,,10");
    Ok(())
}

#[test]
fn preferred_order_applies_before_unnamed_columns() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["a", "b", "c", "d"]), &["a"])?;
    // "z" is not in the schema and must be skipped; "d" is ordered but
    // entirely empty, so omission still removes it.
    sink.set_order(&cols(&["c", "z", "d", "a"]));
    sink.push_row(row(&["1", "2", "3", ""]));
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "c,a,b\n3,1,2\n");
    Ok(())
}

#[test]
fn prefix_sort_is_stable() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["key", "seq"]), &["key", "seq"])?;
    sink.push_row(row(&["b", "1"]));
    sink.push_row(row(&["a", "1"]));
    sink.push_row(row(&["a", "2"]));
    sink.push_row(row(&["b", "2"]));
    sink.sort_by_prefix(1);
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "key,seq\na,1\na,2\nb,1\nb,2\n");
    Ok(())
}

#[test]
fn zero_rows_emit_required_header_only() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["id", "name", "phone"]), &["name"])?;
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "name\n");
    Ok(())
}

#[test]
fn streaming_matches_buffered_output() -> anyhow::Result<()> {
    let rows = [
        row(&["s1", "1", "47.1", "8.5", ""]),
        row(&["s1", "2", "47.2", "8.6", "12.5"]),
        row(&["s2", "1", "47.3", "8.7", ""]),
    ];
    let columns = ["shape_id", "seq", "lat", "lon", "dist"];
    let required = ["shape_id", "seq", "lat", "lon"];

    let mut buffered = CsvSink::new(Vec::new());
    buffered.set_schema(cols(&columns), &required)?;
    for r in &rows {
        buffered.push_row(r.clone());
    }
    buffered.flush()?;

    let mut streamed = CsvSink::new(Vec::new());
    streamed.set_schema(cols(&columns), &required)?;
    for r in &rows {
        streamed.record_usage(r);
    }
    streamed.write_header()?;
    for r in &rows {
        streamed.write_raw(r.clone())?;
    }
    streamed.flush()?;

    assert_eq!(output(buffered)?, output(streamed)?);
    Ok(())
}

#[test]
fn usage_is_monotonic_across_rows() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["a", "b"]), &["a"])?;
    sink.push_row(row(&["1", "x"]));
    // A later empty value must not un-use the column.
    sink.push_row(row(&["2", ""]));
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "a,b\n1,x\n2,\n");
    Ok(())
}

/// Accepts `limit` bytes, then fails every subsequent write.
struct FailingWriter {
    limit: usize,
    written: usize,
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() > self.limit {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "device out of space"));
        }
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn write_failure_mid_table_surfaces_through_flush() {
    let mut sink = CsvSink::new(FailingWriter {
        limit: 16,
        written: 0,
    });
    sink.set_schema(cols(&["id", "name"]), &["id", "name"])
        .unwrap();
    for i in 0..100 {
        sink.push_row(row(&[&format!("S{i}"), "some stop"]));
    }

    let err = sink.flush().unwrap_err();
    assert!(format!("{err:#}").contains("device out of space"), "{err:#}");
}

#[test]
fn cells_needing_quotes_are_escaped() -> anyhow::Result<()> {
    let mut sink = CsvSink::new(Vec::new());
    sink.set_schema(cols(&["id", "name"]), &["id", "name"])?;
    sink.push_row(row(&["A1", "Foo, \"Bar\""]));
    sink.flush()?;

    let out = output(sink)?;
    assert_eq!(out, "id,name\nA1,\"Foo, \"\"Bar\"\"\"\n");
    Ok(())
}
