use gtfs_writer::{Agency, Compression, Feed, FeedWriter, Stop};
use std::fs::{self, File};
use std::io::Read;
use tempfile::tempdir;
use zip::ZipArchive;

fn sample_feed() -> Feed {
    let mut feed = Feed::new();
    feed.agencies.push(Agency {
        id: "A1".to_string(),
        name: "Metro".to_string(),
        url: "https://metro.example".to_string(),
        timezone: "Europe/Berlin".to_string(),
        ..Agency::default()
    });
    feed.stops.push(Stop {
        id: "S1".to_string(),
        name: "Central".to_string(),
        lat_lon: Some((47.5, 8.25)),
        ..Stop::default()
    });
    feed
}

fn read_entry(path: &std::path::Path, name: &str) -> anyhow::Result<String> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entry = archive.by_name(name)?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    Ok(contents)
}

#[test]
fn archive_output_matches_directory_output() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let feed = sample_feed();
    let writer = FeedWriter::default();

    let loose = dir.path().join("loose");
    fs::create_dir(&loose)?;
    writer.write(&feed, &loose)?;

    let archive_path = dir.path().join("feed.zip");
    writer.write(&feed, &archive_path)?;

    for name in ["agency.txt", "stops.txt", "routes.txt", "trips.txt", "stop_times.txt"] {
        let from_dir = fs::read_to_string(loose.join(name))?;
        let from_zip = read_entry(&archive_path, name)?;
        assert_eq!(from_dir, from_zip, "mismatch in {name}");
    }
    Ok(())
}

#[test]
fn archive_skips_empty_optional_tables() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let archive_path = dir.path().join("feed.zip");
    FeedWriter::default().write(&sample_feed(), &archive_path)?;

    let archive = ZipArchive::new(File::open(&archive_path)?)?;
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"agency.txt"));
    assert!(!names.contains(&"transfers.txt"));
    assert!(!names.contains(&"shapes.txt"));
    Ok(())
}

#[test]
fn stored_and_level_compression_round_trip() -> anyhow::Result<()> {
    let dir = tempdir()?;
    for compression in [Compression::None, Compression::Level(1), Compression::Level(9)] {
        let archive_path = dir.path().join("feed.zip");
        let writer = FeedWriter {
            compression,
            ..FeedWriter::default()
        };
        writer.write(&sample_feed(), &archive_path)?;

        let agency = read_entry(&archive_path, "agency.txt")?;
        assert!(agency.starts_with("agency_id,"), "{compression:?}");
    }
    Ok(())
}

#[test]
fn out_of_range_compression_level_is_rejected() {
    let dir = tempdir().unwrap();
    let writer = FeedWriter {
        compression: Compression::Level(12),
        ..FeedWriter::default()
    };
    let err = writer
        .write(&sample_feed(), &dir.path().join("feed.zip"))
        .unwrap_err();
    assert!(err.to_string().contains("compression level"));
}
