use std::path::PathBuf;

use spreadsheet_intake::ingestion::{
    ArtifactNaming, DownloadedArtifact, FetchOptions, Fetcher, FormatTag, Loader, LoadOptions,
    Source,
};
use spreadsheet_intake::LoadError;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fetcher_in(dir: &tempfile::TempDir, naming: ArtifactNaming) -> Fetcher {
    Fetcher::new(FetchOptions {
        prefix: dir.path().join("artifacts"),
        naming,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn fetch_sniffs_and_names_artifacts_by_content() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(&dir, ArtifactNaming::SourceHash);

    for (name, format) in [
        ("legacy.xls", FormatTag::Xls),
        ("with-bom.csv", FormatTag::Csv),
        ("latin-1.csv", FormatTag::Csv),
    ] {
        let src = Source::from_path(fixture(name));
        let artifact = fetcher.fetch(&src).unwrap();
        assert_eq!(artifact.format, format, "{name}");
        assert_eq!(
            artifact.path.extension().and_then(|e| e.to_str()),
            Some(format.extension()),
            "{name}"
        );
        assert!(artifact.path.starts_with(dir.path().join("artifacts")));
        assert_eq!(artifact.bytes, std::fs::metadata(fixture(name)).unwrap().len());
        assert_eq!(
            std::fs::read(&artifact.path).unwrap(),
            std::fs::read(fixture(name)).unwrap()
        );
    }
}

#[test]
fn renamed_workbook_keeps_its_real_format() {
    let dir = tempfile::tempdir().unwrap();
    let disguised = dir.path().join("legacy.txt");
    std::fs::copy(fixture("legacy.xls"), &disguised).unwrap();

    let artifact = fetcher_in(&dir, ArtifactNaming::SourceHash)
        .fetch(&Source::from_path(&disguised))
        .unwrap();
    assert_eq!(artifact.format, FormatTag::Xls);
    assert_eq!(artifact.path.extension().and_then(|e| e.to_str()), Some("xls"));
}

#[test]
fn tiny_chunk_size_still_sniffs_and_copies_everything() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(FetchOptions {
        prefix: dir.path().to_path_buf(),
        chunk_size: 1,
        ..Default::default()
    })
    .unwrap();

    let artifact = fetcher
        .fetch(&Source::from_path(fixture("legacy-hidden-first.xls")))
        .unwrap();
    assert_eq!(artifact.format, FormatTag::Xls);
    assert_eq!(artifact.bytes, 5632);
}

#[test]
fn same_uri_maps_to_same_artifact_unless_unique() {
    let dir = tempfile::tempdir().unwrap();
    let src = Source::from_path(fixture("without-bom-utf-8.csv"));

    let hashed = fetcher_in(&dir, ArtifactNaming::SourceHash);
    let a = hashed.fetch(&src).unwrap();
    let b = hashed.fetch(&src).unwrap();
    assert_eq!(a.path, b.path);

    let unique = fetcher_in(&dir, ArtifactNaming::Unique);
    let c = unique.fetch(&src).unwrap();
    let d = unique.fetch(&src).unwrap();
    assert_ne!(c.path, d.path);
    assert_ne!(c.path, a.path);
    assert!(c.path.exists() && d.path.exists());
}

#[test]
fn artifact_can_be_reopened_and_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let fetched = fetcher_in(&dir, ArtifactNaming::SourceHash)
        .fetch(&Source::from_path(fixture("with-bom.csv")))
        .unwrap();

    let reopened = DownloadedArtifact::from_path(&fetched.path).unwrap();
    assert_eq!(reopened, fetched);

    let t = Loader::new(LoadOptions::default())
        .unwrap()
        .load_artifact(&reopened)
        .unwrap();
    assert_eq!(t.columns, vec!["hello", "world"]);

    reopened.discard().unwrap();
    assert!(!fetched.path.exists());
}

#[test]
fn reopening_needs_a_known_extension() {
    let dir = tempfile::tempdir().unwrap();
    let odd = dir.path().join("artifact.bin");
    std::fs::write(&odd, b"a,b\n").unwrap();

    match DownloadedArtifact::from_path(&odd) {
        Err(LoadError::UnsupportedArtifact { path }) => assert_eq!(path, odd),
        other => panic!("expected UnsupportedArtifact, got {other:?}"),
    }
}

#[test]
fn copy_and_upload_round_trip_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher_in(&dir, ArtifactNaming::SourceHash);

    let mut copied = Vec::new();
    let n = fetcher
        .copy_to(&Source::from_path(fixture("legacy.xls")), &mut copied)
        .unwrap();
    assert_eq!(n, copied.len() as u64);
    assert_eq!(copied, std::fs::read(fixture("legacy.xls")).unwrap());

    let target = dir.path().join("out.xls");
    fetcher
        .upload(&Source::from_path(&target), std::io::Cursor::new(copied.clone()), None)
        .unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), copied);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = fetcher_in(&dir, ArtifactNaming::SourceHash)
        .fetch(&Source::from_path(dir.path().join("nope.csv")))
        .unwrap_err();
    assert!(matches!(err, LoadError::Io(_)), "got {err:?}");
    assert!(err.is_transport());
}

#[test]
fn only_file_and_http_schemes_are_accepted() {
    for uri in ["ftp://example.com/a.csv", "s3://bucket/key", "/plain/path.csv"] {
        match Source::parse(uri) {
            Err(LoadError::UnsupportedScheme { uri: got }) => assert_eq!(got, uri),
            other => panic!("expected UnsupportedScheme for {uri}, got {other:?}"),
        }
    }
    assert!(Source::parse("https://example.com/a.xlsx").unwrap().is_remote());
    assert!(!Source::parse("file:///tmp/a.csv").unwrap().is_remote());
}
