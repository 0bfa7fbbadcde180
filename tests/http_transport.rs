use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use spreadsheet_intake::ingestion::{
    FetchOptions, Fetcher, FormatTag, LoadOptions, Loader, Source,
};
use spreadsheet_intake::LoadError;

type Files = Arc<Mutex<HashMap<String, Vec<u8>>>>;
type Headers = Arc<Mutex<HashMap<String, Vec<String>>>>;

/// Minimal HTTP/1.1 server: serves GETs from a path map and stores PUT bodies back into it.
/// Uploads sent without a `Content-Length` are refused with 411, as object stores do.
struct StubServer {
    base: String,
    files: Files,
    /// Lower-cased request header lines of the last request to each path.
    headers: Headers,
}

impl StubServer {
    fn start(files: HashMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let files = Arc::new(Mutex::new(files));
        let headers = Headers::default();
        let (shared_files, shared_headers) = (files.clone(), headers.clone());
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = serve(stream, &shared_files, &shared_headers);
            }
        });
        Self {
            base,
            files,
            headers,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

fn serve(stream: TcpStream, files: &Files, headers: &Headers) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = None;
    let mut chunked = false;
    let mut seen = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        seen.push(line.to_ascii_lowercase());
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value.parse::<usize>().ok();
            } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
                chunked = true;
            }
        }
    }

    headers.lock().unwrap().insert(path.clone(), seen);

    let (status, body) = match method.as_str() {
        "GET" => match files.lock().unwrap().get(&path) {
            Some(body) => ("200 OK", body.clone()),
            None => ("404 Not Found", b"missing".to_vec()),
        },
        "PUT" => {
            let body = if chunked {
                read_chunked(&mut reader)?
            } else {
                let mut body = vec![0u8; content_length.unwrap_or(0)];
                reader.read_exact(&mut body)?;
                body
            };
            if chunked {
                ("411 Length Required", Vec::new())
            } else {
                files.lock().unwrap().insert(path, body);
                ("201 Created", Vec::new())
            }
        }
        _ => ("405 Method Not Allowed", Vec::new()),
    };

    let mut out = stream;
    write!(
        out,
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    out.write_all(&body)?;
    out.flush()
}

fn read_chunked<R: BufRead>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line)?;
        let size_hex = size_line.trim().split(';').next().unwrap_or("0");
        let size = usize::from_str_radix(size_hex, 16).unwrap_or(0);
        if size == 0 {
            // Trailer section ends with an empty line.
            let mut line = String::new();
            while reader.read_line(&mut line)? > 0 && !line.trim().is_empty() {
                line.clear();
            }
            return Ok(body);
        }
        let mut chunk = vec![0u8; size];
        reader.read_exact(&mut chunk)?;
        body.extend_from_slice(&chunk);
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
    }
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn options_in(dir: &tempfile::TempDir) -> LoadOptions {
    LoadOptions {
        fetch: FetchOptions {
            prefix: dir.path().to_path_buf(),
            timeout_secs: Some(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn http_sources_are_fetched_and_sniffed() {
    let server = StubServer::start(HashMap::from([
        ("/report.csv".to_string(), fixture_bytes("legacy.xls")),
        ("/plain".to_string(), fixture_bytes("with-bom.csv")),
    ]));
    let dir = tempfile::tempdir().unwrap();
    let loader = Loader::new(options_in(&dir)).unwrap();

    let outcome = loader.load_outcome(&server.url("/report.csv")).unwrap();
    assert_eq!(outcome.artifact.format, FormatTag::Xls);
    assert_eq!(outcome.table.columns, vec!["hello", "world"]);

    let outcome = loader.load_outcome(&server.url("/plain")).unwrap();
    assert_eq!(outcome.artifact.format, FormatTag::Csv);
    assert_eq!(outcome.table.columns, vec!["hello", "world"]);
}

#[test]
fn non_success_status_is_a_transport_error() {
    let server = StubServer::start(HashMap::new());
    let dir = tempfile::tempdir().unwrap();

    let err = Loader::new(options_in(&dir))
        .unwrap()
        .load(&server.url("/gone.xlsx"))
        .unwrap_err();
    assert!(matches!(err, LoadError::Http(_)), "got {err:?}");
    assert!(err.is_transport());
}

#[test]
fn uploading_a_file_sends_its_length() {
    let server = StubServer::start(HashMap::new());
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(options_in(&dir).fetch).unwrap();

    let local = dir.path().join("out.csv");
    std::fs::write(&local, fixture_bytes("latin-1.csv")).unwrap();
    let target = Source::parse(&server.url("/upload/out.csv")).unwrap();
    fetcher.upload_file(&target, &local).unwrap();

    let sent = server.headers.lock().unwrap().get("/upload/out.csv").cloned().unwrap();
    assert!(sent.contains(&"content-length: 35".to_string()), "{sent:?}");
    assert!(!sent.iter().any(|h| h.starts_with("transfer-encoding")), "{sent:?}");

    let stored = server.files.lock().unwrap().get("/upload/out.csv").cloned();
    assert_eq!(stored, Some(fixture_bytes("latin-1.csv")));

    let mut back = Vec::new();
    fetcher.copy_to(&target, &mut back).unwrap();
    assert_eq!(back, fixture_bytes("latin-1.csv"));
}

#[test]
fn sized_stream_upload_is_not_chunked() {
    let server = StubServer::start(HashMap::new());
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(options_in(&dir).fetch).unwrap();

    let payload = b"hello,world\nalpha,bravo\n".to_vec();
    let target = Source::parse(&server.url("/sized")).unwrap();
    let len = payload.len() as u64;
    fetcher
        .upload(&target, std::io::Cursor::new(payload.clone()), Some(len))
        .unwrap();
    assert_eq!(server.files.lock().unwrap().get("/sized").cloned(), Some(payload));
}

#[test]
fn unsized_stream_upload_goes_out_chunked() {
    let server = StubServer::start(HashMap::new());
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(options_in(&dir).fetch).unwrap();

    let target = Source::parse(&server.url("/unsized")).unwrap();
    let err = fetcher
        .upload(&target, std::io::Cursor::new(b"a,b\n".to_vec()), None)
        .unwrap_err();
    assert!(matches!(err, LoadError::Http(_)), "got {err:?}");

    let sent = server.headers.lock().unwrap().get("/unsized").cloned().unwrap();
    assert!(sent.contains(&"transfer-encoding: chunked".to_string()), "{sent:?}");
}
