//! Byte-order-mark handling, charset guessing and streaming decode for delimited text.
//!
//! [`EncodingNormalizer::normalize`] takes a seekable byte stream positioned anywhere and
//! returns a [`DecodingReader`] that yields UTF-8:
//!
//! 1. A leading BOM is recognized and skipped. It is *not* trusted as a statement about
//!    the encoding: spreadsheet exporters commonly prepend a UTF-16 BOM to UTF-8 bytes.
//! 2. Up to `sample_size` bytes after the BOM are handed to a [`CharsetDetector`].
//! 3. A guess below `min_confidence` is replaced by `default_encoding`.
//! 4. The stream is rewound to just after the BOM and decoded with the chosen encoding.
//!
//! Detection is best-effort. Under the default [`DecodeErrorPolicy::Ignore`] malformed
//! input is dropped, never reported.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use chardetng::EncodingDetector;
use encoding_rs::{Decoder, DecoderResult, Encoding};
use serde::Deserialize;

use crate::error::{LoadError, LoadResult};

use super::fetch::read_full;

/// Default number of bytes sampled for charset detection (128 KiB).
pub const DEFAULT_SAMPLE_SIZE: usize = 128 * 1024;

/// Default minimum detector confidence accepted.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.8;

/// Default encoding used when detection is not confident.
pub const DEFAULT_ENCODING: &str = "utf-8";

const DECODE_BUFFER_SIZE: usize = 8 * 1024;

/// What to do with byte sequences that are invalid in the chosen encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Drop malformed sequences.
    #[default]
    Ignore,
    /// Substitute U+FFFD for each malformed sequence.
    Replace,
    /// Fail the read with [`io::ErrorKind::InvalidData`].
    Strict,
}

/// Options for [`EncodingNormalizer`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingOptions {
    /// WHATWG label of the fallback encoding.
    pub default_encoding: String,
    /// Detector confidence (0.0..=1.0) required to accept its guess.
    pub min_confidence: f64,
    pub errors: DecodeErrorPolicy,
    /// Bytes sampled for detection.
    pub sample_size: usize,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            default_encoding: DEFAULT_ENCODING.to_string(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            errors: DecodeErrorPolicy::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// A byte-order mark found at the start of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bom {
    /// `EF BB BF`.
    Utf8,
    /// `EE BB BF`. Not a real BOM, but emitted by some exporters in place of `EF BB BF`.
    Utf8Variant,
    /// `FF FE`.
    Utf16Le,
    /// `FE FF`.
    Utf16Be,
}

impl Bom {
    /// Candidates in match order.
    const ALL: [Bom; 4] = [Bom::Utf8, Bom::Utf8Variant, Bom::Utf16Le, Bom::Utf16Be];

    pub fn bytes(self) -> &'static [u8] {
        match self {
            Bom::Utf8 => &[0xEF, 0xBB, 0xBF],
            Bom::Utf8Variant => &[0xEE, 0xBB, 0xBF],
            Bom::Utf16Le => &[0xFF, 0xFE],
            Bom::Utf16Be => &[0xFE, 0xFF],
        }
    }

    /// Number of bytes to skip.
    pub fn byte_len(self) -> usize {
        self.bytes().len()
    }

    /// Match the start of `prefix` against the known marks.
    pub fn detect(prefix: &[u8]) -> Option<Bom> {
        Self::ALL.into_iter().find(|bom| prefix.starts_with(bom.bytes()))
    }
}

/// A detector's best guess for a byte sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CharsetGuess {
    /// Encoding label, or `None` when the detector has no candidate at all.
    pub encoding: Option<String>,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
}

/// Charset detection collaborator.
pub trait CharsetDetector: Send + Sync {
    fn detect(&self, sample: &[u8]) -> CharsetGuess;
}

/// [`CharsetDetector`] backed by `chardetng`.
///
/// `chardetng` reports whether its guess was a clear winner rather than a score, so a
/// confident guess maps to `1.0` and any other guess to `0.5`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChardetngDetector;

impl CharsetDetector for ChardetngDetector {
    fn detect(&self, sample: &[u8]) -> CharsetGuess {
        let mut detector = EncodingDetector::new();
        detector.feed(sample, true);
        let (encoding, confident) = detector.guess_assess(None, true);
        CharsetGuess {
            encoding: Some(encoding.name().to_string()),
            confidence: if confident { 1.0 } else { 0.5 },
        }
    }
}

/// Result of [`EncodingNormalizer::normalize`].
#[derive(Debug)]
pub struct NormalizedText<R> {
    /// UTF-8 view of the content after the BOM.
    pub reader: DecodingReader<R>,
    /// Encoding the content is decoded with.
    pub encoding: &'static Encoding,
    /// Byte offset where decoding starts (the BOM length, or 0).
    pub content_offset: u64,
    /// What the detector said, before the confidence policy was applied.
    pub guess: CharsetGuess,
    pub bom: Option<Bom>,
}

/// Applies BOM skipping, detection and the confidence fallback policy.
#[derive(Clone)]
pub struct EncodingNormalizer {
    options: EncodingOptions,
    fallback: &'static Encoding,
    detector: Arc<dyn CharsetDetector>,
}

impl fmt::Debug for EncodingNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodingNormalizer")
            .field("options", &self.options)
            .field("fallback", &self.fallback.name())
            .finish_non_exhaustive()
    }
}

impl EncodingNormalizer {
    /// Create a normalizer using [`ChardetngDetector`].
    ///
    /// Fails with [`LoadError::UnknownEncoding`] if `default_encoding` is not a known label.
    pub fn new(options: EncodingOptions) -> LoadResult<Self> {
        Self::with_detector(options, Arc::new(ChardetngDetector))
    }

    /// Create a normalizer with a custom detection collaborator.
    pub fn with_detector(
        options: EncodingOptions,
        detector: Arc<dyn CharsetDetector>,
    ) -> LoadResult<Self> {
        let fallback = lookup(&options.default_encoding)?;
        Ok(Self {
            options,
            fallback,
            detector,
        })
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    /// Skip any BOM, pick an encoding, and wrap `input` in a decoder.
    pub fn normalize<R: Read + Seek>(&self, mut input: R) -> LoadResult<NormalizedText<R>> {
        input.seek(SeekFrom::Start(0))?;
        let mut head = [0u8; 3];
        let n = read_full(&mut input, &mut head)?;
        let bom = Bom::detect(&head[..n]);
        let offset = bom.map_or(0, Bom::byte_len) as u64;
        if let Some(bom) = bom {
            tracing::debug!(?bom, "skipping byte-order mark");
        }

        input.seek(SeekFrom::Start(offset))?;
        let mut sample = Vec::new();
        (&mut input)
            .take(self.options.sample_size as u64)
            .read_to_end(&mut sample)?;

        let guess = self.detector.detect(&sample);
        let encoding = self.choose(&guess)?;

        input.seek(SeekFrom::Start(offset))?;
        Ok(NormalizedText {
            reader: DecodingReader::new(input, encoding, self.options.errors),
            encoding,
            content_offset: offset,
            guess,
            bom,
        })
    }

    fn choose(&self, guess: &CharsetGuess) -> LoadResult<&'static Encoding> {
        match &guess.encoding {
            Some(label) if guess.confidence >= self.options.min_confidence => {
                let encoding = lookup(label)?;
                tracing::debug!(
                    encoding = encoding.name(),
                    confidence = guess.confidence,
                    "accepted detected charset"
                );
                Ok(encoding)
            }
            _ => {
                tracing::info!(
                    candidate = guess.encoding.as_deref().unwrap_or("none"),
                    confidence = guess.confidence,
                    min_confidence = self.options.min_confidence,
                    fallback = self.fallback.name(),
                    "charset guess not confident, using default encoding"
                );
                Ok(self.fallback)
            }
        }
    }
}

fn lookup(label: &str) -> LoadResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| LoadError::UnknownEncoding {
        label: label.to_string(),
    })
}

/// Streaming decoder from some encoding to UTF-8.
///
/// Implements [`Read`], yielding UTF-8 bytes, so it can feed a CSV tokenizer directly.
/// Multi-byte sequences split across reads of the inner stream are handled by the
/// underlying `encoding_rs` decoder state.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    policy: DecodeErrorPolicy,
    input: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    output: String,
    out_pos: usize,
    eof: bool,
    finished: bool,
}

impl<R> fmt::Debug for DecodingReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodingReader")
            .field("encoding", &self.decoder.encoding().name())
            .field("policy", &self.policy)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding, policy: DecodeErrorPolicy) -> Self {
        Self::with_buffer_size(inner, encoding, policy, DECODE_BUFFER_SIZE)
    }

    fn with_buffer_size(
        inner: R,
        encoding: &'static Encoding,
        policy: DecodeErrorPolicy,
        size: usize,
    ) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_without_bom_handling(),
            policy,
            input: vec![0u8; size.max(1)],
            in_pos: 0,
            in_len: 0,
            output: String::new(),
            out_pos: 0,
            eof: false,
            finished: false,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decode the next slice of input into `self.output`.
    fn fill_output(&mut self) -> io::Result<()> {
        self.output.clear();
        self.out_pos = 0;

        if self.in_pos == self.in_len && !self.eof {
            self.in_pos = 0;
            self.in_len = loop {
                match self.inner.read(&mut self.input) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            };
            self.eof = self.in_len == 0;
        }

        let last = self.eof;
        let pending = self.in_len - self.in_pos;
        let want = self
            .decoder
            .max_utf8_buffer_length_without_replacement(pending)
            .unwrap_or(DECODE_BUFFER_SIZE);
        self.output.reserve(want.max(16));

        loop {
            let (result, read) = self.decoder.decode_to_string_without_replacement(
                &self.input[self.in_pos..self.in_len],
                &mut self.output,
                last,
            );
            self.in_pos += read;
            match result {
                DecoderResult::InputEmpty => {
                    if last {
                        self.finished = true;
                    }
                    return Ok(());
                }
                DecoderResult::OutputFull => self.output.reserve(DECODE_BUFFER_SIZE),
                DecoderResult::Malformed(_, _) => match self.policy {
                    DecodeErrorPolicy::Ignore => {}
                    DecodeErrorPolicy::Replace => self.output.push(char::REPLACEMENT_CHARACTER),
                    DecodeErrorPolicy::Strict => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("malformed {} input", self.decoder.encoding().name()),
                        ));
                    }
                },
            }
        }
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let ready = &self.output.as_bytes()[self.out_pos..];
            if !ready.is_empty() {
                let n = ready.len().min(buf.len());
                buf[..n].copy_from_slice(&ready[..n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill_output()?;
        }
    }
}
