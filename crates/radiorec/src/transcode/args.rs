//! Argument vectors for the transcoding passes.

use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// One on-demand request covering part of a time-free window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub url: String,
    /// File name inside the chunk directory.
    pub file_name: String,
    pub seconds: u64,
}

pub const CONCAT_LIST_FILE: &str = "concat.txt";

fn common_prefix() -> Vec<String> {
    ["-y", "-nostdin", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn push_headers(args: &mut Vec<String>, headers: &[(String, String)]) {
    if headers.is_empty() {
        return;
    }
    let joined: String = headers
        .iter()
        .map(|(name, value)| format!("{}: {}\r\n", name, value))
        .collect();
    args.push("-headers".to_string());
    args.push(joined);
}

/// Splits `[start, end)` into consecutive chunks of at most `chunk_seconds`.
/// Chunk timestamps are rendered in `offset`, the service's local time.
pub fn plan_chunks(
    stream_url: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    chunk_seconds: u64,
    offset: FixedOffset,
) -> Vec<Chunk> {
    let separator = if stream_url.contains('?') { '&' } else { '?' };
    let step = i64::try_from(chunk_seconds.max(1)).unwrap_or(i64::MAX);
    let mut chunks = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let remaining = (end - cursor).num_seconds();
        if remaining <= 0 {
            break;
        }
        let seconds = remaining.min(step);
        let seek = cursor.with_timezone(&offset).format("%Y%m%d%H%M%S");
        chunks.push(Chunk {
            url: format!("{}{}seek={}&l={}", stream_url, separator, seek, seconds),
            file_name: format!("chunk_{:03}.aac", chunks.len()),
            seconds: seconds as u64,
        });
        cursor += Duration::seconds(seconds);
    }

    chunks
}

/// First time-free pass: fetch every chunk in stream-copy mode, one output
/// per input.
pub fn chunk_fetch_args(headers: &[(String, String)], chunks: &[Chunk]) -> Vec<String> {
    let mut args = common_prefix();
    for chunk in chunks {
        push_headers(&mut args, headers);
        args.push("-i".to_string());
        args.push(chunk.url.clone());
    }
    for (index, chunk) in chunks.iter().enumerate() {
        args.extend([
            "-map".to_string(),
            index.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            chunk.file_name.clone(),
        ]);
    }
    args
}

pub fn concat_list(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("file '{}'\n", chunk.file_name))
        .collect()
}

/// Second time-free pass: concat-demux the fetched chunks into `output`.
pub fn concat_args(output: &Path) -> Vec<String> {
    let mut args = common_prefix();
    args.extend(
        [
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            CONCAT_LIST_FILE,
            "-c",
            "copy",
            "-bsf:a",
            "aac_adtstoasc",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Single live pass. `+faststart` is always requested since the length is
/// only known once capture stops.
pub fn live_args(
    stream_url: &str,
    headers: &[(String, String)],
    duration_seconds: u64,
    output: &Path,
) -> Vec<String> {
    let mut args = common_prefix();
    push_headers(&mut args, headers);
    args.extend([
        "-i".to_string(),
        stream_url.to_string(),
        "-t".to_string(),
        duration_seconds.to_string(),
    ]);
    args.extend(
        [
            "-vn",
            "-c:a",
            "copy",
            "-bsf:a",
            "aac_adtstoasc",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.to_string_lossy().into_owned());
    args
}
