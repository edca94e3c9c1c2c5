use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::request::{Request, RequestType};

/// Parses one request per non-empty, non-comment line of a trace file:
/// `appId,objectId,size,type`. `type` is matched case-insensitively; any
/// token other than `GET` is parsed but left for the engine to ignore.
pub struct TraceReader {
    lines: io::Lines<BufReader<File>>,
}

impl TraceReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(TraceReader { lines: BufReader::new(file).lines() })
    }
}

impl Iterator for TraceReader {
    type Item = io::Result<Request>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(parse_line(line));
        }
    }
}

fn parse_line(line: &str) -> io::Result<Request> {
    let mut fields = line.split(',').map(str::trim);
    let bad = || io::Error::new(io::ErrorKind::InvalidData, format!("malformed trace line: {line}"));

    let app_id: i32 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let object_id: i64 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let size: u32 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let kind = match fields.next() {
        Some(token) if token.eq_ignore_ascii_case("GET") => RequestType::Get,
        Some(token) if token.eq_ignore_ascii_case("SET") => RequestType::Set,
        Some(token) if token.eq_ignore_ascii_case("DELETE") => RequestType::Delete,
        Some(_) => RequestType::Other,
        None => RequestType::Get,
    };

    Ok(Request::new(app_id, object_id, size, kind))
}
