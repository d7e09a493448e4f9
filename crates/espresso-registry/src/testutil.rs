use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use espresso_store::{Fetch, FetchError, FetchResult};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip bytes for `entries`; a `None` body marks a directory entry.
pub fn zip_bytes(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        match body {
            Some(body) => {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            None => writer.add_directory(*name, SimpleFileOptions::default()).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, entries: &[(&str, Option<&str>)]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

/// In-memory fetcher keyed by URL, optionally slow.
#[derive(Default)]
pub struct MapFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
    delay: Option<Duration>,
}

impl MapFetcher {
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Fetch for MapFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> FetchResult<u64> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let body = self.bodies.get(url).ok_or_else(|| FetchError::NotFound {
            url: url.to_string(),
        })?;
        sink.write_all(body).unwrap();
        Ok(body.len() as u64)
    }
}
