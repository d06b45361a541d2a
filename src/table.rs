use std::fs::File;
use std::io::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

use hyper::client::Client;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::pin::{Pin, MAX_PIN};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the records for one first pin live: bucket `pin0 / 1000`, under
/// the key `pin0`. The maximal pin is the bucket's root resource and has
/// no key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bucket {
    pub id: u16,
    pub pin0: Pin,
}

impl Bucket {
    pub fn for_pin(pin0: Pin) -> Bucket {
        Bucket {
            id: pin0.value() / 1000,
            pin0: pin0,
        }
    }

    pub fn key(&self) -> Option<Pin> {
        if self.pin0.value() == MAX_PIN {
            None
        } else {
            Some(self.pin0)
        }
    }
}

pub trait TableSource {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError>;
}

impl<T: TableSource + ?Sized> TableSource for Box<T> {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(bucket)
    }
}

/// `root/<bucket>/<pin0>` on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalTable {
    root: PathBuf,
}

impl LocalTable {
    pub fn new<P: Into<PathBuf>>(root: P) -> LocalTable {
        LocalTable { root: root.into() }
    }

    pub fn path_for(&self, bucket: &Bucket) -> PathBuf {
        let mut path = self.root.clone();
        path.push(bucket.id.to_string());
        path.push(bucket.pin0.to_string());
        path
    }
}

impl TableSource for LocalTable {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(bucket);
        let mut data = Vec::new();
        File::open(&path)
            .and_then(|mut f| f.read_to_end(&mut data))
            .map_err(|e| FetchError::Io { path: path.clone(), source: e })?;
        debug!(path = %path.display(), bytes = data.len(), "read lookup table");
        Ok(data)
    }
}

/// Content-addressed buckets behind an HTTP gateway. `gateway` contains a
/// `{cid}` placeholder; `cids[i]` serves bucket `i + 1`.
pub struct RemoteTable {
    client: Client,
    gateway: String,
    cids: Vec<String>,
}

impl RemoteTable {
    pub fn new(gateway: &str, cids: Vec<String>, timeout: Duration) -> RemoteTable {
        let mut client = Client::new();
        client.set_read_timeout(Some(timeout));
        client.set_write_timeout(Some(timeout));
        RemoteTable {
            client: client,
            gateway: gateway.to_string(),
            cids: cids,
        }
    }

    pub fn url_for(&self, bucket: &Bucket) -> Result<String, FetchError> {
        let cid = (bucket.id as usize)
            .checked_sub(1)
            .and_then(|i| self.cids.get(i))
            .ok_or(FetchError::UnknownBucket { bucket: bucket.id })?;

        let mut url = self.gateway.replace("{cid}", cid);
        if !url.ends_with('/') {
            url.push('/');
        }
        if let Some(key) = bucket.key() {
            url.push_str(&key.to_string());
        }
        Ok(url)
    }
}

impl TableSource for RemoteTable {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(bucket)?;
        info!(url = %url, "fetching lookup table");

        let mut res = self.client.get(url.as_str())
            .send()
            .map_err(|e| FetchError::Http { url: url.clone(), source: e })?;
        if !res.status.is_success() {
            return Err(FetchError::Status { url: url, status: res.status.to_u16() });
        }

        let mut data = Vec::new();
        res.read_to_end(&mut data)
            .map_err(|e| FetchError::Body { url: url.clone(), source: e })?;
        debug!(url = %url, bytes = data.len(), "fetched lookup table");
        Ok(data)
    }
}

/// In-memory buckets keyed by first pin, counting fetches.
#[cfg(test)]
pub(crate) struct MemoryTable {
    buckets: std::collections::HashMap<u16, Vec<u8>>,
    pub fetches: std::cell::Cell<usize>,
}

#[cfg(test)]
impl MemoryTable {
    pub fn new() -> MemoryTable {
        MemoryTable {
            buckets: std::collections::HashMap::new(),
            fetches: std::cell::Cell::new(0),
        }
    }

    pub fn insert(&mut self, pin0: u16, bytes: Vec<u8>) {
        self.buckets.insert(pin0, bytes);
    }
}

#[cfg(test)]
impl TableSource for MemoryTable {
    fn fetch(&self, bucket: &Bucket) -> Result<Vec<u8>, FetchError> {
        self.fetches.set(self.fetches.get() + 1);
        self.buckets.get(&bucket.pin0.value())
            .cloned()
            .ok_or(FetchError::UnknownBucket { bucket: bucket.id })
    }
}

#[cfg(test)]
fn scratch_dir(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("pin_oracle_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_bucket_for_pin() {
    let b = Bucket::for_pin(Pin::new(4163).unwrap());
    assert_eq!(b.id, 4);
    assert_eq!(b.key(), Some(Pin::new(4163).unwrap()));

    let b = Bucket::for_pin(Pin::new(1000).unwrap());
    assert_eq!(b.id, 1);

    let b = Bucket::for_pin(Pin::new(9999).unwrap());
    assert_eq!((b.id, b.key().map(|p| p.value())), (9, Some(9999)));

    let b = Bucket::for_pin(Pin::new(10000).unwrap());
    assert_eq!((b.id, b.key()), (10, None));
}

#[test]
fn test_remote_urls() {
    let cids = (1..11).map(|i| format!("cid{}", i)).collect::<Vec<_>>();
    let remote = RemoteTable::new("http://{cid}.gateway.test", cids, DEFAULT_FETCH_TIMEOUT);

    let b = Bucket::for_pin(Pin::new(4163).unwrap());
    assert_eq!(remote.url_for(&b).unwrap(), "http://cid4.gateway.test/4163");

    let b = Bucket::for_pin(Pin::new(10000).unwrap());
    assert_eq!(remote.url_for(&b).unwrap(), "http://cid10.gateway.test/");
}

#[test]
fn test_remote_unknown_bucket() {
    let remote = RemoteTable::new("http://127.0.0.1:8080/ipfs/{cid}/",
                                  vec!["only".to_string()], DEFAULT_FETCH_TIMEOUT);
    let b = Bucket::for_pin(Pin::new(1500).unwrap());
    assert_eq!(remote.url_for(&b).unwrap(), "http://127.0.0.1:8080/ipfs/only/1500");

    let b = Bucket::for_pin(Pin::new(2500).unwrap());
    match remote.url_for(&b) {
        Err(FetchError::UnknownBucket { bucket }) => assert_eq!(bucket, 2),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_local_table_reads_bucket_file() {
    let root = scratch_dir("local");
    std::fs::create_dir_all(root.join("4")).unwrap();
    std::fs::write(root.join("4").join("4163"), &[0x00_u8, 0x04, 0x09, 0x3b]).unwrap();

    let local = LocalTable::new(&root);
    let b = Bucket::for_pin(Pin::new(4163).unwrap());
    assert_eq!(local.fetch(&b).unwrap(), vec![0x00, 0x04, 0x09, 0x3b]);

    let missing = Bucket::for_pin(Pin::new(4164).unwrap());
    match local.fetch(&missing) {
        Err(FetchError::Io { path, .. }) => assert!(path.ends_with("4/4164")),
        other => panic!("unexpected {:?}", other),
    }

    let boxed: Box<dyn TableSource> = Box::new(local);
    assert_eq!(boxed.fetch(&b).unwrap().len(), 4);

    std::fs::remove_dir_all(&root).unwrap();
}
