//! Forwarding of a child's piped stdout/stderr to the parent's streams.
//!
//! Each stream gets a reader thread that reads fixed-size chunks into an
//! unbounded queue and a writer thread that drains it. Writers share one
//! burst lock: the writer that starts a burst keeps the lock while it sees
//! full chunks and gives it up on the first short chunk or at end of file,
//! so bursts from the two streams never interleave. Readers never touch the
//! lock, so the child never blocks on a pipe while the other stream's burst
//! is being written.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

pub const CHUNK_SIZE: usize = 4096;

pub struct Relay {
    workers: Vec<JoinHandle<io::Result<()>>>,
}

impl Relay {
    pub fn spawn<O, E, OW, EW>(stdout: O, stderr: E, out_sink: OW, err_sink: EW) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
        OW: Write + Send + 'static,
        EW: Write + Send + 'static,
    {
        Self::with_chunk_size(CHUNK_SIZE, stdout, stderr, out_sink, err_sink)
    }

    pub fn with_chunk_size<O, E, OW, EW>(
        chunk_size: usize,
        stdout: O,
        stderr: E,
        out_sink: OW,
        err_sink: EW,
    ) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
        OW: Write + Send + 'static,
        EW: Write + Send + 'static,
    {
        let chunk_size = chunk_size.max(1);
        let burst = Arc::new(Mutex::new(()));
        let mut workers = Vec::with_capacity(4);

        let (tx, rx) = mpsc::channel();
        workers.push(thread::spawn(move || pump(stdout, tx, chunk_size)));
        let lock = burst.clone();
        workers.push(thread::spawn(move || drain(rx, out_sink, lock, chunk_size)));

        let (tx, rx) = mpsc::channel();
        workers.push(thread::spawn(move || pump(stderr, tx, chunk_size)));
        workers.push(thread::spawn(move || drain(rx, err_sink, burst, chunk_size)));

        Self { workers }
    }

    /// Wait for both streams to reach end of file and flush the sinks.
    pub fn finish(self) -> io::Result<()> {
        let mut result = Ok(());
        for worker in self.workers {
            let outcome = worker
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("relay worker panicked")));
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }
}

fn pump<R: Read>(mut reader: R, tx: Sender<Vec<u8>>, chunk_size: usize) -> io::Result<()> {
    loop {
        let mut chunk = vec![0u8; chunk_size];
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        chunk.truncate(n);
        if tx.send(chunk).is_err() {
            return Ok(());
        }
    }
}

fn drain<W: Write>(
    rx: Receiver<Vec<u8>>,
    mut sink: W,
    burst: Arc<Mutex<()>>,
    chunk_size: usize,
) -> io::Result<()> {
    while let Ok(first) = rx.recv() {
        let _guard = burst.lock().unwrap_or_else(PoisonError::into_inner);
        let mut chunk = first;
        loop {
            sink.write_all(&chunk)?;
            if chunk.len() < chunk_size {
                break;
            }
            chunk = match rx.recv() {
                Ok(next) => next,
                Err(_) => break,
            };
        }
        sink.flush()?;
    }
    sink.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::time::Duration;

    /// Shared sink standing in for a terminal both streams write to.
    #[derive(Clone, Default)]
    struct Terminal(Arc<Mutex<Vec<u8>>>);

    impl Write for Terminal {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    /// Reader that returns scripted reads, each after its own pause.
    struct Scripted {
        reads: VecDeque<(Duration, Vec<u8>)>,
    }

    impl Scripted {
        fn steady(pause: Duration, reads: VecDeque<Vec<u8>>) -> Self {
            Self {
                reads: reads.into_iter().map(|data| (pause, data)).collect(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some((pause, data)) => {
                    thread::sleep(pause);
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => Ok(0),
            }
        }
    }

    fn bursts(byte: u8, chunk: usize, full_chunks: usize, count: usize) -> VecDeque<Vec<u8>> {
        let mut reads = VecDeque::new();
        for _ in 0..count {
            for _ in 0..full_chunks {
                reads.push_back(vec![byte; chunk]);
            }
            reads.push_back(vec![byte; chunk / 2]);
        }
        reads
    }

    /// Lengths of the runs of identical bytes.
    fn runs(data: &[u8]) -> Vec<(u8, usize)> {
        let mut runs: Vec<(u8, usize)> = Vec::new();
        for &b in data {
            match runs.last_mut() {
                Some((last, len)) if *last == b => *len += 1,
                _ => runs.push((b, 1)),
            }
        }
        runs
    }

    #[test]
    fn test_forwards_both_streams() {
        let out = Terminal::default();
        let err = Terminal::default();
        let relay = Relay::spawn(
            Cursor::new(b"hello stdout".to_vec()),
            Cursor::new(b"hello stderr".to_vec()),
            out.clone(),
            err.clone(),
        );
        relay.finish().unwrap();

        assert_eq!(out.0.lock().unwrap().as_slice(), b"hello stdout");
        assert_eq!(err.0.lock().unwrap().as_slice(), b"hello stderr");
    }

    #[test]
    fn test_large_output_is_complete() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let out = Terminal::default();
        let relay = Relay::spawn(Cursor::new(data.clone()), io::empty(), out.clone(), io::sink());
        relay.finish().unwrap();

        assert_eq!(*out.0.lock().unwrap(), data);
    }

    #[test]
    fn test_bursts_do_not_interleave() {
        const CHUNK: usize = 64;
        let terminal = Terminal::default();
        let stdout = Scripted::steady(Duration::from_millis(1), bursts(b'o', CHUNK, 3, 10));
        let stderr = Scripted::steady(Duration::from_millis(1), bursts(b'e', CHUNK, 3, 10));

        let relay = Relay::with_chunk_size(CHUNK, stdout, stderr, terminal.clone(), terminal.clone());
        relay.finish().unwrap();

        let data = terminal.0.lock().unwrap().clone();
        let burst_len = CHUNK * 3 + CHUNK / 2;
        assert_eq!(data.len(), burst_len * 20);
        for (byte, len) in runs(&data) {
            assert_eq!(len % burst_len, 0, "burst of {} split: run of {len}", byte as char);
        }
    }

    #[test]
    fn test_slow_burst_is_not_split() {
        let terminal = Terminal::default();
        let stdout = Scripted {
            reads: VecDeque::from([
                (Duration::ZERO, vec![b'o'; 8]),
                (Duration::from_millis(150), vec![b'o'; 8]),
                (Duration::ZERO, vec![b'o'; 2]),
            ]),
        };
        let stderr = Scripted {
            reads: VecDeque::from([(Duration::from_millis(60), vec![b'e'; 3])]),
        };

        let relay = Relay::with_chunk_size(8, stdout, stderr, terminal.clone(), terminal.clone());
        relay.finish().unwrap();

        let data = terminal.0.lock().unwrap().clone();
        assert_eq!(String::from_utf8(data).unwrap(), format!("{}eee", "o".repeat(18)));
    }

    #[test]
    fn test_burst_ended_by_eof_releases_lock() {
        let terminal = Terminal::default();
        let stdout = Scripted {
            reads: VecDeque::from([(Duration::ZERO, vec![b'o'; 8])]),
        };
        let stderr = Scripted {
            reads: VecDeque::from([(Duration::from_millis(30), vec![b'e'; 3])]),
        };

        let relay = Relay::with_chunk_size(8, stdout, stderr, terminal.clone(), terminal.clone());
        relay.finish().unwrap();

        assert_eq!(terminal.0.lock().unwrap().as_slice(), b"ooooooooeee");
    }

    #[test]
    fn test_read_error_is_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> { Err(io::Error::other("pipe broke")) }
        }

        let relay = Relay::spawn(Broken, io::empty(), io::sink(), io::sink());
        assert!(relay.finish().is_err());
    }
}
