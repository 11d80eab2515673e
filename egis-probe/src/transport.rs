use std::time::Duration;

/// Exclusive send/receive access to one claimed device interface.
///
/// A read that sees no data before `timeout` elapses must report
/// `rusb::Error::Timeout`; every other error is a transport fault.
///
pub trait Transport {
    fn write(&mut self, data: &[u8], timeout: Duration) -> rusb::Result<usize>;
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        (**self).write(data, timeout)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        (**self).read(buf, timeout)
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned results and records what was asked of it.
    ///
    /// Reads beyond the script time out.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub writes: Vec<Vec<u8>>,
        pub write_results: VecDeque<rusb::Result<()>>,
        pub reads: VecDeque<rusb::Result<Vec<u8>>>,
        pub read_calls: usize,
        pub read_lengths: Vec<usize>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, data: &[u8]) -> Self {
            self.reads.push_back(Ok(data.to_vec()));
            self
        }

        pub fn fail_read(mut self, error: rusb::Error) -> Self {
            self.reads.push_back(Err(error));
            self
        }

        pub fn fail_write(mut self, error: rusb::Error) -> Self {
            self.write_results.push_back(Err(error));
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn write(&mut self, data: &[u8], _timeout: Duration) -> rusb::Result<usize> {
            self.writes.push(data.to_vec());
            match self.write_results.pop_front() {
                Some(Err(e)) => Err(e),
                _ => Ok(data.len()),
            }
        }

        fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> rusb::Result<usize> {
            self.read_calls += 1;
            self.read_lengths.push(buf.len());
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                },
                Some(Err(e)) => Err(e),
                None => Err(rusb::Error::Timeout),
            }
        }
    }
}
