//! Frame file persistence.
//!
//! A frame file is a bare sequence of `{len: u16 LE}{body: len bytes}`
//! records. There is no header, footer, or count; end of file terminates.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use falabot_core::{FalaError, Frame, FrameBuffer, Result, MAX_FRAME_LEN};

/// Append one record to an in-memory frame file.
///
/// Bodies longer than the length prefix can describe are rejected rather
/// than truncated.
pub fn append_record(out: &mut Vec<u8>, body: &[u8]) -> Result<()> {
    if body.len() > MAX_FRAME_LEN {
        return Err(FalaError::Encode(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_LEN} byte limit",
            body.len()
        )));
    }
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    Ok(())
}

/// Lay out a frame sequence in frame file format.
pub fn encode_frames<'a, I>(frames: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Frame>,
{
    let mut out = Vec::new();
    for frame in frames {
        append_record(&mut out, frame.as_bytes())?;
    }
    Ok(out)
}

/// File-backed frame persistence.
#[derive(Debug, Clone)]
pub struct FrameStore {
    path: PathBuf,
}

impl FrameStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy an already frame-formatted stream verbatim into the file,
    /// truncating any previous contents. Returns the bytes written.
    pub async fn write<R>(&self, source: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = File::create(&self.path).await?;
        let written = tokio::io::copy(source, &mut file).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), bytes = written, "Frame file written");
        Ok(written)
    }

    /// Append every frame in the file to `buffer`, returning how many were read.
    ///
    /// End of file at a record boundary, including a dangling partial length
    /// prefix, ends the read cleanly. A body shorter than its prefix declares
    /// is an I/O error and nothing from that record is appended.
    pub async fn read(&self, buffer: &mut FrameBuffer) -> Result<usize> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FalaError::NotFound(format!(
                    "frame file {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);

        let mut count = 0;
        while let Some(len) = read_prefix(&mut reader).await? {
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body).await?;
            buffer.push(Frame::new(body));
            count += 1;
        }

        info!(path = %self.path.display(), frames = count, "Frame file loaded");
        Ok(count)
    }
}

/// Read a record length prefix. `None` means end of input before a full
/// prefix was available.
async fn read_prefix<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<u16>> {
    let mut prefix = [0u8; 2];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]).await {
            Ok(0) => {
                if filled > 0 {
                    debug!("Ignoring dangling partial length prefix");
                }
                return Ok(None);
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(u16::from_le_bytes(prefix)))
}
