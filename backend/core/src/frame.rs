//! Encoded audio frames and the ordered buffer playback drains.

/// Largest frame body the 2-byte length prefix can describe.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// One unit of encoded audio, carried as an owned byte copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame(Vec<u8>);

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the body fits the persisted length prefix.
    pub fn is_representable(&self) -> bool {
        self.0.len() <= MAX_FRAME_LEN
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl From<&[u8]> for Frame {
    fn from(data: &[u8]) -> Self {
        Self(data.to_vec())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ordered frame sequence filled by the frame store and iterated by playback.
///
/// Playback never removes frames; the owner clears the buffer before each
/// reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    frames: Vec<Frame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Total encoded bytes held.
    pub fn byte_len(&self) -> usize {
        self.frames.iter().map(Frame::len).sum()
    }
}

impl<'a> IntoIterator for &'a FrameBuffer {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl FromIterator<Frame> for FrameBuffer {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}
