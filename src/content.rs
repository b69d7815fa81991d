//! Units exchanged with the conversational backend.

use bytes::Bytes;

use crate::audio::PCM_MIME_TYPE;

/// A captured block of raw PCM, tagged with its media type.
///
/// Immutable once built. The payload is reference counted, so handing a
/// chunk to the outbound queue never copies the audio again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    data: Bytes,
    mime_type: String,
}

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Copy `samples` into a new `audio/pcm` chunk.
    pub fn pcm(samples: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(samples), PCM_MIME_TYPE)
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Empty chunks are legal but carry nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// One piece of a [`ContentUnit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Bytes },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self::inline(PCM_MIME_TYPE, data)
    }
}

impl From<AudioChunk> for Part {
    fn from(chunk: AudioChunk) -> Self {
        Part::InlineData {
            mime_type: chunk.mime_type,
            data: chunk.data,
        }
    }
}

/// A unit of backend output. May carry no parts at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentUnit {
    pub parts: Vec<Part>,
}

impl ContentUnit {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Part::text(text)])
    }

    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self::new(vec![Part::audio(data)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_chunk_copies_prefix() {
        let buffer = [7u8; 16];
        let chunk = AudioChunk::pcm(&buffer[..5]);
        assert_eq!(chunk.len(), 5);
        assert_eq!(chunk.mime_type(), "audio/pcm");
        assert_eq!(chunk.data().as_ref(), &[7u8; 5]);
    }

    #[test]
    fn test_empty_chunk_is_valid() {
        let chunk = AudioChunk::pcm(&[]);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_chunk_into_part() {
        let part: Part = AudioChunk::pcm(&[1, 2]).into();
        assert_eq!(part, Part::audio(vec![1u8, 2]));
    }
}
