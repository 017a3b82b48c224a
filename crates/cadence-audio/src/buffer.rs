//! Decoded audio buffers and the reference-counted store that owns them.
//!
//! Buffers are keyed by the name they were loaded under. Loading a name that
//! is already resident only bumps its use count; the decoded samples are
//! dropped from the store when the count returns to zero. Channels hold an
//! `Arc` to the samples, so a buffer still playing on the rodio device stays
//! alive until its sink lets go of it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cadence_common::{AudioError, AudioResult};
use rodio::{Decoder, Source};
use tracing::{debug, info};

/// Fully decoded audio data.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Name the buffer was registered under.
    pub name: String,
    /// Interleaved f32 samples.
    pub samples: Arc<Vec<f32>>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Playback length at pitch 1.0.
    pub duration: Duration,
    /// File the samples were decoded from, if any.
    pub source_path: Option<PathBuf>,
}

impl AudioBuffer {
    /// Create a buffer from interleaved samples.
    #[must_use]
    pub fn new(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            frames as f64 / sample_rate as f64
        };

        Self {
            name: name.into(),
            samples: Arc::new(samples),
            sample_rate,
            channels,
            duration: Duration::from_secs_f64(duration_secs),
            source_path: None,
        }
    }

    /// Attach the file path the buffer came from.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Size of the sample data in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Number of sample frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Only single-channel buffers can be positioned in 3D.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        self.channels == 1
    }
}

#[derive(Debug)]
struct BufferEntry {
    buffer: Arc<AudioBuffer>,
    use_count: u32,
    loop_default: bool,
}

/// Reference-counted buffer store.
#[derive(Debug, Default)]
pub struct BufferStore {
    entries: HashMap<String, BufferEntry>,
    search_paths: Vec<PathBuf>,
    total_bytes: usize,
}

impl BufferStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        debug!("Created audio buffer store");
        Self::default()
    }

    /// Replace the directories searched for relative file names.
    pub fn set_search_paths(&mut self, paths: Vec<PathBuf>) {
        self.search_paths = paths;
    }

    /// Directories searched for relative file names.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Load a file, or take another reference if it is already resident.
    ///
    /// `name` is tried as given first, then under each search path in order.
    pub fn load(&mut self, name: &str) -> AudioResult<Arc<AudioBuffer>> {
        if let Some(buffer) = self.acquire(name) {
            return Ok(buffer);
        }

        if name.is_empty() {
            return Err(AudioError::LoadFailed {
                path: PathBuf::new(),
                message: "empty file name".to_string(),
            });
        }

        let path = self.resolve(name).ok_or_else(|| AudioError::LoadFailed {
            path: PathBuf::from(name),
            message: "file not found in any search path".to_string(),
        })?;

        let file = File::open(&path).map_err(|e| AudioError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let buffer = decode(name, BufReader::new(file))
            .map_err(|e| AudioError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            })?
            .with_source_path(&path);

        info!(
            "Loaded sound '{}' ({} Hz, {} ch, {:.2}s)",
            name,
            buffer.sample_rate,
            buffer.channels,
            buffer.duration.as_secs_f32()
        );
        self.register(name, buffer)
    }

    /// Decode an in-memory file and register it under `name`.
    pub fn load_from_memory(&mut self, name: &str, data: Vec<u8>) -> AudioResult<Arc<AudioBuffer>> {
        if let Some(buffer) = self.acquire(name) {
            return Ok(buffer);
        }
        let buffer = decode(name, Cursor::new(data))?;
        debug!("Loaded sound '{}' from memory", name);
        self.register(name, buffer)
    }

    /// Register raw interleaved samples under `name`.
    pub fn insert(
        &mut self,
        name: &str,
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> AudioResult<Arc<AudioBuffer>> {
        if let Some(buffer) = self.acquire(name) {
            return Ok(buffer);
        }
        self.register(name, AudioBuffer::new(name, samples, sample_rate, channels))
    }

    /// Drop one reference to `name`, returning how many remain.
    ///
    /// The samples are released from the store when the count reaches zero.
    pub fn unload(&mut self, name: &str) -> AudioResult<u32> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| AudioError::BufferNotLoaded(name.to_string()))?;

        entry.use_count = entry.use_count.saturating_sub(1);
        let remaining = entry.use_count;

        if remaining == 0 {
            if let Some(entry) = self.entries.remove(name) {
                self.total_bytes -= entry.buffer.size_bytes();
            }
            debug!("Released sound '{}'", name);
        }
        Ok(remaining)
    }

    /// Current reference count of `name` (0 when not resident).
    #[must_use]
    pub fn use_count(&self, name: &str) -> u32 {
        self.entries.get(name).map_or(0, |e| e.use_count)
    }

    /// Look up a resident buffer without taking a reference.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<AudioBuffer>> {
        self.entries.get(name).map(|e| Arc::clone(&e.buffer))
    }

    /// Whether `name` is resident.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Mark a buffer as looping by default for sounds that bind it.
    pub fn set_loop_default(&mut self, name: &str, looping: bool) -> AudioResult<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| AudioError::BufferNotLoaded(name.to_string()))?;
        entry.loop_default = looping;
        Ok(())
    }

    /// Whether sounds binding `name` start out looping.
    #[must_use]
    pub fn loop_default(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.loop_default)
    }

    /// Number of resident buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of resident sample data in bytes.
    #[must_use]
    pub const fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    fn acquire(&mut self, name: &str) -> Option<Arc<AudioBuffer>> {
        let entry = self.entries.get_mut(name)?;
        entry.use_count += 1;
        Some(Arc::clone(&entry.buffer))
    }

    fn register(&mut self, name: &str, buffer: AudioBuffer) -> AudioResult<Arc<AudioBuffer>> {
        if buffer.samples.is_empty() {
            return Err(AudioError::BufferEmpty(name.to_string()));
        }

        let buffer = Arc::new(buffer);
        self.total_bytes += buffer.size_bytes();
        self.entries.insert(
            name.to_string(),
            BufferEntry {
                buffer: Arc::clone(&buffer),
                use_count: 1,
                loop_default: false,
            },
        );
        Ok(buffer)
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        if direct.is_absolute() {
            return None;
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

fn decode<R>(name: &str, reader: R) -> AudioResult<AudioBuffer>
where
    R: Read + Seek + Send + Sync + 'static,
{
    let decoder = Decoder::new(reader).map_err(|e| AudioError::DecodeFailed(e.to_string()))?;

    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    Ok(AudioBuffer::new(name, samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Minimal 16-bit PCM WAV file.
    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let block_align = channels * 2;
        let data_len = (frames * block_align as usize) as u32;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames * channels as usize {
            let sample = if i % 2 == 0 { 1000i16 } else { -1000i16 };
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new("tone", vec![0.0; 44100 * 2], 44100, 2);
        assert_eq!(buffer.frame_count(), 44100);
        assert!(buffer.duration >= Duration::from_millis(999));
        assert!(buffer.duration <= Duration::from_millis(1001));
        assert!(!buffer.is_spatial());
    }

    #[test]
    fn test_insert_shares_and_counts() {
        let mut store = BufferStore::new();
        let a = store.insert("beep", vec![0.0; 100], 44100, 1).expect("insert");
        let b = store.insert("beep", vec![1.0; 5], 22050, 2).expect("insert again");

        // The second insert only took a reference
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.sample_rate, 44100);
        assert_eq!(store.use_count("beep"), 2);
        assert_eq!(store.total_bytes(), 400);

        assert_eq!(store.unload("beep").expect("unload"), 1);
        assert!(store.contains("beep"));
        assert_eq!(store.unload("beep").expect("unload"), 0);
        assert!(!store.contains("beep"));
        assert_eq!(store.total_bytes(), 0);

        // Two loads allow exactly two unloads
        assert!(matches!(
            store.unload("beep"),
            Err(AudioError::BufferNotLoaded(name)) if name == "beep"
        ));
        assert_eq!(store.use_count("beep"), 0);
    }

    #[test]
    fn test_unload_unknown() {
        let mut store = BufferStore::new();
        assert!(matches!(
            store.unload("ghost.wav"),
            Err(AudioError::BufferNotLoaded(_))
        ));
    }

    #[test]
    fn test_empty_buffer_rejected() {
        let mut store = BufferStore::new();
        assert!(matches!(
            store.insert("silence", Vec::new(), 44100, 1),
            Err(AudioError::BufferEmpty(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let mut store = BufferStore::new();
        let err = store.load("definitely/not/here.wav");
        assert!(matches!(err, Err(AudioError::LoadFailed { .. })));
        assert_eq!(store.use_count("definitely/not/here.wav"), 0);

        assert!(matches!(store.load(""), Err(AudioError::LoadFailed { .. })));
    }

    #[test]
    fn test_load_wav_through_search_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = File::create(dir.path().join("click.wav")).expect("create");
        file.write_all(&wav_bytes(8000, 1, 800)).expect("write");
        drop(file);

        let mut store = BufferStore::new();
        store.set_search_paths(vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()]);

        let buffer = store.load("click.wav").expect("load");
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.sample_rate, 8000);
        assert_eq!(buffer.frame_count(), 800);
        assert!(buffer.source_path.is_some());

        // Second load hits the store
        store.load("click.wav").expect("reload");
        assert_eq!(store.use_count("click.wav"), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_from_memory() {
        let mut store = BufferStore::new();
        let buffer = store
            .load_from_memory("stereo", wav_bytes(22050, 2, 2205))
            .expect("decode");
        assert_eq!(buffer.channels, 2);
        assert!((buffer.duration.as_secs_f32() - 0.1).abs() < 1e-3);

        assert!(matches!(
            store.load_from_memory("junk", vec![1, 2, 3, 4]),
            Err(AudioError::DecodeFailed(_))
        ));
    }

    #[test]
    fn test_loop_default() {
        let mut store = BufferStore::new();
        store.insert("ambience", vec![0.0; 10], 44100, 1).expect("insert");
        assert!(!store.loop_default("ambience"));
        store.set_loop_default("ambience", true).expect("mark");
        assert!(store.loop_default("ambience"));
        assert!(store.set_loop_default("missing", true).is_err());
    }
}
