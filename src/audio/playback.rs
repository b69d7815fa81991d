use crate::content::{ContentUnit, Part};
use crate::lifecycle::LifecycleFlags;

use super::device::{ActivePlayback, AudioFormat, AudioHost};
use super::error::AudioError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub units: u64,
    /// Units that carried at least one non-empty audio payload.
    pub units_with_audio: u64,
    pub writes: u64,
    pub bytes: u64,
    pub empty_payloads: u64,
    pub text_parts: u64,
}

/// Sets the conversation-ended flag when dropped, however the loop exits.
struct EndedGuard<'a>(&'a LifecycleFlags);

impl Drop for EndedGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_ended();
    }
}

/// Plays the audio parts of backend output on the speaker.
#[derive(Debug, Clone, Default)]
pub struct PlaybackConsumer {
    format: AudioFormat,
}

impl PlaybackConsumer {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    /// Open the output line and play `inbound` until it ends or `flags` stops.
    ///
    /// If the line cannot be opened nothing is pulled from `inbound`. The
    /// conversation-ended flag is set on return in every case, after the
    /// line has been drained, stopped and closed.
    pub fn run<I>(
        &self,
        host: &dyn AudioHost,
        inbound: I,
        flags: &LifecycleFlags,
    ) -> Result<PlaybackStats, AudioError>
    where
        I: IntoIterator<Item = ContentUnit>,
    {
        let _ended = EndedGuard(flags);

        let line = host.open_playback(&self.format)?;
        log::info!(
            "Speaker initialized ({} Hz, {} ch).",
            self.format.sample_rate,
            self.format.channels
        );
        self.playback_loop(ActivePlayback::new(line), inbound, flags)
    }

    /// Play from an already running line. The line is shut down before return.
    pub fn playback_loop<I>(
        &self,
        mut line: ActivePlayback,
        inbound: I,
        flags: &LifecycleFlags,
    ) -> Result<PlaybackStats, AudioError>
    where
        I: IntoIterator<Item = ContentUnit>,
    {
        let mut stats = PlaybackStats::default();

        let result = 'units: {
            for unit in inbound {
                if !flags.is_running() {
                    log::info!("Conversation stopped, leaving playback loop");
                    break;
                }
                stats.units += 1;

                if inspect_unit(&unit, &mut stats) {
                    stats.units_with_audio += 1;
                }

                for part in &unit.parts {
                    let Part::InlineData { mime_type, data } = part else {
                        continue;
                    };
                    if data.is_empty() {
                        continue;
                    }

                    log::info!("Playing audio ({}): {} bytes", mime_type, data.len());
                    match line.write(data) {
                        Ok(written) => {
                            if written < data.len() {
                                log::warn!(
                                    "Short write: {} of {} bytes played",
                                    written,
                                    data.len()
                                );
                            }
                            stats.writes += 1;
                            stats.bytes += written as u64;
                        }
                        Err(e) => break 'units Err(e),
                    }
                }
            }
            Ok(())
        };

        line.shutdown();
        log::info!(
            "Playback stopped: {} units, {} writes, {} bytes played",
            stats.units,
            stats.writes,
            stats.bytes
        );
        result.map(|()| stats)
    }
}

/// Log what a unit carries. Returns true if any part holds non-empty audio.
fn inspect_unit(unit: &ContentUnit, stats: &mut PlaybackStats) -> bool {
    let mut audio_received = false;
    for part in &unit.parts {
        match part {
            Part::Text(text) => {
                stats.text_parts += 1;
                log::debug!("    Text: {}", text);
            }
            Part::InlineData { mime_type, data } if data.is_empty() => {
                stats.empty_payloads += 1;
                log::info!("    Audio ({}): received empty audio data.", mime_type);
            }
            Part::InlineData { mime_type, data } => {
                audio_received = true;
                log::info!("    Audio ({}): received {} bytes.", mime_type, data.len());
            }
        }
    }
    audio_received
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{LineCall, MockHost, RecordingPlayback};

    #[test]
    fn test_text_then_audio_scenario() {
        let line = RecordingPlayback::new();
        let written = line.written();
        let host = MockHost::new().with_playback(line);
        let flags = LifecycleFlags::new();

        let units = vec![ContentUnit::text("hello"), ContentUnit::audio(vec![0u8; 100])];
        let stats = PlaybackConsumer::default().run(&host, units, &flags).unwrap();

        assert_eq!(*written.lock().unwrap(), vec![vec![0u8; 100]]);
        assert_eq!(stats.units, 2);
        assert_eq!(stats.units_with_audio, 1);
        assert_eq!(stats.text_parts, 1);
        assert!(flags.is_ended());
    }

    #[test]
    fn test_parts_written_in_order_and_empty_skipped() {
        let line = RecordingPlayback::new();
        let written = line.written();
        let calls = line.calls();
        let host = MockHost::new().with_playback(line);
        let flags = LifecycleFlags::new();

        let units = vec![
            ContentUnit::new(vec![
                Part::audio(vec![1u8; 4]),
                Part::text("between"),
                Part::audio(Vec::<u8>::new()),
                Part::inline("audio/pcm;rate=24000", vec![2u8; 6]),
            ]),
            ContentUnit::default(),
            ContentUnit::audio(vec![3u8; 2]),
        ];
        let stats = PlaybackConsumer::default().run(&host, units, &flags).unwrap();

        assert_eq!(
            *written.lock().unwrap(),
            vec![vec![1u8; 4], vec![2u8; 6], vec![3u8; 2]]
        );
        assert_eq!(stats.empty_payloads, 1);
        assert_eq!(stats.bytes, 12);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LineCall::Write(4),
                LineCall::Write(6),
                LineCall::Write(2),
                LineCall::Drain,
                LineCall::Stop,
                LineCall::Close
            ]
        );
    }

    #[test]
    fn test_write_failure_still_cleans_up() {
        let line = RecordingPlayback::new().fail_write_at(2);
        let calls = line.calls();
        let host = MockHost::new().with_playback(line);
        let flags = LifecycleFlags::new();

        let mut units = vec![
            ContentUnit::audio(vec![1u8; 8]),
            ContentUnit::audio(vec![2u8; 8]),
            ContentUnit::audio(vec![3u8; 8]),
        ]
        .into_iter();
        let err = PlaybackConsumer::default()
            .run(&host, units.by_ref(), &flags)
            .unwrap_err();

        assert!(matches!(err, AudioError::DeviceAccess { .. }));
        assert_eq!(units.len(), 1);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LineCall::Write(8),
                LineCall::Drain,
                LineCall::Stop,
                LineCall::Close
            ]
        );
        assert!(flags.is_ended());
    }

    #[test]
    fn test_unavailable_line_consumes_nothing() {
        let flags = LifecycleFlags::new();
        let mut units = vec![ContentUnit::audio(vec![1u8; 8])].into_iter();

        let err = PlaybackConsumer::default()
            .run(&MockHost::new(), units.by_ref(), &flags)
            .unwrap_err();

        assert!(matches!(err, AudioError::DeviceUnavailable { .. }));
        assert_eq!(units.len(), 1);
        assert!(flags.is_ended());
    }

    #[test]
    fn test_cleared_flag_stops_before_processing() {
        let line = RecordingPlayback::new();
        let written = line.written();
        let host = MockHost::new().with_playback(line);
        let flags = LifecycleFlags::new();
        flags.stop();

        let mut units = vec![
            ContentUnit::audio(vec![1u8; 8]),
            ContentUnit::audio(vec![2u8; 8]),
        ]
        .into_iter();
        let stats = PlaybackConsumer::default()
            .run(&host, units.by_ref(), &flags)
            .unwrap();

        assert_eq!(stats.units, 0);
        assert!(written.lock().unwrap().is_empty());
        assert_eq!(units.len(), 1);
        assert!(flags.is_ended());
    }
}
