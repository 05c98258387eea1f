use crate::{
	BufferSlot, Indicator, PlaybackEvent, PlayoutEvent, SampleProcessor, SlotState, Statistics, VideoSink,
};

// Whether delta frames of the current GOP can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gop {
	NoKey,
	Valid,
	Broken,
}

/// Plays video frames, skipping those that cannot be decoded.
///
/// Delta frames need every frame before them back to their key frame. Once one is lost
/// the rest of the GOP is skipped until the next key frame arrives.
pub struct VideoProcessor {
	sink: Box<dyn VideoSink>,
	stats: Statistics,
	gop: Gop,
	// The key frame that opened the current GOP.
	gop_key: Option<u64>,
	last_playback_no: Option<u64>,
}

impl VideoProcessor {
	pub fn new(sink: Box<dyn VideoSink>, stats: Statistics) -> Self {
		Self {
			sink,
			stats,
			gop: Gop::NoKey,
			gop_key: None,
			last_playback_no: None,
		}
	}

	fn skip(&self, slot: &BufferSlot, reason: PlaybackEvent) -> PlayoutEvent {
		let indicator = match reason {
			PlaybackEvent::DeltaSkipIncomplete | PlaybackEvent::KeySkipIncomplete => Indicator::SkippedIncompleteNum,
			PlaybackEvent::DeltaSkipNoKey => Indicator::SkippedNoKeyNum,
			PlaybackEvent::DeltaSkipInvalidGop => Indicator::SkippedBadGopNum,
		};

		self.stats.increment(Indicator::SkippedNum);
		self.stats.increment(indicator);

		tracing::debug!(playback_no = slot.playback_no(), seq_no = slot.seq_no(), ?reason, "skip");

		PlayoutEvent::FrameSkipped {
			playback_no: slot.playback_no(),
			seq_no: slot.seq_no(),
			key: slot.is_key(),
			reason,
		}
	}

	fn lose(&mut self, key: bool) {
		if key {
			self.gop = Gop::NoKey;
		} else if self.gop == Gop::Valid {
			self.gop = Gop::Broken;
		}
	}
}

impl SampleProcessor for VideoProcessor {
	fn process_sample(&mut self, slot: &BufferSlot) -> Vec<PlayoutEvent> {
		let playback_no = slot.playback_no();
		let seq_no = slot.seq_no();
		let key = slot.is_key();

		let gap = self.last_playback_no.is_some_and(|last| playback_no != last.saturating_add(1));
		self.last_playback_no = Some(playback_no);

		if !key && self.gop != Gop::NoKey {
			let paired = slot.header().map(|h| h.paired_seq_no);
			if paired != self.gop_key {
				// The key frame of this GOP never showed up.
				tracing::warn!(playback_no, ?paired, "missed key frame");
				self.gop = Gop::NoKey;
			} else if gap && self.gop == Gop::Valid {
				// A delta that never showed up breaks the chain too.
				tracing::warn!(playback_no, "gap in playback sequence");
				self.gop = Gop::Broken;
			}
		}

		if slot.state() == SlotState::Incomplete {
			self.lose(key);
			let reason = match key {
				true => PlaybackEvent::KeySkipIncomplete,
				false => PlaybackEvent::DeltaSkipIncomplete,
			};
			return vec![self.skip(slot, reason)];
		}

		let Some(frame) = slot.frame() else {
			tracing::warn!(playback_no, seq_no, "failed recovery");
			self.lose(key);
			return vec![PlayoutEvent::RecoveryFailure { seq_no, key }];
		};

		if key {
			self.gop = Gop::Valid;
			self.gop_key = Some(seq_no);
		} else {
			match self.gop {
				Gop::Valid => {}
				Gop::NoKey => return vec![self.skip(slot, PlaybackEvent::DeltaSkipNoKey)],
				Gop::Broken => return vec![self.skip(slot, PlaybackEvent::DeltaSkipInvalidGop)],
			}
		}

		if let Err(err) = self.sink.process_frame(&frame) {
			tracing::error!(playback_no, ?err, "video sink failed");
			self.lose(key);
			return vec![PlayoutEvent::Failure(err)];
		}

		self.stats
			.increment_class(Indicator::PlayedNum, Indicator::PlayedKeyNum, key);
		self.stats.set(Indicator::LastPlayedNo, playback_no as f64);
		match key {
			true => self.stats.set(Indicator::LastPlayedKeyNo, seq_no as f64),
			false => self.stats.set(Indicator::LastPlayedDeltaNo, seq_no as f64),
		}

		tracing::trace!(playback_no, seq_no, key, "played");

		vec![PlayoutEvent::FrameProcessed {
			playback_no,
			seq_no,
			key,
		}]
	}

	fn flush(&mut self) {
		self.gop = Gop::NoKey;
		self.gop_key = None;
		self.last_playback_no = None;
	}
}
