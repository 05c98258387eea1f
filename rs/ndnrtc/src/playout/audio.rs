use crate::{AudioSink, BufferSlot, Indicator, PlaybackEvent, PlayoutEvent, SampleProcessor, SlotState, Statistics};

/// Plays audio samples. Every sample decodes on its own, so only incomplete ones are skipped.
pub struct AudioProcessor {
	sink: Box<dyn AudioSink>,
	stats: Statistics,
}

impl AudioProcessor {
	pub fn new(sink: Box<dyn AudioSink>, stats: Statistics) -> Self {
		Self { sink, stats }
	}
}

impl SampleProcessor for AudioProcessor {
	fn process_sample(&mut self, slot: &BufferSlot) -> Vec<PlayoutEvent> {
		let playback_no = slot.playback_no();
		let seq_no = slot.seq_no();

		if slot.state() == SlotState::Incomplete {
			self.stats.increment(Indicator::SkippedNum);
			self.stats.increment(Indicator::SkippedIncompleteNum);

			return vec![PlayoutEvent::FrameSkipped {
				playback_no,
				seq_no,
				key: false,
				reason: PlaybackEvent::DeltaSkipIncomplete,
			}];
		}

		let Some(sample) = slot.frame() else {
			return vec![PlayoutEvent::RecoveryFailure { seq_no, key: false }];
		};

		if let Err(err) = self.sink.process_sample(&sample) {
			tracing::error!(playback_no, ?err, "audio sink failed");
			return vec![PlayoutEvent::Failure(err)];
		}

		self.stats.increment(Indicator::PlayedNum);
		self.stats.set(Indicator::LastPlayedNo, playback_no as f64);
		self.stats.set(Indicator::LastPlayedDeltaNo, seq_no as f64);

		vec![PlayoutEvent::FrameProcessed {
			playback_no,
			seq_no,
			key: false,
		}]
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use parking_lot::Mutex;

	use super::*;
	use crate::{Frame, Result, testing::Producer};

	#[derive(Clone, Default)]
	struct Speaker {
		samples: Arc<Mutex<Vec<Frame>>>,
	}

	impl AudioSink for Speaker {
		fn process_sample(&mut self, sample: &Frame) -> Result<()> {
			self.samples.lock().push(sample.clone());
			Ok(())
		}
	}

	#[test]
	fn test_audio() {
		let speaker = Speaker::default();
		let stats = Statistics::new();
		let mut processor = AudioProcessor::new(Box::new(speaker.clone()), stats.clone());
		let mut producer = Producer::audio();

		let sample = producer.next(80);
		let played = sample.payload.clone();
		let mut slot = BufferSlot::default();
		for segment in sample.segments() {
			slot.add(&segment);
		}
		let events = processor.process_sample(&slot);
		assert!(matches!(events[..], [PlayoutEvent::FrameProcessed { key: false, .. }]));

		let sample = producer.next(180);
		let mut slot = BufferSlot::default();
		slot.add(&sample.data_segment(1));
		slot.finalize();
		let events = processor.process_sample(&slot);
		assert!(matches!(
			events[..],
			[PlayoutEvent::FrameSkipped {
				reason: PlaybackEvent::DeltaSkipIncomplete,
				..
			}]
		));

		let samples = speaker.samples.lock();
		assert_eq!(samples.len(), 1);
		assert_eq!(samples[0].payload.as_ref(), played.as_slice());
		assert_eq!(stats.get(Indicator::PlayedNum), 1.);
		assert_eq!(stats.get(Indicator::SkippedIncompleteNum), 1.);
	}
}
