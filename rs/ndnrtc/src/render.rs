//! The boundary between playout and whatever shows or plays the media.

use bytes::{Bytes, BytesMut};

use crate::{Error, Frame, Result};

/// Receives encoded video frames in playback order.
pub trait VideoSink: Send {
	fn process_frame(&mut self, frame: &Frame) -> Result<()>;
}

/// Receives encoded audio samples in playback order.
pub trait AudioSink: Send {
	fn process_sample(&mut self, sample: &Frame) -> Result<()>;
}

/// A decoded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
	pub width: u32,
	pub height: u32,
	pub data: Bytes,
}

/// Turns encoded frames into pictures.
pub trait FrameDecoder: Send {
	/// Returns `None` while the decoder has no picture to show yet.
	fn decode(&mut self, frame: &Frame) -> anyhow::Result<Option<Image>>;
}

/// An application surface that displays pictures.
pub trait ExternalRenderer: Send {
	/// A buffer for a picture of the given size, owned by the renderer.
	fn get_frame_buffer(&mut self, width: u32, height: u32) -> BytesMut;

	/// Show the picture held in `buffer`, previously obtained from [Self::get_frame_buffer].
	fn render_frame(&mut self, timestamp: u64, width: u32, height: u32, buffer: BytesMut);
}

/// Decodes frames and hands the pictures to a renderer.
pub struct RendererSink<D, R> {
	decoder: D,
	renderer: R,
}

impl<D: FrameDecoder, R: ExternalRenderer> RendererSink<D, R> {
	pub fn new(decoder: D, renderer: R) -> Self {
		Self { decoder, renderer }
	}

	pub fn renderer(&self) -> &R {
		&self.renderer
	}
}

impl<D: FrameDecoder, R: ExternalRenderer> VideoSink for RendererSink<D, R> {
	fn process_frame(&mut self, frame: &Frame) -> Result<()> {
		let image = self
			.decoder
			.decode(frame)
			.map_err(|err| Error::Codec(std::sync::Arc::new(err)))?;

		let Some(image) = image else {
			tracing::trace!(playback_no = frame.playback_no, "decoder buffering");
			return Ok(());
		};

		let mut buffer = self.renderer.get_frame_buffer(image.width, image.height);
		buffer.clear();
		buffer.extend_from_slice(&image.data);

		self.renderer
			.render_frame(frame.timestamp, image.width, image.height, buffer);

		Ok(())
	}
}
