//! Pixel-data helpers shared by the FFmpeg decoder.

use ffmpeg_next::frame::Video as VideoFrame;

/// Copy plane 0 of an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg pads each row to its line size; the returned buffer has exactly
/// `width * bytes_per_pixel` bytes per row.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        return data[..row_length * (height as usize)].to_vec();
    }

    let mut buffer = Vec::with_capacity(row_length * (height as usize));
    for row in data.chunks(stride).take(height as usize) {
        buffer.extend_from_slice(&row[..row_length]);
    }
    buffer
}
