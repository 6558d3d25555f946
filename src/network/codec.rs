//! Wire Codec
//!
//! Newline-delimited JSON framing. Each frame is one UTF-8 JSON object
//! followed by `\n`; the reader enforces a byte cap per frame so a peer
//! can never grow the buffer without bound. A frame that is not valid
//! JSON terminates the session; valid JSON that is not a known message
//! (unknown action, unusable fields) is silently ignored by the caller.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::network::protocol::{ClientMessage, ServerMessage};

/// Default per-frame cap in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024;

/// Codec errors. All of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame grew past the configured cap before its newline.
    #[error("frame exceeds {limit} bytes")]
    Oversize {
        /// The configured cap.
        limit: usize,
    },

    /// Frame bytes are not UTF-8.
    #[error("frame is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Frame is not a JSON object at all.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read one frame. `Ok(None)` means the peer closed the connection
/// (including mid-frame, which is treated as a disconnect).
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Option<String>, CodecError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line: Vec<u8> = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(None);
        }

        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&buf[..pos]);
                reader.consume(pos + 1);
                if line.len() > max_bytes {
                    return Err(CodecError::Oversize { limit: max_bytes });
                }
                break;
            }
            None => {
                line.extend_from_slice(buf);
                let consumed = buf.len();
                reader.consume(consumed);
                if line.len() > max_bytes {
                    return Err(CodecError::Oversize { limit: max_bytes });
                }
            }
        }
    }

    Ok(Some(String::from_utf8(line)?))
}

/// Decode a frame into a client message.
///
/// `Ok(None)` means the frame was well-formed JSON but not a message this
/// server understands; such frames are dropped without ending the session.
pub fn decode(line: &str) -> Result<Option<ClientMessage>, CodecError> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    Ok(serde_json::from_value(value).ok())
}

/// Encode and send one server message followed by the frame delimiter.
pub async fn write_frame<W>(writer: &mut W, msg: &ServerMessage) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut text = serde_json::to_string(msg)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
