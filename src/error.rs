/*
    fluxrecover

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/error.rs

    Error taxonomy for the flux-reconstruction core. Per-candidate rejection
    (pattern miss, CRC mismatch) is never represented here - those outcomes
    are silent and expressed as `None`/empty iterators. `FluxError` is only
    for conditions that abort processing of a stream or a cache.
*/

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluxError {
    #[error("An IO error occurred reading or writing a stream or cache file")]
    IoError(String),

    #[error("Filename '{0}' does not match the KryoFlux stream naming convention")]
    NotAFluxStream(String),

    #[error("Stream is malformed at byte offset {offset}: {reason}")]
    StreamMalformed { offset: u64, reason: String },

    #[error("Cache line {line} could not be parsed: {text}")]
    CacheCorruption { line: usize, text: String },

    #[error("The disk image was corrupt or incomplete")]
    ImageCorrupt,

    #[error("An invalid parameter was supplied: {0}")]
    ParameterError(String),
}

impl From<std::io::Error> for FluxError {
    fn from(err: std::io::Error) -> Self {
        FluxError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for FluxError {
    fn from(err: binrw::Error) -> Self {
        FluxError::IoError(err.to_string())
    }
}
