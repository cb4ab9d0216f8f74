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
*/

//! # fluxrecover
//!
//! fluxrecover reconstructs floppy-disk sector contents from raw flux-timing
//! captures (KryoFlux stream files). It turns per-track flux intervals into
//! a three-symbol cell string via adaptive clock recovery, recognizes
//! sectors against a catalog of historical FM/MFM/M2FM formats, and
//! aggregates multiple readings of the same physical sector into a single
//! majority-vote payload per [`chs::PhysicalChs`].
//!
//! The usual flow is: parse a [`stream::Stream`] from a `.raw` file, hand it
//! to a [`format::Registry`] built from [`format::Registry::catalog`], and
//! read back results from the [`media::Media`] the registry was filling in.
//! [`cache`] and [`image`] cover persisting readings between runs and
//! emitting the final disk image once a medium is complete.

pub mod cache;
pub mod cellstring;
pub mod chs;
pub mod chsset;
pub mod clock;
pub mod crc;
pub mod error;
pub mod format;
pub mod image;
pub mod media;
pub mod pattern;
pub mod sector;
pub mod stream;

pub use crate::chs::PhysicalChs;
pub use crate::error::FluxError;
pub use crate::media::Media;
pub use crate::sector::ReadSector;
pub use crate::stream::Stream;
