// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Optional gzip decompression (§4.4 Finalization step 2).

use crate::error::TransactResult;

#[cfg(feature = "gzip")]
pub fn decompress(body: &[u8]) -> Result<Vec<u8>, TransactResult> {
    use std::io::Read;

    use flate2::read::GzDecoder;

    let mut decoder = GzDecoder::new(body);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| TransactResult::IoError)?;
    Ok(out)
}

#[cfg(not(feature = "gzip"))]
pub fn decompress(_body: &[u8]) -> Result<Vec<u8>, TransactResult> {
    Err(TransactResult::InternalError)
}

#[cfg(all(test, feature = "gzip"))]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_flate2_encoder() {
        use std::io::Write;

        use flate2::{write::GzEncoder, Compression};

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello gzip").expect("write");
        let compressed = encoder.finish().expect("finish");

        let decompressed = decompress(&compressed).expect("decompress");
        assert_eq!(decompressed, b"hello gzip");
    }
}
