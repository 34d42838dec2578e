//! Compression envelope for stored objects

use bzip2::{read::BzDecoder, write::BzEncoder, Compression as BzCompression};
use flate2::{read::GzDecoder, Compression as GzCompression, GzBuilder};
use serde::Deserialize;
use std::fmt;
use std::io::{self, Read, Write};

/// A supported compression envelope
///
/// Every stored object is written at the highest level the format offers;
/// cached pages are written once and read rarely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Gzip single-member archive (.gz)
    #[default]
    Gzip,
    /// Bzip2 stream (.bz2)
    Bzip2,
}

impl Compression {
    /// File extension marking this envelope in object paths
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Compresses `input` into a single-entry archive named `entry_name`
    ///
    /// Bzip2 streams carry no entry name, so the name is only recorded for gzip.
    pub fn wrap(&self, entry_name: &str, input: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzBuilder::new()
                    .filename(entry_name)
                    .write(Vec::new(), GzCompression::best());
                encoder.write_all(input)?;
                encoder.finish()
            }
            Self::Bzip2 => {
                let mut encoder = BzEncoder::new(Vec::new(), BzCompression::best());
                encoder.write_all(input)?;
                encoder.finish()
            }
        }
    }

    /// Decompresses an archive produced by `wrap`
    pub fn unwrap(&self, input: &[u8]) -> io::Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Self::Gzip => GzDecoder::new(input).read_to_end(&mut output)?,
            Self::Bzip2 => BzDecoder::new(input).read_to_end(&mut output)?,
        };
        Ok(output)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}
