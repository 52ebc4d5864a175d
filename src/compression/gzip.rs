use flate2::write::GzEncoder;
use hyper::body::Bytes;
use log::debug;
use std::io::Write;

/// Compress content using gzip
pub fn compress_content(content: &[u8], gzip_content: &mut Vec<u8>) -> Result<(), std::io::Error> {
    let mut encoder = GzEncoder::new(gzip_content, flate2::Compression::default());
    encoder.write_all(content)?;
    encoder.finish()?;
    Ok(())
}

/// Gzip `content`, or `None` when the encoder fails and the caller should send it as is.
pub fn gzip_body(content: &[u8]) -> Option<Bytes> {
    let mut gzip_content = Vec::new();
    match compress_content(content, &mut gzip_content) {
        Ok(()) => Some(Bytes::from(gzip_content)),
        Err(e) => {
            debug!("Gzip compression failed, sending uncompressed body: {}", e);
            None
        }
    }
}
