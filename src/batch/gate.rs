use super::codec::BatchCodec;

/// Something whose wire length can be checked against a backend limit.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    /// A single text, measured as the one-item batch it is sent as.
    Text(&'a str),
    /// A group of texts measured by the encoding the codec would send.
    Batch(&'a [&'a str]),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a [&'a str]> for Payload<'a> {
    fn from(texts: &'a [&'a str]) -> Self {
        Payload::Batch(texts)
    }
}

/// Length in characters the payload occupies on the wire.
pub fn encoded_length(payload: Payload<'_>, codec: &dyn BatchCodec) -> usize {
    match payload {
        Payload::Text(text) => codec.encoded_len(&[text]),
        Payload::Batch(texts) => codec.encoded_len(texts),
    }
}

/// Number of characters by which `payload` exceeds `limit`, or 0 if it fits.
pub fn excess_length(payload: Payload<'_>, codec: &dyn BatchCodec, limit: usize) -> usize {
    encoded_length(payload, codec).saturating_sub(limit)
}
