//! Recursive-length-prefix encoding, just the subset legacy transactions need.

/// One RLP item: a byte string or a list of already-encoded items.
pub enum Item<'a> {
    Bytes(&'a [u8]),
    Uint(u128),
    List(Vec<Item<'a>>),
}

pub fn encode(item: &Item<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(item, &mut out);
    out
}

fn encode_into(item: &Item<'_>, out: &mut Vec<u8>) {
    match item {
        Item::Bytes(bytes) => encode_bytes(bytes, out),
        Item::Uint(value) => encode_bytes(&minimal_be(*value), out),
        Item::List(items) => {
            let mut payload = Vec::new();
            for nested in items {
                encode_into(nested, &mut payload);
            }
            encode_length(payload.len(), 0xc0, out);
            out.extend_from_slice(&payload);
        }
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        out.push(bytes[0]);
    } else {
        encode_length(bytes.len(), 0x80, out);
        out.extend_from_slice(bytes);
    }
}

fn encode_length(len: usize, offset: u8, out: &mut Vec<u8>) {
    if len < 56 {
        out.push(offset + len as u8);
    } else {
        let len_bytes = minimal_be(len as u128);
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
    }
}

/// Big-endian bytes with leading zeros stripped; zero encodes as the empty string.
pub fn minimal_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Strip leading zero bytes from a fixed-width big-endian integer such as a signature scalar.
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}
