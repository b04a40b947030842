/// Percent-encodes a string so it can be used as a single path component.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; every other byte of the
/// UTF-8 encoding becomes `%XX`. A leading `.` is encoded too, so no name
/// can collide with `.`, `..` or the store's temporary files.
///
/// ```
/// # use labstore_fs::encode_for_filename;
/// assert_eq!(encode_for_filename("req-42"), "req-42");
/// assert_eq!(encode_for_filename("a@lab/b"), "a%40lab%2Fb");
/// assert_eq!(encode_for_filename(".."), "%2E.");
/// ```
pub fn encode_for_filename(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for (i, byte) in s.bytes().enumerate() {
        match byte {
            b'.' if i == 0 => encoded.push_str("%2E"),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                encoded.push(char::from(byte));
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Reverses [`encode_for_filename`]. Returns `None` for malformed input.
///
/// ```
/// # use labstore_fs::decode_from_filename;
/// assert_eq!(decode_from_filename("a%40lab"), Some("a@lab".to_string()));
/// assert_eq!(decode_from_filename("bad%4"), None);
/// ```
pub fn decode_from_filename(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut input = encoded.bytes();
    while let Some(byte) = input.next() {
        if byte == b'%' {
            let high = char::from(input.next()?).to_digit(16)?;
            let low = char::from(input.next()?).to_digit(16)?;
            bytes.push(u8::try_from(high * 16 + low).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}
