use serialize::hex::ToHex;

pub fn read_u32_be(input: &[u8]) -> u32 {
    assert!(input.len() == 4);
    let mut tmp = [0_u8; 4];
    tmp.copy_from_slice(input);
    u32::from_be_bytes(tmp)
}

pub fn write_u32_be(dst: &mut [u8], input: u32) {
    assert!(dst.len() == 4);
    dst.copy_from_slice(&input.to_be_bytes());
}

pub fn write_u32v_be(dst: &mut [u8], input: &[u32]) {
    assert!(dst.len() == 4 * input.len());
    for (chunk, &x) in dst.chunks_mut(4).zip(input) {
        write_u32_be(chunk, x);
    }
}

/// Hex of at most the last `n` bytes, for error messages about a buffer's
/// ragged end.
pub fn hex_tail(b: &[u8], n: usize) -> String {
    let start = b.len().saturating_sub(n);
    b[start..].to_hex()
}

#[test]
fn test_read_u32() {
    let input = [0x12_u8, 0x34, 0x56, 0x78];
    assert_eq!(0x12345678_u32, read_u32_be(&input));
}

#[test]
fn test_write_u32v() {
    let mut dst = [0_u8; 8];
    let src = [0x12345678_u32, 0x90abcdef_u32];
    write_u32v_be(&mut dst, &src);
    assert_eq!(&dst, &[0x12_u8, 0x34, 0x56, 0x78, 0x90, 0xab, 0xcd, 0xef]);
    assert_eq!(read_u32_be(&dst[4..]), 0x90abcdef_u32);
}

#[test]
fn test_hex_tail() {
    let b = [0x00_u8, 0x01, 0xfe, 0xff];
    assert_eq!(hex_tail(&b, 2), "feff");
    assert_eq!(hex_tail(&b, 10), "0001feff");
    assert_eq!(hex_tail(&[], 3), "");
}
