use super::*;

#[test]
fn test_put_ch_and_mem() {
    let mut b = OutBuf::new();
    b.put_ch(b'a').unwrap();
    b.put_mem(b"bc").unwrap();
    b.put_str("de").unwrap();
    assert_eq!(b.as_bytes(), b"abcde");
    assert_eq!(b.len(), 5);
}

#[test]
fn test_put_obuf_drains_source() {
    let mut b = OutBuf::new();
    let mut t = OutBuf::new();
    b.put_str("head ").unwrap();
    t.put_str("tail").unwrap();
    b.put_obuf(&mut t).unwrap();
    assert_eq!(b.as_bytes(), b"head tail");
    assert!(t.is_empty());
}

#[test]
fn test_put_obuf_empty_source_is_noop() {
    let mut b = OutBuf::new();
    let mut t = OutBuf::new();
    b.put_str("x").unwrap();
    b.put_obuf(&mut t).unwrap();
    assert_eq!(b.as_bytes(), b"x");
}

#[test]
fn test_put_stream() {
    let mut b = OutBuf::new();
    let mut src: &[u8] = b"streamed bytes";
    b.put_stream(&mut src).unwrap();
    assert_eq!(b.as_bytes(), b"streamed bytes");
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");

    let mut b = OutBuf::new();
    b.put_str("first\n").unwrap();
    b.write_file(&path, false).unwrap();
    assert!(b.is_empty());

    let mut b2 = OutBuf::new();
    b2.put_str("second\n").unwrap();
    b2.write_file(&path, true).unwrap();

    let mut back = OutBuf::new();
    back.put_file(&path).unwrap();
    assert_eq!(back.as_bytes(), b"first\nsecond\n");
}

#[test]
fn test_write_file_creates_missing_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a/b/c.txt");

    let mut b = OutBuf::new();
    b.put_str("deep").unwrap();
    b.write_file(&path, false).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"deep");
}

#[test]
fn test_put_file_missing_is_error() {
    let mut b = OutBuf::new();
    assert!(b.put_file(Path::new("/no/such/file/here")).is_err());
}

#[test]
fn test_flush_to_plain() {
    let mut b = OutBuf::new();
    b.put_mem(b"ab\x01cd").unwrap();
    let mut sink = Vec::new();
    b.flush_to(&mut sink, false).unwrap();
    assert_eq!(sink, b"ab\x01cd");
    assert!(b.is_empty());
}

#[test]
fn test_flush_to_tty_renders_control_bytes() {
    let mut b = OutBuf::new();
    b.put_mem(&[1, 26, 0, 27, 28, 29, 30, 31, 127]).unwrap();
    let mut sink = Vec::new();
    b.flush_to(&mut sink, true).unwrap();
    assert_eq!(sink, b"^A^Z^@^[^\\^]^^^_^?");
}

#[test]
fn test_flush_to_tty_passes_newline_and_printables() {
    let mut b = OutBuf::new();
    b.put_mem(b"ok\n").unwrap();
    b.put_ch(0x80).unwrap();
    let mut sink = Vec::new();
    b.flush_to(&mut sink, true).unwrap();
    assert_eq!(sink, b"ok\n\\x80");
}

#[test]
fn test_into_bytes() {
    let mut b = OutBuf::new();
    b.put_str("own").unwrap();
    assert_eq!(b.into_bytes(), b"own".to_vec());
}
